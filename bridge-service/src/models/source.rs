//! Models for the repair-shop platform (the source system).
//!
//! Everything here is read-only from the engine's perspective: the source is
//! authoritative and is never written back to.

use super::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice payment status as reported by the source platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceInvoiceStatus {
    Paid,
    Unpaid,
    Partial,
    Refund,
}

impl SourceInvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceInvoiceStatus::Paid => "Paid",
            SourceInvoiceStatus::Unpaid => "UnPaid",
            SourceInvoiceStatus::Partial => "Partial",
            SourceInvoiceStatus::Refund => "Refund",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "Paid" => SourceInvoiceStatus::Paid,
            "Partial" => SourceInvoiceStatus::Partial,
            "Refund" => SourceInvoiceStatus::Refund,
            _ => SourceInvoiceStatus::Unpaid,
        }
    }
}

/// One entry of the platform's ticket-status taxonomy.
#[derive(Debug, Clone)]
pub struct TicketStatus {
    pub name: String,
    /// Taxonomy category, e.g. "Closed" or "Open".
    pub category: String,
}

impl TicketStatus {
    pub fn is_closed(&self) -> bool {
        self.category == "Closed"
    }
}

/// A device attached to a repair ticket.
#[derive(Debug, Clone)]
pub struct TicketDevice {
    pub id: String,
    pub name: String,
    pub status: String,
}

/// A repair ticket linked to an invoice.
#[derive(Debug, Clone)]
pub struct SourceTicket {
    pub id: String,
    pub created_date: DateTime<Utc>,
    pub devices: Vec<TicketDevice>,
}

impl SourceTicket {
    /// A ticket is closed only when every device sits in a closed status.
    pub fn is_closed(&self, closed_statuses: &[String]) -> bool {
        self.devices
            .iter()
            .all(|d| closed_statuses.contains(&d.status))
    }
}

/// Customer record as carried on a full invoice.
#[derive(Debug, Clone)]
pub struct SourceCustomer {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub tax_id: Option<String>,
    pub customer_group_id: String,
    pub billing_address: Option<Address>,
}

/// A line item on a source invoice. `total` is the gross line total the
/// customer was charged; `unit_price` is the net unit price before tax.
#[derive(Debug, Clone)]
pub struct SourceLineItem {
    pub id: String,
    pub name: String,
    pub notes: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub tax_class: Option<String>,
    pub tax_percent: Decimal,
}

/// A payment recorded against a source invoice.
#[derive(Debug, Clone)]
pub struct SourcePayment {
    pub id: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub method: String,
    pub notes: String,
}

/// Listing-level invoice summary (the list endpoint returns no items or
/// payments; a full fetch by id is needed for those).
#[derive(Debug, Clone)]
pub struct SourceInvoiceSummary {
    pub id: String,
    pub order_number: String,
    pub date: DateTime<Utc>,
    pub status: SourceInvoiceStatus,
    pub customer_id: String,
    pub customer_name: String,
}

/// A fully hydrated source invoice.
#[derive(Debug, Clone)]
pub struct SourceInvoice {
    pub id: String,
    pub order_number: String,
    pub ticket: Option<SourceTicket>,
    pub date: DateTime<Utc>,
    pub subtotal: Decimal,
    pub total_tax: Decimal,
    pub total: Decimal,
    pub notes: String,
    pub customer: SourceCustomer,
    pub status: SourceInvoiceStatus,
    pub items: Vec<SourceLineItem>,
    pub payments: Vec<SourcePayment>,
}

impl SourceInvoice {
    /// Sum of all gross line totals.
    pub fn line_total_sum(&self) -> Decimal {
        self.items.iter().map(|i| i.total).sum()
    }

    /// Sum of all recorded payments.
    pub fn payment_sum(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }
}
