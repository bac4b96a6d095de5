//! Models for the accounting ledger (the target system).

use super::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Document type in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    CreditNote,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::CreditNote => "creditnote",
        }
    }
}

/// Sort order accepted by the ledger's document listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSort {
    CreatedAscending,
    CreatedDescending,
}

impl DocumentSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSort::CreatedAscending => "created-asc",
            DocumentSort::CreatedDescending => "created-desc",
        }
    }
}

/// Payment status of a ledger document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Unpaid,
    Paid,
    PartiallyPaid,
    Canceled,
}

impl DocumentStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => DocumentStatus::Paid,
            2 => DocumentStatus::PartiallyPaid,
            3 => DocumentStatus::Canceled,
            _ => DocumentStatus::Unpaid,
        }
    }

    pub fn as_code(&self) -> i64 {
        match self {
            DocumentStatus::Unpaid => 0,
            DocumentStatus::Paid => 1,
            DocumentStatus::PartiallyPaid => 2,
            DocumentStatus::Canceled => 3,
        }
    }
}

/// A contact in the ledger. `custom_id` carries the source customer id and is
/// the primary cross-system identity; mobile number is the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContact {
    pub id: String,
    pub custom_id: Option<String>,
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub phone: Option<String>,
    pub is_person: bool,
    pub billing_address: Option<Address>,
}

/// Contact payload for create/update calls (no ledger id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub custom_id: Option<String>,
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub phone: Option<String>,
    pub is_person: bool,
    pub billing_address: Option<Address>,
}

impl NewContact {
    /// Copy with billing address removed, for the strip-address retry after a
    /// rejected create/update.
    pub fn without_address(&self) -> Self {
        Self {
            billing_address: None,
            ..self.clone()
        }
    }
}

/// A line item on a ledger document. `subtotal` is the net unit price.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentItem {
    pub name: String,
    pub description: Option<String>,
    pub units: Decimal,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax_percent: Decimal,
    pub taxes: Vec<String>,
}

impl DocumentItem {
    /// Gross unit price: net subtotal with tax applied.
    pub fn gross_unit_price(&self) -> Decimal {
        self.subtotal * (Decimal::ONE + self.tax_percent / Decimal::ONE_HUNDRED)
    }
}

/// A payment recorded on a ledger document.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPayment {
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub amount: Decimal,
}

/// An existing ledger document.
#[derive(Debug, Clone)]
pub struct TargetDocument {
    pub id: String,
    pub doc_type: DocumentType,
    pub number: Option<String>,
    pub date: DateTime<Utc>,
    pub contact_id: Option<String>,
    pub items: Vec<DocumentItem>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub payments: Vec<TargetPayment>,
    pub total: Decimal,
    pub paid: Decimal,
    pub pending: Decimal,
    pub status: DocumentStatus,
}

impl TargetDocument {
    pub fn is_canceled(&self) -> bool {
        self.status == DocumentStatus::Canceled
    }
}

/// Document payload for create calls. Payments are posted separately, after
/// creation, by the payment reconciler.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub doc_type: DocumentType,
    pub contact_id: String,
    pub number: String,
    pub date: DateTime<Utc>,
    pub items: Vec<DocumentItem>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub numbering_series_id: Option<String>,
}
