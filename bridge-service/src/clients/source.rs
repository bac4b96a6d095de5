//! Repair-shop platform client (source system).
//!
//! Wire format notes: the API wraps payloads in a `data` envelope, hands out
//! money as strings, dates as unix seconds, and authenticates with an
//! `api_key` query parameter.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use sync_core::error::SyncError;
use sync_core::retry::{retry_call, RetryConfig};

use super::wire::{de_decimal, de_id, de_timestamp, non_empty};
use super::{InvoiceListFilter, SourceApi};
use crate::config::SourceApiConfig;
use crate::models::{
    normalize_address, RawAddress, SourceCustomer, SourceInvoice, SourceInvoiceStatus,
    SourceInvoiceSummary, SourceLineItem, SourcePayment, SourceTicket, TicketDevice, TicketStatus,
};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct InvoiceListData {
    #[serde(rename = "invoiceData", default)]
    invoices: Vec<InvoiceListEntry>,
}

#[derive(Debug, Deserialize)]
struct InvoiceListEntry {
    summary: InvoiceSummaryWire,
}

#[derive(Debug, Deserialize)]
struct InvoiceSummaryWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(rename = "order_id", deserialize_with = "de_id")]
    order_number: String,
    #[serde(rename = "created_date", deserialize_with = "de_timestamp")]
    date: chrono::DateTime<chrono::Utc>,
    status: String,
    customer: BasicCustomerWire,
}

#[derive(Debug, Deserialize)]
struct BasicCustomerWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(rename = "fullName")]
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceDetailWire {
    summary: InvoiceDetailSummaryWire,
    #[serde(default)]
    items: Vec<LineItemWire>,
}

#[derive(Debug, Deserialize)]
struct InvoiceDetailSummaryWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(rename = "order_id", deserialize_with = "de_id")]
    order_number: String,
    #[serde(rename = "created_date", deserialize_with = "de_timestamp")]
    date: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "subtotal_without_symbol", deserialize_with = "de_decimal")]
    subtotal: rust_decimal::Decimal,
    #[serde(rename = "total_tax_without_symbol", deserialize_with = "de_decimal")]
    total_tax: rust_decimal::Decimal,
    #[serde(rename = "total_without_symbol", deserialize_with = "de_decimal")]
    total: rust_decimal::Decimal,
    status: String,
    #[serde(default)]
    notes: Option<String>,
    customer: Value,
    ticket: TicketRefWire,
    #[serde(default)]
    payments: Vec<PaymentWire>,
}

#[derive(Debug, Deserialize)]
struct TicketRefWire {
    #[serde(rename = "isTicket", default)]
    is_ticket: bool,
    #[serde(default, deserialize_with = "super::wire::de_opt_id")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineItemWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    name: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(deserialize_with = "de_decimal")]
    quantity: rust_decimal::Decimal,
    #[serde(deserialize_with = "de_decimal")]
    price: rust_decimal::Decimal,
    #[serde(rename = "gst", deserialize_with = "de_decimal")]
    tax_amount: rust_decimal::Decimal,
    #[serde(deserialize_with = "de_decimal")]
    total: rust_decimal::Decimal,
    tax_class: TaxClassWire,
}

#[derive(Debug, Deserialize)]
struct TaxClassWire {
    #[serde(default, deserialize_with = "super::wire::de_opt_id")]
    id: Option<String>,
    #[serde(rename = "tax_percent", default, deserialize_with = "super::wire::de_opt_decimal")]
    percent: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Deserialize)]
struct PaymentWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(deserialize_with = "de_decimal")]
    amount: rust_decimal::Decimal,
    #[serde(rename = "payment_date", deserialize_with = "de_timestamp")]
    date: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TicketWire {
    summary: TicketSummaryWire,
    #[serde(default)]
    devices: Vec<TicketDeviceWire>,
}

#[derive(Debug, Deserialize)]
struct TicketSummaryWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(rename = "created_date", deserialize_with = "de_timestamp")]
    created_date: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct TicketDeviceWire {
    device: DeviceRefWire,
    status: StatusRefWire,
}

#[derive(Debug, Deserialize)]
struct DeviceRefWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusRefWire {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TicketStatusWire {
    name: String,
    #[serde(rename = "type")]
    category: String,
}

/// HTTP client for the repair-shop platform.
#[derive(Clone)]
pub struct SourceClient {
    client: Client,
    config: SourceApiConfig,
    retry: RetryConfig,
}

impl SourceClient {
    pub fn new(config: SourceApiConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            config,
            retry: RetryConfig::default(),
        })
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, SyncError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("api_key", self.config.api_key.expose_secret().clone()));

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        tracing::debug!(path = path, status = %status, "Source API response");

        if status.is_server_error() {
            return Err(SyncError::Transport(format!(
                "source API returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            return Err(SyncError::DomainRejection(format!(
                "source API returned {status}: {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| SyncError::InvalidResponse(format!("source API body: {e}")))
    }
}

/// The customer's address has shipped in three shapes over platform
/// revisions; each gets an explicit branch instead of attribute probing.
fn parse_raw_address(customer: &Value) -> Option<RawAddress> {
    if let Some(list) = customer.get("addresses") {
        if list.is_array() {
            return serde_json::from_value(list.clone()).ok();
        }
    }
    if let Some(nested) = customer.get("address") {
        if nested.is_object() {
            return serde_json::from_value(serde_json::json!({ "address": nested })).ok();
        }
    }
    serde_json::from_value(customer.clone()).ok()
}

fn parse_customer(raw: &Value) -> Result<SourceCustomer, SyncError> {
    #[derive(Debug, Deserialize)]
    struct CustomerWire {
        #[serde(alias = "cid", deserialize_with = "de_id")]
        id: String,
        #[serde(rename = "fullName")]
        full_name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        mobile: Option<String>,
        #[serde(default)]
        phone: Option<String>,
        #[serde(rename = "cus_group_id", deserialize_with = "de_id")]
        customer_group_id: String,
        #[serde(default)]
        custom_fields: Vec<CustomFieldWire>,
    }

    #[derive(Debug, Deserialize)]
    struct CustomFieldWire {
        name: String,
        #[serde(default)]
        value: Option<String>,
    }

    let wire: CustomerWire = serde_json::from_value(raw.clone())
        .map_err(|e| SyncError::InvalidResponse(format!("source customer: {e}")))?;

    let tax_id = wire
        .custom_fields
        .iter()
        .find(|f| f.name == "nif" || f.name == "tax_id")
        .and_then(|f| f.value.clone());

    let billing_address = parse_raw_address(raw).and_then(|a| normalize_address(&a));

    Ok(SourceCustomer {
        id: wire.id,
        full_name: wire.full_name,
        // Mobile falls back to the landline; both are blank-prone upstream.
        email: non_empty(wire.email),
        mobile: non_empty(wire.mobile).or(non_empty(wire.phone)),
        tax_id,
        customer_group_id: wire.customer_group_id,
        billing_address,
    })
}

fn into_line_item(wire: LineItemWire) -> SourceLineItem {
    SourceLineItem {
        id: wire.id,
        name: wire.name,
        notes: non_empty(wire.notes),
        quantity: wire.quantity,
        unit_price: wire.price,
        tax_amount: wire.tax_amount,
        total: wire.total,
        tax_class: wire.tax_class.id,
        tax_percent: wire.tax_class.percent.unwrap_or_default(),
    }
}

fn into_payment(wire: PaymentWire) -> SourcePayment {
    SourcePayment {
        id: wire.id,
        amount: wire.amount,
        date: wire.date,
        method: wire.method.unwrap_or_default(),
        notes: wire.notes.unwrap_or_default(),
    }
}

#[async_trait]
impl SourceApi for SourceClient {
    async fn list_invoices(
        &self,
        filter: &InvoiceListFilter,
    ) -> Result<Vec<SourceInvoiceSummary>, SyncError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(from) = filter.from {
            params.push(("from_datetime", from.timestamp().to_string()));
        }
        if let Some(to) = filter.to {
            params.push(("to_datetime", to.timestamp().to_string()));
        }
        if let Some(status) = filter.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(keyword) = &filter.keyword {
            params.push(("keyword", keyword.clone()));
        }
        if let Some(page_size) = filter.page_size {
            params.push(("pagesize", page_size.to_string()));
        }

        let body = retry_call(&self.retry, "source.list_invoices", || {
            self.get_json("/invoices", &params)
        })
        .await?;

        let envelope: Envelope<InvoiceListData> = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("invoice list: {e}")))?;

        Ok(envelope
            .data
            .invoices
            .into_iter()
            .map(|entry| SourceInvoiceSummary {
                id: entry.summary.id,
                order_number: entry.summary.order_number,
                date: entry.summary.date,
                status: SourceInvoiceStatus::from_string(&entry.summary.status),
                customer_id: entry.summary.customer.id,
                customer_name: entry.summary.customer.full_name,
            })
            .collect())
    }

    async fn invoice_by_id(&self, id: &str) -> Result<SourceInvoice, SyncError> {
        let path = format!("/invoices/{id}");
        let body = retry_call(&self.retry, "source.invoice_by_id", || {
            self.get_json(&path, &[])
        })
        .await?;

        let envelope: Envelope<InvoiceDetailWire> = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("invoice {id}: {e}")))?;
        let detail = envelope.data;

        let ticket = match (&detail.summary.ticket.is_ticket, &detail.summary.ticket.id) {
            (true, Some(ticket_id)) => Some(self.ticket_by_id(ticket_id).await?),
            _ => None,
        };

        let customer = parse_customer(&detail.summary.customer)?;

        Ok(SourceInvoice {
            id: detail.summary.id,
            order_number: detail.summary.order_number,
            ticket,
            date: detail.summary.date,
            subtotal: detail.summary.subtotal,
            total_tax: detail.summary.total_tax,
            total: detail.summary.total,
            notes: detail.summary.notes.unwrap_or_default(),
            customer,
            status: SourceInvoiceStatus::from_string(&detail.summary.status),
            items: detail.items.into_iter().map(into_line_item).collect(),
            payments: detail
                .summary
                .payments
                .into_iter()
                .map(into_payment)
                .collect(),
        })
    }

    async fn ticket_by_id(&self, id: &str) -> Result<SourceTicket, SyncError> {
        let path = format!("/tickets/{id}");
        let body = retry_call(&self.retry, "source.ticket_by_id", || {
            self.get_json(&path, &[])
        })
        .await?;

        let envelope: Envelope<TicketWire> = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("ticket {id}: {e}")))?;
        let ticket = envelope.data;

        Ok(SourceTicket {
            id: ticket.summary.id,
            created_date: ticket.summary.created_date,
            devices: ticket
                .devices
                .into_iter()
                .map(|d| TicketDevice {
                    id: d.device.id,
                    name: d.device.name,
                    status: d.status.name,
                })
                .collect(),
        })
    }

    async fn ticket_statuses(&self) -> Result<Vec<TicketStatus>, SyncError> {
        let body = retry_call(&self.retry, "source.ticket_statuses", || {
            self.get_json("/statuses", &[])
        })
        .await?;

        let envelope: Envelope<Vec<TicketStatusWire>> = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("ticket statuses: {e}")))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|s| TicketStatus {
                name: s.name,
                category: s.category,
            })
            .collect())
    }
}
