//! Common test utilities for bridge-service integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use bridge_service::clients::{DocumentListFilter, InvoiceListFilter, SourceApi, TargetApi};
use bridge_service::config::{
    BridgeConfig, MappingConfig, SchedulerConfig, SourceApiConfig, TargetApiConfig,
};
use bridge_service::models::{
    DocumentItem, DocumentStatus, DocumentType, NewContact, NewDocument, SourceCustomer,
    SourceInvoice, SourceInvoiceStatus, SourceInvoiceSummary, SourceLineItem, SourcePayment,
    SourceTicket, TargetContact, TargetDocument, TargetPayment, TicketStatus,
};
use secrecy::Secret;
use sync_core::error::SyncError;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
#[allow(dead_code)]
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,bridge_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + n * 86_400, 0).unwrap()
}

pub fn test_config(data_dir: &std::path::Path) -> BridgeConfig {
    BridgeConfig {
        common: sync_core::config::Config {
            log_level: "debug".to_string(),
            log_json: false,
        },
        service_name: "bridge-service-test".to_string(),
        source: SourceApiConfig {
            base_url: "http://localhost:0".to_string(),
            api_key: Secret::new("test".to_string()),
        },
        target: TargetApiConfig {
            base_url: "http://localhost:0".to_string(),
            api_key: Secret::new("test".to_string()),
        },
        data_dir: data_dir.to_path_buf(),
        email_enabled: false,
        sync_cutoff: Utc.timestamp_opt(0, 0).unwrap(),
        scheduler: SchedulerConfig {
            new_invoice_interval_secs: 60,
            recent_resync_interval_secs: 3600,
            recent_resync_count: 50,
            deep_resync_interval_secs: 86_400,
        },
        mapping: MappingConfig::default(),
    }
}

pub fn customer(id: &str) -> SourceCustomer {
    SourceCustomer {
        id: id.to_string(),
        full_name: "Jane Doe".to_string(),
        email: Some("jane@example.com".to_string()),
        mobile: Some("600123456".to_string()),
        tax_id: None,
        customer_group_id: "1".to_string(),
        billing_address: None,
    }
}

pub fn line(total: &str, quantity: &str, tax_percent: &str) -> SourceLineItem {
    SourceLineItem {
        id: "li1".to_string(),
        name: "Screen replacement".to_string(),
        notes: None,
        quantity: dec(quantity),
        unit_price: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        total: dec(total),
        tax_class: None,
        tax_percent: dec(tax_percent),
    }
}

pub fn payment(id: &str, amount: &str, date: DateTime<Utc>) -> SourcePayment {
    SourcePayment {
        id: id.to_string(),
        amount: dec(amount),
        date,
        method: "Cash".to_string(),
        notes: String::new(),
    }
}

/// A paid single-line invoice; total and payment agree with the line.
pub fn paid_invoice(id: &str, order_number: &str, total: &str) -> SourceInvoice {
    SourceInvoice {
        id: id.to_string(),
        order_number: order_number.to_string(),
        ticket: None,
        date: day(0),
        subtotal: Decimal::ZERO,
        total_tax: Decimal::ZERO,
        total: dec(total),
        notes: String::new(),
        customer: customer("55"),
        status: SourceInvoiceStatus::Paid,
        items: vec![line(total, "1", "21")],
        payments: vec![payment("p1", total, day(0))],
    }
}

pub fn summary_of(invoice: &SourceInvoice) -> SourceInvoiceSummary {
    SourceInvoiceSummary {
        id: invoice.id.clone(),
        order_number: invoice.order_number.clone(),
        date: invoice.date,
        status: invoice.status,
        customer_id: invoice.customer.id.clone(),
        customer_name: invoice.customer.full_name.clone(),
    }
}

/// In-memory stand-in for the repair-shop platform.
#[derive(Default)]
pub struct MockSource {
    pub invoices: Mutex<HashMap<String, SourceInvoice>>,
    pub statuses: Mutex<Vec<TicketStatus>>,
    pub tickets: Mutex<HashMap<String, SourceTicket>>,
    pub list_calls: Mutex<Vec<InvoiceListFilter>>,
}

impl MockSource {
    pub fn with_invoices(invoices: Vec<SourceInvoice>) -> Self {
        let mock = Self::default();
        {
            let mut map = mock.invoices.lock().unwrap();
            for invoice in invoices {
                map.insert(invoice.id.clone(), invoice);
            }
        }
        *mock.statuses.lock().unwrap() = vec![
            TicketStatus {
                name: "Repaired".to_string(),
                category: "Closed".to_string(),
            },
            TicketStatus {
                name: "In Progress".to_string(),
                category: "Open".to_string(),
            },
        ];
        mock
    }

    pub fn put_invoice(&self, invoice: SourceInvoice) {
        self.invoices
            .lock()
            .unwrap()
            .insert(invoice.id.clone(), invoice);
    }
}

#[async_trait]
impl SourceApi for MockSource {
    async fn list_invoices(
        &self,
        filter: &InvoiceListFilter,
    ) -> Result<Vec<SourceInvoiceSummary>, SyncError> {
        self.list_calls.lock().unwrap().push(filter.clone());
        let mut summaries: Vec<SourceInvoiceSummary> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|i| filter.from.map_or(true, |from| i.date >= from))
            .map(summary_of)
            .collect();
        // The real endpoint lists newest first.
        summaries.sort_by(|a, b| b.date.cmp(&a.date));
        if let Some(page_size) = filter.page_size {
            summaries.truncate(page_size);
        }
        Ok(summaries)
    }

    async fn invoice_by_id(&self, id: &str) -> Result<SourceInvoice, SyncError> {
        self.invoices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::DomainRejection(format!("no invoice {id}")))
    }

    async fn ticket_by_id(&self, id: &str) -> Result<SourceTicket, SyncError> {
        self.tickets
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::DomainRejection(format!("no ticket {id}")))
    }

    async fn ticket_statuses(&self) -> Result<Vec<TicketStatus>, SyncError> {
        Ok(self.statuses.lock().unwrap().clone())
    }
}

/// In-memory stand-in for the accounting ledger. Records every mutation so
/// tests can assert on call counts.
#[derive(Default)]
pub struct MockTarget {
    pub contacts: Mutex<Vec<TargetContact>>,
    pub documents: Mutex<Vec<TargetDocument>>,
    pub created: Mutex<Vec<(NewDocument, bool)>>,
    pub contact_creates: Mutex<Vec<NewContact>>,
    pub contact_updates: Mutex<Vec<(String, NewContact)>>,
    pub payments_posted: Mutex<Vec<(String, TargetPayment)>>,
    pub deleted: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<String>>,
    next_id: AtomicU64,
    /// When set, the unwindowed document listing returns at most this many
    /// entries, like the real first page does.
    pub first_page_limit: Option<usize>,
    /// When set, contact writes carrying a billing address are rejected.
    pub reject_contact_addresses: bool,
    /// When set, document deletes are rejected.
    pub reject_deletes: AtomicBool,
    pub delete_attempts: AtomicU64,
}

impl MockTarget {
    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn put_contact(&self, contact: TargetContact) {
        self.contacts.lock().unwrap().push(contact);
    }

    pub fn put_document(&self, document: TargetDocument) {
        self.documents.lock().unwrap().push(document);
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn posted_payments(&self) -> Vec<(String, TargetPayment)> {
        self.payments_posted.lock().unwrap().clone()
    }
}

fn document_from_payload(id: String, payload: &NewDocument) -> TargetDocument {
    let items: Vec<DocumentItem> = payload.items.clone();
    let total: Decimal = items.iter().map(|i| i.units * i.gross_unit_price()).sum();
    TargetDocument {
        id,
        doc_type: payload.doc_type,
        number: Some(payload.number.clone()),
        date: payload.date,
        contact_id: Some(payload.contact_id.clone()),
        items,
        tags: payload.tags.clone(),
        notes: payload.notes.clone(),
        payments: vec![],
        total,
        paid: Decimal::ZERO,
        pending: total,
        status: DocumentStatus::Unpaid,
    }
}

#[async_trait]
impl TargetApi for MockTarget {
    async fn list_documents(
        &self,
        filter: &DocumentListFilter,
    ) -> Result<Vec<TargetDocument>, SyncError> {
        let mut documents: Vec<TargetDocument> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.doc_type == filter.doc_type)
            .filter(|d| {
                filter
                    .contact_id
                    .as_ref()
                    .map_or(true, |c| d.contact_id.as_ref() == Some(c))
            })
            .filter(|d| filter.start.map_or(true, |s| d.date >= s))
            .filter(|d| filter.end.map_or(true, |e| d.date <= e))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.date.cmp(&a.date));
        if filter.start.is_none() && filter.end.is_none() {
            if let Some(limit) = self.first_page_limit {
                documents.truncate(limit);
            }
        }
        Ok(documents)
    }

    async fn create_document(
        &self,
        document: &NewDocument,
        draft: bool,
    ) -> Result<String, SyncError> {
        let id = self.fresh_id("doc");
        self.created.lock().unwrap().push((document.clone(), draft));
        self.documents
            .lock()
            .unwrap()
            .push(document_from_payload(id.clone(), document));
        Ok(id)
    }

    async fn delete_document(&self, _doc_type: DocumentType, id: &str) -> Result<(), SyncError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::DomainRejection(
                "document is locked".to_string(),
            ));
        }
        self.deleted.lock().unwrap().push(id.to_string());
        self.documents.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }

    async fn pay_document(
        &self,
        _doc_type: DocumentType,
        id: &str,
        payment: &TargetPayment,
    ) -> Result<(), SyncError> {
        self.payments_posted
            .lock()
            .unwrap()
            .push((id.to_string(), payment.clone()));
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| SyncError::DomainRejection(format!("no document {id}")))?;
        document.payments.push(payment.clone());
        document.paid += payment.amount;
        document.pending -= payment.amount;
        Ok(())
    }

    async fn send_document(
        &self,
        _doc_type: DocumentType,
        id: &str,
        _email: &str,
    ) -> Result<(), SyncError> {
        self.sent.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn contact_by_id(&self, id: &str) -> Result<Option<TargetContact>, SyncError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn contact_by_custom_id(
        &self,
        custom_id: &str,
    ) -> Result<Option<TargetContact>, SyncError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.custom_id.as_deref() == Some(custom_id))
            .cloned())
    }

    async fn contact_by_mobile(&self, mobile: &str) -> Result<Option<TargetContact>, SyncError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.mobile.as_deref() == Some(mobile))
            .cloned())
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<String, SyncError> {
        self.contact_creates.lock().unwrap().push(contact.clone());
        if self.reject_contact_addresses && contact.billing_address.is_some() {
            return Err(SyncError::DomainRejection("invalid address".to_string()));
        }
        let id = self.fresh_id("con");
        self.contacts.lock().unwrap().push(TargetContact {
            id: id.clone(),
            custom_id: contact.custom_id.clone(),
            name: contact.name.clone(),
            tax_id: contact.tax_id.clone(),
            email: contact.email.clone(),
            mobile: contact.mobile.clone(),
            phone: contact.phone.clone(),
            is_person: contact.is_person,
            billing_address: contact.billing_address.clone(),
        });
        Ok(id)
    }

    async fn update_contact(&self, id: &str, contact: &NewContact) -> Result<(), SyncError> {
        self.contact_updates
            .lock()
            .unwrap()
            .push((id.to_string(), contact.clone()));
        if self.reject_contact_addresses && contact.billing_address.is_some() {
            return Err(SyncError::DomainRejection("invalid address".to_string()));
        }
        let mut contacts = self.contacts.lock().unwrap();
        let existing = contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| SyncError::DomainRejection(format!("no contact {id}")))?;
        existing.custom_id = contact.custom_id.clone();
        existing.name = contact.name.clone();
        existing.tax_id = contact.tax_id.clone();
        existing.email = contact.email.clone();
        existing.mobile = contact.mobile.clone();
        existing.is_person = contact.is_person;
        existing.billing_address = contact.billing_address.clone();
        Ok(())
    }
}
