//! API clients for the two external platforms.
//!
//! The engine only ever talks to [`SourceApi`] and [`TargetApi`]; the reqwest
//! implementations own the wire formats and keep them out of the sync logic.

pub mod source;
pub mod target;
pub(crate) mod wire;

pub use source::SourceClient;
pub use target::TargetClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sync_core::error::SyncError;

use crate::models::{
    DocumentSort, DocumentStatus, DocumentType, NewContact, NewDocument, SourceInvoice,
    SourceInvoiceStatus, SourceInvoiceSummary, SourceTicket, TargetContact, TargetDocument,
    TargetPayment, TicketStatus,
};

/// Filter for the source invoice listing.
#[derive(Debug, Clone, Default)]
pub struct InvoiceListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<SourceInvoiceStatus>,
    pub keyword: Option<String>,
    pub page_size: Option<usize>,
}

/// Filter for the ledger document listing.
#[derive(Debug, Clone)]
pub struct DocumentListFilter {
    pub doc_type: DocumentType,
    pub contact_id: Option<String>,
    pub sort: Option<DocumentSort>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub paid: Option<DocumentStatus>,
}

impl DocumentListFilter {
    pub fn invoices() -> Self {
        Self {
            doc_type: DocumentType::Invoice,
            contact_id: None,
            sort: Some(DocumentSort::CreatedDescending),
            start: None,
            end: None,
            paid: None,
        }
    }

    pub fn for_contact(contact_id: &str) -> Self {
        Self {
            contact_id: Some(contact_id.to_string()),
            ..Self::invoices()
        }
    }
}

/// Read-only operations against the repair-shop platform.
#[async_trait]
pub trait SourceApi: Send + Sync {
    async fn list_invoices(
        &self,
        filter: &InvoiceListFilter,
    ) -> Result<Vec<SourceInvoiceSummary>, SyncError>;

    async fn invoice_by_id(&self, id: &str) -> Result<SourceInvoice, SyncError>;

    async fn ticket_by_id(&self, id: &str) -> Result<SourceTicket, SyncError>;

    async fn ticket_statuses(&self) -> Result<Vec<TicketStatus>, SyncError>;
}

/// Operations against the accounting ledger.
#[async_trait]
pub trait TargetApi: Send + Sync {
    async fn list_documents(
        &self,
        filter: &DocumentListFilter,
    ) -> Result<Vec<TargetDocument>, SyncError>;

    /// Create a document; returns the new ledger id.
    async fn create_document(&self, document: &NewDocument, draft: bool)
        -> Result<String, SyncError>;

    async fn delete_document(&self, doc_type: DocumentType, id: &str) -> Result<(), SyncError>;

    async fn pay_document(
        &self,
        doc_type: DocumentType,
        id: &str,
        payment: &TargetPayment,
    ) -> Result<(), SyncError>;

    async fn send_document(
        &self,
        doc_type: DocumentType,
        id: &str,
        email: &str,
    ) -> Result<(), SyncError>;

    async fn contact_by_id(&self, id: &str) -> Result<Option<TargetContact>, SyncError>;

    async fn contact_by_custom_id(
        &self,
        custom_id: &str,
    ) -> Result<Option<TargetContact>, SyncError>;

    async fn contact_by_mobile(&self, mobile: &str) -> Result<Option<TargetContact>, SyncError>;

    /// Create a contact; returns the new ledger id.
    async fn create_contact(&self, contact: &NewContact) -> Result<String, SyncError>;

    async fn update_contact(&self, id: &str, contact: &NewContact) -> Result<(), SyncError>;
}
