//! Domain models for bridge-service.

mod address;
mod source;
mod target;
mod warning;

pub use address::{normalize_address, Address, AddressFields, RawAddress};
pub use source::{
    SourceCustomer, SourceInvoice, SourceInvoiceStatus, SourceInvoiceSummary, SourceLineItem,
    SourcePayment, SourceTicket, TicketDevice, TicketStatus,
};
pub use target::{
    DocumentItem, DocumentSort, DocumentStatus, DocumentType, NewContact, NewDocument,
    TargetContact, TargetDocument, TargetPayment,
};
pub use warning::Warning;
