//! Invoice synchronizer: the per-invoice state machine and the sweeps that
//! drive it.
//!
//! For each source invoice: sanity gate, contact reconciliation, document
//! lookup, then create / replace / no-op, each followed by payment
//! reconciliation. Anything the engine cannot resolve becomes a warning.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use sync_core::error::SyncError;

use crate::clients::{DocumentListFilter, InvoiceListFilter, SourceApi, TargetApi};
use crate::config::{BridgeConfig, MappingConfig};
use crate::models::{
    DocumentType, SourceInvoice, SourceInvoiceSummary, TargetContact, TargetDocument, Warning,
};
use crate::services::locator::{locate_document, LocatorOutcome};
use crate::services::mapping::{
    convert_document, decode_order_number, encode_order_number, is_pure_used_goods,
    mixes_used_goods,
};
use crate::services::{
    compare_documents, Comparison, ContactReconciler, PaymentReconciler, WarningLedger, TOLERANCE,
};

/// Anonymous walk-in account in the source platform; its "invoices" have no
/// real buyer and are never synced.
const WALK_IN_CUSTOMER_ID: &str = "0";

/// A ticket still open after this long is probably abandoned; drafts created
/// for such tickets get an informational warning so someone takes a look.
const STALE_TICKET_DAYS: i64 = 30;

/// Page size for sweep listings. Source invoice dates are floored to the
/// day, so narrow paging around the resume point is unreliable; one large
/// page with client-side filtering covers every invoice the sweep's date
/// window can hold.
const SWEEP_PAGE_SIZE: usize = 10_000;

pub struct Synchronizer {
    source: Arc<dyn SourceApi>,
    target: Arc<dyn TargetApi>,
    contacts: ContactReconciler,
    payments: PaymentReconciler,
    warnings: WarningLedger,
    mapping: MappingConfig,
    email_enabled: bool,
    sync_cutoff: chrono::DateTime<Utc>,
}

impl Synchronizer {
    pub fn new(
        source: Arc<dyn SourceApi>,
        target: Arc<dyn TargetApi>,
        warnings: WarningLedger,
        config: &BridgeConfig,
    ) -> Self {
        let contacts = ContactReconciler::new(target.clone(), config.mapping.clone());
        let payments = PaymentReconciler::new(target.clone(), warnings.clone());
        Self {
            source,
            target,
            contacts,
            payments,
            warnings,
            mapping: config.mapping.clone(),
            email_enabled: config.email_enabled,
            sync_cutoff: config.sync_cutoff,
        }
    }

    /// Sweep for invoices the ledger has not seen yet.
    ///
    /// The resume point is re-derived each run from the ledger itself: the
    /// highest document number that decodes as one of ours, plus that
    /// document's date. No cursor file. The listing window opens at the
    /// resume document's date (numbers grow with time, so nothing newer can
    /// be dated earlier), which keeps the window small enough for one page.
    pub async fn sync_new_invoices(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        let resume_point = self.resume_point().await?;
        tracing::debug!(resume_point = ?resume_point, "Starting new-invoice sweep");

        let from = resume_point
            .map(|(_, date)| date)
            .unwrap_or(self.sync_cutoff);
        let mut summaries = self
            .source
            .list_invoices(&InvoiceListFilter {
                from: Some(from),
                to: Some(Utc::now()),
                page_size: Some(SWEEP_PAGE_SIZE),
                ..InvoiceListFilter::default()
            })
            .await?;
        summaries.retain(|s| match decode_order_number(&s.order_number) {
            Some(n) => resume_point.map_or(true, |(resume, _)| n > resume),
            None => false,
        });

        self.sync_batch(summaries, cancel).await
    }

    /// Re-verify the `count` most recent invoices. Catches same-day edits:
    /// payments added after the fact, line corrections, refunds.
    pub async fn sync_recent_invoices(
        &self,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let mut summaries = self
            .source
            .list_invoices(&InvoiceListFilter {
                from: Some(self.sync_cutoff),
                to: Some(Utc::now()),
                page_size: Some(count.max(1)),
                ..InvoiceListFilter::default()
            })
            .await?;
        summaries.sort_by(|a, b| b.date.cmp(&a.date));
        summaries.truncate(count);

        self.sync_batch(summaries, cancel).await
    }

    /// Full re-verification of everything from the cutoff forward.
    pub async fn deep_resync(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        let summaries = self
            .source
            .list_invoices(&InvoiceListFilter {
                from: Some(self.sync_cutoff),
                to: Some(Utc::now()),
                page_size: Some(SWEEP_PAGE_SIZE),
                ..InvoiceListFilter::default()
            })
            .await?;
        self.sync_batch(summaries, cancel).await
    }

    /// Process a batch oldest-first, one invoice at a time. Cancellation is
    /// honored between invoices only; a single invoice always runs to
    /// completion so delete/recreate/pay never ends half-done.
    async fn sync_batch(
        &self,
        mut summaries: Vec<SourceInvoiceSummary>,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        summaries.sort_by_key(|s| s.date);
        for summary in summaries {
            if cancel.is_cancelled() {
                tracing::info!("Sweep cancelled; stopping before next invoice");
                return Ok(());
            }
            if let Err(e) = self.sync_invoice(&summary.id).await {
                tracing::error!(
                    invoice_id = %summary.id,
                    order_number = %summary.order_number,
                    error = %e,
                    "Invoice sync failed; continuing with next invoice"
                );
            }
        }
        Ok(())
    }

    /// Synchronize one invoice end to end.
    pub async fn sync_invoice(&self, invoice_id: &str) -> Result<(), SyncError> {
        let invoice = self.source.invoice_by_id(invoice_id).await?;
        if invoice.date < self.sync_cutoff {
            tracing::debug!(invoice_id, "Invoice predates cutoff; skipping");
            return Ok(());
        }

        let order_id = match self.sanity_check(&invoice) {
            Ok(order_id) => order_id,
            Err(issue) => {
                self.warnings.record(Warning::new(
                    issue.to_string(),
                    invoice.order_number.clone(),
                    Some(invoice.id.clone()),
                    None,
                ))?;
                return Ok(());
            }
        };

        let contact = match self.contacts.reconcile(&invoice.customer).await {
            Ok(contact) => contact,
            Err(SyncError::DomainRejection(reason)) => {
                self.warnings.record(Warning::new(
                    format!("ledger rejected the customer record: {reason}"),
                    invoice.order_number.clone(),
                    Some(invoice.id.clone()),
                    None,
                ))?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let draft = self.draft_decision(&invoice).await?;
        let doc_number = encode_order_number(order_id);

        match locate_document(self.target.as_ref(), &contact.id, &doc_number).await? {
            LocatorOutcome::NotFound => {
                self.create_and_pay(&invoice, &contact, &doc_number, draft)
                    .await
            }
            LocatorOutcome::Found(document) => {
                match compare_documents(&invoice, &document, &self.mapping) {
                    Comparison::Matching => self.payments.reconcile(&invoice, &document).await,
                    Comparison::Mismatched(reason) => {
                        if self
                            .warnings
                            .has_warning_for(Some(&invoice.id), Some(&document.id))?
                        {
                            // A previous run already flagged this pair; the
                            // correction waits for an operator.
                            tracing::debug!(
                                invoice_id = %invoice.id,
                                document_id = %document.id,
                                "Mismatch already flagged; leaving document untouched"
                            );
                            return Ok(());
                        }
                        self.replace_and_pay(&invoice, &contact, &document, &doc_number, draft, reason)
                            .await
                    }
                }
            }
        }
    }

    /// Gate against invoices that must never produce a target call. On
    /// success, returns the parsed numeric order id.
    fn sanity_check(&self, invoice: &SourceInvoice) -> Result<u64, SyncError> {
        let Ok(order_id) = invoice.order_number.trim().parse::<u64>() else {
            return Err(SyncError::SanityCheck(format!(
                "order number {:?} is not a numeric id and cannot produce a document number",
                invoice.order_number
            )));
        };
        let drift = (invoice.line_total_sum() - invoice.total).abs();
        if drift > TOLERANCE {
            return Err(SyncError::SanityCheck(format!(
                "line totals sum to {} but the invoice total is {}",
                invoice.line_total_sum(),
                invoice.total
            )));
        }
        if mixes_used_goods(invoice, &self.mapping) {
            return Err(SyncError::SanityCheck(
                "invoice mixes margin-scheme (used goods) lines with priced regular lines"
                    .to_string(),
            ));
        }
        if invoice.customer.id == WALK_IN_CUSTOMER_ID {
            return Err(SyncError::SanityCheck(
                "invoice belongs to the anonymous walk-in account".to_string(),
            ));
        }
        Ok(order_id)
    }

    /// Whether the ledger document should be created as a draft.
    ///
    /// With a linked ticket the document stays draft while any device is in
    /// an open status. Without a ticket, only pure used-goods invoices stay
    /// draft (the margin scheme needs manual approval).
    async fn draft_decision(&self, invoice: &SourceInvoice) -> Result<bool, SyncError> {
        match &invoice.ticket {
            Some(ticket) => {
                let closed = self.closed_statuses().await?;
                Ok(!ticket.is_closed(&closed))
            }
            None => Ok(is_pure_used_goods(invoice, &self.mapping)),
        }
    }

    async fn closed_statuses(&self) -> Result<Vec<String>, SyncError> {
        Ok(self
            .source
            .ticket_statuses()
            .await?
            .into_iter()
            .filter(|s| s.is_closed())
            .map(|s| s.name)
            .collect())
    }

    async fn create_and_pay(
        &self,
        invoice: &SourceInvoice,
        contact: &TargetContact,
        doc_number: &str,
        draft: bool,
    ) -> Result<(), SyncError> {
        let payload = convert_document(invoice, &contact.id, doc_number, &self.mapping);
        tracing::info!(
            invoice_id = %invoice.id,
            doc_number = %payload.number,
            draft,
            "Creating ledger document"
        );
        let document_id = self.target.create_document(&payload, draft).await?;

        if draft {
            self.explain_draft(invoice, &document_id).await?;
        }

        let document = self.refetch(&contact.id, &payload.number).await?;
        self.payments.reconcile(invoice, &document).await?;
        self.maybe_send(invoice, &document_id, draft).await
    }

    /// Replace a diverged document: delete and recreate back-to-back, then
    /// reconcile payments onto the replacement. A rejection from the ledger
    /// on either step is terminal for this invoice; it becomes a warning and
    /// is never retried.
    async fn replace_and_pay(
        &self,
        invoice: &SourceInvoice,
        contact: &TargetContact,
        existing: &TargetDocument,
        doc_number: &str,
        draft: bool,
        reason: String,
    ) -> Result<(), SyncError> {
        tracing::info!(
            invoice_id = %invoice.id,
            document_id = %existing.id,
            reason = %reason,
            "Replacing diverged ledger document"
        );

        let payload = convert_document(invoice, &contact.id, doc_number, &self.mapping);
        let replaced: Result<String, SyncError> = async {
            self.target
                .delete_document(existing.doc_type, &existing.id)
                .await?;
            self.target.create_document(&payload, draft).await
        }
        .await
        .map_err(|e| match e {
            SyncError::DomainRejection(rejection) => SyncError::Divergence(format!(
                "approved document is mismatched ({reason}) and could not be replaced: {rejection}"
            )),
            other => other,
        });

        let document_id = match replaced {
            Ok(id) => id,
            Err(failure @ SyncError::Divergence(_)) => {
                // Terminal for this invoice; the correction is never retried.
                self.warnings.record(Warning::new(
                    failure.to_string(),
                    invoice.order_number.clone(),
                    Some(invoice.id.clone()),
                    Some(existing.id.clone()),
                ))?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if draft {
            self.explain_draft(invoice, &document_id).await?;
        }

        let document = self.refetch(&contact.id, &payload.number).await?;
        self.payments.reconcile(invoice, &document).await?;
        self.maybe_send(invoice, &document_id, draft).await
    }

    /// Informational warnings for drafts that need a human decision: a
    /// ticket left open past the stale threshold, or a used-goods invoice
    /// awaiting manual approval.
    async fn explain_draft(
        &self,
        invoice: &SourceInvoice,
        document_id: &str,
    ) -> Result<(), SyncError> {
        let message = match &invoice.ticket {
            Some(ticket) => {
                let age = Utc::now() - ticket.created_date;
                if age > Duration::days(STALE_TICKET_DAYS) {
                    Some(format!(
                        "draft created for ticket {} open for more than {} days",
                        ticket.id, STALE_TICKET_DAYS
                    ))
                } else {
                    None
                }
            }
            None => Some(
                "draft created for a used-goods invoice; approve it manually after review"
                    .to_string(),
            ),
        };
        if let Some(message) = message {
            self.warnings.record(Warning::new(
                message,
                invoice.order_number.clone(),
                Some(invoice.id.clone()),
                Some(document_id.to_string()),
            ))?;
        }
        Ok(())
    }

    /// The create call returns only an id; the authoritative document (with
    /// ledger-computed totals) comes from a fresh lookup.
    async fn refetch(&self, contact_id: &str, doc_number: &str) -> Result<TargetDocument, SyncError> {
        match locate_document(self.target.as_ref(), contact_id, doc_number).await? {
            LocatorOutcome::Found(document) => Ok(document),
            LocatorOutcome::NotFound => Err(SyncError::InvalidResponse(format!(
                "document {doc_number} vanished right after creation"
            ))),
        }
    }

    async fn maybe_send(
        &self,
        invoice: &SourceInvoice,
        document_id: &str,
        draft: bool,
    ) -> Result<(), SyncError> {
        if draft || !self.email_enabled {
            return Ok(());
        }
        let Some(email) = invoice.customer.email.as_deref() else {
            return Ok(());
        };
        tracing::info!(invoice_id = %invoice.id, "Emailing approved document");
        self.target
            .send_document(DocumentType::Invoice, document_id, email)
            .await
    }

    /// Highest engine-produced document number currently live in the ledger,
    /// with that document's date. Manually created documents (numbers that
    /// do not decode) are ignored. The highest-numbered document is also the
    /// newest, so the unwindowed first page is enough to find it.
    async fn resume_point(&self) -> Result<Option<(u64, chrono::DateTime<Utc>)>, SyncError> {
        let documents = self
            .target
            .list_documents(&DocumentListFilter::invoices())
            .await?;
        Ok(documents
            .iter()
            .filter(|d| !d.is_canceled())
            .filter_map(|d| {
                d.number
                    .as_deref()
                    .and_then(decode_order_number)
                    .map(|n| (n, d.date))
            })
            .max_by_key(|(n, _)| *n))
    }
}
