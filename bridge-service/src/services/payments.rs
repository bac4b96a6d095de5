//! Payment reconciliation.
//!
//! Aligns the payments recorded on a ledger document with the payments the
//! source platform holds for the invoice, posting the missing ones and
//! raising warnings for anything that cannot be resolved. Small shortfalls
//! on fully paid invoices are closed with a synthetic rounding adjustment.

use std::sync::Arc;

use rust_decimal::Decimal;
use sync_core::error::SyncError;

use crate::clients::TargetApi;
use crate::models::{
    DocumentType, SourceInvoice, SourceInvoiceStatus, TargetDocument, TargetPayment, Warning,
};
use crate::services::mapping::convert_payment;
use crate::services::{amounts_match, WarningLedger, ROUNDING_BOUND, TOLERANCE};

const ADJUSTMENT_DESCRIPTION: &str = "Rounding adjustment";

pub struct PaymentReconciler {
    target: Arc<dyn TargetApi>,
    warnings: WarningLedger,
}

impl PaymentReconciler {
    pub fn new(target: Arc<dyn TargetApi>, warnings: WarningLedger) -> Self {
        Self { target, warnings }
    }

    /// Reconcile the document's payments against the invoice's.
    ///
    /// Both sides are sorted by date and paired positionally. A source
    /// payment with no counterpart is posted; a ledger payment with no
    /// source counterpart, or an amount disagreement, becomes a warning
    /// (ledger payments are never deleted).
    pub async fn reconcile(
        &self,
        invoice: &SourceInvoice,
        document: &TargetDocument,
    ) -> Result<(), SyncError> {
        let mut source: Vec<TargetPayment> =
            invoice.payments.iter().map(convert_payment).collect();
        source.sort_by_key(|p| p.date);

        let mut existing: Vec<&TargetPayment> = document
            .payments
            .iter()
            .filter(|p| p.description.as_deref() != Some(ADJUSTMENT_DESCRIPTION))
            .collect();
        existing.sort_by_key(|p| p.date);

        let mut posted_total = Decimal::ZERO;

        let pairs = source.len().max(existing.len());
        for index in 0..pairs {
            match (source.get(index), existing.get(index)) {
                (Some(wanted), None) => {
                    // Zero-ish payments are bookkeeping noise; skip them.
                    if wanted.amount.abs() <= TOLERANCE {
                        continue;
                    }
                    tracing::info!(
                        document_id = %document.id,
                        amount = %wanted.amount,
                        "Posting missing payment"
                    );
                    self.target
                        .pay_document(DocumentType::Invoice, &document.id, wanted)
                        .await?;
                    posted_total += wanted.amount;
                }
                (None, Some(orphan)) => {
                    self.flag(
                        invoice,
                        document,
                        SyncError::PaymentDivergence(format!(
                            "ledger document has a payment of {} with no counterpart in the source system (payments deleted?)",
                            orphan.amount
                        )),
                    )?;
                }
                (Some(wanted), Some(recorded)) => {
                    if !amounts_match(wanted.amount, recorded.amount) {
                        self.flag(
                            invoice,
                            document,
                            SyncError::PaymentDivergence(format!(
                                "payment amounts differ: source {} vs ledger {}",
                                wanted.amount, recorded.amount
                            )),
                        )?;
                    }
                }
                (None, None) => unreachable!(),
            }
        }

        if invoice.status == SourceInvoiceStatus::Paid {
            self.close_shortfall(invoice, document, posted_total)
                .await?;
        }
        Ok(())
    }

    /// On a fully paid invoice, a tiny gap between the document total and
    /// its payments is the two platforms rounding differently. Close gaps up
    /// to [`ROUNDING_BOUND`] with an adjustment payment; warn on anything
    /// larger.
    async fn close_shortfall(
        &self,
        invoice: &SourceInvoice,
        document: &TargetDocument,
        posted_total: Decimal,
    ) -> Result<(), SyncError> {
        // Measured against the ledger document, not the source invoice: the
        // two totals already agree within tolerance by the time this runs,
        // and the adjustment must close exactly what the ledger shows as
        // pending, or the document stays open over a sub-cent residue.
        let already_paid: Decimal = document.payments.iter().map(|p| p.amount).sum();
        let shortfall = document.total - already_paid - posted_total;

        if shortfall.abs() <= TOLERANCE {
            return Ok(());
        }
        if shortfall > Decimal::ZERO && shortfall <= ROUNDING_BOUND {
            tracing::info!(
                document_id = %document.id,
                amount = %shortfall,
                "Closing rounding shortfall"
            );
            let adjustment = TargetPayment {
                date: document.date,
                description: Some(ADJUSTMENT_DESCRIPTION.to_string()),
                amount: shortfall,
            };
            return self
                .target
                .pay_document(DocumentType::Invoice, &document.id, &adjustment)
                .await;
        }

        let gap = if shortfall > Decimal::ZERO {
            format!("short by {shortfall}")
        } else {
            format!("overpaid by {}", -shortfall)
        };
        self.flag(
            invoice,
            document,
            SyncError::PaymentDivergence(format!(
                "invoice is paid in the source system but the ledger document is {gap}"
            )),
        )
    }

    /// A payment-level divergence never aborts the invoice; it becomes a
    /// warning for the operator and reconciliation moves on.
    fn flag(
        &self,
        invoice: &SourceInvoice,
        document: &TargetDocument,
        divergence: SyncError,
    ) -> Result<(), SyncError> {
        self.warnings.record(Warning::new(
            divergence.to_string(),
            invoice.order_number.clone(),
            Some(invoice.id.clone()),
            Some(document.id.clone()),
        ))
    }
}
