//! Invoice locator.
//!
//! Finds the ledger document previously created for a source invoice, by its
//! encoded document number. The ledger's listing endpoint only filters by
//! date window, so the search starts from the newest documents and walks
//! backwards in fixed-size windows until an empty window says there is
//! nothing older.

use chrono::{DateTime, Duration, Utc};

use sync_core::error::SyncError;

use crate::clients::{DocumentListFilter, TargetApi};
use crate::models::TargetDocument;

/// Width of one backward search window.
const WINDOW_DAYS: i64 = 90;

#[derive(Debug)]
pub enum LocatorOutcome {
    Found(TargetDocument),
    NotFound,
}

/// Locate the contact's live ledger document carrying `doc_number`. Canceled
/// documents are invisible to the search; a canceled twin never blocks
/// re-creation.
///
/// The backward walk assumes a contact's documents are date-monotonic; an
/// empty window means nothing older exists.
pub async fn locate_document(
    target: &dyn TargetApi,
    contact_id: &str,
    doc_number: &str,
) -> Result<LocatorOutcome, SyncError> {
    // Most syncs touch recent invoices, so the unwindowed newest-first page
    // usually settles it in one call.
    let recent = target
        .list_documents(&DocumentListFilter::for_contact(contact_id))
        .await?;
    if let Some(found) = pick(&recent, doc_number) {
        return Ok(LocatorOutcome::Found(found));
    }

    let mut anchor = match oldest_date(&recent) {
        Some(date) => date,
        // The contact has no documents at all.
        None => return Ok(LocatorOutcome::NotFound),
    };

    loop {
        let start = anchor - Duration::days(WINDOW_DAYS);
        let window = target
            .list_documents(&DocumentListFilter {
                start: Some(start),
                end: Some(anchor),
                ..DocumentListFilter::for_contact(contact_id)
            })
            .await?;

        if let Some(found) = pick(&window, doc_number) {
            return Ok(LocatorOutcome::Found(found));
        }
        if window.iter().all(|d| d.is_canceled()) {
            return Ok(LocatorOutcome::NotFound);
        }

        anchor = start;
    }
}

fn pick(documents: &[TargetDocument], doc_number: &str) -> Option<TargetDocument> {
    documents
        .iter()
        .find(|d| !d.is_canceled() && d.number.as_deref() == Some(doc_number))
        .cloned()
}

fn oldest_date(documents: &[TargetDocument]) -> Option<DateTime<Utc>> {
    documents.iter().map(|d| d.date).min()
}
