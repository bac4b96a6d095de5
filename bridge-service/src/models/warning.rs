//! Warning records for situations the engine could not resolve on its own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted, operator-reviewable warning.
///
/// At most one live warning exists per distinct (source id, target id) pair;
/// further messages for the same pair stack onto the existing entry. Warnings
/// are only ever removed by explicit operator action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub id: Uuid,
    pub messages: Vec<String>,
    pub source_invoice_id: Option<String>,
    pub target_document_id: Option<String>,
    pub order_number: String,
}

impl Warning {
    pub fn new(
        message: impl Into<String>,
        order_number: impl Into<String>,
        source_invoice_id: Option<String>,
        target_document_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: vec![message.into()],
            source_invoice_id,
            target_document_id,
            order_number: order_number.into(),
        }
    }

    /// Whether this entry is addressed by the given id pair. Both ids known
    /// means both must match; a single known id matches on that field alone.
    pub fn matches(&self, source_id: Option<&str>, target_id: Option<&str>) -> bool {
        match (source_id, target_id) {
            (Some(s), Some(t)) => {
                self.source_invoice_id.as_deref() == Some(s)
                    && self.target_document_id.as_deref() == Some(t)
            }
            (Some(s), None) => self.source_invoice_id.as_deref() == Some(s),
            (None, Some(t)) => self.target_document_id.as_deref() == Some(t),
            (None, None) => false,
        }
    }
}
