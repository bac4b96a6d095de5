//! Invoice comparator.
//!
//! Decides whether an existing ledger document still represents the source
//! invoice. All money checks use the shared tolerance, so the two systems'
//! rounding never produces false mismatches.

use crate::config::MappingConfig;
use crate::models::{SourceInvoice, SourceLineItem, TargetDocument};
use crate::services::{amounts_match, mapping::convert_item};

/// Comparison verdict. `Mismatched` carries the first divergence found, for
/// the operator-facing warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Matching,
    Mismatched(String),
}

/// Compare a source invoice against its ledger document.
///
/// Checks the grand total first, then pairs line items positionally and
/// compares each source line's effective gross unit price against the
/// document item's. An absent counterpart on either side is a mismatch.
pub fn compare_documents(
    invoice: &SourceInvoice,
    document: &TargetDocument,
    mapping: &MappingConfig,
) -> Comparison {
    if !amounts_match(invoice.total, document.total) {
        return Comparison::Mismatched(format!(
            "total differs: source {} vs ledger {}",
            invoice.total, document.total
        ));
    }

    let lines = invoice.items.len().max(document.items.len());
    for index in 0..lines {
        let source_item = invoice.items.get(index);
        let target_item = document.items.get(index);
        match (source_item, target_item) {
            (Some(source), Some(target)) => {
                let expected = convert_item(source, mapping);
                if !amounts_match(gross_unit_price(source), target.gross_unit_price()) {
                    return Comparison::Mismatched(format!(
                        "line {} differs: source {:?} ({} x {}) vs ledger {:?} ({} x {})",
                        index + 1,
                        source.name,
                        source.quantity,
                        gross_unit_price(source),
                        target.name,
                        target.units,
                        target.gross_unit_price(),
                    ));
                }
                // Tax mapping changes also force a rebuild, otherwise the
                // ledger keeps booking the wrong tax account.
                if expected.taxes != target.taxes {
                    return Comparison::Mismatched(format!(
                        "line {} tax mapping differs: expected {:?}, ledger has {:?}",
                        index + 1,
                        expected.taxes,
                        target.taxes,
                    ));
                }
            }
            (Some(source), None) => {
                return Comparison::Mismatched(format!(
                    "line {} ({:?}) missing from ledger document",
                    index + 1,
                    source.name
                ));
            }
            (None, Some(target)) => {
                return Comparison::Mismatched(format!(
                    "ledger document has extra line {} ({:?})",
                    index + 1,
                    target.name
                ));
            }
            (None, None) => unreachable!(),
        }
    }

    Comparison::Matching
}

/// Effective gross unit price of a source line: the gross line total spread
/// over its quantity.
fn gross_unit_price(item: &SourceLineItem) -> rust_decimal::Decimal {
    if item.quantity.is_zero() {
        rust_decimal::Decimal::ZERO
    } else {
        item.total / item.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentItem, DocumentStatus, DocumentType, SourceCustomer};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn source_invoice(total: &str, items: Vec<SourceLineItem>) -> SourceInvoice {
        SourceInvoice {
            id: "i1".to_string(),
            order_number: "17".to_string(),
            ticket: None,
            date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            subtotal: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            total: dec(total),
            notes: String::new(),
            customer: SourceCustomer {
                id: "5".to_string(),
                full_name: "Jane".to_string(),
                email: None,
                mobile: None,
                tax_id: None,
                customer_group_id: "1".to_string(),
                billing_address: None,
            },
            status: crate::models::SourceInvoiceStatus::Paid,
            items,
            payments: vec![],
        }
    }

    fn source_line(total: &str, quantity: &str, tax_percent: &str) -> SourceLineItem {
        SourceLineItem {
            id: "1".to_string(),
            name: "Screen".to_string(),
            notes: None,
            quantity: dec(quantity),
            unit_price: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: dec(total),
            tax_class: None,
            tax_percent: dec(tax_percent),
        }
    }

    fn document(total: &str, items: Vec<DocumentItem>) -> TargetDocument {
        TargetDocument {
            id: "d1".to_string(),
            doc_type: DocumentType::Invoice,
            number: Some("00017".to_string()),
            date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            contact_id: Some("c1".to_string()),
            items,
            tags: vec![],
            notes: None,
            payments: vec![],
            total: dec(total),
            paid: Decimal::ZERO,
            pending: Decimal::ZERO,
            status: DocumentStatus::Unpaid,
        }
    }

    fn document_item(subtotal: &str, units: &str, tax_percent: &str) -> DocumentItem {
        DocumentItem {
            name: "Screen".to_string(),
            description: None,
            units: dec(units),
            subtotal: dec(subtotal),
            discount: Decimal::ZERO,
            tax_percent: dec(tax_percent),
            taxes: vec![],
        }
    }

    #[test]
    fn identical_invoice_matches() {
        let invoice = source_invoice("121.00", vec![source_line("121.00", "1", "21")]);
        let doc = document("121.00", vec![document_item("100.00", "1", "21")]);
        assert_eq!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Matching
        );
    }

    #[test]
    fn difference_of_exactly_tolerance_still_matches() {
        let invoice = source_invoice("121.001", vec![source_line("121.001", "1", "21")]);
        let doc = document("121.00", vec![document_item("100.00", "1", "21")]);
        assert_eq!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Matching
        );
    }

    #[test]
    fn ledger_higher_by_exactly_tolerance_still_matches() {
        let invoice = source_invoice("121.00", vec![source_line("121.00", "1", "21")]);
        let doc = document("121.001", vec![document_item("100.00", "1", "21")]);
        assert_eq!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Matching
        );
    }

    #[test]
    fn ledger_higher_past_tolerance_mismatches() {
        let invoice = source_invoice("121.00", vec![source_line("121.00", "1", "21")]);
        let doc = document("121.002", vec![document_item("100.00", "1", "21")]);
        assert!(matches!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Mismatched(reason) if reason.contains("total differs")
        ));
    }

    #[test]
    fn difference_past_tolerance_mismatches() {
        let invoice = source_invoice("121.002", vec![source_line("121.00", "1", "21")]);
        let doc = document("121.00", vec![document_item("100.00", "1", "21")]);
        assert!(matches!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Mismatched(reason) if reason.contains("total differs")
        ));
    }

    #[test]
    fn missing_ledger_line_mismatches() {
        let invoice = source_invoice(
            "242.00",
            vec![source_line("121.00", "1", "21"), source_line("121.00", "1", "21")],
        );
        let doc = document("242.00", vec![document_item("100.00", "1", "21")]);
        assert!(matches!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Mismatched(reason) if reason.contains("missing from ledger")
        ));
    }

    #[test]
    fn extra_ledger_line_mismatches() {
        let invoice = source_invoice("121.00", vec![source_line("121.00", "1", "21")]);
        let doc = document(
            "121.00",
            vec![
                document_item("100.00", "1", "21"),
                document_item("5.00", "1", "21"),
            ],
        );
        assert!(matches!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Mismatched(reason) if reason.contains("extra line")
        ));
    }

    #[test]
    fn quantity_change_mismatches() {
        let invoice = source_invoice("242.00", vec![source_line("242.00", "2", "21")]);
        let doc = document("242.00", vec![document_item("200.00", "1", "21")]);
        assert!(matches!(
            compare_documents(&invoice, &doc, &MappingConfig::default()),
            Comparison::Mismatched(_)
        ));
    }
}
