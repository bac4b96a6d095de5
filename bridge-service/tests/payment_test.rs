//! Payment reconciliation tests.

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;
use tempfile::TempDir;

use bridge_service::models::{
    DocumentItem, DocumentStatus, DocumentType, TargetDocument, TargetPayment,
};
use bridge_service::services::{PaymentReconciler, WarningLedger};

use common::*;

fn ledger_document(total: &str, payments: Vec<TargetPayment>) -> TargetDocument {
    let paid: Decimal = payments.iter().map(|p| p.amount).sum();
    TargetDocument {
        id: "doc-1".to_string(),
        doc_type: DocumentType::Invoice,
        number: Some("00017".to_string()),
        date: day(0),
        contact_id: Some("con-1".to_string()),
        items: vec![DocumentItem {
            name: "Screen replacement".to_string(),
            description: None,
            units: Decimal::ONE,
            subtotal: dec(total) / dec("1.21"),
            discount: Decimal::ZERO,
            tax_percent: dec("21"),
            taxes: vec![],
        }],
        tags: vec![],
        notes: None,
        payments,
        total: dec(total),
        paid,
        pending: dec(total) - paid,
        status: DocumentStatus::Unpaid,
    }
}

fn target_payment(amount: &str, day_offset: i64) -> TargetPayment {
    TargetPayment {
        date: day(day_offset),
        description: Some("Cash".to_string()),
        amount: dec(amount),
    }
}

fn reconciler(target: Arc<MockTarget>, dir: &TempDir) -> (PaymentReconciler, WarningLedger) {
    init_tracing();
    let warnings = WarningLedger::new(dir.path());
    (
        PaymentReconciler::new(target, warnings.clone()),
        warnings,
    )
}

#[tokio::test]
async fn missing_payment_is_posted_by_position() {
    let target = Arc::new(MockTarget::default());
    let document = ledger_document("15.00", vec![target_payment("10.00", 0)]);
    target.put_document(document.clone());
    let dir = TempDir::new().unwrap();
    let (reconciler, warnings) = reconciler(target.clone(), &dir);

    let mut invoice = paid_invoice("i1", "17", "15.00");
    invoice.payments = vec![payment("p1", "10.00", day(0)), payment("p2", "5.00", day(1))];

    reconciler.reconcile(&invoice, &document).await.unwrap();

    let posted = target.posted_payments();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1.amount, dec("5.00"));
    assert!(warnings.list().unwrap().is_empty());
}

#[tokio::test]
async fn orphan_ledger_payment_is_warned_about_never_deleted() {
    let target = Arc::new(MockTarget::default());
    let document = ledger_document(
        "10.00",
        vec![target_payment("10.00", 0), target_payment("2.00", 1)],
    );
    target.put_document(document.clone());
    let dir = TempDir::new().unwrap();
    let (reconciler, warnings) = reconciler(target.clone(), &dir);

    let mut invoice = paid_invoice("i1", "17", "10.00");
    invoice.payments = vec![payment("p1", "10.00", day(0))];

    reconciler.reconcile(&invoice, &document).await.unwrap();

    assert!(target.posted_payments().is_empty());
    let recorded = warnings.list().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].messages[0].contains("no counterpart in the source system"));
}

#[tokio::test]
async fn amount_disagreement_is_warned_not_corrected() {
    let target = Arc::new(MockTarget::default());
    let document = ledger_document("10.00", vec![target_payment("8.00", 0)]);
    target.put_document(document.clone());
    let dir = TempDir::new().unwrap();
    let (reconciler, warnings) = reconciler(target.clone(), &dir);

    let mut invoice = paid_invoice("i1", "17", "10.00");
    invoice.payments = vec![payment("p1", "10.00", day(0))];
    invoice.status = bridge_service::models::SourceInvoiceStatus::Partial;

    reconciler.reconcile(&invoice, &document).await.unwrap();

    assert!(target.posted_payments().is_empty());
    let recorded = warnings.list().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].messages[0].contains("payment amounts differ"));
}

#[tokio::test]
async fn small_shortfall_on_a_paid_invoice_is_closed_with_an_adjustment() {
    let target = Arc::new(MockTarget::default());
    let document = ledger_document("100.00", vec![target_payment("99.97", 0)]);
    target.put_document(document.clone());
    let dir = TempDir::new().unwrap();
    let (reconciler, warnings) = reconciler(target.clone(), &dir);

    let mut invoice = paid_invoice("i1", "17", "100.00");
    invoice.payments = vec![payment("p1", "99.97", day(0))];

    reconciler.reconcile(&invoice, &document).await.unwrap();

    let posted = target.posted_payments();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1.amount, dec("0.03"));
    assert_eq!(posted[0].1.description.as_deref(), Some("Rounding adjustment"));
    assert!(warnings.list().unwrap().is_empty());
}

#[tokio::test]
async fn large_shortfall_on_a_paid_invoice_is_warned_not_adjusted() {
    let target = Arc::new(MockTarget::default());
    let document = ledger_document("100.00", vec![target_payment("99.90", 0)]);
    target.put_document(document.clone());
    let dir = TempDir::new().unwrap();
    let (reconciler, warnings) = reconciler(target.clone(), &dir);

    let mut invoice = paid_invoice("i1", "17", "100.00");
    invoice.payments = vec![payment("p1", "99.90", day(0))];

    reconciler.reconcile(&invoice, &document).await.unwrap();

    assert!(target.posted_payments().is_empty());
    let recorded = warnings.list().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].messages[0].contains("short by 0.10"));
}

#[tokio::test]
async fn unpaid_invoice_shortfall_needs_no_adjustment() {
    let target = Arc::new(MockTarget::default());
    let document = ledger_document("100.00", vec![target_payment("50.00", 0)]);
    target.put_document(document.clone());
    let dir = TempDir::new().unwrap();
    let (reconciler, warnings) = reconciler(target.clone(), &dir);

    let mut invoice = paid_invoice("i1", "17", "100.00");
    invoice.status = bridge_service::models::SourceInvoiceStatus::Partial;
    invoice.payments = vec![payment("p1", "50.00", day(0))];

    reconciler.reconcile(&invoice, &document).await.unwrap();

    assert!(target.posted_payments().is_empty());
    assert!(warnings.list().unwrap().is_empty());
}
