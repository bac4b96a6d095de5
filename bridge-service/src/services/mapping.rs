//! Cross-system model conversion.
//!
//! Everything that turns source-platform records into ledger payloads lives
//! here: the order-number codec, tax-id cleanup and the invoice, item,
//! payment and customer conversions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::MappingConfig;
use crate::models::{
    DocumentItem, DocumentType, NewContact, NewDocument, SourceCustomer, SourceInvoice,
    SourceLineItem, SourcePayment, TargetPayment,
};

/// Ledger document numbers are the source order number zero-padded to five
/// digits, so numeric and lexicographic order agree.
pub fn encode_order_number(order_number: u64) -> String {
    format!("{order_number:05}")
}

/// Inverse of [`encode_order_number`]. Returns `None` for document numbers
/// that were not produced by this engine (manually created documents).
pub fn decode_order_number(doc_number: &str) -> Option<u64> {
    doc_number.trim().parse::<u64>().ok()
}

/// Tax-id placeholders people type into the source platform instead of
/// leaving the field blank.
const TAX_ID_PLACEHOLDERS: &[&str] = &["", "-", "0", "NA", "N/A"];

/// Canonicalize a tax id: strip whitespace and dashes, uppercase, and map
/// placeholder values to absence.
pub fn normalize_tax_id(raw: Option<&str>) -> Option<String> {
    let cleaned: String = raw?
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();
    if TAX_ID_PLACEHOLDERS.contains(&cleaned.as_str()) {
        return None;
    }
    Some(cleaned)
}

/// Build the ledger contact payload for a source customer.
///
/// Customers in a business group become company contacts; everyone else is a
/// person. The source customer id goes into `custom_id` as the cross-system
/// identity.
pub fn convert_customer(customer: &SourceCustomer, mapping: &MappingConfig) -> NewContact {
    NewContact {
        custom_id: Some(customer.id.clone()),
        name: customer.full_name.trim().to_string(),
        tax_id: normalize_tax_id(customer.tax_id.as_deref()),
        email: customer.email.clone(),
        mobile: customer.mobile.clone(),
        phone: None,
        is_person: !mapping.is_business_group(&customer.customer_group_id),
        billing_address: customer.billing_address.clone(),
    }
}

/// Convert a source line item into a ledger document item.
///
/// The source reports the gross line total; the ledger wants a net unit
/// price (`subtotal`), so tax and quantity are divided back out.
pub fn convert_item(item: &SourceLineItem, mapping: &MappingConfig) -> DocumentItem {
    let tax_factor = Decimal::ONE + item.tax_percent / Decimal::ONE_HUNDRED;
    let subtotal = if item.quantity.is_zero() {
        Decimal::ZERO
    } else {
        item.total / tax_factor / item.quantity
    };
    DocumentItem {
        name: item.name.clone(),
        description: item.notes.clone(),
        units: item.quantity,
        subtotal,
        discount: Decimal::ZERO,
        tax_percent: item.tax_percent,
        taxes: mapping
            .tax_code(item.tax_class.as_deref())
            .into_iter()
            .collect(),
    }
}

/// Convert a source payment into a ledger payment posting.
pub fn convert_payment(payment: &SourcePayment) -> TargetPayment {
    let description = if payment.notes.trim().is_empty() {
        payment.method.clone()
    } else {
        format!("{}\n\n{}", payment.method, payment.notes)
    };
    TargetPayment {
        date: payment.date,
        description: Some(description),
        amount: payment.amount,
    }
}

/// Convert a full source invoice into a ledger create payload. The document
/// number is passed in already encoded (the synchronizer validates the order
/// number before anything touches the ledger). Payments are not part of the
/// payload; the payment reconciler posts them afterwards.
pub fn convert_document(
    invoice: &SourceInvoice,
    contact_id: &str,
    number: &str,
    mapping: &MappingConfig,
) -> NewDocument {
    let doc_type = DocumentType::Invoice;
    NewDocument {
        doc_type,
        contact_id: contact_id.to_string(),
        number: number.to_string(),
        date: clamp_future_date(invoice.date),
        items: invoice
            .items
            .iter()
            .map(|i| convert_item(i, mapping))
            .collect(),
        tags: vec!["sync".to_string()],
        notes: non_empty_note(&invoice.notes),
        numbering_series_id: mapping.numbering_series.get(doc_type.as_str()).cloned(),
    }
}

/// Whether the invoice consists exclusively of margin-scheme (used goods)
/// lines.
pub fn is_pure_used_goods(invoice: &SourceInvoice, mapping: &MappingConfig) -> bool {
    !invoice.items.is_empty()
        && invoice
            .items
            .iter()
            .all(|i| mapping.is_used_goods_class(i.tax_class.as_deref()))
}

/// Whether the invoice mixes used-goods lines with priced regular lines.
/// Zero-priced regular lines (freebies, notes) do not count as mixing.
pub fn mixes_used_goods(invoice: &SourceInvoice, mapping: &MappingConfig) -> bool {
    let has_used = invoice
        .items
        .iter()
        .any(|i| mapping.is_used_goods_class(i.tax_class.as_deref()));
    let has_priced_other = invoice
        .items
        .iter()
        .any(|i| !mapping.is_used_goods_class(i.tax_class.as_deref()) && !i.total.is_zero());
    has_used && has_priced_other
}

fn non_empty_note(notes: &str) -> Option<String> {
    let trimmed = notes.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Ledger rejects documents dated in the future; clock skew between the two
/// platforms makes that happen for just-issued invoices.
fn clamp_future_date(date: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if date > now {
        now
    } else {
        date
    }
}
