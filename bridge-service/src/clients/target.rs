//! Accounting ledger client (target system).
//!
//! Wire format notes: the API authenticates with a `Key` header, returns
//! lists as bare JSON arrays, and signals mutation failures inside a 200
//! response as `{"status": 0, "info": "..."}` payloads — those surface as
//! domain rejections, never retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use sync_core::error::SyncError;
use sync_core::retry::{retry_call, RetryConfig};

use super::wire::{de_decimal, de_id, de_opt_id, de_timestamp, non_empty};
use super::{DocumentListFilter, TargetApi};
use crate::config::TargetApiConfig;
use crate::models::{
    Address, DocumentItem, DocumentStatus, DocumentType, NewContact, NewDocument, TargetContact,
    TargetDocument, TargetPayment,
};

#[derive(Debug, Deserialize)]
struct MutationAck {
    status: i64,
    #[serde(default)]
    info: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(rename = "docNumber", default, deserialize_with = "de_opt_id")]
    number: Option<String>,
    #[serde(deserialize_with = "de_timestamp")]
    date: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_opt_id")]
    contact: Option<String>,
    #[serde(default)]
    products: Vec<ProductWire>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(rename = "paymentsDetail", default)]
    payments: Vec<PaymentDetailWire>,
    #[serde(deserialize_with = "de_decimal")]
    total: Decimal,
    #[serde(rename = "paymentsTotal", deserialize_with = "de_decimal", default)]
    paid: Decimal,
    #[serde(rename = "paymentsPending", deserialize_with = "de_decimal", default)]
    pending: Decimal,
    #[serde(default)]
    status: i64,
}

#[derive(Debug, Deserialize)]
struct ProductWire {
    name: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(deserialize_with = "de_decimal")]
    units: Decimal,
    #[serde(rename = "price", deserialize_with = "de_decimal")]
    subtotal: Decimal,
    #[serde(deserialize_with = "de_decimal", default)]
    discount: Decimal,
    #[serde(rename = "tax", deserialize_with = "de_decimal", default)]
    tax_percent: Decimal,
    #[serde(default)]
    taxes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentDetailWire {
    #[serde(deserialize_with = "de_timestamp")]
    date: DateTime<Utc>,
    #[serde(deserialize_with = "de_decimal")]
    amount: Decimal,
    #[serde(default)]
    desc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactWire {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(rename = "customId", default, deserialize_with = "de_opt_id")]
    custom_id: Option<String>,
    name: String,
    #[serde(rename = "code", default)]
    tax_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    mobile: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    isperson: bool,
    #[serde(rename = "billAddress", default)]
    bill_address: Option<BillAddressWire>,
}

#[derive(Debug, Deserialize)]
struct BillAddressWire {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(rename = "postalCode", default)]
    postal_code: Option<String>,
    #[serde(default)]
    province: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl From<ContactWire> for TargetContact {
    fn from(wire: ContactWire) -> Self {
        let billing_address = wire.bill_address.and_then(|a| {
            let address = Address {
                street: non_empty(a.address),
                city: non_empty(a.city),
                postal_code: non_empty(a.postal_code),
                province: non_empty(a.province),
                country: non_empty(a.country),
            };
            if address.is_empty() {
                None
            } else {
                Some(address)
            }
        });
        TargetContact {
            id: wire.id,
            custom_id: wire.custom_id,
            name: wire.name,
            tax_id: non_empty(wire.tax_id),
            email: non_empty(wire.email),
            mobile: non_empty(wire.mobile),
            phone: non_empty(wire.phone),
            is_person: wire.isperson,
            billing_address,
        }
    }
}

fn into_document(wire: DocumentWire, doc_type: DocumentType) -> TargetDocument {
    TargetDocument {
        id: wire.id,
        doc_type,
        number: wire.number,
        date: wire.date,
        contact_id: wire.contact,
        items: wire
            .products
            .into_iter()
            .map(|p| DocumentItem {
                name: p.name,
                description: non_empty(p.desc),
                units: p.units,
                subtotal: p.subtotal,
                discount: p.discount,
                tax_percent: p.tax_percent,
                taxes: p.taxes,
            })
            .collect(),
        tags: wire.tags,
        notes: non_empty(wire.notes),
        payments: wire
            .payments
            .into_iter()
            .map(|p| TargetPayment {
                date: p.date,
                description: non_empty(p.desc),
                amount: p.amount,
            })
            .collect(),
        total: wire.total,
        paid: wire.paid,
        pending: wire.pending,
        status: DocumentStatus::from_code(wire.status),
    }
}

fn amount_json(amount: Decimal) -> Value {
    // The ledger expects JSON numbers for money.
    json!(amount.to_f64().unwrap_or_default())
}

fn contact_payload(contact: &NewContact) -> Value {
    let mut payload = json!({
        "CustomId": contact.custom_id,
        "name": contact.name,
        "code": contact.tax_id,
        "email": contact.email,
        "mobile": contact.mobile,
        "phone": contact.phone,
        "type": "client",
        "isperson": contact.is_person,
    });
    if let Some(address) = &contact.billing_address {
        payload["billAddress"] = json!({
            "address": address.street,
            "city": address.city,
            "postalCode": address.postal_code,
            "province": address.province,
            "country": address.country,
        });
    }
    payload
}

/// HTTP client for the accounting ledger.
#[derive(Clone)]
pub struct TargetClient {
    client: Client,
    config: TargetApiConfig,
    retry: RetryConfig,
}

impl TargetClient {
    pub fn new(config: TargetApiConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            config,
            retry: RetryConfig::default(),
        })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        payload: Option<&Value>,
    ) -> Result<Value, SyncError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut request = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json")
            .header("Key", self.config.api_key.expose_secret())
            .query(params);
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        tracing::debug!(path = path, status = %status, "Target API response");

        if status.is_server_error() {
            return Err(SyncError::Transport(format!(
                "ledger API returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            return Err(SyncError::DomainRejection(format!(
                "ledger API returned {status}: {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| SyncError::InvalidResponse(format!("ledger API body: {e}")))
    }

    /// Mutations come back as `{"status": 1, "id": ...}` on success and
    /// `{"status": 0, "info": ...}` on rejection.
    fn ack(&self, body: Value, operation: &str) -> Result<MutationAck, SyncError> {
        let ack: MutationAck = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("{operation} ack: {e}")))?;
        if ack.status != 1 {
            return Err(SyncError::DomainRejection(
                ack.info
                    .unwrap_or_else(|| format!("{operation} rejected with no detail")),
            ));
        }
        Ok(ack)
    }

    async fn find_one_contact(
        &self,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<Option<TargetContact>, SyncError> {
        let body = retry_call(&self.retry, operation, || {
            self.call(Method::GET, "/contacts", params, None)
        })
        .await?;

        let contacts: Vec<ContactWire> = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("{operation}: {e}")))?;
        Ok(contacts.into_iter().next().map(TargetContact::from))
    }
}

#[async_trait]
impl TargetApi for TargetClient {
    async fn list_documents(
        &self,
        filter: &DocumentListFilter,
    ) -> Result<Vec<TargetDocument>, SyncError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(start) = filter.start {
            params.push(("starttmp", start.timestamp().to_string()));
        }
        if let Some(end) = filter.end {
            params.push(("endtmp", end.timestamp().to_string()));
        }
        if let Some(contact_id) = &filter.contact_id {
            params.push(("contactId", contact_id.clone()));
        }
        if let Some(sort) = filter.sort {
            params.push(("sort", sort.as_str().to_string()));
        }
        if let Some(paid) = filter.paid {
            params.push(("paid", paid.as_code().to_string()));
        }

        let path = format!("/documents/{}", filter.doc_type.as_str());
        let body = retry_call(&self.retry, "target.list_documents", || {
            self.call(Method::GET, &path, &params, None)
        })
        .await?;

        let documents: Vec<DocumentWire> = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("document list: {e}")))?;
        Ok(documents
            .into_iter()
            .map(|d| into_document(d, filter.doc_type))
            .collect())
    }

    async fn create_document(
        &self,
        document: &NewDocument,
        draft: bool,
    ) -> Result<String, SyncError> {
        let payload = json!({
            "contactId": document.contact_id,
            "date": document.date.timestamp(),
            "items": document.items.iter().map(|i| json!({
                "name": i.name,
                "desc": i.description,
                "units": i.units.to_f64().unwrap_or_default(),
                "subtotal": amount_json(i.subtotal),
                "discount": amount_json(i.discount),
                "tax": i.tax_percent.to_f64().unwrap_or_default(),
                "taxes": i.taxes,
            })).collect::<Vec<_>>(),
            "invoiceNum": document.number,
            "numberingSeriesId": document.numbering_series_id,
            "currency": "eur",
            "currencyChange": 1,
            "tags": document.tags,
            "notes": document.notes,
            "approveDoc": !draft,
        });

        let path = format!("/documents/{}", document.doc_type.as_str());
        let body = retry_call(&self.retry, "target.create_document", || {
            self.call(Method::POST, &path, &[], Some(&payload))
        })
        .await?;

        let ack = self.ack(body, "create_document")?;
        ack.id
            .ok_or_else(|| SyncError::InvalidResponse("create_document ack without id".into()))
    }

    async fn delete_document(&self, doc_type: DocumentType, id: &str) -> Result<(), SyncError> {
        let path = format!("/documents/{}/{}", doc_type.as_str(), id);
        let body = retry_call(&self.retry, "target.delete_document", || {
            self.call(Method::DELETE, &path, &[], None)
        })
        .await?;
        self.ack(body, "delete_document")?;
        Ok(())
    }

    async fn pay_document(
        &self,
        doc_type: DocumentType,
        id: &str,
        payment: &TargetPayment,
    ) -> Result<(), SyncError> {
        let payload = json!({
            "date": payment.date.timestamp(),
            "desc": payment.description,
            "amount": amount_json(payment.amount),
        });
        let path = format!("/documents/{}/{}/pay", doc_type.as_str(), id);
        let body = retry_call(&self.retry, "target.pay_document", || {
            self.call(Method::POST, &path, &[], Some(&payload))
        })
        .await?;
        self.ack(body, "pay_document")?;
        Ok(())
    }

    async fn send_document(
        &self,
        doc_type: DocumentType,
        id: &str,
        email: &str,
    ) -> Result<(), SyncError> {
        let payload = json!({ "emails": email });
        let path = format!("/documents/{}/{}/send", doc_type.as_str(), id);
        let body = retry_call(&self.retry, "target.send_document", || {
            self.call(Method::POST, &path, &[], Some(&payload))
        })
        .await?;
        self.ack(body, "send_document")?;
        Ok(())
    }

    async fn contact_by_id(&self, id: &str) -> Result<Option<TargetContact>, SyncError> {
        let path = format!("/contacts/{id}");
        let body = retry_call(&self.retry, "target.contact_by_id", || {
            self.call(Method::GET, &path, &[], None)
        })
        .await?;

        if body.is_null() {
            return Ok(None);
        }
        let contact: ContactWire = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("contact {id}: {e}")))?;
        Ok(Some(contact.into()))
    }

    async fn contact_by_custom_id(
        &self,
        custom_id: &str,
    ) -> Result<Option<TargetContact>, SyncError> {
        self.find_one_contact(
            &[("customId", custom_id.to_string())],
            "target.contact_by_custom_id",
        )
        .await
    }

    async fn contact_by_mobile(&self, mobile: &str) -> Result<Option<TargetContact>, SyncError> {
        self.find_one_contact(&[("mobile", mobile.to_string())], "target.contact_by_mobile")
            .await
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<String, SyncError> {
        let payload = contact_payload(contact);
        let body = retry_call(&self.retry, "target.create_contact", || {
            self.call(Method::POST, "/contacts", &[], Some(&payload))
        })
        .await?;
        let ack = self.ack(body, "create_contact")?;
        ack.id
            .ok_or_else(|| SyncError::InvalidResponse("create_contact ack without id".into()))
    }

    async fn update_contact(&self, id: &str, contact: &NewContact) -> Result<(), SyncError> {
        let payload = contact_payload(contact);
        let path = format!("/contacts/{id}");
        let body = retry_call(&self.retry, "target.update_contact", || {
            self.call(Method::PUT, &path, &[], Some(&payload))
        })
        .await?;
        self.ack(body, "update_contact")?;
        Ok(())
    }
}
