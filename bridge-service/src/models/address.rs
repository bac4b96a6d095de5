//! Billing address normalization.
//!
//! The repair-shop platform has shipped customer addresses in three shapes
//! over time: flat fields on the customer record, a nested address object,
//! and a list of addresses. Each shape gets an explicit parse branch here;
//! the rest of the engine only ever sees the normalized [`Address`].

use serde::{Deserialize, Serialize};

/// Normalized billing address as the ledger expects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
            && self.province.is_none()
            && self.country.is_none()
    }
}

/// One set of address fields as they appear on the wire, whatever the
/// surrounding shape. Field names drifted across platform revisions, hence
/// the aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressFields {
    #[serde(default, alias = "address1", alias = "line1")]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "postalCode", alias = "zip")]
    pub postcode: Option<String>,
    #[serde(default, alias = "province")]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// The address shapes observed upstream. Serde tries the variants in order,
/// so the catch-all flat shape must stay last.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAddress {
    /// A list of addresses; the first usable one wins.
    Many(Vec<AddressFields>),
    /// A single nested `{ "address": { ... } }` object.
    Nested { address: AddressFields },
    /// Flat fields directly on the customer record.
    Flat(AddressFields),
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn from_fields(fields: &AddressFields) -> Option<Address> {
    let address = Address {
        street: clean(&fields.address),
        city: clean(&fields.city),
        postal_code: clean(&fields.postcode),
        province: clean(&fields.state),
        country: clean(&fields.country),
    };
    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

/// Normalize any known upstream address shape into an [`Address`].
pub fn normalize_address(raw: &RawAddress) -> Option<Address> {
    match raw {
        RawAddress::Many(list) => list.iter().find_map(from_fields),
        RawAddress::Nested { address } => from_fields(address),
        RawAddress::Flat(fields) => from_fields(fields),
    }
}
