//! Contact reconciliation.
//!
//! Finds or creates the ledger contact for a source customer and brings its
//! fields up to date. The source customer id (stored as the ledger contact's
//! `customId`) is the primary identity; the mobile number is the fallback for
//! contacts created before the bridge existed.

use std::sync::Arc;

use sync_core::error::SyncError;

use crate::clients::TargetApi;
use crate::config::MappingConfig;
use crate::models::{NewContact, SourceCustomer, TargetContact};
use crate::services::mapping::convert_customer;

pub struct ContactReconciler {
    target: Arc<dyn TargetApi>,
    mapping: MappingConfig,
}

impl ContactReconciler {
    pub fn new(target: Arc<dyn TargetApi>, mapping: MappingConfig) -> Self {
        Self { target, mapping }
    }

    /// Ensure a ledger contact exists for the customer and matches the
    /// source fields. Returns the authoritative ledger contact.
    pub async fn reconcile(&self, customer: &SourceCustomer) -> Result<TargetContact, SyncError> {
        let desired = convert_customer(customer, &self.mapping);

        if let Some(existing) = self.find_existing(customer, &desired).await? {
            if fields_differ(&existing, &desired) {
                tracing::info!(
                    contact_id = %existing.id,
                    customer_id = %customer.id,
                    "Updating ledger contact from source customer"
                );
                self.update_with_fallback(&existing.id, &desired).await?;
                return self.refetch(&existing.id).await;
            }
            return Ok(existing);
        }

        tracing::info!(customer_id = %customer.id, "Creating ledger contact");
        let id = self.create_with_fallback(&desired).await?;
        self.refetch(&id).await
    }

    async fn find_existing(
        &self,
        customer: &SourceCustomer,
        desired: &NewContact,
    ) -> Result<Option<TargetContact>, SyncError> {
        if let Some(contact) = self.target.contact_by_custom_id(&customer.id).await? {
            return Ok(Some(contact));
        }
        // Fallback for contacts that predate the bridge: match on mobile.
        if let Some(mobile) = &desired.mobile {
            return self.target.contact_by_mobile(mobile).await;
        }
        Ok(None)
    }

    /// Create the contact; on a domain rejection, retry once without the
    /// billing address (the ledger rejects malformed addresses outright).
    async fn create_with_fallback(&self, contact: &NewContact) -> Result<String, SyncError> {
        match self.target.create_contact(contact).await {
            Ok(id) => Ok(id),
            Err(SyncError::DomainRejection(reason)) if contact.billing_address.is_some() => {
                tracing::warn!(reason = %reason, "Contact rejected; retrying without address");
                self.target.create_contact(&contact.without_address()).await
            }
            Err(e) => Err(e),
        }
    }

    async fn update_with_fallback(&self, id: &str, contact: &NewContact) -> Result<(), SyncError> {
        match self.target.update_contact(id, contact).await {
            Ok(()) => Ok(()),
            Err(SyncError::DomainRejection(reason)) if contact.billing_address.is_some() => {
                tracing::warn!(reason = %reason, "Contact update rejected; retrying without address");
                self.target
                    .update_contact(id, &contact.without_address())
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch back the contact after a write so the caller works with the
    /// ledger's authoritative view, not our submitted payload.
    async fn refetch(&self, id: &str) -> Result<TargetContact, SyncError> {
        self.target.contact_by_id(id).await?.ok_or_else(|| {
            SyncError::InvalidResponse(format!("contact {id} vanished after write"))
        })
    }
}

/// Whether the ledger contact diverges from the source-derived payload on
/// any synced field. Fields the bridge does not manage (e.g. the landline
/// phone) are ignored.
fn fields_differ(existing: &TargetContact, desired: &NewContact) -> bool {
    existing.custom_id != desired.custom_id
        || existing.name != desired.name
        || existing.tax_id != desired.tax_id
        || existing.email != desired.email
        || existing.mobile != desired.mobile
        || existing.is_person != desired.is_person
        || existing.billing_address != desired.billing_address
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;

    fn contact(name: &str) -> TargetContact {
        TargetContact {
            id: "c1".to_string(),
            custom_id: Some("55".to_string()),
            name: name.to_string(),
            tax_id: None,
            email: None,
            mobile: None,
            phone: None,
            is_person: true,
            billing_address: None,
        }
    }

    fn desired(name: &str) -> NewContact {
        NewContact {
            custom_id: Some("55".to_string()),
            name: name.to_string(),
            tax_id: None,
            email: None,
            mobile: None,
            phone: None,
            is_person: true,
            billing_address: None,
        }
    }

    #[test]
    fn identical_fields_do_not_differ() {
        assert!(!fields_differ(&contact("Jane"), &desired("Jane")));
    }

    #[test]
    fn name_change_differs() {
        assert!(fields_differ(&contact("Jane"), &desired("Jane Doe")));
    }

    #[test]
    fn address_change_differs() {
        let mut desired = desired("Jane");
        desired.billing_address = Some(Address {
            street: Some("Calle Mayor 1".to_string()),
            city: None,
            postal_code: None,
            province: None,
            country: None,
        });
        assert!(fields_differ(&contact("Jane"), &desired));
    }

    #[test]
    fn unmanaged_phone_field_is_ignored() {
        let mut existing = contact("Jane");
        existing.phone = Some("911234567".to_string());
        assert!(!fields_differ(&existing, &desired("Jane")));
    }
}
