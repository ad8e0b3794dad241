//! Collaborator directories owned by other back-office modules.
//!
//! The settlement core never loads or mutates patients, owners, staff,
//! consultations or products. It checks existence before issuing documents
//! and fetches display data when assembling read models, all through these
//! traits.

use vetdesk_core::{ConsultationId, OwnerId, PatientId, ProductId, StaffId};

/// Display data for a catalog product referenced by a line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub name: String,
}

pub trait PatientDirectory: Send + Sync {
    fn exists(&self, patient_id: PatientId) -> bool;
}

pub trait OwnerDirectory: Send + Sync {
    fn exists(&self, owner_id: OwnerId) -> bool;
}

pub trait StaffDirectory: Send + Sync {
    fn exists(&self, staff_id: StaffId) -> bool;

    /// Display name for read-model enrichment only.
    fn display_name(&self, staff_id: StaffId) -> Option<String>;
}

pub trait ConsultationDirectory: Send + Sync {
    fn exists(&self, consultation_id: ConsultationId) -> bool;
}

pub trait ProductCatalog: Send + Sync {
    /// Look up display data for a product. Line items may legitimately
    /// reference no product at all, so absence is not an error here; the
    /// services decide whether a dangling reference is acceptable.
    fn lookup(&self, product_id: ProductId) -> Option<ProductRef>;
}
