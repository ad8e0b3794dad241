//! In-memory collaborator directories for tests/dev.
//!
//! Production deployments back these traits with the patient, user and
//! inventory modules; the billing core only ever sees the trait surface.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use vetdesk_billing::directory::{
    ConsultationDirectory, OwnerDirectory, PatientDirectory, ProductCatalog, ProductRef,
    StaffDirectory,
};
use vetdesk_core::{ConsultationId, OwnerId, PatientId, ProductId, StaffId};

/// One registry implementing every directory trait the billing core needs.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    patients: RwLock<HashSet<PatientId>>,
    owners: RwLock<HashSet<OwnerId>>,
    staff: RwLock<HashMap<StaffId, String>>,
    consultations: RwLock<HashSet<ConsultationId>>,
    products: RwLock<HashMap<ProductId, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patient(&self, patient_id: PatientId) {
        if let Ok(mut set) = self.patients.write() {
            set.insert(patient_id);
        }
    }

    pub fn add_owner(&self, owner_id: OwnerId) {
        if let Ok(mut set) = self.owners.write() {
            set.insert(owner_id);
        }
    }

    pub fn add_staff(&self, staff_id: StaffId, display_name: impl Into<String>) {
        if let Ok(mut map) = self.staff.write() {
            map.insert(staff_id, display_name.into());
        }
    }

    pub fn add_consultation(&self, consultation_id: ConsultationId) {
        if let Ok(mut set) = self.consultations.write() {
            set.insert(consultation_id);
        }
    }

    pub fn add_product(&self, product_id: ProductId, name: impl Into<String>) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product_id, name.into());
        }
    }
}

impl PatientDirectory for InMemoryDirectory {
    fn exists(&self, patient_id: PatientId) -> bool {
        self.patients
            .read()
            .map(|s| s.contains(&patient_id))
            .unwrap_or(false)
    }
}

impl OwnerDirectory for InMemoryDirectory {
    fn exists(&self, owner_id: OwnerId) -> bool {
        self.owners
            .read()
            .map(|s| s.contains(&owner_id))
            .unwrap_or(false)
    }
}

impl StaffDirectory for InMemoryDirectory {
    fn exists(&self, staff_id: StaffId) -> bool {
        self.staff
            .read()
            .map(|m| m.contains_key(&staff_id))
            .unwrap_or(false)
    }

    fn display_name(&self, staff_id: StaffId) -> Option<String> {
        self.staff.read().ok()?.get(&staff_id).cloned()
    }
}

impl ConsultationDirectory for InMemoryDirectory {
    fn exists(&self, consultation_id: ConsultationId) -> bool {
        self.consultations
            .read()
            .map(|s| s.contains(&consultation_id))
            .unwrap_or(false)
    }
}

impl ProductCatalog for InMemoryDirectory {
    fn lookup(&self, product_id: ProductId) -> Option<ProductRef> {
        let name = self.products.read().ok()?.get(&product_id).cloned()?;
        Some(ProductRef { name })
    }
}
