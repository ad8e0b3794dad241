//! Application services: the billing facade callers talk to.
//!
//! Services validate collaborator references, allocate document numbers,
//! and dispatch commands through the event-sourcing pipeline. Optimistic
//! concurrency losses are retried a bounded number of times; every other
//! failure is returned to the caller as a distinguishable error kind.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use vetdesk_billing::directory::{
    ConsultationDirectory, OwnerDirectory, PatientDirectory, ProductCatalog, StaffDirectory,
};

use crate::command_dispatcher::DispatchError;

pub mod invoicing;
pub mod payments;
pub mod sweeper;

pub use invoicing::{InvoiceDetails, InvoiceService, LineItemView, NewInvoice};
pub use payments::{NewPayment, PaymentDetails, PaymentReceipt, PaymentService};
pub use sweeper::ExpirationSweeper;

/// How many times a service retries an operation that lost an optimistic
/// concurrency race before giving up.
pub(crate) const MAX_DISPATCH_RETRIES: usize = 3;

/// The collaborator directories the billing core consumes (owned by the
/// patient, user, clinical and inventory modules).
#[derive(Clone)]
pub struct BillingDirectories {
    pub patients: Arc<dyn PatientDirectory>,
    pub owners: Arc<dyn OwnerDirectory>,
    pub staff: Arc<dyn StaffDirectory>,
    pub consultations: Arc<dyn ConsultationDirectory>,
    pub products: Arc<dyn ProductCatalog>,
}

/// Turn an inclusive date range into `[start of from, start of day after
/// to)` instants, rejecting inverted ranges.
pub(crate) fn day_bounds(
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>), DispatchError> {
    if from > to {
        return Err(DispatchError::Validation(
            "start date cannot be after end date".to_string(),
        ));
    }
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let until = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| DispatchError::Validation("end date out of range".to_string()))?
        .and_time(NaiveTime::MIN)
        .and_utc();
    Ok((start, until))
}
