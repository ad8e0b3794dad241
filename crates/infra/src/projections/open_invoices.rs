//! Open invoices (accounts receivable) projection.
//!
//! Tracks the settlement position of every invoice that may still need
//! collection. This is the view the expiration sweeper walks to find
//! past-due invoices, and the source of the AR summary.

use chrono::{Duration, NaiveDate};
use serde_json::Value as JsonValue;

use vetdesk_billing::{INVOICE_AGGREGATE_TYPE, InvoiceEvent, InvoiceId, InvoiceStatus};
use vetdesk_core::{Money, OwnerId};
use vetdesk_events::EventEnvelope;

use super::{ProjectionError, StreamCursors};
use crate::read_model::ReadModelStore;

/// Read model: settlement position of one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub owner_id: OwnerId,
    pub due_date: Option<NaiveDate>,
    pub total: Money,
    pub paid_total: Money,
    pub outstanding: Money,
    pub status: InvoiceStatus,
    pub active: bool,
}

impl OpenInvoice {
    /// Still open for collection: not paid, not cancelled.
    pub fn is_open(&self) -> bool {
        self.active && !self.status.is_settled()
    }

    /// Past due as of the given date.
    pub fn is_past_due(&self, as_of: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due < as_of)
    }
}

/// Summary statistics for open invoices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInvoicesSummary {
    pub count: usize,
    pub total_outstanding: Money,
    pub overdue_count: usize,
    pub overdue_amount: Money,
}

/// Open invoices projection.
///
/// - Invoices enter when issued
/// - Invoices stop being listed once fully paid or cancelled
/// - Partial payments and voids update the outstanding amount
///
/// Rebuildable from invoice events.
#[derive(Debug)]
pub struct OpenInvoicesProjection<S>
where
    S: ReadModelStore<InvoiceId, OpenInvoice>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> OpenInvoicesProjection<S>
where
    S: ReadModelStore<InvoiceId, OpenInvoice>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Get one invoice's settlement position.
    pub fn get(&self, invoice_id: &InvoiceId) -> Option<OpenInvoice> {
        self.store.get(invoice_id)
    }

    /// All invoices still open for collection.
    pub fn list_open(&self) -> Vec<OpenInvoice> {
        self.store
            .list()
            .into_iter()
            .filter(OpenInvoice::is_open)
            .collect()
    }

    /// Open invoices whose due date has passed as of `as_of`.
    ///
    /// This is the sweep's candidate set; it includes invoices already
    /// marked overdue (the aggregate no-ops on them), so re-running a sweep
    /// is harmless.
    pub fn list_due_before(&self, as_of: NaiveDate) -> Vec<OpenInvoice> {
        self.list_open()
            .into_iter()
            .filter(|inv| inv.is_past_due(as_of))
            .collect()
    }

    /// Open invoices due within the next `days` days (collections view).
    pub fn list_due_within(&self, as_of: NaiveDate, days: i64) -> Vec<OpenInvoice> {
        let cutoff = as_of + Duration::days(days);
        self.list_open()
            .into_iter()
            .filter(|inv| {
                inv.due_date
                    .is_some_and(|due| due >= as_of && due <= cutoff)
            })
            .collect()
    }

    /// AR summary as of a date.
    pub fn summary(&self, as_of: NaiveDate) -> OpenInvoicesSummary {
        let open = self.list_open();

        let count = open.len();
        let total_outstanding: Money = open.iter().map(|i| i.outstanding).sum();

        let overdue: Vec<_> = open.iter().filter(|i| i.is_past_due(as_of)).collect();
        let overdue_count = overdue.len();
        let overdue_amount: Money = overdue.iter().map(|i| i.outstanding).sum();

        OpenInvoicesSummary {
            count,
            total_outstanding,
            overdue_count,
            overdue_amount,
        }
    }

    /// Apply one envelope from the invoice stream.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != INVOICE_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.admit(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    e.invoice_id,
                    OpenInvoice {
                        invoice_id: e.invoice_id,
                        number: e.number,
                        owner_id: e.owner_id,
                        due_date: e.due_date,
                        total: e.total,
                        paid_total: Money::ZERO,
                        outstanding: e.total,
                        status: InvoiceStatus::Pending,
                        active: true,
                    },
                );
            }
            InvoiceEvent::PaymentRegistered(e) => {
                if let Some(mut inv) = self.store.get(&e.invoice_id) {
                    inv.paid_total = e.new_paid_total;
                    inv.outstanding = e.new_balance_due;
                    inv.status = if e.new_balance_due.is_positive() {
                        InvoiceStatus::Partial
                    } else {
                        InvoiceStatus::Paid
                    };
                    self.store.upsert(e.invoice_id, inv);
                }
            }
            InvoiceEvent::PaymentVoided(e) => {
                if let Some(mut inv) = self.store.get(&e.invoice_id) {
                    inv.paid_total = e.new_paid_total;
                    inv.outstanding = e.new_balance_due;
                    inv.status = if e.new_paid_total.is_zero() {
                        InvoiceStatus::Pending
                    } else {
                        InvoiceStatus::Partial
                    };
                    self.store.upsert(e.invoice_id, inv);
                }
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                // Cancellation is terminal (it requires zero payments, and a
                // cancelled invoice accepts no further commands), so the
                // record can be dropped outright. A paid invoice stays: a
                // void can reopen it.
                self.store.remove(&e.invoice_id);
            }
            InvoiceEvent::InvoiceMarkedOverdue(e) => {
                if let Some(mut inv) = self.store.get(&e.invoice_id) {
                    inv.status = InvoiceStatus::Overdue;
                    self.store.upsert(e.invoice_id, inv);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
