//! Invoice documents projection.
//!
//! The full read model behind `GetInvoice` and the back-office listings:
//! one record per invoice, indexed by id and by document number.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use vetdesk_billing::{
    INVOICE_AGGREGATE_TYPE, InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceStatus, LineItem,
};
use vetdesk_core::{ConsultationId, Money, OwnerId, PatientId, StaffId};
use vetdesk_events::EventEnvelope;

use super::{ProjectionError, StreamCursors, append_note};
use crate::read_model::ReadModelStore;

/// Read model: one invoice document with lines and settlement totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub patient_id: PatientId,
    pub owner_id: OwnerId,
    pub consultation_id: Option<ConsultationId>,
    pub issued_by: StaffId,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub lines: Vec<LineItem>,
    pub tax_percent: Decimal,
    pub discount: Money,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub paid_total: Money,
    pub balance_due: Money,
    pub notes: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl InvoiceReadModel {
    pub fn from_issued(e: &InvoiceIssued) -> Self {
        Self {
            invoice_id: e.invoice_id,
            number: e.number.clone(),
            patient_id: e.patient_id,
            owner_id: e.owner_id,
            consultation_id: e.consultation_id,
            issued_by: e.issued_by,
            issue_date: e.issue_date,
            due_date: e.due_date,
            status: InvoiceStatus::Pending,
            lines: e.lines.clone(),
            tax_percent: e.tax_percent,
            discount: e.discount,
            subtotal: e.subtotal,
            tax_amount: e.tax_amount,
            total: e.total,
            paid_total: Money::ZERO,
            balance_due: e.total,
            notes: e.notes.clone().unwrap_or_default(),
            active: true,
            created_at: e.occurred_at,
        }
    }
}

/// Invoice documents projection. Rebuildable from invoice events.
#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: ReadModelStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    numbers: RwLock<HashMap<String, InvoiceId>>,
    cursors: StreamCursors,
}

impl<S> InvoicesProjection<S>
where
    S: ReadModelStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            numbers: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    /// Get one invoice by id.
    pub fn get(&self, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(invoice_id)
    }

    /// Get one invoice by document number.
    pub fn get_by_number(&self, number: &str) -> Option<InvoiceReadModel> {
        let invoice_id = *self.numbers.read().ok()?.get(number)?;
        self.store.get(&invoice_id)
    }

    /// Latest invoice attached to a consultation, if any.
    pub fn get_by_consultation(&self, consultation_id: ConsultationId) -> Option<InvoiceReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|m| m.consultation_id == Some(consultation_id))
            .max_by_key(|m| (m.issue_date, m.created_at))
    }

    /// All invoices for an owner, newest first.
    pub fn list_by_owner(&self, owner_id: OwnerId) -> Vec<InvoiceReadModel> {
        self.sorted(|m| m.owner_id == owner_id)
    }

    /// All invoices for a patient, newest first.
    pub fn list_by_patient(&self, patient_id: PatientId) -> Vec<InvoiceReadModel> {
        self.sorted(|m| m.patient_id == patient_id)
    }

    /// All invoices in a status, newest first.
    pub fn list_by_status(&self, status: InvoiceStatus) -> Vec<InvoiceReadModel> {
        self.sorted(|m| m.status == status)
    }

    /// All invoices issued in `[from, to]`, newest first.
    pub fn list_issued_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<InvoiceReadModel> {
        self.sorted(|m| m.issue_date >= from && m.issue_date <= to)
    }

    /// Σ total of active, non-cancelled invoices issued in `[from, to]`.
    pub fn total_invoiced(&self, from: NaiveDate, to: NaiveDate) -> Money {
        self.store
            .list()
            .into_iter()
            .filter(|m| {
                m.active
                    && m.status != InvoiceStatus::Cancelled
                    && m.issue_date >= from
                    && m.issue_date <= to
            })
            .map(|m| m.total)
            .sum()
    }

    fn sorted(&self, filter: impl Fn(&InvoiceReadModel) -> bool) -> Vec<InvoiceReadModel> {
        let mut result: Vec<_> = self.store.list().into_iter().filter(|m| filter(m)).collect();
        result.sort_by(|a, b| (b.issue_date, b.created_at).cmp(&(a.issue_date, a.created_at)));
        result
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

        let invoice_id = match &ev {
            InvoiceEvent::InvoiceIssued(e) => e.invoice_id,
            InvoiceEvent::InvoiceCancelled(e) => e.invoice_id,
            InvoiceEvent::PaymentRegistered(e) => e.invoice_id,
            InvoiceEvent::PaymentVoided(e) => e.invoice_id,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.invoice_id,
        };
        if invoice_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event invoice_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                let model = InvoiceReadModel::from_issued(&e);
                if let Ok(mut numbers) = self.numbers.write() {
                    numbers.insert(model.number.clone(), model.invoice_id);
                }
                self.store.upsert(e.invoice_id, model);
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                if let Some(mut model) = self.store.get(&invoice_id) {
                    model.status = InvoiceStatus::Cancelled;
                    append_note(&mut model.notes, "CANCELLED", &e.reason);
                    self.store.upsert(invoice_id, model);
                }
            }
            InvoiceEvent::PaymentRegistered(e) => {
                if let Some(mut model) = self.store.get(&invoice_id) {
                    model.paid_total = e.new_paid_total;
                    model.balance_due = e.new_balance_due;
                    model.status = if e.new_balance_due.is_positive() {
                        InvoiceStatus::Partial
                    } else {
                        InvoiceStatus::Paid
                    };
                    self.store.upsert(invoice_id, model);
                }
            }
            InvoiceEvent::PaymentVoided(e) => {
                if let Some(mut model) = self.store.get(&invoice_id) {
                    model.paid_total = e.new_paid_total;
                    model.balance_due = e.new_balance_due;
                    model.status = if e.new_paid_total.is_zero() {
                        InvoiceStatus::Pending
                    } else {
                        InvoiceStatus::Partial
                    };
                    self.store.upsert(invoice_id, model);
                }
            }
            InvoiceEvent::InvoiceMarkedOverdue(_) => {
                if let Some(mut model) = self.store.get(&invoice_id) {
                    model.status = InvoiceStatus::Overdue;
                    self.store.upsert(invoice_id, model);
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
        if let Ok(mut numbers) = self.numbers.write() {
            numbers.clear();
        }
        self.cursors.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
