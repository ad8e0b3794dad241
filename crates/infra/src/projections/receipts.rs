//! Receipts projection.
//!
//! One record per registered payment, indexed by payment id and receipt
//! number, with per-invoice listings and collection totals. The cash
//! reports (`total_collected`, `total_by_method`) only count active
//! payments, so a voided receipt drops out of them.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use vetdesk_billing::{
    INVOICE_AGGREGATE_TYPE, InvoiceEvent, InvoiceId, PaymentId, PaymentMethod, PaymentRecord,
};
use vetdesk_core::{Money, StaffId};
use vetdesk_events::EventEnvelope;

use super::{ProjectionError, StreamCursors, append_note};
use crate::read_model::ReadModelStore;

/// Read model: one payment with its receipt and invoice context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReadModel {
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub receipt_number: String,
    pub paid_at: DateTime<Utc>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub bank: Option<String>,
    pub notes: String,
    pub received_by: StaffId,
    pub active: bool,
}

impl PaymentReadModel {
    fn from_record(invoice_id: InvoiceId, invoice_number: String, record: &PaymentRecord) -> Self {
        Self {
            payment_id: record.payment_id,
            invoice_id,
            invoice_number,
            receipt_number: record.receipt_number.clone(),
            paid_at: record.paid_at,
            amount: record.amount,
            method: record.method,
            reference: record.reference.clone(),
            bank: record.bank.clone(),
            notes: record.notes.clone(),
            received_by: record.received_by,
            active: record.active,
        }
    }
}

/// Receipts projection. Rebuildable from invoice events.
#[derive(Debug)]
pub struct ReceiptsProjection<S>
where
    S: ReadModelStore<PaymentId, PaymentReadModel>,
{
    store: S,
    receipt_numbers: RwLock<HashMap<String, PaymentId>>,
    invoice_numbers: RwLock<HashMap<InvoiceId, String>>,
    cursors: StreamCursors,
}

impl<S> ReceiptsProjection<S>
where
    S: ReadModelStore<PaymentId, PaymentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            receipt_numbers: RwLock::new(HashMap::new()),
            invoice_numbers: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    /// Get one payment by id.
    pub fn get(&self, payment_id: &PaymentId) -> Option<PaymentReadModel> {
        self.store.get(payment_id)
    }

    /// Get one payment by receipt number.
    pub fn get_by_receipt(&self, receipt_number: &str) -> Option<PaymentReadModel> {
        let payment_id = *self.receipt_numbers.read().ok()?.get(receipt_number)?;
        self.store.get(&payment_id)
    }

    /// All payments on an invoice (active and voided), newest first.
    pub fn list_for_invoice(&self, invoice_id: InvoiceId) -> Vec<PaymentReadModel> {
        self.sorted(|p| p.invoice_id == invoice_id)
    }

    /// All payments made with a method, newest first.
    pub fn list_by_method(&self, method: PaymentMethod) -> Vec<PaymentReadModel> {
        self.sorted(|p| p.method == method)
    }

    /// All payments received by a staff member, newest first.
    pub fn list_received_by(&self, staff_id: StaffId) -> Vec<PaymentReadModel> {
        self.sorted(|p| p.received_by == staff_id)
    }

    /// All payments with `paid_at` in `[from, until)`, newest first.
    pub fn list_paid_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<PaymentReadModel> {
        self.sorted(|p| p.paid_at >= from && p.paid_at < until)
    }

    /// Σ amount of active payments with `paid_at` in `[from, until)`.
    pub fn total_collected(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Money {
        self.store
            .list()
            .into_iter()
            .filter(|p| p.active && p.paid_at >= from && p.paid_at < until)
            .map(|p| p.amount)
            .sum()
    }

    /// Σ amount of active payments made with `method` in `[from, until)`.
    pub fn total_by_method(
        &self,
        method: PaymentMethod,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Money {
        self.store
            .list()
            .into_iter()
            .filter(|p| p.active && p.method == method && p.paid_at >= from && p.paid_at < until)
            .map(|p| p.amount)
            .sum()
    }

    fn sorted(&self, filter: impl Fn(&PaymentReadModel) -> bool) -> Vec<PaymentReadModel> {
        let mut result: Vec<_> = self.store.list().into_iter().filter(|p| filter(p)).collect();
        result.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
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

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                if let Ok(mut numbers) = self.invoice_numbers.write() {
                    numbers.insert(e.invoice_id, e.number.clone());
                }
            }
            InvoiceEvent::PaymentRegistered(e) => {
                let invoice_number = self
                    .invoice_numbers
                    .read()
                    .ok()
                    .and_then(|m| m.get(&e.invoice_id).cloned())
                    .unwrap_or_default();
                let model = PaymentReadModel::from_record(e.invoice_id, invoice_number, &e.payment);
                if let Ok(mut receipts) = self.receipt_numbers.write() {
                    receipts.insert(model.receipt_number.clone(), model.payment_id);
                }
                self.store.upsert(model.payment_id, model);
            }
            InvoiceEvent::PaymentVoided(e) => {
                if let Some(mut model) = self.store.get(&e.payment_id) {
                    model.active = false;
                    append_note(&mut model.notes, "VOIDED", &e.reason);
                    self.store.upsert(e.payment_id, model);
                }
            }
            // Cancellation and overdue marking do not touch receipts.
            InvoiceEvent::InvoiceCancelled(_) | InvoiceEvent::InvoiceMarkedOverdue(_) => {}
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
        if let Ok(mut receipts) = self.receipt_numbers.write() {
            receipts.clear();
        }
        if let Ok(mut numbers) = self.invoice_numbers.write() {
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
