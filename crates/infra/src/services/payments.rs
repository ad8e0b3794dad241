//! Payment registration and voiding.
//!
//! The only writer of payment state. Balance validation lives in the
//! invoice aggregate; registering a payment appends `PaymentRegistered` to
//! the invoice stream, so the payment row and the balance change are one
//! atomic write — there is no window where one exists without the other.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use vetdesk_billing::sequence::{DocumentSeries, SequenceGenerator, SequenceStore};
use vetdesk_billing::{
    INVOICE_AGGREGATE_TYPE, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, PaymentId,
    PaymentMethod, PaymentRegistered, RegisterPayment, VoidPayment,
};
use vetdesk_core::{AggregateId, Money, StaffId};
use vetdesk_events::{EventBus, EventEnvelope};

use super::{BillingDirectories, MAX_DISPATCH_RETRIES, day_bounds};
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{PaymentReadModel, ReceiptsProjection};
use crate::read_model::ReadModelStore;

/// Input for registering a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub received_by: StaffId,
    pub reference: Option<String>,
    pub bank: Option<String>,
    pub notes: Option<String>,
}

/// Confirmation of a registered payment, built from the committed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub receipt_number: String,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub new_paid_total: Money,
    pub new_balance_due: Money,
}

/// A payment enriched with display data from the directories.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub payment: PaymentReadModel,
    pub received_by_name: Option<String>,
}

/// Payment registration, voiding and read access.
pub struct PaymentService<S, B, Q, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    Q: SequenceStore,
    R: ReadModelStore<PaymentId, PaymentReadModel>,
{
    dispatcher: Arc<CommandDispatcher<S, B>>,
    sequences: Arc<SequenceGenerator<Q>>,
    directories: BillingDirectories,
    receipts: Arc<ReceiptsProjection<R>>,
}

impl<S, B, Q, R> PaymentService<S, B, Q, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    Q: SequenceStore,
    R: ReadModelStore<PaymentId, PaymentReadModel>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        sequences: Arc<SequenceGenerator<Q>>,
        directories: BillingDirectories,
        receipts: Arc<ReceiptsProjection<R>>,
    ) -> Self {
        Self {
            dispatcher,
            sequences,
            directories,
            receipts,
        }
    }

    /// Register a payment against an invoice.
    ///
    /// The aggregate enforces the cancelled-invoice rule and refuses any
    /// amount above the balance due. A lost concurrency race (another
    /// payment or a sweep touched the invoice first) is retried against the
    /// winner's state, so two concurrent payments can never both pass the
    /// balance check.
    pub fn register_payment(&self, input: NewPayment) -> Result<PaymentReceipt, DispatchError> {
        if !self.directories.staff.exists(input.received_by) {
            return Err(DispatchError::NotFound("staff member".to_string()));
        }

        let payment_id = PaymentId::new(AggregateId::new());
        let year = input.paid_at.year();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let receipt_number = self
                .sequences
                .next_number(DocumentSeries::Receipt, year)
                .map_err(DispatchError::from)?;

            let command = InvoiceCommand::RegisterPayment(RegisterPayment {
                invoice_id: input.invoice_id,
                payment_id,
                receipt_number,
                amount: input.amount,
                method: input.method,
                paid_at: input.paid_at,
                reference: input.reference.clone(),
                bank: input.bank.clone(),
                notes: input.notes.clone(),
                received_by: input.received_by,
                occurred_at: Utc::now(),
            });

            match self.dispatcher.dispatch(
                input.invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                command,
                |id| Invoice::empty(InvoiceId::new(id)),
            ) {
                Ok(committed) => {
                    let registered = registered_payload(&committed)?;
                    let receipt = PaymentReceipt {
                        payment_id: registered.payment.payment_id,
                        receipt_number: registered.payment.receipt_number.clone(),
                        invoice_id: registered.invoice_id,
                        amount: registered.payment.amount,
                        new_paid_total: registered.new_paid_total,
                        new_balance_due: registered.new_balance_due,
                    };
                    info!(
                        receipt = %receipt.receipt_number,
                        invoice = %receipt.invoice_id,
                        amount = %receipt.amount,
                        "payment registered"
                    );
                    return Ok(receipt);
                }
                Err(err) if err.is_retryable() && attempts < MAX_DISPATCH_RETRIES => {
                    warn!(error = %err, attempt = attempts, "payment lost a concurrency race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Void a payment, reversing its effect on the invoice.
    ///
    /// Allowed only within 30 days of `paid_at`; the invoice's status falls
    /// back to pending/partial (an overdue flag is only restored by the
    /// next sweep).
    pub fn void_payment(&self, payment_id: PaymentId, reason: &str) -> Result<(), DispatchError> {
        let payment = self
            .receipts
            .get(&payment_id)
            .filter(|p| p.active)
            .ok_or_else(|| DispatchError::NotFound("payment".to_string()))?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let command = InvoiceCommand::VoidPayment(VoidPayment {
                invoice_id: payment.invoice_id,
                payment_id,
                reason: reason.to_string(),
                occurred_at: Utc::now(),
            });

            match self.dispatcher.dispatch(
                payment.invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                command,
                |id| Invoice::empty(InvoiceId::new(id)),
            ) {
                Ok(_) => {
                    info!(receipt = %payment.receipt_number, invoice = %payment.invoice_id, "payment voided");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempts < MAX_DISPATCH_RETRIES => {
                    warn!(error = %err, attempt = attempts, "void lost a concurrency race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Get a payment by id.
    pub fn get(&self, payment_id: PaymentId) -> Option<PaymentReadModel> {
        self.receipts.get(&payment_id)
    }

    /// Get a payment by receipt number.
    pub fn get_by_receipt(&self, receipt_number: &str) -> Option<PaymentReadModel> {
        self.receipts.get_by_receipt(receipt_number)
    }

    /// A payment enriched with the receiving staff member's name.
    pub fn get_details(&self, payment_id: PaymentId) -> Option<PaymentDetails> {
        let payment = self.receipts.get(&payment_id)?;
        let received_by_name = self.directories.staff.display_name(payment.received_by);
        Some(PaymentDetails {
            payment,
            received_by_name,
        })
    }

    /// All payments on an invoice (active and voided), newest first.
    pub fn list_for_invoice(&self, invoice_id: InvoiceId) -> Vec<PaymentReadModel> {
        self.receipts.list_for_invoice(invoice_id)
    }

    /// All payments made with a method, newest first.
    pub fn list_by_method(&self, method: PaymentMethod) -> Vec<PaymentReadModel> {
        self.receipts.list_by_method(method)
    }

    /// All payments received by a staff member, newest first.
    pub fn list_received_by(&self, staff_id: StaffId) -> Vec<PaymentReadModel> {
        self.receipts.list_received_by(staff_id)
    }

    /// All payments made on days in `[from, to]`, newest first.
    pub fn list_paid_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PaymentReadModel>, DispatchError> {
        let (start, until) = day_bounds(from, to)?;
        Ok(self.receipts.list_paid_between(start, until))
    }

    /// Σ amount of active payments made on days in `[from, to]`.
    pub fn total_collected(&self, from: NaiveDate, to: NaiveDate) -> Result<Money, DispatchError> {
        let (start, until) = day_bounds(from, to)?;
        Ok(self.receipts.total_collected(start, until))
    }

    /// Σ amount of active payments with `method` on days in `[from, to]`.
    pub fn total_collected_by_method(
        &self,
        method: PaymentMethod,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Money, DispatchError> {
        let (start, until) = day_bounds(from, to)?;
        Ok(self.receipts.total_by_method(method, start, until))
    }
}

fn registered_payload(committed: &[StoredEvent]) -> Result<PaymentRegistered, DispatchError> {
    let first = committed.first().ok_or_else(|| {
        DispatchError::InvariantViolation("payment committed no events".to_string())
    })?;
    let event: InvoiceEvent = serde_json::from_value(first.payload.clone())
        .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
    match event {
        InvoiceEvent::PaymentRegistered(registered) => Ok(registered),
        other => Err(DispatchError::InvariantViolation(format!(
            "expected PaymentRegistered, got {other:?}"
        ))),
    }
}
