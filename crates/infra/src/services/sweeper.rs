//! Expiration sweep: batch transition of past-due invoices.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use vetdesk_billing::{
    INVOICE_AGGREGATE_TYPE, Invoice, InvoiceCommand, InvoiceId, MarkOverdue,
};
use vetdesk_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{OpenInvoice, OpenInvoicesProjection};
use crate::read_model::ReadModelStore;

/// Walks the open-invoices view and marks past-due invoices overdue.
///
/// Safe to re-run: an invoice that is already overdue (or got paid or
/// cancelled since the view was read) produces no events and is not
/// counted. A sweep racing a payment on the same invoice loses the
/// optimistic append and simply skips it — the payment's serialized
/// history wins, and the next sweep re-evaluates.
pub struct ExpirationSweeper<S, B, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: ReadModelStore<InvoiceId, OpenInvoice>,
{
    dispatcher: Arc<CommandDispatcher<S, B>>,
    open_invoices: Arc<OpenInvoicesProjection<R>>,
}

impl<S, B, R> ExpirationSweeper<S, B, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: ReadModelStore<InvoiceId, OpenInvoice>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        open_invoices: Arc<OpenInvoicesProjection<R>>,
    ) -> Self {
        Self {
            dispatcher,
            open_invoices,
        }
    }

    /// Transition every active, unpaid invoice with `due_date < as_of` to
    /// overdue. Returns the number of invoices actually transitioned.
    pub fn sweep(&self, as_of: NaiveDate) -> Result<usize, DispatchError> {
        let candidates = self.open_invoices.list_due_before(as_of);
        let mut transitioned = 0usize;

        for candidate in candidates {
            let command = InvoiceCommand::MarkOverdue(MarkOverdue {
                invoice_id: candidate.invoice_id,
                as_of,
                occurred_at: Utc::now(),
            });

            match self.dispatcher.dispatch(
                candidate.invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                command,
                |id| Invoice::empty(InvoiceId::new(id)),
            ) {
                Ok(events) if !events.is_empty() => transitioned += 1,
                // Already overdue, or settled since the view was read.
                Ok(_) => {}
                Err(err) if err.is_retryable() => {
                    // A payment won the race on this invoice; the next sweep
                    // re-evaluates it against the new state.
                    warn!(invoice = %candidate.invoice_id, error = %err, "sweep skipped a contended invoice");
                }
                Err(err) => return Err(err),
            }
        }

        info!(%as_of, transitioned, "overdue sweep complete");
        Ok(transitioned)
    }
}
