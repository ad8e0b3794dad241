//! Read models built from the invoice event stream.
//!
//! Projections are disposable: events are the source of truth, and every
//! read model here can be rebuilt from scratch by replaying envelopes in
//! order. Each projection tracks a per-stream cursor so at-least-once
//! delivery from the bus is safe.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use vetdesk_core::AggregateId;

pub mod invoices;
pub mod open_invoices;
pub mod receipts;

pub use invoices::{InvoiceReadModel, InvoicesProjection};
pub use open_invoices::{OpenInvoice, OpenInvoicesProjection, OpenInvoicesSummary};
pub use receipts::{PaymentReadModel, ReceiptsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize invoice event: {0}")]
    Deserialize(String),

    #[error("event does not belong to the envelope stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream cursor tracking for idempotent projections.
///
/// At-least-once delivery means a projection can see the same envelope
/// twice; replays at or below the cursor are skipped, and a gap above the
/// cursor is an error rather than silent data loss.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decide whether an envelope at `sequence_number` should be applied.
    ///
    /// `Ok(true)`: apply it (and call [`StreamCursors::advance`] after).
    /// `Ok(false)`: duplicate delivery, skip silently.
    pub(crate) fn admit(
        &self,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<bool, ProjectionError> {
        let last = match self.inner.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        };

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            return Ok(false);
        }
        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        Ok(true)
    }

    pub(crate) fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

/// Append an audit tag to a notes field, mirroring the aggregate's format.
pub(crate) fn append_note(notes: &mut String, tag: &str, reason: &str) {
    if !notes.is_empty() {
        notes.push('\n');
    }
    notes.push_str(tag);
    notes.push_str(": ");
    notes.push_str(reason);
}
