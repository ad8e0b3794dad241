//! Atomic document-number allocation.

use std::collections::HashMap;
use std::sync::Mutex;

use vetdesk_billing::sequence::{DocumentSeries, SequenceStore, last_sequence_in};
use vetdesk_core::{DomainError, DomainResult};

/// In-memory per-(series, year) counter store.
///
/// `next` is a fetch-and-increment under one mutex, so concurrent invoice
/// and payment creation can never be handed the same number. A database
/// sequence plays this role in a persistent deployment.
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    counters: Mutex<HashMap<(DocumentSeries, i32), u64>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a counter from the last issued number of a series.
    ///
    /// The parse is defensive (see [`last_sequence_in`]): a malformed or
    /// prior-year number seeds from 0, so the series restarts at 1.
    pub fn seed(&self, series: DocumentSeries, year: i32, last_number: Option<&str>) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.insert((series, year), last_sequence_in(series, year, last_number));
        }
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn next(&self, series: DocumentSeries, year: i32) -> DomainResult<u64> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| DomainError::conflict("sequence store lock poisoned"))?;

        let counter = counters.entry((series, year)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
