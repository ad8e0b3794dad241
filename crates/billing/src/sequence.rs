//! Year-scoped document number series (invoice numbers, receipt numbers).
//!
//! Numbers look like `INV-2026-000417`: series prefix, calendar year, and a
//! zero-padded sequence that restarts at 1 each year. Allocation goes
//! through [`SequenceStore::next`], an atomic fetch-and-increment — never
//! through "find the last issued number and add one", which hands out
//! duplicates under concurrent creation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vetdesk_core::DomainResult;

/// A document number series.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSeries {
    Invoice,
    Receipt,
}

impl DocumentSeries {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentSeries::Invoice => "INV",
            DocumentSeries::Receipt => "REC",
        }
    }
}

impl core::fmt::Display for DocumentSeries {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Render a document number: `PREFIX-YYYY-NNNNNN`.
pub fn format_number(series: DocumentSeries, year: i32, sequence: u64) -> String {
    format!("{}-{}-{:06}", series.prefix(), year, sequence)
}

/// Extract the numeric suffix of a previously issued number.
///
/// Defensive by contract: anything malformed — wrong field count, foreign
/// prefix, a different year, a non-numeric suffix — is treated as 0, never
/// an error. This is only a *seeding* aid for counter stores recovering
/// from persisted documents; live allocation never re-parses numbers.
pub fn last_sequence_in(series: DocumentSeries, year: i32, last_number: Option<&str>) -> u64 {
    let Some(number) = last_number else {
        return 0;
    };

    let mut parts = number.split('-');
    let (Some(prefix), Some(year_part), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return 0;
    };

    if prefix != series.prefix() {
        return 0;
    }
    if year_part.parse::<i32>() != Ok(year) {
        return 0;
    }
    suffix.parse::<u64>().unwrap_or(0)
}

/// Atomic allocator of per-(series, year) sequence values.
///
/// `next` must behave as an atomic fetch-and-increment: two concurrent
/// callers can never observe the same value for the same (series, year).
pub trait SequenceStore: Send + Sync {
    fn next(&self, series: DocumentSeries, year: i32) -> DomainResult<u64>;
}

impl<S> SequenceStore for Arc<S>
where
    S: SequenceStore + ?Sized,
{
    fn next(&self, series: DocumentSeries, year: i32) -> DomainResult<u64> {
        (**self).next(series, year)
    }
}

/// Produces the next document number for a series in a given year.
#[derive(Debug)]
pub struct SequenceGenerator<S> {
    store: S,
}

impl<S> SequenceGenerator<S>
where
    S: SequenceStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn next_number(&self, series: DocumentSeries, year: i32) -> DomainResult<String> {
        let sequence = self.store.next(series, year)?;
        Ok(format_number(series, year, sequence))
    }
}
