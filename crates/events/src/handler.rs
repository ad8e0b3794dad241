use crate::{Command, Event};

/// Handles a command and emits events (command handler abstraction).
///
/// A standalone interface for command → events transformation, independent
/// of the aggregate lifecycle. Useful for workers and for tests that do not
/// need the full dispatch pipeline.
pub trait CommandHandler {
    type Cmd: Command;
    type Ev: Event;
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn handle(&self, command: Self::Cmd) -> Result<Vec<Self::Ev>, Self::Error>;
}

/// Execute an aggregate command deterministically (no IO, no async).
///
/// Combines decision and state evolution in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` produces events (pure).
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// This mutates the aggregate in place. For the persisted pipeline (store
/// append, optimistic concurrency, publication), use the command
/// dispatcher instead.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: vetdesk_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
