//! `vetdesk-events` — event and bus mechanics shared by domain and infra.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::{CommandHandler, execute};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
