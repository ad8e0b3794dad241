pub mod store;

pub use store::{InMemoryReadModelStore, ReadModelStore};
