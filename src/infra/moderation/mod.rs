pub mod in_memory;
pub mod sqlite_violation_store;
pub mod webhook_sink;

pub use in_memory::InMemoryViolationStore;
pub use sqlite_violation_store::SqliteViolationStore;
pub use webhook_sink::{NullEscalationSink, WebhookEscalationSink};
