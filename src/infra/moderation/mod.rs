// Storage backends for the moderation core. Every backend implements all
// three ports (policies, warns, word lists); clone the store to hand the
// service one handle per port.

pub mod in_memory;
pub mod json_store;
pub mod sqlite_store;

pub use in_memory::InMemoryModerationStore;
pub use json_store::JsonModerationStore;
pub use sqlite_store::SqliteModerationStore;
