#![forbid(unsafe_code)]

pub mod progress;
pub mod record;
pub mod repository;
pub mod sqlite;

pub use progress::{ProgressStore, SaveOutcome};
pub use record::SessionRecord;
pub use repository::{InMemoryBackend, KeyValueBackend, Storage, StorageError};
