//! [`RecordStore`](crate::ports::RecordStore) implementations.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::{DatabaseConfig, PgRecordStore};
