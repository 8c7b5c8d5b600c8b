//! GRC tracker: governance, risk and compliance records over a REST API.
//!
//! Layout:
//! - [`scoring`]: the risk classification engine (impact x likelihood bands)
//! - [`schema`]: explicit table declarations with delete rules
//! - [`ports`] / [`store`]: the storage port and its memory/Postgres stores
//! - [`service`]: validated, typed CRUD plus risk metrics, attachments and seeding
//! - [`api`]: axum routes (feature `server`)

pub mod blob_store;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod record;
pub mod schema;
pub mod scoring;
pub mod seed;
pub mod service;
pub mod store;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod config;

pub use error::{FieldErrors, GrcError, Result};
pub use grc_types;
pub use record::Record;
pub use schema::{EntityKind, Schema};
pub use service::{GrcService, ListParams};
