//! CarInfo Core - records, persistence and authorization for the car inventory
//!
//! This crate holds everything the HTTP layer composes: the record types,
//! payload validation, the snapshot store with its read-modify-write
//! operations, and the client for the external policy decision point.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod authz;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod store;
pub mod validate;

pub use authz::{Authorizer, DecisionInput, PolicyClient, PolicyError};
pub use config::{Config, LogFormat, LoggingConfig, PolicyConfig, PolicyMode, ServerConfig};
pub use error::{CarInfoError, Result, SchemaError};
pub use inventory::Inventory;
pub use model::{Car, Snapshot, Status};
pub use store::{next_identifier, FileStore, MemoryStore, Store};
pub use validate::{validate_car_payload, validate_identifier, validate_status_payload};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
