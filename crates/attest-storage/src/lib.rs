//! SQLite-backed storage for the attestation workflow.
//!
//! The crate exposes the [`AttestStore`] trait (the narrow persistence interface the application
//! layer depends on) and [`Storage`], its SQLite implementation:
//! - schema creation and additive migrations on open
//! - whole-set replacement of the active protocol selection and the site list
//! - per-protocol replacement of row/column mappings (other protocols are never touched)
//! - an append-only attestation log with deletion by stable identifier
//! - the persisted mapping lock flag
//!
//! Every multi-row write runs in a single transaction, so readers never see a partial set.

mod schema;
pub mod storage;
mod store;

pub use storage::{Storage, StorageError};
pub use store::AttestStore;

pub type Result<T> = std::result::Result<T, StorageError>;
