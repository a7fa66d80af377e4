//! Core data model for protocol attestations.
//!
//! Everything in this crate is pure: no IO, no persistence. The workbook reader produces
//! [`RawTable`]s, the store persists [`MappingRecord`]s and [`AttestationRecord`]s, and the
//! application layer uses [`HeaderedTable`] to rebuild the exact view a configurator saved.

mod attestation;
mod filter;
mod labels;
mod lock;
mod mapping;
mod table;
mod value;

pub use attestation::{AttestationId, AttestationRecord, NewAttestation, TIMESTAMP_FORMAT};
pub use filter::{DashboardFilter, DateRange};
pub use labels::{dedupe_labels, header_labels};
pub use lock::LockState;
pub use mapping::{MappingRecord, ProtocolMapping};
pub use table::{HeaderedTable, ProjectedTable, TableError};
pub use value::{CellValue, RawTable};
