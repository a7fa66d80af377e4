use attest_model::{AttestationId, AttestationRecord, LockState, MappingRecord, NewAttestation};

use crate::Result;

/// The persistence interface the attestation workflow is written against.
///
/// Replace operations are last-writer-wins: two concurrent replacements both succeed and the later
/// one is what readers observe afterwards.
pub trait AttestStore: Send + Sync {
    /// Active protocols in ascending name order.
    fn active_protocols(&self) -> Result<Vec<String>>;

    /// Replace the whole active set.
    fn replace_active_protocols(&self, protocols: &[String]) -> Result<()>;

    /// Every mapping record, in insertion order.
    fn mappings(&self) -> Result<Vec<MappingRecord>>;

    fn mappings_for(&self, protocol: &str) -> Result<Vec<MappingRecord>>;

    /// Replace the mapping records of `protocol` only.
    ///
    /// All `records` must belong to `protocol` and agree on `header_row`.
    fn replace_mappings_for(&self, protocol: &str, records: &[MappingRecord]) -> Result<()>;

    /// Delete the mappings of the given protocols; returns the number of records removed.
    fn clear_mappings_for(&self, protocols: &[String]) -> Result<usize>;

    fn append_attestation(&self, entry: &NewAttestation) -> Result<AttestationRecord>;

    /// The full log, newest first.
    fn attestations(&self) -> Result<Vec<AttestationRecord>>;

    /// Delete exactly the given records; unknown ids are ignored. Returns the number removed.
    fn delete_attestations(&self, ids: &[AttestationId]) -> Result<usize>;

    /// Sites in their saved order.
    fn sites(&self) -> Result<Vec<String>>;

    fn replace_sites(&self, sites: &[String]) -> Result<()>;

    fn lock_state(&self) -> Result<LockState>;

    fn set_lock_state(&self, state: LockState) -> Result<()>;
}
