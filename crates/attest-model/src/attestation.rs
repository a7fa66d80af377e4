use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used to persist and display attestation timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Store-assigned identifier of an attestation. Stable across deletions of other records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestationId(pub i64);

impl fmt::Display for AttestationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttestationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(AttestationId)
    }
}

/// An attestation that has not been appended to the log yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttestation {
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub site: String,
    pub protocols_reviewed: Vec<String>,
    /// Subset of `protocols_reviewed`, in reviewed order.
    pub protocols_completed: Vec<String>,
    pub description: Option<String>,
}

impl NewAttestation {
    pub fn with_id(self, id: AttestationId) -> AttestationRecord {
        AttestationRecord {
            id,
            timestamp: self.timestamp,
            name: self.name,
            site: self.site,
            protocols_reviewed: self.protocols_reviewed,
            protocols_completed: self.protocols_completed,
            description: self.description,
        }
    }
}

/// One row of the attestation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub id: AttestationId,
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub site: String,
    pub protocols_reviewed: Vec<String>,
    pub protocols_completed: Vec<String>,
    pub description: Option<String>,
}

impl AttestationRecord {
    /// Reviewed protocols that were not marked complete, in reviewed order.
    pub fn protocols_not_completed(&self) -> Vec<&str> {
        self.protocols_reviewed
            .iter()
            .filter(|p| !self.protocols_completed.contains(p))
            .map(String::as_str)
            .collect()
    }

    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
