use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether mapping edits are currently frozen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        matches!(self, LockState::Locked)
    }

    /// Value stored in the flag table.
    pub fn as_str(self) -> &'static str {
        match self {
            LockState::Unlocked => "unlocked",
            LockState::Locked => "locked",
        }
    }

    /// Unknown stored values read as unlocked.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("locked") => LockState::Locked,
            _ => LockState::Unlocked,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
