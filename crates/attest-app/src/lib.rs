//! Application services for the protocol attestation workflow.
//!
//! [`AttestApp`] wires a [`WorkbookSource`], an [`AttestStore`] and a [`Notifier`] together and
//! hands out one service per stage:
//! - [`ProtocolSelection`]: which sheets are under review
//! - [`MappingManager`]: which rows/columns of each sheet are surfaced
//! - [`Workflow`]: the review view and attestation submission
//! - [`Dashboard`]: reading, filtering, exporting and deleting log entries
//! - [`LockGate`]: the password-gated freeze on mapping edits
//!
//! [`WorkbookSource`]: attest_workbook::WorkbookSource
//! [`AttestStore`]: attest_storage::AttestStore
//! [`Notifier`]: attest_notify::Notifier

mod app;
pub mod config;
mod dashboard;
mod error;
pub mod export;
mod lock;
mod mapping;
mod selection;
mod workflow;

pub use app::{AttestApp, Settings};
pub use config::{AppConfig, ConfigError, NotifyConfig};
pub use dashboard::{filter_options, Dashboard, FilterOptions};
pub use error::{AppError, ErrorKind};
pub use export::{ExportError, ExportFormat};
pub use lock::LockGate;
pub use mapping::{MappingDraft, MappingManager, MappingView, SaveReport};
pub use selection::{ProtocolLink, ProtocolSelection};
pub use workflow::{
    AttestationForm, NotificationStatus, ProtocolReview, ReviewStatus, SubmitOutcome, Workflow,
};

pub type Result<T> = std::result::Result<T, AppError>;
