use attest_notify::NotifyError;
use attest_storage::StorageError;
use attest_workbook::WorkbookError;
use thiserror::Error;

use crate::export::ExportError;

/// Coarse classification used by the user surface to decide how to present a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing workbook or sheet.
    NotFound,
    /// A form field or argument was missing or invalid. Nothing was written.
    Validation,
    /// Persistence was unreachable or a write failed. Nothing was written.
    Storage,
    Notification,
    /// Mapping edit attempted while the lock is engaged.
    Locked,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("{0}")]
    Validation(String),
    #[error("protocol mappings are locked; unlock them before editing")]
    Locked,
}

impl AppError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            // A workbook that exists but can't be parsed is just as unusable as a missing one.
            AppError::Workbook(_) => ErrorKind::NotFound,
            AppError::Storage(_) | AppError::Export(_) => ErrorKind::Storage,
            AppError::Notify(_) => ErrorKind::Notification,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Locked => ErrorKind::Locked,
        }
    }
}
