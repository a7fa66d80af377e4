//! Read-only access to the protocol workbook.
//!
//! Each protocol is one sheet. Sheets are parsed on demand into a [`RawTable`]; nothing is
//! cached, so every call observes the file as it currently is on disk.

use std::path::{Path, PathBuf};

use attest_model::RawTable;
use thiserror::Error;

mod calamine_source;
mod memory;

pub use calamine_source::CalamineWorkbook;
pub use memory::MemoryWorkbook;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("workbook not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error("failed to open workbook {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("failed to read sheet `{sheet}`: {source}")]
    Read {
        sheet: String,
        #[source]
        source: calamine::Error,
    },
}

impl WorkbookError {
    /// Missing file or missing sheet, as opposed to a file that exists but can't be parsed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkbookError::NotFound(_) | WorkbookError::SheetNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkbookError>;

/// A source of protocol sheets.
pub trait WorkbookSource: Send + Sync {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Result<Vec<String>>;

    /// Parse one sheet. Fails with [`WorkbookError::SheetNotFound`] if it doesn't exist.
    fn read_sheet(&self, name: &str) -> Result<RawTable>;

    fn has_sheet(&self, name: &str) -> Result<bool> {
        Ok(self.sheet_names()?.iter().any(|s| s == name))
    }
}

/// Open the workbook at `path`, failing early with [`WorkbookError::NotFound`] if it is absent.
pub fn open_path(path: impl AsRef<Path>) -> Result<CalamineWorkbook> {
    let workbook = CalamineWorkbook::new(path.as_ref());
    workbook.ensure_exists()?;
    Ok(workbook)
}
