//! Tabular export of the attestation log.
//!
//! Both formats carry the same table: one header row followed by one row per record, with list
//! columns joined by `", "`.

use std::io::Write;
use std::path::Path;

use attest_model::AttestationRecord;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const EXPORT_COLUMNS: [&str; 7] = [
    "id",
    "timestamp",
    "name",
    "site",
    "protocols_reviewed",
    "protocols_completed",
    "description",
];

pub const EXPORT_SHEET_NAME: &str = "Attestations";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build xlsx export: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("failed to build csv export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    /// `.csv` exports CSV; anything else gets XLSX.
    pub fn from_path(path: &Path) -> Self {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            ExportFormat::Csv
        } else {
            ExportFormat::Xlsx
        }
    }
}

/// One record as a row of [`EXPORT_COLUMNS`]. The dashboard listing renders the same row.
pub fn record_fields(record: &AttestationRecord) -> [String; 7] {
    [
        record.id.to_string(),
        record.timestamp_display(),
        record.name.clone(),
        record.site.clone(),
        record.protocols_reviewed.join(", "),
        record.protocols_completed.join(", "),
        record.description.clone().unwrap_or_default(),
    ]
}

pub fn export(records: &[AttestationRecord], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Xlsx => to_xlsx(records),
        ExportFormat::Csv => to_csv(records),
    }
}

pub fn to_xlsx(records: &[AttestationRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET_NAME)?;
    for (col, title) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (idx, record) in records.iter().enumerate() {
        let row = idx as u32 + 1;
        let fields = record_fields(record);
        // Ids go out as numbers so spreadsheet sorting works.
        sheet.write_number(row, 0, record.id.0 as f64)?;
        for (col, value) in fields.iter().enumerate().skip(1) {
            sheet.write_string(row, col as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn to_csv(records: &[AttestationRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS)?;
    for record in records {
        writer.write_record(record_fields(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

/// Write `bytes` next to `path` and rename into place; a failed export leaves any previous file
/// untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}
