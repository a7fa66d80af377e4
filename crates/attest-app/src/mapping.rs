use std::collections::{BTreeMap, BTreeSet};

use attest_model::{CellValue, HeaderedTable, ProtocolMapping, TableError};
use attest_storage::AttestStore;
use attest_workbook::WorkbookSource;
use serde::Serialize;

use crate::{AppError, LockGate, Result};

/// A protocol sheet as the mapping editor shows it, with the saved (or default) choices.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MappingView {
    pub protocol: String,
    pub header_row: usize,
    /// De-duplicated header labels.
    pub labels: Vec<String>,
    /// Header-stripped rows, indexed from 0.
    pub rows: Vec<Vec<CellValue>>,
    pub selected_rows: Vec<usize>,
    pub selected_columns: Vec<String>,
    pub renames: BTreeMap<String, String>,
    pub description: Option<String>,
    /// Whether the selection came from a saved mapping rather than the all-rows default.
    pub saved: bool,
    pub warnings: Vec<String>,
}

/// What a configurator submits for one protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingDraft {
    pub protocol: String,
    pub header_row: usize,
    pub rows: Vec<usize>,
    pub columns: Vec<String>,
    pub renames: BTreeMap<String, String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub protocol: String,
    pub records_written: usize,
    /// Requested row offsets that fell outside the header-stripped table.
    pub dropped_rows: Vec<usize>,
    /// Requested columns that are not among the header labels.
    pub dropped_columns: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct MappingManager<'a> {
    workbook: &'a dyn WorkbookSource,
    store: &'a dyn AttestStore,
}

impl<'a> MappingManager<'a> {
    pub fn new(workbook: &'a dyn WorkbookSource, store: &'a dyn AttestStore) -> Self {
        Self { workbook, store }
    }

    /// Load `protocol` for editing. `header_row` defaults to the saved value, else 0.
    pub fn load(&self, protocol: &str, header_row: Option<usize>) -> Result<MappingView> {
        let raw = self.workbook.read_sheet(protocol)?;
        let records = self.store.mappings_for(protocol)?;
        let saved = ProtocolMapping::from_records(protocol, &records);

        let mut warnings = Vec::new();
        let header_row = match header_row {
            Some(requested) => requested,
            // A saved header row past the end of the sheet falls back to row 0.
            None => match saved.as_ref().map(|m| m.header_row) {
                Some(saved_row) if raw.row(saved_row).is_none() => {
                    warnings.push(format!(
                        "saved header row {saved_row} is past the end of the sheet ({} rows); showing header row 0",
                        raw.row_count()
                    ));
                    0
                }
                Some(saved_row) => saved_row,
                None => 0,
            },
        };

        if raw.is_empty() && header_row == 0 {
            warnings.push("sheet is empty".to_string());
            return Ok(MappingView {
                protocol: protocol.to_string(),
                header_row,
                labels: Vec::new(),
                rows: Vec::new(),
                selected_rows: Vec::new(),
                selected_columns: Vec::new(),
                renames: BTreeMap::new(),
                description: saved.and_then(|m| m.description),
                saved: false,
                warnings,
            });
        }

        let table = headered(&raw, header_row)?;
        if table.header_is_sparse() {
            warnings.push(sparse_header_warning(header_row));
        }

        let mut view = MappingView {
            protocol: protocol.to_string(),
            header_row,
            labels: table.labels().to_vec(),
            rows: table.rows().to_vec(),
            selected_rows: (0..table.row_count()).collect(),
            selected_columns: table.labels().to_vec(),
            renames: BTreeMap::new(),
            description: None,
            saved: false,
            warnings,
        };

        if let Some(saved) = saved {
            view.description = saved.description;
            if saved.header_row == header_row {
                view.saved = true;
                view.selected_rows = saved
                    .rows
                    .into_iter()
                    .filter(|r| *r < table.row_count())
                    .collect();
                view.selected_columns = saved
                    .columns
                    .into_iter()
                    .filter(|c| table.column_index(c).is_some())
                    .collect();
                view.renames = saved
                    .renames
                    .into_iter()
                    .filter(|(column, _)| view.selected_columns.contains(column))
                    .collect();
            } else {
                view.warnings.push(format!(
                    "saved mapping uses header row {}; showing all rows and columns for header row {header_row}",
                    saved.header_row
                ));
            }
        }

        Ok(view)
    }

    /// Replace every record of `draft.protocol` with the accepted rows × columns.
    pub fn save(&self, draft: &MappingDraft) -> Result<SaveReport> {
        LockGate::new(self.store, None).ensure_unlocked()?;

        let raw = self.workbook.read_sheet(&draft.protocol)?;
        let table = headered(&raw, draft.header_row)?;

        let mut report = SaveReport {
            protocol: draft.protocol.clone(),
            ..SaveReport::default()
        };
        if table.header_is_sparse() {
            report.warnings.push(sparse_header_warning(draft.header_row));
        }

        let mut rows = BTreeSet::new();
        let mut dropped_rows = BTreeSet::new();
        for row in &draft.rows {
            if *row < table.row_count() {
                rows.insert(*row);
            } else {
                dropped_rows.insert(*row);
            }
        }
        report.dropped_rows = dropped_rows.into_iter().collect();

        let mut seen = BTreeSet::new();
        let mut columns = Vec::new();
        for column in &draft.columns {
            if !seen.insert(column.as_str()) {
                continue;
            }
            if table.column_index(column).is_some() {
                columns.push(column.clone());
            } else {
                report
                    .warnings
                    .push(format!("column `{column}` is not in header row {}; skipped", draft.header_row));
                report.dropped_columns.push(column.clone());
            }
        }

        let renames = draft
            .renames
            .iter()
            .filter(|(column, _)| columns.contains(column))
            .map(|(column, rename)| (column.clone(), rename.trim().to_string()))
            .filter(|(_, rename)| !rename.is_empty())
            .collect();

        let mapping = ProtocolMapping {
            protocol: draft.protocol.clone(),
            header_row: draft.header_row,
            rows: rows.into_iter().collect(),
            columns,
            renames,
            description: draft
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };
        let records = mapping.to_records();
        if records.is_empty() {
            report
                .warnings
                .push("no rows or no columns selected; the protocol will show nothing on review".to_string());
        }

        self.store.replace_mappings_for(&draft.protocol, &records)?;
        report.records_written = records.len();

        for warning in &report.warnings {
            log::warn!("mapping `{}`: {warning}", draft.protocol);
        }
        log::info!(
            "saved {} mapping record(s) for `{}`",
            report.records_written,
            draft.protocol
        );
        Ok(report)
    }
}

fn headered(raw: &attest_model::RawTable, header_row: usize) -> Result<HeaderedTable> {
    HeaderedTable::new(raw, header_row).map_err(|err| match err {
        TableError::HeaderRowOutOfRange { .. } => AppError::validation(err.to_string()),
    })
}

fn sparse_header_warning(header_row: usize) -> String {
    format!("header row {header_row} is blank or mostly empty; column names may not be meaningful")
}
