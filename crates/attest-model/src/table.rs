use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::labels::header_labels;
use crate::{CellValue, RawTable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("header row {header_row} is out of range (sheet has {row_count} rows)")]
    HeaderRowOutOfRange { header_row: usize, row_count: usize },
}

/// A sheet re-read with one of its rows promoted to column labels.
///
/// The header row and every row above it are dropped; the remaining rows are re-indexed from 0.
/// Both the mapping editor and the attestation view build tables through this type so the row
/// offsets a configurator saved always point at the same cells later.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderedTable {
    header_row: usize,
    labels: Vec<String>,
    header_blank_cells: usize,
    rows: Vec<Vec<CellValue>>,
}

impl HeaderedTable {
    pub fn new(raw: &RawTable, header_row: usize) -> Result<Self, TableError> {
        let header = raw.row(header_row).ok_or(TableError::HeaderRowOutOfRange {
            header_row,
            row_count: raw.row_count(),
        })?;

        let labels = header_labels(header);
        let header_blank_cells = header.iter().filter(|c| c.is_empty()).count();
        let rows = raw
            .rows()
            .skip(header_row + 1)
            .map(<[CellValue]>::to_vec)
            .collect();

        Ok(Self {
            header_row,
            labels,
            header_blank_cells,
            rows,
        })
    }

    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// True when more than half of the header cells are blank.
    ///
    /// Such a header still works (blank cells get positional names) but usually means the wrong
    /// row was picked.
    pub fn header_is_sparse(&self) -> bool {
        let width = self.labels.len();
        width == 0 || self.header_blank_cells * 2 > width
    }

    /// Select rows and columns and apply display renames.
    ///
    /// Row offsets outside the table and unknown column labels are skipped. Rows come out in
    /// ascending order with duplicates removed; columns keep the caller's order.
    pub fn project(
        &self,
        rows: &[usize],
        columns: &[String],
        renames: &BTreeMap<String, String>,
    ) -> ProjectedTable {
        let row_set: BTreeSet<usize> = rows
            .iter()
            .copied()
            .filter(|r| *r < self.rows.len())
            .collect();

        let mut seen = BTreeSet::new();
        let picked: Vec<(usize, &String)> = columns
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .filter_map(|c| self.column_index(c).map(|idx| (idx, c)))
            .collect();

        let display_columns = picked
            .iter()
            .map(|(_, label)| match renames.get(label.as_str()) {
                Some(rename) if !rename.trim().is_empty() => rename.clone(),
                _ => (*label).clone(),
            })
            .collect();

        let projected_rows = row_set
            .iter()
            .map(|r| {
                picked
                    .iter()
                    .map(|(idx, _)| self.rows[*r][*idx].clone())
                    .collect()
            })
            .collect();

        ProjectedTable {
            columns: display_columns,
            source_rows: row_set.into_iter().collect(),
            rows: projected_rows,
        }
    }
}

/// The slice of a protocol sheet surfaced for review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedTable {
    /// Column headings after renames.
    pub columns: Vec<String>,
    /// Offsets of the kept rows in the header-stripped table.
    pub source_rows: Vec<usize>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ProjectedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sheet() -> RawTable {
        RawTable::from_text_rows(vec![
            vec!["CT Head", "", ""],
            vec!["Name", "Dose", "Name"],
            vec!["Routine", "40", "R1"],
            vec!["Stroke", "50", "S1"],
            vec!["Trauma", "45", "T1"],
        ])
    }

    #[test]
    fn strips_header_and_rows_above() {
        let table = HeaderedTable::new(&sheet(), 1).unwrap();
        assert_eq!(table.labels(), &["Name", "Dose", "Name_2"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[0][0], CellValue::Text("Routine".into()));
    }

    #[test]
    fn header_row_past_end_is_an_error() {
        let err = HeaderedTable::new(&sheet(), 5).unwrap_err();
        assert_eq!(
            err,
            TableError::HeaderRowOutOfRange {
                header_row: 5,
                row_count: 5
            }
        );
    }

    #[test]
    fn sparse_header_is_flagged() {
        assert!(HeaderedTable::new(&sheet(), 0).unwrap().header_is_sparse());
        assert!(!HeaderedTable::new(&sheet(), 1).unwrap().header_is_sparse());
    }

    #[test]
    fn projection_drops_stale_rows_and_unknown_columns() {
        let table = HeaderedTable::new(&sheet(), 1).unwrap();
        let mut renames = BTreeMap::new();
        renames.insert("Dose".to_string(), "CTDIvol".to_string());

        let projected = table.project(
            &[2, 0, 9, 0],
            &["Dose".to_string(), "Missing".to_string(), "Name".to_string()],
            &renames,
        );

        assert_eq!(projected.columns, vec!["CTDIvol", "Name"]);
        assert_eq!(projected.source_rows, vec![0, 2]);
        assert_eq!(
            projected.rows,
            vec![
                vec![CellValue::Text("40".into()), CellValue::Text("Routine".into())],
                vec![CellValue::Text("45".into()), CellValue::Text("Trauma".into())],
            ]
        );
    }

    #[test]
    fn blank_renames_keep_original_label() {
        let table = HeaderedTable::new(&sheet(), 1).unwrap();
        let mut renames = BTreeMap::new();
        renames.insert("Name".to_string(), "  ".to_string());
        let projected = table.project(&[0], &["Name".to_string()], &renames);
        assert_eq!(projected.columns, vec!["Name"]);
    }
}
