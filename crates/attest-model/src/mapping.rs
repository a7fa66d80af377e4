use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One persisted `(protocol, row, column)` display choice.
///
/// `header_row` and `description` are per-protocol values repeated on every record of that
/// protocol; writers must keep them identical across the protocol's records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub protocol: String,
    /// Offset into the header-stripped table.
    pub row_index: usize,
    /// De-duplicated column label derived from the header row.
    pub original_column: String,
    pub renamed_column: Option<String>,
    pub header_row: usize,
    pub description: Option<String>,
}

/// All mapping choices for a single protocol, folded back out of its records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMapping {
    pub protocol: String,
    pub header_row: usize,
    /// Ascending, unique.
    pub rows: Vec<usize>,
    /// In the order they were first saved.
    pub columns: Vec<String>,
    pub renames: BTreeMap<String, String>,
    pub description: Option<String>,
}

impl ProtocolMapping {
    /// Fold the records belonging to `protocol`. Returns `None` if there are none.
    pub fn from_records<'a>(
        protocol: &str,
        records: impl IntoIterator<Item = &'a MappingRecord>,
    ) -> Option<Self> {
        let mut mapping: Option<ProtocolMapping> = None;
        let mut rows = BTreeSet::new();
        let mut seen_columns = BTreeSet::new();

        for record in records.into_iter().filter(|r| r.protocol == protocol) {
            let m = mapping.get_or_insert_with(|| ProtocolMapping {
                protocol: protocol.to_string(),
                header_row: record.header_row,
                ..ProtocolMapping::default()
            });

            rows.insert(record.row_index);
            if seen_columns.insert(record.original_column.clone()) {
                m.columns.push(record.original_column.clone());
            }
            if let Some(rename) = record.renamed_column.as_ref().filter(|r| !r.trim().is_empty()) {
                m.renames
                    .entry(record.original_column.clone())
                    .or_insert_with(|| rename.clone());
            }
            if m.description.is_none() {
                m.description = record
                    .description
                    .as_ref()
                    .filter(|d| !d.trim().is_empty())
                    .cloned();
            }
        }

        mapping.map(|mut m| {
            m.rows = rows.into_iter().collect();
            m
        })
    }

    /// Expand into one record per `(row, column)` pair.
    pub fn to_records(&self) -> Vec<MappingRecord> {
        let description = self
            .description
            .as_ref()
            .filter(|d| !d.trim().is_empty())
            .cloned();

        let mut out = Vec::with_capacity(self.rows.len() * self.columns.len());
        for row in &self.rows {
            for column in &self.columns {
                out.push(MappingRecord {
                    protocol: self.protocol.clone(),
                    row_index: *row,
                    original_column: column.clone(),
                    renamed_column: self
                        .renames
                        .get(column)
                        .filter(|r| !r.trim().is_empty())
                        .cloned(),
                    header_row: self.header_row,
                    description: description.clone(),
                });
            }
        }
        out
    }
}
