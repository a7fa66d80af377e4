use attest_model::RawTable;

use crate::{Result, WorkbookError, WorkbookSource};

/// An in-process workbook, mostly useful for tests and previews.
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, RawTable)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a sheet, keeping first-insertion order.
    pub fn with_sheet(mut self, name: impl Into<String>, table: RawTable) -> Self {
        self.insert_sheet(name, table);
        self
    }

    pub fn insert_sheet(&mut self, name: impl Into<String>, table: RawTable) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = table,
            None => self.sheets.push((name, table)),
        }
    }
}

impl WorkbookSource for MemoryWorkbook {
    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    fn read_sheet(&self, name: &str) -> Result<RawTable> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, table)| table.clone())
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_sheet_keeps_its_position() {
        let wb = MemoryWorkbook::new()
            .with_sheet("A", RawTable::default())
            .with_sheet("B", RawTable::default())
            .with_sheet("A", RawTable::from_text_rows(vec![vec!["x"]]));
        assert_eq!(wb.sheet_names().unwrap(), vec!["A", "B"]);
        assert_eq!(wb.read_sheet("A").unwrap().row_count(), 1);
    }

    #[test]
    fn missing_sheet_is_not_found() {
        let err = MemoryWorkbook::new().read_sheet("nope").unwrap_err();
        assert!(err.is_not_found());
    }
}
