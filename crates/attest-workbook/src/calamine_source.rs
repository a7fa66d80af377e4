use std::path::{Path, PathBuf};

use attest_model::{CellValue, RawTable};
use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::{Result, WorkbookError, WorkbookSource};

/// Workbook reader backed by calamine.
///
/// Any format calamine auto-detects (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) is accepted. The
/// file is reopened on every call.
#[derive(Clone, Debug)]
pub struct CalamineWorkbook {
    path: PathBuf,
}

impl CalamineWorkbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn ensure_exists(&self) -> Result<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(WorkbookError::NotFound(self.path.clone()))
        }
    }

    fn open(&self) -> Result<calamine::Sheets<std::io::BufReader<std::fs::File>>> {
        self.ensure_exists()?;
        open_workbook_auto(&self.path).map_err(|source| WorkbookError::Open {
            path: self.path.clone(),
            source,
        })
    }
}

impl WorkbookSource for CalamineWorkbook {
    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.open()?.sheet_names())
    }

    fn read_sheet(&self, name: &str) -> Result<RawTable> {
        let mut workbook = self.open()?;
        if !workbook.sheet_names().iter().any(|s| s == name) {
            return Err(WorkbookError::SheetNotFound(name.to_string()));
        }

        let range = workbook
            .worksheet_range(name)
            .map_err(|source| WorkbookError::Read {
                sheet: name.to_string(),
                source,
            })?;

        let table = range_to_table(&range);
        log::debug!(
            "read sheet `{name}` from {}: {} rows x {} columns",
            self.path.display(),
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }
}

fn range_to_table(range: &Range<Data>) -> RawTable {
    // NOTE: calamine ranges start at the first used cell. Pad the leading empty rows back in so
    // row offsets line up with the sheet's own row numbers; leading empty columns stay trimmed.
    let leading_rows = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let width = range.width();

    let mut rows: Vec<Vec<CellValue>> = Vec::with_capacity(leading_rows + range.height());
    rows.extend((0..leading_rows).map(|_| vec![CellValue::Empty; width]));
    rows.extend(
        range
            .rows()
            .map(|row| row.iter().map(convert_value).collect::<Vec<_>>()),
    );

    RawTable::new(rows)
}

fn convert_value(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Empty,
        Data::Bool(v) => CellValue::Bool(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::String(v) => CellValue::Text(v.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::DateTime(v) => match v.as_datetime() {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Number(v.as_f64()),
        },
        Data::DateTimeIso(v) => CellValue::Text(v.clone()),
        Data::DurationIso(v) => CellValue::Text(v.clone()),
    }
}
