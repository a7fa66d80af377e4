//! Plain-text and JSON output for the `attest` commands.

use std::fmt::Display;
use std::io::{self, Write};

use attest_app::export::{record_fields, EXPORT_COLUMNS};
use attest_app::{MappingView, ProtocolReview, ReviewStatus};
use attest_model::{AttestationRecord, CellValue};
use serde::Serialize;

pub fn json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

pub fn join_display<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Left-aligned columns separated by two spaces.
fn table(out: &mut impl Write, header: &[String], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(header))?;
    for row in rows {
        writeln!(out, "{}", line(row))?;
    }
    Ok(())
}

fn cells(row: &[CellValue]) -> Vec<String> {
    row.iter().map(ToString::to_string).collect()
}

pub fn mapping_view(out: &mut impl Write, view: &MappingView) -> io::Result<()> {
    writeln!(out, "{} (header row {})", view.protocol, view.header_row)?;
    if !view.saved {
        writeln!(out, "no saved mapping; showing the default selection")?;
    }
    if let Some(description) = &view.description {
        writeln!(out, "notes: {description}")?;
    }
    writeln!(out, "rows: {}", join_display(&view.selected_rows))?;
    writeln!(out, "columns: {}", view.selected_columns.join(", "))?;
    for (column, rename) in &view.renames {
        writeln!(out, "rename: {column} -> {rename}")?;
    }
    writeln!(out)?;

    let mut header = vec!["#".to_string()];
    header.extend(view.labels.iter().cloned());
    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let marker = if view.selected_rows.contains(&idx) { "*" } else { "" };
            let mut line = vec![format!("{idx}{marker}")];
            line.extend(cells(row));
            line
        })
        .collect();
    table(out, &header, &rows)
}

pub fn reviews(out: &mut impl Write, reviews: &[ProtocolReview]) -> io::Result<()> {
    if reviews.is_empty() {
        return writeln!(out, "no protocols are selected for review");
    }
    for (idx, review) in reviews.iter().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        writeln!(out, "== {} ==", review.protocol)?;
        if let Some(notes) = &review.notes {
            writeln!(out, "notes: {notes}")?;
        }
        if let Some(snapshot) = &review.snapshot {
            writeln!(out, "snapshot: {}", snapshot.display())?;
        }
        match &review.status {
            ReviewStatus::Ready(projected) => {
                let rows: Vec<Vec<String>> =
                    projected.rows.iter().map(Vec::as_slice).map(cells).collect();
                table(out, &projected.columns, &rows)?;
            }
            ReviewStatus::SheetMissing => writeln!(out, "sheet is missing from the workbook")?,
            ReviewStatus::NoMapping => writeln!(out, "no rows or columns have been mapped yet")?,
            ReviewStatus::InvalidHeaderRow => {
                writeln!(out, "saved header row no longer exists in the sheet")?
            }
            ReviewStatus::NoMatchingColumns => {
                writeln!(out, "none of the saved columns exist in the sheet any more")?
            }
        }
    }
    Ok(())
}

/// The dashboard listing. Same columns and cells as the CSV/XLSX export.
pub fn attestations(out: &mut impl Write, records: &[AttestationRecord]) -> io::Result<()> {
    let header: Vec<String> = EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| record_fields(r).to_vec())
        .collect();
    table(out, &header, &rows)
}
