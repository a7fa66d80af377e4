use attest_model::CellValue;
use attest_workbook::{open_path, CalamineWorkbook, WorkbookError, WorkbookSource};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use std::path::Path;

fn write_fixture(path: &Path) {
    let mut workbook = Workbook::new();

    let head = workbook.add_worksheet();
    head.set_name("CT Head").expect("sheet name");
    head.write_string(0, 0, "Name").unwrap();
    head.write_string(0, 1, "Dose").unwrap();
    head.write_string(0, 2, "Contrast").unwrap();
    head.write_string(1, 0, "Routine").unwrap();
    head.write_number(1, 1, 40).unwrap();
    head.write_boolean(1, 2, false).unwrap();
    head.write_string(2, 0, "Stroke").unwrap();
    head.write_number(2, 1, 52.5).unwrap();
    head.write_boolean(2, 2, true).unwrap();

    let chest = workbook.add_worksheet();
    chest.set_name("CT Chest").expect("sheet name");
    // Data starts on the third sheet row.
    chest.write_string(2, 1, "Phase").unwrap();
    chest.write_string(3, 1, "Arterial").unwrap();

    workbook.save(path).expect("save fixture");
}

#[test]
fn lists_sheets_in_workbook_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("protocols.xlsx");
    write_fixture(&path);

    let workbook = open_path(&path).expect("open workbook");
    assert_eq!(workbook.sheet_names().unwrap(), vec!["CT Head", "CT Chest"]);
    assert!(workbook.has_sheet("CT Chest").unwrap());
    assert!(!workbook.has_sheet("MR Brain").unwrap());
}

#[test]
fn parses_typed_cells() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("protocols.xlsx");
    write_fixture(&path);

    let table = CalamineWorkbook::new(&path).read_sheet("CT Head").unwrap();
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_count(), 3);
    assert_eq!(
        table.row(2).unwrap(),
        &[
            CellValue::Text("Stroke".into()),
            CellValue::Number(52.5),
            CellValue::Bool(true),
        ]
    );
    assert_eq!(table.row(1).unwrap()[1].to_string(), "40");
}

#[test]
fn leading_blank_rows_are_kept() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("protocols.xlsx");
    write_fixture(&path);

    let table = CalamineWorkbook::new(&path).read_sheet("CT Chest").unwrap();
    assert_eq!(table.row_count(), 4);
    assert!(table.row(0).unwrap().iter().all(CellValue::is_empty));
    assert_eq!(table.row(2).unwrap(), &[CellValue::Text("Phase".into())]);
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.xlsx");

    let err = open_path(&path).unwrap_err();
    assert!(matches!(err, WorkbookError::NotFound(p) if p == path));

    let err = CalamineWorkbook::new(&path).sheet_names().unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn missing_sheet_is_sheet_not_found() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("protocols.xlsx");
    write_fixture(&path);

    let err = CalamineWorkbook::new(&path).read_sheet("MR Brain").unwrap_err();
    assert!(matches!(err, WorkbookError::SheetNotFound(ref s) if s == "MR Brain"));
}

#[test]
fn garbage_file_fails_to_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"not a zip archive").unwrap();

    let err = CalamineWorkbook::new(&path).sheet_names().unwrap_err();
    assert!(matches!(err, WorkbookError::Open { .. }));
    assert!(!err.is_not_found());
}
