//! End-to-end write/read scenarios run against both store implementations.

use pretty_assertions::assert_eq;
use sheetcalc_core::api::{self, Body, Status, WriteRequest};
use sheetcalc_core::{MemoryStore, SheetError, SqliteStore, Store, Workbook};
use sheetcalc_engine::engine::format_result;

fn result_of<S: Store>(wb: &Workbook<S>, sheet: &str, cell: &str) -> String {
    format_result(wb.get_cell(sheet, cell).unwrap().result)
}

fn cascade<S: Store>(wb: &Workbook<S>) {
    assert_eq!(wb.write("sheet1", "cell1", "1").unwrap().result, 1.0);
    assert_eq!(wb.write("sheet1", "cell2", "=cell1+2").unwrap().result, 3.0);
    assert_eq!(wb.write("sheet1", "cell3", "=cell1+cell2").unwrap().result, 4.0);

    let outcome = wb.write("sheet1", "cell1", "10").unwrap();
    assert!(outcome.updated);
    assert_eq!(outcome.recomputed, vec!["cell2", "cell3"]);

    assert_eq!(result_of(wb, "sheet1", "cell1"), "10.000000");
    assert_eq!(result_of(wb, "sheet1", "cell2"), "12.000000");
    assert_eq!(result_of(wb, "sheet1", "cell3"), "22.000000");
}

fn diamond<S: Store>(wb: &Workbook<S>) {
    wb.write("d", "top", "2").unwrap();
    wb.write("d", "left", "=top*3").unwrap();
    wb.write("d", "right", "=top+1").unwrap();
    wb.write("d", "bottom", "=left-right").unwrap();
    assert_eq!(result_of(wb, "d", "bottom"), "3.000000");

    let outcome = wb.write("d", "top", "5").unwrap();
    assert_eq!(outcome.recomputed.len(), 3);
    assert_eq!(outcome.recomputed.last().map(String::as_str), Some("bottom"));
    assert_eq!(result_of(wb, "d", "bottom"), "9.000000");
}

fn rejected_writes_persist_nothing<S: Store>(wb: &Workbook<S>) {
    wb.write("r", "a", "1").unwrap();
    wb.write("r", "b", "=a+1").unwrap();

    assert!(matches!(
        wb.write("r", "a", "=b+1"),
        Err(SheetError::CircularDependency(_))
    ));
    assert!(matches!(
        wb.write("r", "a", "=a+1"),
        Err(SheetError::SelfReference(_))
    ));
    wb.write("r", "a", "0").unwrap();
    assert!(matches!(
        wb.write("r", "c", "=1/a"),
        Err(SheetError::Arithmetic(_))
    ));

    assert_eq!(result_of(wb, "r", "b"), "1.000000");
    assert!(matches!(wb.get_cell("r", "c"), Err(SheetError::NotFound(_))));
}

#[test]
fn test_cascade_memory() {
    cascade(&Workbook::new(MemoryStore::new()));
}

#[test]
fn test_cascade_sqlite() {
    cascade(&Workbook::new(SqliteStore::open_in_memory().unwrap()));
}

#[test]
fn test_diamond_memory() {
    diamond(&Workbook::new(MemoryStore::new()));
}

#[test]
fn test_diamond_sqlite() {
    diamond(&Workbook::new(SqliteStore::open_in_memory().unwrap()));
}

#[test]
fn test_rejected_writes_memory() {
    rejected_writes_persist_nothing(&Workbook::new(MemoryStore::new()));
}

#[test]
fn test_rejected_writes_sqlite() {
    rejected_writes_persist_nothing(&Workbook::new(SqliteStore::open_in_memory().unwrap()));
}

#[test]
fn test_sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cells.db");

    {
        let wb = Workbook::new(SqliteStore::open_path(&path).unwrap());
        cascade(&wb);
    }

    let wb = Workbook::new(SqliteStore::open_path(&path).unwrap());
    let sheet = wb.get_sheet("SHEET1").unwrap();
    assert_eq!(sheet.len(), 3);
    assert_eq!(sheet["cell3"].value, "=cell1+cell2");
    assert_eq!(format_result(sheet["cell3"].result), "22.000000");

    // Edges were persisted too, so propagation still works after reopening.
    let outcome = wb.write("sheet1", "cell1", "0").unwrap();
    assert_eq!(outcome.recomputed, vec!["cell2", "cell3"]);
    assert_eq!(result_of(&wb, "sheet1", "cell3"), "2.000000");
}

#[test]
fn test_api_json_shapes() {
    let wb = Workbook::new(SqliteStore::open_in_memory().unwrap());
    let write = |cell: &str, value: &str| {
        api::write_cell(
            &wb,
            "Sheet1",
            cell,
            &WriteRequest {
                value: value.to_string(),
            },
        )
    };

    let created = write("a", "=-2.5*2");
    assert_eq!(created.status, Status::Created);
    assert_eq!(
        serde_json::to_value(&created.body).unwrap(),
        serde_json::json!({"value": "=-2.5*2", "result": "-5.000000"})
    );

    let failed = write("b", "=A/0");
    assert_eq!(failed.status.code(), 422);
    assert_eq!(
        serde_json::to_value(&failed.body).unwrap(),
        serde_json::json!({"value": "=A/0", "result": "ERROR"})
    );

    let sheet = api::read_sheet(&wb, "sheet1");
    assert_eq!(sheet.status, Status::Ok);
    assert_eq!(
        serde_json::to_value(&sheet.body).unwrap(),
        serde_json::json!({"a": {"value": "=-2.5*2", "result": "-5.000000"}})
    );

    let missing = api::read_cell(&wb, "sheet1", "b");
    assert_eq!(
        serde_json::to_value(&missing.body).unwrap(),
        serde_json::json!({"message": "value not found", "code": "404"})
    );
    assert!(matches!(missing.body, Body::Error(_)));
}

#[test]
fn test_write_request_parses_from_json() {
    let request: WriteRequest = serde_json::from_str(r#"{"value": "=a+1"}"#).unwrap();
    assert_eq!(request.value, "=a+1");
}
