//! JSON snapshot files: loading and serializing them end to end.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use chrono::NaiveDate;
use common::{cells, entry_text, read_entries, shared_strings, TemplateBuilder};
use pretty_assertions::assert_eq;
use test_case::test_case;
use xlclone::{serialize, CellValue, ErrorKind, WorkbookSnapshot};

const REPORT_JSON: &str = r#"{
    "name": "Book1.xlsx",
    "sheets": [
        {
            "name": "Sheet1",
            "cells": {
                "A1": {"text": "Q1"},
                "B1": {"number": 100.5},
                "C1": {"boolean": true},
                "D1": {"date": "2024-01-31T00:00:00"},
                "a2": {"text": "lowercase address"},
                "$B$2": "empty"
            }
        },
        {"name": "Notes", "cells": {"A1": {"text": "Q1"}}}
    ]
}"#;

#[test]
fn test_load_snapshot_json() {
    let wb = WorkbookSnapshot::from_json(REPORT_JSON).unwrap();
    assert_eq!(wb.name(), "Book1.xlsx");
    assert_eq!(wb.sheet_names().collect::<Vec<_>>(), vec!["Sheet1", "Notes"]);

    let sheet = &wb.sheets()[0].cells;
    assert_eq!(sheet.get(1, 1), &CellValue::Text("Q1".into()));
    assert_eq!(sheet.get(1, 2), &CellValue::Number(100.5));
    assert_eq!(sheet.get(1, 3), &CellValue::Boolean(true));
    assert_eq!(
        sheet.get(1, 4),
        &CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(0, 0, 0).unwrap())
    );
    assert_eq!(sheet.get(2, 1), &CellValue::Text("lowercase address".into()));
    // Empty cells are not stored.
    assert_eq!(sheet.len(), 5);
    assert_eq!(sheet.used_column_count(), 4);
}

#[test]
fn test_serialize_snapshot_json() {
    let template = TemplateBuilder::new()
        .add_sheet("Sheet1")
        .add_sheet("Notes")
        .with_date_styles()
        .build();
    let wb = WorkbookSnapshot::from_json(REPORT_JSON).unwrap();

    let entries = read_entries(serialize(&wb, &template).unwrap().as_bytes());

    let sst = entry_text(&entries, "xl/sharedStrings.xml");
    assert_eq!(shared_strings(&sst), vec!["Q1", "lowercase address"]);
    assert!(sst.contains(r#"count="3" uniqueCount="2""#));

    let sheet1 = entry_text(&entries, "xl/worksheets/sheet1.xml");
    assert_eq!(
        cells(&sheet1),
        vec![
            ("A1".to_string(), Some("s".to_string()), "0".to_string()),
            ("B1".to_string(), None, "100.5".to_string()),
            ("C1".to_string(), Some("b".to_string()), "1".to_string()),
            ("D1".to_string(), None, "45322".to_string()),
            ("A2".to_string(), Some("s".to_string()), "1".to_string()),
        ]
    );
    assert!(sheet1.contains(r#"<c r="D1" s="2">"#));

    let notes = entry_text(&entries, "xl/worksheets/sheet2.xml");
    assert_eq!(
        cells(&notes),
        vec![("A1".to_string(), Some("s".to_string()), "0".to_string())]
    );
}

#[test]
fn test_workbook_name_from_file_stem() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("quarterly.json");
    std::fs::write(&path, r#"{"sheets": [{"name": "Sheet1"}]}"#).unwrap();

    let wb = WorkbookSnapshot::from_json_path(&path).unwrap();
    assert_eq!(wb.name(), "quarterly");
    assert!(wb.sheets()[0].cells.is_empty());
}

#[test_case(r#"{"sheets": [{"name": ""}]}"#; "empty sheet name")]
#[test_case(r#"{"sheets": [{"name": "A"}, {"name": "A"}]}"#; "duplicate sheet name")]
#[test_case(r#"{"sheets": [{"name": "A", "cells": {"1A": {"number": 1}}}]}"#; "bad address")]
#[test_case(r#"{"sheets": [{"name": "A", "cells": {"A0": {"number": 1}}}]}"#; "row zero")]
#[test_case(r#"{"sheets": [{"name": "A", "cells": {"XFE1": {"number": 1}}}]}"#; "column past limit")]
#[test_case(r#"{"sheets": [{"name": "A", "cells": {"A1": {"formula": "=1+1"}}}]}"#; "unknown cell type")]
#[test_case(r#"{"sheets": "#; "truncated")]
fn test_invalid_snapshot_json(json: &str) {
    let err = WorkbookSnapshot::from_json(json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);
}
