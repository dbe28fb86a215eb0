//! Generates worksheet XML from a `SheetGrid`.
//!
//! Text cells always go through the workbook's shared string table
//! (`t="s"`), never inline strings, so the package carries exactly one
//! string table.

use crate::cell_ref::{area_ref, to_address};
use crate::date_serial::DateSystem;
use crate::error::{Result, XlcloneError};
use crate::shared_strings::SharedStringTable;
use crate::types::{CellValue, SheetGrid};

/// Per-sheet settings derived from the template and the serializer options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetXmlOptions {
    pub date_system: DateSystem,
    /// Style index for date cells, if the template defines one.
    pub date_style: Option<u32>,
    /// Style index for every other cell; `None` leaves `s` off (style 0).
    pub default_style: Option<u32>,
    /// Whether this sheet is the workbook's selected tab.
    pub tab_selected: bool,
}

/// Write a complete worksheet XML string from a `SheetGrid`, interning text
/// into `strings`.
///
/// # Errors
/// [`XlcloneError::UnsupportedValue`] for non-finite numbers or dates before
/// the epoch; [`XlcloneError::InvalidAddress`] if a cell lies outside the
/// grid's used bounds.
pub fn write_sheet_xml(
    grid: &SheetGrid,
    strings: &mut SharedStringTable,
    options: &SheetXmlOptions,
) -> Result<String> {
    let max_row = grid.used_row_count();
    let max_col = grid.used_column_count();

    let mut out = String::with_capacity(512 + grid.len() * 32);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    );
    out.push_str(
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    );
    out.push('\n');

    // <dimension>
    let dimension = if max_row > 0 && max_col > 0 {
        area_ref(max_row, max_col)?
    } else {
        "A1".to_string()
    };
    out.push_str(&format!("<dimension ref=\"{dimension}\"/>\n"));

    // <sheetViews>
    if options.tab_selected {
        out.push_str("<sheetViews><sheetView tabSelected=\"1\" workbookViewId=\"0\"/></sheetViews>\n");
    } else {
        out.push_str("<sheetViews><sheetView workbookViewId=\"0\"/></sheetViews>\n");
    }

    out.push_str("<sheetFormatPr defaultRowHeight=\"15\"/>\n");

    // <sheetData>
    if grid.is_empty() {
        out.push_str("<sheetData/>\n");
    } else {
        out.push_str("<sheetData>\n");
        write_sheet_data(&mut out, grid, strings, options, (max_row, max_col))?;
        out.push_str("</sheetData>\n");
    }

    out.push_str(
        "<pageMargins left=\"0.7\" right=\"0.7\" top=\"0.75\" bottom=\"0.75\" header=\"0.3\" footer=\"0.3\"/>\n",
    );
    out.push_str("</worksheet>");
    Ok(out)
}

/// Write all cell rows into `<sheetData>`.
fn write_sheet_data(
    out: &mut String,
    grid: &SheetGrid,
    strings: &mut SharedStringTable,
    options: &SheetXmlOptions,
    (max_row, max_col): (u32, u32),
) -> Result<()> {
    let mut current_row: Option<u32> = None;

    for ((row, col), value) in grid.iter() {
        if row > max_row || col > max_col {
            return Err(XlcloneError::InvalidAddress(format!(
                "cell ({row}, {col}) outside used range {max_row}x{max_col}"
            )));
        }
        if value.is_empty() {
            continue;
        }

        if current_row != Some(row) {
            if current_row.is_some() {
                out.push_str("</row>\n");
            }
            out.push_str(&format!("<row r=\"{row}\" spans=\"1:{max_col}\">"));
            current_row = Some(row);
        }

        write_cell(out, row, col, value, strings, options)?;
    }

    if current_row.is_some() {
        out.push_str("</row>\n");
    }
    Ok(())
}

/// Write a single `<c>` element.
fn write_cell(
    out: &mut String,
    row: u32,
    col: u32,
    value: &CellValue,
    strings: &mut SharedStringTable,
    options: &SheetXmlOptions,
) -> Result<()> {
    let cell_ref = to_address(row, col)?;

    let style = match value {
        CellValue::Date(_) => options.date_style.or(options.default_style),
        _ => options.default_style,
    };
    let s = match style {
        Some(0) | None => String::new(),
        Some(n) => format!(" s=\"{n}\""),
    };

    match value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            let v = format_number(*n)?;
            out.push_str(&format!("<c r=\"{cell_ref}\"{s}><v>{v}</v></c>"));
        }
        CellValue::Text(text) => {
            let idx = strings.intern(text);
            out.push_str(&format!("<c r=\"{cell_ref}\"{s} t=\"s\"><v>{idx}</v></c>"));
        }
        CellValue::Boolean(b) => {
            let v = u8::from(*b);
            out.push_str(&format!("<c r=\"{cell_ref}\"{s} t=\"b\"><v>{v}</v></c>"));
        }
        CellValue::Date(dt) => {
            let serial = options.date_system.serial(dt)?;
            let v = format_number(serial)?;
            out.push_str(&format!("<c r=\"{cell_ref}\"{s}><v>{v}</v></c>"));
        }
    }
    Ok(())
}

/// Culture-invariant numeric literal for `<v>`.
///
/// Uses the shortest representation that parses back to the same `f64`:
/// `.` as separator, no grouping, no trailing zeros. Very large or very small
/// magnitudes switch to exponent notation.
///
/// # Errors
/// [`XlcloneError::UnsupportedValue`] for NaN and infinities.
pub fn format_number(n: f64) -> Result<String> {
    if !n.is_finite() {
        return Err(XlcloneError::UnsupportedValue(format!(
            "non-finite number {n}"
        )));
    }
    let magnitude = n.abs();
    let text = if magnitude != 0.0 && !(1e-5..1e16).contains(&magnitude) {
        format!("{n:e}")
    } else {
        format!("{n}")
    };
    if text == "-0" {
        return Ok("0".to_string());
    }
    Ok(text)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn sheet_data(xml: &str) -> &str {
        let start = xml.find("<sheetData").unwrap();
        let end = xml.find("<pageMargins").unwrap();
        xml[start..end].trim_end()
    }

    #[test_case(100.5, "100.5")]
    #[test_case(3.14, "3.14")]
    #[test_case(100.0, "100")]
    #[test_case(-0.0, "0")]
    #[test_case(0.1 + 0.2, "0.30000000000000004")]
    #[test_case(1234567.0, "1234567")]
    #[test_case(1e20, "1e20")]
    #[test_case(2.5e-7, "2.5e-7")]
    fn test_format_number(n: f64, expected: &str) {
        let text = format_number(n).unwrap();
        assert_eq!(text, expected);
        assert_eq!(text.parse::<f64>().unwrap(), n);
    }

    #[test]
    fn test_format_number_rejects_non_finite() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                format_number(n),
                Err(XlcloneError::UnsupportedValue(_))
            ));
        }
    }

    #[test]
    fn test_single_cell_sheet() {
        let mut grid = SheetGrid::new();
        grid.set(1, 1, 42.0).unwrap();
        let mut sst = SharedStringTable::new();
        let xml = write_sheet_xml(&grid, &mut sst, &SheetXmlOptions::default()).unwrap();

        assert!(xml.contains(r#"<dimension ref="A1"/>"#));
        assert_eq!(
            sheet_data(&xml),
            "<sheetData>\n<row r=\"1\" spans=\"1:1\"><c r=\"A1\"><v>42</v></c></row>\n</sheetData>"
        );
        assert_eq!(xml.matches("<row ").count(), 1);
        assert_eq!(xml.matches("<c ").count(), 1);
    }

    #[test]
    fn test_mixed_row_and_sparse_rows() {
        let mut grid = SheetGrid::new();
        grid.set_at("A1", "Q1").unwrap();
        grid.set_at("B1", 100.5).unwrap();
        grid.set_at("C3", true).unwrap();
        grid.set_at("A3", "Q1").unwrap();
        let mut sst = SharedStringTable::new();
        let xml = write_sheet_xml(&grid, &mut sst, &SheetXmlOptions::default()).unwrap();

        assert!(xml.contains(r#"<dimension ref="A1:C3"/>"#));
        assert_eq!(
            sheet_data(&xml),
            concat!(
                "<sheetData>\n",
                r#"<row r="1" spans="1:3"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>100.5</v></c></row>"#,
                "\n",
                r#"<row r="3" spans="1:3"><c r="A3" t="s"><v>0</v></c><c r="C3" t="b"><v>1</v></c></row>"#,
                "\n</sheetData>"
            )
        );
        assert_eq!(sst.len(), 1);
        assert_eq!(sst.reference_count(), 2);
    }

    #[test]
    fn test_empty_grid() {
        let mut sst = SharedStringTable::new();
        let xml = write_sheet_xml(&SheetGrid::new(), &mut sst, &SheetXmlOptions::default()).unwrap();
        assert!(xml.contains("<sheetData/>"));
        assert!(xml.contains(r#"<dimension ref="A1"/>"#));
        assert!(!xml.contains("<row"));
    }

    #[test]
    fn test_date_cells_use_template_style() {
        let mut grid = SheetGrid::new();
        let dt = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        grid.set(1, 1, dt).unwrap();
        grid.set(1, 2, 7.0).unwrap();
        let mut sst = SharedStringTable::new();
        let options = SheetXmlOptions {
            date_style: Some(3),
            ..SheetXmlOptions::default()
        };
        let xml = write_sheet_xml(&grid, &mut sst, &options).unwrap();
        assert!(xml.contains(r#"<c r="A1" s="3"><v>45322.5</v></c><c r="B1"><v>7</v></c>"#));
    }

    #[test]
    fn test_default_style_applies_to_all_cells() {
        let mut grid = SheetGrid::new();
        grid.set(1, 1, "x").unwrap();
        let mut sst = SharedStringTable::new();
        let options = SheetXmlOptions {
            default_style: Some(5),
            ..SheetXmlOptions::default()
        };
        let xml = write_sheet_xml(&grid, &mut sst, &options).unwrap();
        assert!(xml.contains(r#"<c r="A1" s="5" t="s"><v>0</v></c>"#));
    }

    #[test]
    fn test_tab_selection() {
        let mut sst = SharedStringTable::new();
        let options = SheetXmlOptions {
            tab_selected: true,
            ..SheetXmlOptions::default()
        };
        let xml = write_sheet_xml(&SheetGrid::new(), &mut sst, &options).unwrap();
        assert!(xml.contains(r#"tabSelected="1""#));
    }

    #[test]
    fn test_non_finite_number_fails_sheet() {
        let mut grid = SheetGrid::new();
        grid.set(2, 2, f64::NAN).unwrap();
        let mut sst = SharedStringTable::new();
        let err = write_sheet_xml(&grid, &mut sst, &SheetXmlOptions::default()).unwrap_err();
        assert!(matches!(err, XlcloneError::UnsupportedValue(_)));
    }
}
