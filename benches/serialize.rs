//! Benchmarks for worksheet generation and full workbook serialization.
//!
//! Run with: cargo bench
//!
//! Results are saved to `target/criterion/` with HTML reports.
#![allow(clippy::expect_used, clippy::cast_possible_truncation, clippy::cast_lossless)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xlclone::export::{write_sheet_xml, SheetXmlOptions};
use xlclone::{CellValue, Serializer, SharedStringTable, SheetGrid, TemplatePackage, WorkbookSnapshot};

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn template() -> TemplatePackage {
    TemplatePackage::from_parts([
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", RELS_XML),
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ("xl/worksheets/sheet1.xml", "<worksheet/>"),
    ])
}

/// Mixed grid: a text label column, numbers, and a repeating category column.
fn make_grid(rows: u32, cols: u32) -> SheetGrid {
    let mut grid = SheetGrid::new();
    for r in 1..=rows {
        grid.set(r, 1, format!("Row {r}")).expect("valid cell");
        grid.set(r, 2, format!("Category {}", r % 10)).expect("valid cell");
        for c in 3..=cols {
            grid.set(r, c, CellValue::Number(f64::from(r * c) / 7.0))
                .expect("valid cell");
        }
    }
    grid
}

/// Worksheet XML generation at several grid sizes
fn bench_sheet_xml(c: &mut Criterion) {
    let mut group = c.benchmark_group("sheet_xml");

    for (rows, cols) in [(100, 10), (1000, 20), (5000, 20)] {
        let grid = make_grid(rows, cols);
        group.throughput(Throughput::Elements(grid.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("write", format!("{rows}x{cols}")),
            &grid,
            |b, grid| {
                b.iter(|| {
                    let mut strings = SharedStringTable::new();
                    write_sheet_xml(black_box(grid), &mut strings, &SheetXmlOptions::default())
                        .expect("Failed to write sheet")
                })
            },
        );
    }

    group.finish();
}

/// Full serialization: sheet generation, shared strings and archive assembly
fn bench_serialize(c: &mut Criterion) {
    let template = template();
    let snapshot = WorkbookSnapshot::new("bench.xlsx")
        .with_sheet("Sheet1", make_grid(5000, 20))
        .expect("valid snapshot");
    let serializer = Serializer::new();

    c.bench_function("serialize_5000x20", |b| {
        b.iter(|| {
            serializer
                .serialize(black_box(&snapshot), &template)
                .expect("Failed to serialize")
        })
    });
}

criterion_group!(benches, bench_sheet_xml, bench_serialize);
criterion_main!(benches);
