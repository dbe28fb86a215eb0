//! Template fixtures for integration tests.
//!
//! [`TemplateBuilder`] produces a minimal but complete package template in
//! memory, as parts, as an `.xlsx` archive, or as an unzipped directory.
//!
//! ```rust,ignore
//! let template = TemplateBuilder::new()
//!     .add_sheet("Sheet1")
//!     .add_sheet("Data")
//!     .with_date_styles()
//!     .build();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use xlclone::TemplatePackage;

pub const WORKSHEET_CT: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
pub const SST_CT: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Default template styles: cellXfs 0 general, 1 fixed decimal, 2 short date.
pub const STYLES_WITH_DATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="0.000"/></numFmts><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

pub const STYLES_PLAIN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

pub const THEME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements/></a:theme>"#;

/// Builder for in-memory template packages.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    sheets: Vec<String>,
    styles: Option<String>,
    shared_strings: bool,
    date1904: bool,
    active_tab: Option<usize>,
    extra: Vec<(String, Vec<u8>)>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            styles: Some(STYLES_PLAIN.to_string()),
            shared_strings: false,
            date1904: false,
            active_tab: None,
            extra: vec![("xl/theme/theme1.xml".to_string(), THEME_XML.as_bytes().to_vec())],
        }
    }

    #[must_use]
    pub fn add_sheet(mut self, name: &str) -> Self {
        self.sheets.push(name.to_string());
        self
    }

    /// Ship a (stale) `xl/sharedStrings.xml` declared in both manifests.
    #[must_use]
    pub fn with_shared_strings(mut self) -> Self {
        self.shared_strings = true;
        self
    }

    #[must_use]
    pub fn with_date_styles(mut self) -> Self {
        self.styles = Some(STYLES_WITH_DATE.to_string());
        self
    }

    #[must_use]
    pub fn without_styles(mut self) -> Self {
        self.styles = None;
        self
    }

    #[must_use]
    pub fn date1904(mut self) -> Self {
        self.date1904 = true;
        self
    }

    #[must_use]
    pub fn active_tab(mut self, tab: usize) -> Self {
        self.active_tab = Some(tab);
        self
    }

    #[must_use]
    pub fn with_part(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.extra.push((path.to_string(), bytes.into()));
        self
    }

    /// All parts, keyed by package path.
    #[must_use]
    pub fn parts(&self) -> BTreeMap<String, Vec<u8>> {
        let mut parts = BTreeMap::new();

        let mut ct = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let mut sheets_xml = String::new();

        for (i, name) in self.sheets.iter().enumerate() {
            let n = i + 1;
            ct.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="{WORKSHEET_CT}"/>"#
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
            sheets_xml.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
            parts.insert(
                format!("xl/worksheets/sheet{n}.xml"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>template {name}</t></is></c></row></sheetData></worksheet>"#
                )
                .into_bytes(),
            );
        }

        let mut next_id = self.sheets.len() + 1;
        if let Some(styles) = &self.styles {
            ct.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
            rels.push_str(&format!(
                r#"<Relationship Id="rId{next_id}" Type="{REL_NS}/styles" Target="styles.xml"/>"#
            ));
            parts.insert("xl/styles.xml".to_string(), styles.clone().into_bytes());
            next_id += 1;
        }
        rels.push_str(&format!(
            r#"<Relationship Id="rId{next_id}" Type="{REL_NS}/theme" Target="theme/theme1.xml"/>"#
        ));
        next_id += 1;
        if self.shared_strings {
            ct.push_str(&format!(
                r#"<Override PartName="/xl/sharedStrings.xml" ContentType="{SST_CT}"/>"#
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{next_id}" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/>"#
            ));
            parts.insert(
                "xl/sharedStrings.xml".to_string(),
                br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="1" uniqueCount="1"><si><t>stale</t></si></sst>"#.to_vec(),
            );
        }

        ct.push_str("</Types>");
        rels.push_str("</Relationships>");

        let workbook_pr = if self.date1904 {
            r#"<workbookPr date1904="1"/>"#
        } else {
            r#"<workbookPr/>"#
        };
        let book_views = self
            .active_tab
            .map(|t| format!(r#"<bookViews><workbookView activeTab="{t}"/></bookViews>"#))
            .unwrap_or_default();
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="{REL_NS}">{workbook_pr}{book_views}<sheets>{sheets_xml}</sheets></workbook>"#
        );

        parts.insert("[Content_Types].xml".to_string(), ct.into_bytes());
        parts.insert(
            "_rels/.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#
            )
            .into_bytes(),
        );
        parts.insert(
            "docProps/core.xml".to_string(),
            br#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"/>"#.to_vec(),
        );
        parts.insert("xl/workbook.xml".to_string(), workbook.into_bytes());
        parts.insert("xl/_rels/workbook.xml.rels".to_string(), rels.into_bytes());

        for (path, bytes) in &self.extra {
            parts.insert(path.clone(), bytes.clone());
        }
        parts
    }

    #[must_use]
    pub fn build(&self) -> TemplatePackage {
        TemplatePackage::from_parts(self.parts())
    }

    /// The template as `.xlsx` bytes.
    #[must_use]
    pub fn build_xlsx(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (path, bytes) in self.parts() {
                zip.start_file(path, options).unwrap();
                zip.write_all(&bytes).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    /// Write the template unzipped under `dir`.
    pub fn write_dir(&self, dir: &Path) {
        for (path, bytes) in self.parts() {
            let dest = dir.join(&path);
            std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
            std::fs::write(dest, bytes).unwrap();
        }
    }
}

/// A one-sheet template named `Sheet1`.
#[must_use]
pub fn single_sheet_template() -> TemplatePackage {
    TemplateBuilder::new().add_sheet("Sheet1").build()
}

/// Every entry of an archive, keyed by name.
#[must_use]
pub fn read_entries(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("output is a zip archive");
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        entries.insert(file.name().to_string(), data);
    }
    entries
}

/// Entry names in archive order.
#[must_use]
pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[must_use]
pub fn entry_text(entries: &BTreeMap<String, Vec<u8>>, name: &str) -> String {
    let bytes = entries
        .get(name)
        .unwrap_or_else(|| panic!("missing entry {name}"));
    String::from_utf8(bytes.clone()).unwrap()
}

/// Text of every `<si><t>` in a shared-strings part, decoded.
#[must_use]
pub fn shared_strings(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                in_t = true;
                current.clear();
            }
            Event::Text(t) if in_t => current.push_str(&t.unescape().unwrap()),
            Event::End(e) if e.local_name().as_ref() == b"t" => {
                in_t = false;
                strings.push(std::mem::take(&mut current));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    strings
}

/// `(reference, type, value)` of every `<c>` in a worksheet, in document order.
#[must_use]
pub fn cells(xml: &str) -> Vec<(String, Option<String>, String)> {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();
    let mut current: Option<(String, Option<String>)> = None;
    let mut in_v = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let mut r = String::new();
                let mut t = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8(attr.value.to_vec()).unwrap();
                    match attr.key.as_ref() {
                        b"r" => r = value,
                        b"t" => t = Some(value),
                        _ => {}
                    }
                }
                current = Some((r, t));
            }
            Event::Start(e) if e.local_name().as_ref() == b"v" => in_v = true,
            Event::End(e) if e.local_name().as_ref() == b"v" => in_v = false,
            Event::Text(text) if in_v => {
                if let Some((r, t)) = current.take() {
                    cells.push((r, t, text.unescape().unwrap().into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    cells
}
