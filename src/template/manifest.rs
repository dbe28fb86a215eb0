//! Template manifest parsing - content types, package and workbook
//! relationships, sheet list, date system.
//!
//! The manifest tells the serializer which worksheet part belongs to which
//! sheet position and where the shared-strings part lives. It is read, never
//! rewritten; the only edits the assembler makes are the two injections at
//! the bottom of this module, used when the template has no shared-strings
//! part at all.

use std::collections::{BTreeSet, HashMap};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::TemplatePackage;
use crate::date_serial::DateSystem;
use crate::error::{Result, XlcloneError};
use crate::xml_helpers::{attr_bool, attr_string, attr_string_local, attr_u32, escape_attr};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

pub const SHARED_STRINGS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
pub const SHARED_STRINGS_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

/// Sheet metadata from workbook.xml, in tab order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    /// Resolved worksheet part path, e.g. `xl/worksheets/sheet1.xml`.
    pub path: String,
}

/// One `<Relationship>` with its target resolved to a package path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    rel_type: String,
    path: String,
    external: bool,
}

/// Everything the serializer needs to know about the template's structure.
#[derive(Debug, Clone)]
pub struct TemplateManifest {
    pub workbook_part: String,
    pub workbook_rels_part: String,
    pub sheets: Vec<SheetInfo>,
    pub shared_strings_part: Option<String>,
    pub styles_part: Option<String>,
    pub date_system: DateSystem,
    /// Index of the tab selected when the workbook opens.
    pub active_tab: usize,
    /// Part paths (without leading slash) that have a content-type override.
    pub content_type_overrides: BTreeSet<String>,
    relationship_ids: Vec<String>,
}

impl TemplateManifest {
    /// Directory holding the workbook part (`xl` for `xl/workbook.xml`).
    #[must_use]
    pub fn workbook_dir(&self) -> &str {
        parent_dir(&self.workbook_part)
    }

    /// Path the shared-strings part is written to: the template's own, or
    /// `sharedStrings.xml` next to the workbook part.
    #[must_use]
    pub fn shared_strings_target(&self) -> String {
        self.shared_strings_part
            .clone()
            .unwrap_or_else(|| join_path(self.workbook_dir(), "sharedStrings.xml"))
    }

    #[must_use]
    pub fn has_override(&self, part: &str) -> bool {
        self.content_type_overrides.contains(part)
    }

    /// A workbook relationship id not used by the template (`rId{max+1}`).
    ///
    /// # Errors
    /// [`XlcloneError::PackageInconsistent`] when the template already uses
    /// `rId4294967295`.
    pub fn next_relationship_id(&self) -> Result<String> {
        let max = self
            .relationship_ids
            .iter()
            .filter_map(|id| id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(0);
        // Any rId{n} with n > max would have parsed above, so it is free.
        max.checked_add(1)
            .map(|n| format!("rId{n}"))
            .ok_or_else(|| {
                XlcloneError::PackageInconsistent(format!(
                    "{} has no free numeric relationship id",
                    self.workbook_rels_part
                ))
            })
    }
}

/// Parse the manifest of `template`.
///
/// # Errors
/// [`XlcloneError::TemplateMissing`] when `[Content_Types].xml`, the workbook
/// part or its relationships part is absent; [`XlcloneError::Xml`] when one
/// of them is malformed.
pub(crate) fn read_manifest(template: &TemplatePackage) -> Result<TemplateManifest> {
    let content_types = template.required_part(CONTENT_TYPES_PART)?;
    let content_type_overrides = parse_content_type_overrides(content_types)?;

    let workbook_part = match template.part(PACKAGE_RELS_PART) {
        Some(xml) => parse_relationships(xml, "")?
            .into_iter()
            .find(|r| !r.external && r.rel_type.ends_with("/officeDocument"))
            .map(|r| r.path),
        None => None,
    }
    .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    let workbook_xml = template.required_part(&workbook_part)?;

    let workbook_dir = parent_dir(&workbook_part);
    let workbook_rels_part = rels_part_for(&workbook_part);
    let rels = parse_relationships(template.required_part(&workbook_rels_part)?, workbook_dir)?;

    let mut worksheets = HashMap::new();
    let mut shared_strings_part = None;
    let mut styles_part = None;
    for rel in rels.iter().filter(|r| !r.external) {
        if rel.rel_type.ends_with("/worksheet") {
            worksheets.insert(rel.id.clone(), rel.path.clone());
        } else if rel.rel_type.ends_with("/sharedStrings") {
            shared_strings_part = Some(rel.path.clone());
        } else if rel.rel_type.ends_with("/styles") {
            styles_part = Some(rel.path.clone());
        }
    }

    let workbook = parse_workbook_xml(workbook_xml, &worksheets, &workbook_part)?;

    Ok(TemplateManifest {
        workbook_part,
        workbook_rels_part,
        sheets: workbook.sheets,
        shared_strings_part,
        styles_part,
        date_system: workbook.date_system,
        active_tab: workbook.active_tab,
        content_type_overrides,
        relationship_ids: rels.into_iter().map(|r| r.id).collect(),
    })
}

/// `<Override PartName="/xl/workbook.xml" .../>` entries of `[Content_Types].xml`.
fn parse_content_type_overrides(xml: &[u8]) -> Result<BTreeSet<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut overrides = BTreeSet::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Override" {
                    if let Some(part) = attr_string(e, b"PartName") {
                        overrides.insert(part.trim_start_matches('/').to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(overrides)
}

/// Parse a relationships part. Internal targets are resolved against
/// `base_dir`; external targets (hyperlinks etc.) are kept verbatim.
fn parse_relationships(xml: &[u8], base_dir: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut rels = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let id = attr_string(e, b"Id").unwrap_or_default();
                    let rel_type = attr_string(e, b"Type").unwrap_or_default();
                    let target = attr_string(e, b"Target").unwrap_or_default();
                    let external = attr_string(e, b"TargetMode").as_deref() == Some("External");
                    if !id.is_empty() {
                        let path = if external {
                            target
                        } else {
                            resolve_target(base_dir, &target)
                        };
                        rels.push(Relationship {
                            id,
                            rel_type,
                            path,
                            external,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

struct WorkbookXml {
    sheets: Vec<SheetInfo>,
    date_system: DateSystem,
    active_tab: usize,
}

/// Parse workbook.xml for the sheet list, date system and active tab.
///
/// - `<sheets><sheet name="..." r:id="rId1"/></sheets>`
/// - `<workbookPr date1904="1"/>`
/// - `<bookViews><workbookView activeTab="2"/></bookViews>`
///
/// A `<sheet>` whose `r:id` names no worksheet relationship is
/// [`XlcloneError::PackageInconsistent`].
fn parse_workbook_xml(
    xml: &[u8],
    worksheets: &HashMap<String, String>,
    workbook_part: &str,
) -> Result<WorkbookXml> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut sheets = Vec::new();
    let mut date_system = DateSystem::Date1900;
    let mut active_tab = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attr_string(e, b"name").unwrap_or_default();
                    if !name.is_empty() {
                        let r_id = attr_string_local(e, b"id").unwrap_or_default();
                        let Some(path) = worksheets.get(&r_id).cloned() else {
                            return Err(XlcloneError::PackageInconsistent(format!(
                                "sheet {name:?} in {workbook_part} references unknown worksheet relationship {r_id:?}"
                            )));
                        };
                        sheets.push(SheetInfo { name, path });
                    }
                }
                b"workbookPr" => {
                    if attr_bool(e, b"date1904") == Some(true) {
                        date_system = DateSystem::Date1904;
                    }
                }
                b"workbookView" => {
                    if let Some(tab) = attr_u32(e, b"activeTab") {
                        active_tab = usize::try_from(tab).unwrap_or(0);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(WorkbookXml {
        sheets,
        date_system,
        active_tab,
    })
}

/// Add `<Override>` for `part` to a `[Content_Types].xml` document.
pub(crate) fn inject_override(content_types: &[u8], part: &str, content_type: &str) -> Result<Vec<u8>> {
    let entry = format!(
        r#"<Override PartName="/{}" ContentType="{}"/>"#,
        escape_attr(part),
        escape_attr(content_type)
    );
    insert_before_closing(content_types, "</Types>", &entry, CONTENT_TYPES_PART)
}

/// Add a `<Relationship>` to a relationships part.
pub(crate) fn inject_relationship(
    rels: &[u8],
    id: &str,
    rel_type: &str,
    target: &str,
    rels_part: &str,
) -> Result<Vec<u8>> {
    let entry = format!(
        r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
        escape_attr(id),
        escape_attr(rel_type),
        escape_attr(target)
    );
    insert_before_closing(rels, "</Relationships>", &entry, rels_part)
}

fn insert_before_closing(xml: &[u8], closing: &str, entry: &str, part: &str) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(xml)
        .map_err(|e| XlcloneError::PackageInconsistent(format!("{part} is not UTF-8: {e}")))?;
    let pos = text.rfind(closing).ok_or_else(|| {
        XlcloneError::PackageInconsistent(format!("{part} has no {closing} to extend"))
    })?;
    let (head, tail) = text.split_at(pos);
    let mut out = String::with_capacity(text.len() + entry.len());
    out.push_str(head);
    out.push_str(entry);
    out.push_str(tail);
    Ok(out.into_bytes())
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`
fn rels_part_for(part: &str) -> String {
    let dir = parent_dir(part);
    let file = part.rsplit('/').next().unwrap_or(part);
    join_path(dir, &format!("_rels/{file}.rels"))
}

fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Path of `target` relative to `base_dir` from the package root.
///
/// A leading `/` makes the target absolute; `..` and `.` segments are
/// collapsed.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    let (mut segments, rest): (Vec<&str>, &str) = match target.strip_prefix('/') {
        Some(abs) => (Vec::new(), abs),
        None => (
            base_dir.split('/').filter(|s| !s.is_empty()).collect(),
            target,
        ),
    };
    for seg in rest.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Relative path from `from_dir` to `to_part`, for relationship targets.
pub(crate) fn relative_target(from_dir: &str, to_part: &str) -> String {
    if from_dir.is_empty() {
        return to_part.to_string();
    }
    match to_part.strip_prefix(from_dir).and_then(|r| r.strip_prefix('/')) {
        Some(rel) => rel.to_string(),
        None => format!("/{to_part}"),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

    const ROOT_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="1"/><bookViews><workbookView activeTab="1"/></bookViews><sheets><sheet name="First" sheetId="1" r:id="rId2"/><sheet name="Second" sheetId="2" r:id="rId1"/></sheets></workbook>"#;

    const WORKBOOK_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#;

    fn template() -> TemplatePackage {
        TemplatePackage::from_parts([
            (CONTENT_TYPES_PART, CONTENT_TYPES),
            (PACKAGE_RELS_PART, ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ])
    }

    #[test]
    fn test_sheet_order_follows_workbook_not_rels() {
        let manifest = template().manifest().unwrap();
        assert_eq!(
            manifest.sheets,
            vec![
                SheetInfo {
                    name: "First".into(),
                    path: "xl/worksheets/sheet1.xml".into()
                },
                SheetInfo {
                    name: "Second".into(),
                    path: "xl/worksheets/sheet2.xml".into()
                },
            ]
        );
        assert_eq!(manifest.date_system, DateSystem::Date1904);
        assert_eq!(manifest.active_tab, 1);
        assert_eq!(manifest.styles_part.as_deref(), Some("xl/styles.xml"));
        assert_eq!(manifest.shared_strings_part, None);
        assert_eq!(manifest.shared_strings_target(), "xl/sharedStrings.xml");
        assert!(manifest.has_override("xl/worksheets/sheet1.xml"));
        // rId9 is taken by the external hyperlink.
        assert_eq!(manifest.next_relationship_id().unwrap(), "rId10");
    }

    #[test]
    fn test_dangling_sheet_relationship() {
        let workbook = WORKBOOK.replace(r#"r:id="rId1""#, r#"r:id="rId7""#);
        let t = TemplatePackage::from_parts([
            (CONTENT_TYPES_PART, CONTENT_TYPES),
            (PACKAGE_RELS_PART, ROOT_RELS),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ]);
        let err = t.manifest().unwrap_err();
        assert!(
            matches!(err, XlcloneError::PackageInconsistent(ref msg) if msg.contains("rId7")),
            "{err:?}"
        );
    }

    #[test]
    fn test_relationship_ids_exhausted() {
        let rels = WORKBOOK_RELS.replace(r#"Id="rId9""#, r#"Id="rId4294967295""#);
        let t = TemplatePackage::from_parts([
            (CONTENT_TYPES_PART, CONTENT_TYPES),
            (PACKAGE_RELS_PART, ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", rels.as_str()),
        ]);
        let err = t.manifest().unwrap().next_relationship_id().unwrap_err();
        assert!(matches!(err, XlcloneError::PackageInconsistent(_)));
    }

    #[test]
    fn test_missing_content_types() {
        let t = TemplatePackage::from_parts([("xl/workbook.xml", WORKBOOK)]);
        let err = t.manifest().unwrap_err();
        assert!(matches!(err, XlcloneError::TemplateMissing(ref p) if p == CONTENT_TYPES_PART));
    }

    #[test]
    fn test_missing_workbook_part() {
        let t = TemplatePackage::from_parts([
            (CONTENT_TYPES_PART, CONTENT_TYPES),
            (PACKAGE_RELS_PART, ROOT_RELS),
        ]);
        let err = t.manifest().unwrap_err();
        assert!(matches!(err, XlcloneError::TemplateMissing(ref p) if p == "xl/workbook.xml"));
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(resolve_target("xl", "../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("", "xl/workbook.xml"), "xl/workbook.xml");
        assert_eq!(resolve_target("xl", "./theme/theme1.xml"), "xl/theme/theme1.xml");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(relative_target("xl", "xl/sharedStrings.xml"), "sharedStrings.xml");
        assert_eq!(relative_target("xl", "other/sst.xml"), "/other/sst.xml");
        assert_eq!(relative_target("", "sst.xml"), "sst.xml");
    }

    #[test]
    fn test_rels_part_for() {
        assert_eq!(rels_part_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_part_for("workbook.xml"), "_rels/workbook.xml.rels");
    }

    #[test]
    fn test_inject_override() {
        let out = inject_override(
            CONTENT_TYPES.as_bytes(),
            "xl/sharedStrings.xml",
            SHARED_STRINGS_CONTENT_TYPE,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with(&format!(
            r#"<Override PartName="/xl/sharedStrings.xml" ContentType="{SHARED_STRINGS_CONTENT_TYPE}"/></Types>"#
        )));
        let overrides = parse_content_type_overrides(text.as_bytes()).unwrap();
        assert!(overrides.contains("xl/sharedStrings.xml"));
    }

    #[test]
    fn test_inject_relationship_requires_closing_tag() {
        let err = inject_relationship(b"<Relationships/>", "rId4", "t", "x.xml", "r.rels").unwrap_err();
        assert!(matches!(err, XlcloneError::PackageInconsistent(_)));
    }
}
