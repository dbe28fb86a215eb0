//! Assemble the output archive from template parts and generated parts.
//!
//! Every template part is carried over byte-identical except the worksheets
//! being regenerated and the shared-strings part. Entries are written in
//! lexicographic path order with one fixed timestamp, so the same inputs
//! always produce the same bytes.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::{Result, XlcloneError};
use crate::options::SerializeOptions;
use crate::template::manifest::{
    inject_override, inject_relationship, relative_target, CONTENT_TYPES_PART,
    SHARED_STRINGS_CONTENT_TYPE, SHARED_STRINGS_REL_TYPE,
};
use crate::template::{TemplateManifest, TemplatePackage};

/// Build the output archive.
///
/// `sheets` pairs each regenerated worksheet part path with its XML; every
/// path must already exist in the template. `shared_strings_xml` is written to
/// [`TemplateManifest::shared_strings_target`].
///
/// # Errors
/// [`XlcloneError::TemplateMissing`] if a worksheet part is absent from the
/// template; [`XlcloneError::PackageInconsistent`] if the manifest parts can't
/// be extended; [`XlcloneError::Zip`] / [`XlcloneError::Io`] from the archive
/// writer; [`XlcloneError::Cancelled`] between entries.
pub fn assemble(
    template: &TemplatePackage,
    manifest: &TemplateManifest,
    sheets: &[(String, String)],
    shared_strings_xml: &str,
    options: &SerializeOptions,
) -> Result<Vec<u8>> {
    let mut parts: BTreeMap<String, Cow<'_, [u8]>> = template
        .parts()
        .map(|(name, bytes)| (name.to_string(), Cow::Borrowed(bytes)))
        .collect();

    for (path, xml) in sheets {
        let Some(slot) = parts.get_mut(path.as_str()) else {
            return Err(XlcloneError::TemplateMissing(path.clone()));
        };
        *slot = Cow::Borrowed(xml.as_bytes());
    }

    let sst_part = manifest.shared_strings_target();
    if manifest.shared_strings_part.is_none() {
        add_shared_strings_entries(template, manifest, &sst_part, &mut parts)?;
    }
    parts.insert(sst_part, Cow::Borrowed(shared_strings_xml.as_bytes()));

    let file_options = FileOptions::default()
        .compression_method(options.compression.method())
        .last_modified_time(options.archive_timestamp.to_zip()?)
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in &parts {
        options.check_cancelled()?;
        writer.start_file(name.as_str(), file_options)?;
        writer.write_all(bytes)?;
    }
    let bytes = writer.finish()?.into_inner();

    debug!(
        entries = parts.len(),
        regenerated = sheets.len(),
        bytes = bytes.len(),
        "assembled package"
    );
    Ok(bytes)
}

/// Register a new shared-strings part in `[Content_Types].xml` and the
/// workbook relationships. Existing declarations are left alone.
fn add_shared_strings_entries(
    template: &TemplatePackage,
    manifest: &TemplateManifest,
    sst_part: &str,
    parts: &mut BTreeMap<String, Cow<'_, [u8]>>,
) -> Result<()> {
    if !manifest.has_override(sst_part) {
        let content_types = template.required_part(CONTENT_TYPES_PART)?;
        let patched = inject_override(content_types, sst_part, SHARED_STRINGS_CONTENT_TYPE)?;
        parts.insert(CONTENT_TYPES_PART.to_string(), Cow::Owned(patched));
    }

    let rels_part = manifest.workbook_rels_part.as_str();
    let rels = template.required_part(rels_part)?;
    let target = relative_target(manifest.workbook_dir(), sst_part);
    let patched = inject_relationship(
        rels,
        &manifest.next_relationship_id()?,
        SHARED_STRINGS_REL_TYPE,
        &target,
        rels_part,
    )?;
    parts.insert(rels_part.to_string(), Cow::Owned(patched));

    debug!(part = sst_part, "registered new shared strings part");
    Ok(())
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
    use crate::options::{ArchiveTimestamp, CancellationToken};
    use std::io::Read;
    use zip::ZipArchive;

    const CONTENT_TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;
    const ROOT_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    const WORKBOOK_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

    fn template() -> TemplatePackage {
        TemplatePackage::from_parts([
            (CONTENT_TYPES_PART, CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", "<worksheet/>"),
            ("xl/theme/theme1.xml", "<theme/>"),
        ])
    }

    fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut f = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                f.read_to_end(&mut data).unwrap();
                (f.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_entries_sorted_and_sheet_replaced() {
        let t = template();
        let manifest = t.manifest().unwrap();
        let sheets = vec![("xl/worksheets/sheet1.xml".to_string(), "<new/>".to_string())];
        let bytes = assemble(&t, &manifest, &sheets, "<sst/>", &SerializeOptions::default()).unwrap();

        let out = entries(&bytes);
        let names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"xl/sharedStrings.xml"));

        let get = |name: &str| out.iter().find(|(n, _)| n == name).map(|(_, d)| d.clone()).unwrap();
        assert_eq!(get("xl/worksheets/sheet1.xml"), b"<new/>");
        assert_eq!(get("xl/theme/theme1.xml"), b"<theme/>");
        assert_eq!(get("xl/sharedStrings.xml"), b"<sst/>");

        let ct = String::from_utf8(get(CONTENT_TYPES_PART)).unwrap();
        assert!(ct.contains(r#"PartName="/xl/sharedStrings.xml""#));
        let rels = String::from_utf8(get("xl/_rels/workbook.xml.rels")).unwrap();
        assert!(rels.contains(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#));
    }

    #[test]
    fn test_fixed_timestamp_and_determinism() {
        let t = template();
        let manifest = t.manifest().unwrap();
        let options = SerializeOptions::new().archive_timestamp(ArchiveTimestamp {
            year: 2020,
            month: 2,
            day: 3,
            hour: 4,
            minute: 5,
            second: 6,
        });
        let a = assemble(&t, &manifest, &[], "<sst/>", &options).unwrap();
        let b = assemble(&t, &manifest, &[], "<sst/>", &options).unwrap();
        assert_eq!(a, b);

        let mut archive = ZipArchive::new(Cursor::new(&a)).unwrap();
        for i in 0..archive.len() {
            let f = archive.by_index(i).unwrap();
            let ts = f.last_modified();
            assert_eq!((ts.year(), ts.month(), ts.day()), (2020, 2, 3));
            assert_eq!((ts.hour(), ts.minute(), ts.second()), (4, 5, 6));
        }
    }

    #[test]
    fn test_unknown_sheet_part() {
        let t = template();
        let manifest = t.manifest().unwrap();
        let sheets = vec![("xl/worksheets/sheet9.xml".to_string(), "<x/>".to_string())];
        let err = assemble(&t, &manifest, &sheets, "<sst/>", &SerializeOptions::default()).unwrap_err();
        assert!(matches!(err, XlcloneError::TemplateMissing(ref p) if p == "xl/worksheets/sheet9.xml"));
    }

    #[test]
    fn test_cancelled_before_first_entry() {
        let t = template();
        let manifest = t.manifest().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let options = SerializeOptions::new().cancellation(token);
        let err = assemble(&t, &manifest, &[], "<sst/>", &options).unwrap_err();
        assert!(matches!(err, XlcloneError::Cancelled));
    }
}
