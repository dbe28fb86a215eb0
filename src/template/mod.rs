//! The template package: an unzipped (or zipped) XLSX whose parts are reused.
//!
//! A [`TemplatePackage`] is an immutable map from part path to bytes. The
//! serializer only ever reads it, so one template can back any number of
//! concurrent serializations.

pub mod manifest;
pub mod styles;
pub mod worksheet;

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Result, XlcloneError};

pub use manifest::{SheetInfo, TemplateManifest};

/// Read-only template parts keyed by package path (`xl/workbook.xml`).
#[derive(Debug, Clone, Default)]
pub struct TemplatePackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl TemplatePackage {
    /// Load an unzipped template directory.
    ///
    /// # Errors
    /// [`XlcloneError::TemplateMissing`] if `dir` is not a directory; I/O
    /// errors while walking or reading.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(XlcloneError::TemplateMissing(format!(
                "template folder not found: {}",
                dir.display()
            )));
        }

        let mut parts = BTreeMap::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| {
                XlcloneError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "template walk failed")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = std::fs::read(entry.path())?;
            parts.insert(name, bytes);
        }

        debug!(path = %dir.display(), parts = parts.len(), "loaded template directory");
        Ok(Self { parts })
    }

    /// Use an existing `.xlsx` archive as the template.
    pub fn from_xlsx_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_part_name(entry.name());
            let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry.read_to_end(&mut bytes)?;
            parts.insert(name, bytes);
        }
        debug!(parts = parts.len(), "loaded template archive");
        Ok(Self { parts })
    }

    /// Read an `.xlsx` file from disk and use it as the template.
    pub fn from_xlsx_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                XlcloneError::TemplateMissing(format!("template file not found: {}", path.display()))
            } else {
                XlcloneError::Io(e)
            }
        })?;
        Self::from_xlsx_bytes(&data)
    }

    /// Load a template from a directory or an `.xlsx` file, whichever `path` is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_xlsx_path(path)
        }
    }

    /// Build a template from in-memory parts.
    pub fn from_parts<I, K, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Vec<u8>>,
    {
        Self {
            parts: parts
                .into_iter()
                .map(|(k, v)| (normalize_part_name(k.as_ref()), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Part paths in lexicographic order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// All parts in lexicographic path order.
    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// A part that must exist.
    pub(crate) fn required_part(&self, name: &str) -> Result<&[u8]> {
        self.part(name)
            .ok_or_else(|| XlcloneError::TemplateMissing(name.to_string()))
    }

    /// Read the package manifest: content types, relationships, sheet list.
    pub fn manifest(&self) -> Result<TemplateManifest> {
        manifest::read_manifest(self)
    }
}

/// Package paths use forward slashes and no leading slash.
fn normalize_part_name(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
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
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_from_dir_uses_forward_slash_paths() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("xl/worksheets")).unwrap();
        std::fs::write(tmp.path().join("[Content_Types].xml"), b"ct").unwrap();
        std::fs::write(tmp.path().join("xl/worksheets/sheet1.xml"), b"ws").unwrap();

        let template = TemplatePackage::from_dir(tmp.path()).unwrap();
        assert_eq!(
            template.part_names().collect::<Vec<_>>(),
            vec!["[Content_Types].xml", "xl/worksheets/sheet1.xml"]
        );
        assert_eq!(template.part("xl/worksheets/sheet1.xml"), Some(&b"ws"[..]));
    }

    #[test]
    fn test_from_dir_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = TemplatePackage::from_dir(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, XlcloneError::TemplateMissing(_)));
    }

    #[test]
    fn test_from_xlsx_bytes_skips_directories() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = FileOptions::default();
            zip.add_directory("xl/", options).unwrap();
            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(b"<workbook/>").unwrap();
            zip.finish().unwrap();
        }
        let template = TemplatePackage::from_xlsx_bytes(&buffer.into_inner()).unwrap();
        assert_eq!(template.len(), 1);
        assert!(template.contains("xl/workbook.xml"));
    }

    #[test]
    fn test_from_parts_normalizes_names() {
        let template = TemplatePackage::from_parts([("/xl\\styles.xml", "x")]);
        assert!(template.contains("xl/styles.xml"));
        assert!(matches!(
            template.required_part("xl/workbook.xml"),
            Err(XlcloneError::TemplateMissing(_))
        ));
    }
}
