//! Workbook serialization: snapshot + template -> archive bytes.
//!
//! One run owns one [`SharedStringTable`] and one working copy of the
//! template parts. The template itself is only read, so any number of runs
//! can share it; [`Serializer::serialize_all`] does exactly that on rayon.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Result, XlcloneError};
use crate::export::{assemble, write_atomic, write_sheet_xml, SheetXmlOptions};
use crate::options::{DateStyle, SerializeOptions};
use crate::shared_strings::SharedStringTable;
use crate::template::styles::CellStyles;
use crate::template::worksheet::{shared_string_refs, SharedStringRefs};
use crate::template::{TemplateManifest, TemplatePackage};
use crate::types::WorkbookSnapshot;

/// A finished archive plus what went into it.
#[derive(Debug, Clone)]
pub struct OutputPackage {
    bytes: Vec<u8>,
    /// Worksheet parts regenerated from the snapshot, in sheet order.
    pub sheet_parts: Vec<String>,
    pub shared_strings_part: String,
    pub unique_strings: usize,
    pub string_references: u64,
}

impl OutputPackage {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the archive to `dest` atomically.
    pub fn write_to(&self, dest: impl AsRef<Path>) -> Result<()> {
        write_atomic(dest, &self.bytes, &SerializeOptions::default())
    }
}

/// Serializes workbook snapshots against templates.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    options: SerializeOptions,
}

impl Serializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: SerializeOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &SerializeOptions {
        &self.options
    }

    /// Produce the archive for one snapshot.
    ///
    /// Sheets map onto the template's worksheets by position. Template
    /// worksheets beyond the snapshot are copied unchanged, and when they
    /// reference shared strings the template's table is carried into the new
    /// one at the same indices. Nothing is written anywhere; the first
    /// failure aborts the run.
    ///
    /// # Errors
    /// - [`XlcloneError::InvalidSnapshot`] for empty or duplicate sheet names
    /// - [`XlcloneError::TemplateMissing`] for absent manifest or worksheet parts
    /// - [`XlcloneError::PackageInconsistent`] when the snapshot has more
    ///   sheets than the template, names differ under `strict_sheet_names`,
    ///   a configured style index is not in the template's `cellXfs`, or an
    ///   untouched worksheet references a shared string the template lacks
    /// - [`XlcloneError::UnsupportedValue`] for unrepresentable cell values
    /// - [`XlcloneError::Cancelled`] once the cancellation token fires
    pub fn serialize(
        &self,
        snapshot: &WorkbookSnapshot,
        template: &TemplatePackage,
    ) -> Result<OutputPackage> {
        snapshot.validate()?;
        self.options.check_cancelled()?;

        let manifest = template.manifest()?;
        self.check_sheets(snapshot, &manifest)?;

        let styles = match manifest.styles_part.as_deref().and_then(|p| template.part(p)) {
            Some(xml) => Some(CellStyles::parse(xml)?),
            None => None,
        };
        let sheet_options = SheetXmlOptions {
            date_system: manifest.date_system,
            date_style: self.date_style(styles.as_ref())?,
            default_style: self
                .options
                .default_style
                .map(|idx| check_style(styles.as_ref(), idx, "default style"))
                .transpose()?,
            tab_selected: false,
        };

        let mut strings = carry_template_strings(template, &manifest, snapshot.sheets().len())?;
        let mut generated = Vec::with_capacity(snapshot.sheets().len());
        for (idx, (sheet, info)) in snapshot.sheets().iter().zip(&manifest.sheets).enumerate() {
            self.options.check_cancelled()?;
            template.required_part(&info.path)?;

            let options = SheetXmlOptions {
                tab_selected: idx == manifest.active_tab,
                ..sheet_options
            };
            let xml = write_sheet_xml(&sheet.cells, &mut strings, &options)?;
            debug!(
                sheet = %sheet.name,
                part = %info.path,
                cells = sheet.cells.len(),
                "generated worksheet"
            );
            generated.push((info.path.clone(), xml));
        }

        let sst_xml = strings.to_xml();
        let bytes = assemble(template, &manifest, &generated, &sst_xml, &self.options)?;

        info!(
            workbook = %snapshot.name(),
            sheets = generated.len(),
            unique_strings = strings.len(),
            bytes = bytes.len(),
            "serialized workbook"
        );

        Ok(OutputPackage {
            bytes,
            sheet_parts: generated.into_iter().map(|(path, _)| path).collect(),
            shared_strings_part: manifest.shared_strings_target(),
            unique_strings: strings.len(),
            string_references: strings.reference_count(),
        })
    }

    /// Serialize, then write the archive to `dest` atomically.
    ///
    /// On failure `dest` is left as it was.
    pub fn serialize_to_path(
        &self,
        snapshot: &WorkbookSnapshot,
        template: &TemplatePackage,
        dest: impl AsRef<Path>,
    ) -> Result<OutputPackage> {
        let package = self.serialize(snapshot, template)?;
        write_atomic(dest, package.as_bytes(), &self.options)?;
        Ok(package)
    }

    /// Serialize independent workbooks in parallel against one template.
    ///
    /// Results come back in input order; one failure does not affect the others.
    pub fn serialize_all(
        &self,
        snapshots: &[WorkbookSnapshot],
        template: &TemplatePackage,
    ) -> Vec<Result<OutputPackage>> {
        snapshots
            .par_iter()
            .map(|snapshot| self.serialize(snapshot, template))
            .collect()
    }

    fn check_sheets(&self, snapshot: &WorkbookSnapshot, manifest: &TemplateManifest) -> Result<()> {
        let provided = snapshot.sheets().len();
        let available = manifest.sheets.len();
        if provided > available {
            return Err(XlcloneError::PackageInconsistent(format!(
                "snapshot has {provided} sheets but the template has {available} worksheets"
            )));
        }
        if provided < available {
            warn!(
                provided,
                available, "template worksheets beyond the snapshot are kept unchanged"
            );
        }

        for (sheet, info) in snapshot.sheets().iter().zip(&manifest.sheets) {
            if sheet.name == info.name {
                continue;
            }
            if self.options.strict_sheet_names {
                return Err(XlcloneError::PackageInconsistent(format!(
                    "sheet {:?} does not match template sheet {:?}",
                    sheet.name, info.name
                )));
            }
            warn!(
                sheet = %sheet.name,
                template_sheet = %info.name,
                "sheet name differs from template; tab keeps the template name"
            );
        }
        Ok(())
    }

    fn date_style(&self, styles: Option<&CellStyles>) -> Result<Option<u32>> {
        match self.options.date_style {
            DateStyle::Index(idx) => check_style(styles, idx, "date style").map(Some),
            DateStyle::Unstyled => Ok(None),
            DateStyle::Auto => {
                let style = styles.and_then(CellStyles::date_style);
                if style.is_none() {
                    debug!("template defines no date cell style; dates are written unstyled");
                }
                Ok(style)
            }
        }
    }
}

/// `idx` if the template's stylesheet defines that cell style.
fn check_style(styles: Option<&CellStyles>, idx: u32, what: &str) -> Result<u32> {
    let available = styles.map_or(0, CellStyles::len);
    if styles.is_some_and(|s| s.contains(idx)) {
        Ok(idx)
    } else {
        Err(XlcloneError::PackageInconsistent(format!(
            "{what} {idx} is not defined; the template has {available} cell styles"
        )))
    }
}

/// Start the run's string table.
///
/// Template worksheets past the snapshot's sheets are copied unchanged, so
/// any `t="s"` cells in them must keep resolving to the same items. When
/// there are such cells the template's own table is carried over; otherwise
/// the table starts empty.
fn carry_template_strings(
    template: &TemplatePackage,
    manifest: &TemplateManifest,
    regenerated: usize,
) -> Result<SharedStringTable> {
    let mut refs = SharedStringRefs::default();
    for info in manifest.sheets.iter().skip(regenerated) {
        if let Some(xml) = template.part(&info.path) {
            refs.merge(shared_string_refs(xml, &info.path)?);
        }
    }
    let Some(max_index) = refs.max_index else {
        return Ok(SharedStringTable::new());
    };

    let sst_xml = manifest
        .shared_strings_part
        .as_deref()
        .and_then(|p| template.part(p))
        .ok_or_else(|| {
            XlcloneError::PackageInconsistent(
                "untouched template worksheets use shared strings but the template has no shared-strings part"
                    .to_string(),
            )
        })?;
    let mut strings = SharedStringTable::from_template_xml(sst_xml)?;
    if strings.get(max_index).is_none() {
        return Err(XlcloneError::PackageInconsistent(format!(
            "untouched template worksheets use shared string {max_index} but the template table has {} items",
            strings.len()
        )));
    }
    strings.add_references(refs.count);

    debug!(
        carried = strings.carried_len(),
        references = refs.count,
        "carried template shared strings"
    );
    Ok(strings)
}

/// Serialize `snapshot` against `template` with default options.
pub fn serialize(snapshot: &WorkbookSnapshot, template: &TemplatePackage) -> Result<OutputPackage> {
    Serializer::new().serialize(snapshot, template)
}
