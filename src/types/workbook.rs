use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::SheetGrid;
use crate::error::{Result, XlcloneError};

/// One sheet of a snapshot: its name and its grid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SheetSnapshot {
    pub name: String,
    #[serde(default)]
    pub cells: SheetGrid,
}

/// Immutable, already-extracted contents of one workbook.
///
/// Sheet order is the output order. Names are non-empty and unique; both
/// are checked on construction and never repaired.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawWorkbook")]
pub struct WorkbookSnapshot {
    name: String,
    sheets: Vec<SheetSnapshot>,
}

#[derive(Deserialize)]
struct RawWorkbook {
    #[serde(default)]
    name: String,
    sheets: Vec<SheetSnapshot>,
}

impl TryFrom<RawWorkbook> for WorkbookSnapshot {
    type Error = XlcloneError;

    fn try_from(raw: RawWorkbook) -> Result<Self> {
        let mut snapshot = Self::new(raw.name);
        for sheet in raw.sheets {
            snapshot.push_sheet(sheet.name, sheet.cells)?;
        }
        Ok(snapshot)
    }
}

impl WorkbookSnapshot {
    /// Empty snapshot. `name` is the workbook's file name, used by front ends
    /// to name the output; it may be empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
        }
    }

    /// Append a sheet.
    ///
    /// # Errors
    /// [`XlcloneError::InvalidSnapshot`] for an empty or duplicate name.
    pub fn push_sheet(&mut self, name: impl Into<String>, grid: SheetGrid) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(XlcloneError::InvalidSnapshot(format!(
                "sheet {} has an empty name",
                self.sheets.len() + 1
            )));
        }
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(XlcloneError::InvalidSnapshot(format!(
                "duplicate sheet name {name:?}"
            )));
        }
        self.sheets.push(SheetSnapshot { name, cells: grid });
        Ok(())
    }

    /// Builder-style [`push_sheet`](Self::push_sheet).
    pub fn with_sheet(mut self, name: impl Into<String>, grid: SheetGrid) -> Result<Self> {
        self.push_sheet(name, grid)?;
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn sheets(&self) -> &[SheetSnapshot] {
        &self.sheets
    }

    /// Sheet names in order.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Parse a JSON snapshot document.
    ///
    /// # Errors
    /// [`XlcloneError::InvalidSnapshot`] for malformed JSON, bad cell
    /// references, or violated sheet-name preconditions.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| XlcloneError::InvalidSnapshot(e.to_string()))
    }

    /// Read a JSON snapshot file. An empty workbook name is replaced by the
    /// file stem.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let mut snapshot = Self::from_json(&json)?;
        if snapshot.name.is_empty() {
            if let Some(stem) = path.file_stem() {
                snapshot.name = stem.to_string_lossy().into_owned();
            }
        }
        Ok(snapshot)
    }

    /// Check the unique-name invariant; used by code that receives snapshots
    /// built elsewhere.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for sheet in &self.sheets {
            if sheet.name.is_empty() || !seen.insert(sheet.name.as_str()) {
                return Err(XlcloneError::InvalidSnapshot(format!(
                    "sheet name {:?} is empty or repeated",
                    sheet.name
                )));
            }
        }
        Ok(())
    }
}
