//! xlclone - template-preserving XLSX serializer
//!
//! Turns an in-memory snapshot of cell values into an `.xlsx` archive by
//! combining generated worksheet parts with an existing package template:
//! - Worksheet XML generated from sparse typed grids
//! - One deduplicated shared string table per workbook
//! - Styles, themes, content types and relationships reused byte-for-byte
//! - Deterministic archives (sorted entries, fixed timestamps)
//! - Atomic file output
//!
//! # Usage
//!
//! ```no_run
//! use xlclone::{Serializer, SheetGrid, TemplatePackage, WorkbookSnapshot};
//!
//! # fn main() -> xlclone::Result<()> {
//! let template = TemplatePackage::from_dir("template/")?;
//!
//! let mut grid = SheetGrid::new();
//! grid.set_at("A1", "Q1")?;
//! grid.set_at("B1", 100.5)?;
//! let snapshot = WorkbookSnapshot::new("Report.xlsx").with_sheet("Sheet1", grid)?;
//!
//! Serializer::new().serialize_to_path(&snapshot, &template, "out/Report.xlsx")?;
//! # Ok(())
//! # }
//! ```

pub mod cell_ref;
pub mod date_serial;
pub mod error;
pub mod export;
pub mod options;
pub mod serializer;
pub mod shared_strings;
pub mod template;
pub mod types;
pub mod xml_helpers;

pub use cell_ref::{from_address, to_address};
pub use date_serial::DateSystem;
pub use error::{ErrorKind, Result, XlcloneError};
pub use options::{ArchiveTimestamp, CancellationToken, Compression, DateStyle, SerializeOptions};
pub use serializer::{serialize, OutputPackage, Serializer};
pub use shared_strings::SharedStringTable;
pub use template::{SheetInfo, TemplateManifest, TemplatePackage};
pub use types::*;
