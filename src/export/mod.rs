//! XLSX output pipeline.
//!
//! Worksheets are generated from grids, then combined with the untouched
//! template parts into a fresh archive. The archive reaches disk only
//! through [`write_atomic`].

pub mod atomic;
pub mod package_writer;
pub mod sheet_writer;

pub use atomic::write_atomic;
pub use package_writer::assemble;
pub use sheet_writer::{format_number, write_sheet_xml, SheetXmlOptions};
