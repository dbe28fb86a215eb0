//! Snapshot data types consumed by the serializer.

mod cell;
mod grid;
mod workbook;

pub use cell::*;
pub use grid::*;
pub use workbook::*;
