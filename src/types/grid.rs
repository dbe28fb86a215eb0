use std::collections::BTreeMap;

use serde::Deserialize;

use super::CellValue;
use crate::cell_ref::{from_address, to_address, MAX_COLUMN, MAX_ROW};
use crate::error::{Result, XlcloneError};

/// Sparse grid of cell values for one sheet.
///
/// Keys are 1-based `(row, col)`; the `BTreeMap` ordering is row-major.
/// Absent positions read as [`CellValue::Empty`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, CellValue>")]
pub struct SheetGrid {
    cells: BTreeMap<(u32, u32), CellValue>,
}

static EMPTY: CellValue = CellValue::Empty;

impl SheetGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from a rectangular block whose top-left cell is
    /// (`start_row`, `start_col`), the shape a used-range read produces.
    ///
    /// # Errors
    /// [`XlcloneError::InvalidAddress`] if any position falls outside the sheet.
    pub fn from_rows<R, I>(start_row: u32, start_col: u32, rows: R) -> Result<Self>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = CellValue>,
    {
        let mut grid = Self::new();
        for (i, row_values) in rows.into_iter().enumerate() {
            let row = offset(start_row, i)?;
            for (j, value) in row_values.into_iter().enumerate() {
                grid.set(row, offset(start_col, j)?, value)?;
            }
        }
        Ok(grid)
    }

    /// Store `value` at (`row`, `col`); storing `Empty` clears the cell.
    ///
    /// # Errors
    /// [`XlcloneError::InvalidAddress`] if the position is 0 or beyond the
    /// format limits.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Result<()> {
        if row == 0 || col == 0 || row > MAX_ROW || col > MAX_COLUMN {
            return Err(XlcloneError::InvalidAddress(format!(
                "cell position ({row}, {col}) outside 1..={MAX_ROW} x 1..={MAX_COLUMN}"
            )));
        }
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
        Ok(())
    }

    /// Store `value` at an A1-style reference.
    pub fn set_at(&mut self, cell_ref: &str, value: impl Into<CellValue>) -> Result<()> {
        let (row, col) = from_address(cell_ref)?;
        self.set(row, col, value)
    }

    #[must_use]
    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    /// Highest populated row (0 for an empty grid).
    #[must_use]
    pub fn used_row_count(&self) -> u32 {
        self.cells.keys().next_back().map_or(0, |&(r, _)| r)
    }

    /// Highest populated column (0 for an empty grid).
    #[must_use]
    pub fn used_column_count(&self) -> u32 {
        self.cells.keys().map(|&(_, c)| c).max().unwrap_or(0)
    }

    /// Number of populated cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Populated cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = ((u32, u32), &CellValue)> + '_ {
        self.cells.iter().map(|(&pos, v)| (pos, v))
    }
}

fn offset(start: u32, index: usize) -> Result<u32> {
    u32::try_from(index)
        .ok()
        .and_then(|i| start.checked_add(i))
        .ok_or_else(|| XlcloneError::InvalidAddress(format!("offset {index} from {start}")))
}

impl TryFrom<BTreeMap<String, CellValue>> for SheetGrid {
    type Error = XlcloneError;

    fn try_from(cells: BTreeMap<String, CellValue>) -> Result<Self> {
        let mut grid = Self::new();
        for (cell_ref, value) in cells {
            grid.set_at(&cell_ref, value)?;
        }
        Ok(grid)
    }
}

impl std::fmt::Display for SheetGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.used_row_count();
        let cols = self.used_column_count();
        if rows == 0 {
            return write!(f, "empty grid");
        }
        let corner = to_address(rows, cols).map_err(|_| std::fmt::Error)?;
        write!(f, "{} cells in A1:{corner}", self.cells.len())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_follow_populated_cells() {
        let mut grid = SheetGrid::new();
        assert_eq!(grid.used_row_count(), 0);
        assert_eq!(grid.used_column_count(), 0);

        grid.set(3, 2, 1.0).unwrap();
        grid.set(1, 5, "x").unwrap();
        assert_eq!(grid.used_row_count(), 3);
        assert_eq!(grid.used_column_count(), 5);

        grid.set(1, 5, CellValue::Empty).unwrap();
        assert_eq!(grid.used_column_count(), 2);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_absent_cells_read_empty() {
        let grid = SheetGrid::new();
        assert!(grid.get(10, 10).is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_positions() {
        let mut grid = SheetGrid::new();
        assert!(grid.set(0, 1, 1.0).is_err());
        assert!(grid.set(1, 0, 1.0).is_err());
        assert!(grid.set(MAX_ROW + 1, 1, 1.0).is_err());
        assert!(grid.set(1, MAX_COLUMN + 1, 1.0).is_err());
    }

    #[test]
    fn test_iteration_is_row_major() {
        let mut grid = SheetGrid::new();
        grid.set_at("B2", 4.0).unwrap();
        grid.set_at("A2", 3.0).unwrap();
        grid.set_at("B1", 2.0).unwrap();
        grid.set_at("A1", 1.0).unwrap();
        let order: Vec<_> = grid.iter().map(|(pos, _)| pos).collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_from_rows_with_offset() {
        let grid = SheetGrid::from_rows(
            2,
            3,
            vec![
                vec![CellValue::from("a"), CellValue::Empty],
                vec![CellValue::from(1.5), CellValue::from(true)],
            ],
        )
        .unwrap();
        assert_eq!(grid.get(2, 3), &CellValue::Text("a".into()));
        assert!(grid.get(2, 4).is_empty());
        assert_eq!(grid.get(3, 4), &CellValue::Boolean(true));
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_deserialize_from_address_map() {
        let grid: SheetGrid =
            serde_json::from_str(r#"{"A1": {"text": "Q1"}, "B1": {"number": 100.5}}"#).unwrap();
        assert_eq!(grid.get(1, 2), &CellValue::Number(100.5));
        assert_eq!(grid.to_string(), "2 cells in A1:B1");

        let bad = serde_json::from_str::<SheetGrid>(r#"{"1A": {"number": 1}}"#);
        assert!(bad.is_err());
    }
}
