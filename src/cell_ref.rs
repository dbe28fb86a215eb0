//! Conversion between 1-based (row, column) pairs and A1-style cell references.

use crate::error::{Result, XlcloneError};

/// Last column of the target format (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Last row of the target format.
pub const MAX_ROW: u32 = 1_048_576;

/// Convert a 1-based column index to its letter encoding (1 -> "A", 27 -> "AA").
///
/// Returns `None` for column 0.
pub fn column_to_letters(col: u32) -> Option<String> {
    if col == 0 {
        return None;
    }
    let mut letters = Vec::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        // rem < 26, so the sum stays in the ASCII uppercase range
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        n = (n - 1) / 26;
    }
    Some(letters.iter().rev().collect())
}

/// Convert column letters ("A", "ab", "XFD") to a 1-based column index.
///
/// Returns `None` for an empty string, non-letters, or overflow.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

/// Format a 1-based (row, col) pair as a cell reference: `(1, 28)` -> `"AB1"`.
///
/// # Errors
/// Returns [`XlcloneError::InvalidAddress`] if `row` or `col` is 0.
pub fn to_address(row: u32, col: u32) -> Result<String> {
    if row == 0 {
        return Err(XlcloneError::InvalidAddress(format!(
            "row must be >= 1 (got row {row}, col {col})"
        )));
    }
    let letters = column_to_letters(col).ok_or_else(|| {
        XlcloneError::InvalidAddress(format!("column must be >= 1 (got row {row}, col {col})"))
    })?;
    Ok(format!("{letters}{row}"))
}

/// Parse a cell reference like `"B7"` (or `"$b$7"`) into a 1-based (row, col) pair.
///
/// # Errors
/// Returns [`XlcloneError::InvalidAddress`] when the reference has no letters,
/// no digits, letters after digits, a zero row, or overflows `u32`.
pub fn from_address(cell_ref: &str) -> Result<(u32, u32)> {
    let invalid = |why: &str| XlcloneError::InvalidAddress(format!("{cell_ref:?}: {why}"));

    let trimmed = cell_ref.trim();
    let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let split = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    let (letters, rest) = body.split_at(split);
    let digits = rest.strip_prefix('$').unwrap_or(rest);

    if letters.is_empty() {
        return Err(invalid("missing column letters"));
    }
    if digits.is_empty() {
        return Err(invalid("missing row number"));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("unexpected characters after row number"));
    }

    let col = letters_to_column(letters).ok_or_else(|| invalid("column out of range"))?;
    let row: u32 = digits.parse().map_err(|_| invalid("row out of range"))?;
    if row == 0 {
        return Err(invalid("row must be >= 1"));
    }

    Ok((row, col))
}

/// Range reference covering `A1` to the given bottom-right corner, e.g. `"A1:C10"`.
///
/// A 1x1 area collapses to the single cell reference.
pub fn area_ref(last_row: u32, last_col: u32) -> Result<String> {
    let end = to_address(last_row, last_col)?;
    if end == "A1" {
        Ok(end)
    } else {
        Ok(format!("A1:{end}"))
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
    use test_case::test_case;

    #[test_case(1, "A")]
    #[test_case(26, "Z")]
    #[test_case(27, "AA")]
    #[test_case(28, "AB")]
    #[test_case(52, "AZ")]
    #[test_case(53, "BA")]
    #[test_case(702, "ZZ")]
    #[test_case(703, "AAA")]
    #[test_case(MAX_COLUMN, "XFD")]
    fn test_column_letters(col: u32, letters: &str) {
        assert_eq!(column_to_letters(col).as_deref(), Some(letters));
        assert_eq!(letters_to_column(letters), Some(col));
    }

    #[test]
    fn test_to_address() {
        assert_eq!(to_address(1, 1).unwrap(), "A1");
        assert_eq!(to_address(1, 28).unwrap(), "AB1");
        assert_eq!(to_address(7, 2).unwrap(), "B7");
    }

    #[test]
    fn test_to_address_rejects_zero() {
        assert!(matches!(to_address(0, 1), Err(XlcloneError::InvalidAddress(_))));
        assert!(matches!(to_address(1, 0), Err(XlcloneError::InvalidAddress(_))));
    }

    #[test_case("A1", (1, 1))]
    #[test_case("AB1", (1, 28))]
    #[test_case("b7", (7, 2))]
    #[test_case("$C$10", (10, 3))]
    #[test_case("XFD1048576", (MAX_ROW, MAX_COLUMN))]
    fn test_from_address(input: &str, expected: (u32, u32)) {
        assert_eq!(from_address(input).unwrap(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("123"; "no letters")]
    #[test_case("ABC"; "no digits")]
    #[test_case("1A"; "digits first")]
    #[test_case("A1B"; "letters after digits")]
    #[test_case("A0"; "row zero")]
    #[test_case("A99999999999"; "row overflow")]
    #[test_case("A-1"; "sign")]
    fn test_from_address_rejects(input: &str) {
        assert!(matches!(
            from_address(input),
            Err(XlcloneError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_area_ref() {
        assert_eq!(area_ref(1, 1).unwrap(), "A1");
        assert_eq!(area_ref(10, 3).unwrap(), "A1:C10");
    }
}
