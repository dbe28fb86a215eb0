//! Stylesheet inspection.
//!
//! Generated cells never get new styles. From `styles.xml` the serializer
//! needs the number of cell styles (`cellXfs` entries), so configured style
//! indices can be checked, and a cell style that already formats numbers as
//! dates, so date cells display as dates.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;
use crate::xml_helpers::{attr_string, attr_u32};

/// Built-in number formats that display dates or times
/// (`m/d/yyyy`, `d-mmm-yy`, `h:mm`, `m/d/yy h:mm`, `mm:ss`, ...).
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 45..=47)
}

/// Check whether a custom format code displays a date or time.
///
/// Quoted literals and bracketed sections (colors, locales, conditions) are
/// ignored; `m` only counts as a month when no digit placeholders are present.
pub fn is_date_format(format_code: &str) -> bool {
    let lower = format_code.to_lowercase();

    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    let mut cleaned = String::new();

    for c in lower.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            _ if !in_quotes && !in_brackets => cleaned.push(c),
            _ => {}
        }
    }

    if cleaned == "general" {
        return false;
    }
    let has_digit_placeholder = cleaned.contains('#') || cleaned.contains('0');

    cleaned.contains('y')
        || cleaned.contains('d')
        || cleaned.contains('h')
        || (cleaned.contains('m') && !has_digit_placeholder)
        || (cleaned.contains('s') && cleaned.contains(':'))
}

/// The `cellXfs` table of a stylesheet: one number format id per cell
/// style, plus the custom format codes those ids may refer to.
#[derive(Debug, Clone, Default)]
pub struct CellStyles {
    custom_formats: Vec<(u32, String)>,
    xf_formats: Vec<u32>,
}

impl CellStyles {
    /// Parse `styles.xml`.
    ///
    /// # Errors
    /// [`XlcloneError::Xml`](crate::XlcloneError::Xml) for a malformed stylesheet.
    pub fn parse(styles_xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(styles_xml);
        reader.trim_text(true);

        let mut styles = Self::default();
        let mut in_num_fmts = false;
        let mut in_cell_xfs = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(ref event @ (Event::Start(ref e) | Event::Empty(ref e))) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    match e.local_name().as_ref() {
                        b"numFmts" => in_num_fmts = !is_empty,
                        b"cellXfs" => in_cell_xfs = !is_empty,
                        b"numFmt" if in_num_fmts => {
                            if let Some(id) = attr_u32(e, b"numFmtId") {
                                styles
                                    .custom_formats
                                    .push((id, attr_string(e, b"formatCode").unwrap_or_default()));
                            }
                        }
                        b"xf" if in_cell_xfs => {
                            styles.xf_formats.push(attr_u32(e, b"numFmtId").unwrap_or(0));
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"numFmts" => in_num_fmts = false,
                    b"cellXfs" => in_cell_xfs = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }
        Ok(styles)
    }

    /// Number of cell styles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.xf_formats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xf_formats.is_empty()
    }

    /// Whether `idx` names an existing cell style.
    #[must_use]
    pub fn contains(&self, idx: u32) -> bool {
        usize::try_from(idx).is_ok_and(|i| i < self.xf_formats.len())
    }

    /// Index of the first cell style whose number format is a date format.
    #[must_use]
    pub fn date_style(&self) -> Option<u32> {
        let is_date = |id: u32| {
            // A custom definition overrides the built-in meaning of an id.
            match self.custom_formats.iter().find(|(fid, _)| *fid == id) {
                Some((_, code)) => is_date_format(code),
                None => is_builtin_date_format(id),
            }
        };

        self.xf_formats
            .iter()
            .position(|&id| is_date(id))
            .and_then(|idx| u32::try_from(idx).ok())
    }
}

/// Index of the first `cellXfs` entry whose number format is a date format.
///
/// # Errors
/// [`XlcloneError::Xml`](crate::XlcloneError::Xml) for a malformed stylesheet.
pub fn find_date_style(styles_xml: &[u8]) -> Result<Option<u32>> {
    Ok(CellStyles::parse(styles_xml)?.date_style())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("yyyy-mm-dd", true)]
    #[test_case("m/d/yy h:mm", true)]
    #[test_case("[$-409]mmmm d, yyyy", true)]
    #[test_case("hh:mm:ss", true)]
    #[test_case("mm:ss", true)]
    #[test_case("General", false)]
    #[test_case("0.00", false)]
    #[test_case("#,##0", false)]
    #[test_case("0.00%", false)]
    #[test_case("[Red]0.00", false)]
    #[test_case("\"days\" 0", false)]
    #[test_case("@", false)]
    fn test_is_date_format(code: &str, expected: bool) {
        assert_eq!(is_date_format(code), expected, "{code}");
    }

    #[test]
    fn test_finds_builtin_date_xf() {
        let xml = br#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <cellStyleXfs count="1"><xf numFmtId="14"/></cellStyleXfs>
            <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="4"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs>
        </styleSheet>"#;
        assert_eq!(find_date_style(xml).unwrap(), Some(2));
    }

    #[test]
    fn test_finds_custom_date_xf() {
        let xml = br#"<styleSheet>
            <numFmts count="2"><numFmt numFmtId="164" formatCode="0.000"/><numFmt numFmtId="165" formatCode="yyyy-mm-dd"/></numFmts>
            <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="165"/></cellXfs>
        </styleSheet>"#;
        assert_eq!(find_date_style(xml).unwrap(), Some(2));
    }

    #[test]
    fn test_cell_style_bounds() {
        let xml = br#"<styleSheet><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="4"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;
        let styles = CellStyles::parse(xml).unwrap();
        assert_eq!(styles.len(), 3);
        assert!(styles.contains(0));
        assert!(styles.contains(2));
        assert!(!styles.contains(3));
        assert!(!styles.contains(u32::MAX));
    }

    #[test]
    fn test_cell_style_xfs_are_not_cell_styles() {
        let xml = br#"<styleSheet><cellStyleXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0"/></cellXfs></styleSheet>"#;
        let styles = CellStyles::parse(xml).unwrap();
        assert_eq!(styles.len(), 1);
        assert_eq!(styles.date_style(), None);
    }

    #[test]
    fn test_no_date_xf() {
        let xml = br#"<styleSheet><cellXfs count="1"><xf numFmtId="0"/></cellXfs></styleSheet>"#;
        assert_eq!(find_date_style(xml).unwrap(), None);
    }
}
