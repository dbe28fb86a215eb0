//! Workbook-scoped shared string table.
//!
//! Text cells reference strings by index into this table instead of carrying
//! inline text. Indices are assigned in first-seen order and never change
//! during one serialization run.
//!
//! A table can also start from a template's own shared-strings part, when
//! worksheets copied unchanged from the template still point into it. Those
//! items keep their indices and their original markup.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, XlcloneError};
use crate::xml_helpers::escape_text;

const SST_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Ordered, deduplicated strings plus the reverse lookup.
#[derive(Debug, Default)]
pub struct SharedStringTable {
    strings: Vec<String>,
    /// `<si>` markup of items carried over from a template table. They hold
    /// the first `carried.len()` indices.
    carried: Vec<String>,
    index: HashMap<String, u32>,
    /// Total number of interned references, duplicates included.
    references: u64,
}

impl SharedStringTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing shared-strings part, keeping every item at its
    /// index.
    ///
    /// Plain items take part in deduplication; rich-text items are only
    /// reachable through their index. The template's reference count is not
    /// inherited, see [`add_references`](Self::add_references).
    ///
    /// # Errors
    /// [`XlcloneError::Xml`] for malformed XML;
    /// [`XlcloneError::PackageInconsistent`] for an item that is not UTF-8.
    pub fn from_template_xml(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut table = Self::new();
        let mut buf = Vec::new();

        let mut item_start = None;
        let mut prefixed = false;
        let mut rich = false;
        let mut in_t = false;
        let mut in_phonetic = false;
        let mut text = String::new();

        loop {
            let before = reader.buffer_position();
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"si" => {
                        item_start = Some(before);
                        prefixed = e.name().as_ref() != b"si";
                        rich = false;
                        text.clear();
                    }
                    b"r" => rich = true,
                    b"rPh" => in_phonetic = true,
                    b"t" if !in_phonetic => in_t = true,
                    _ => {}
                },
                Event::Empty(ref e) if e.local_name().as_ref() == b"si" => {
                    table.push_carried(String::new(), plain_item(""), true);
                }
                Event::Text(ref t) if in_t => text.push_str(&t.unescape()?),
                Event::CData(ref c) if in_t => text.push_str(&String::from_utf8_lossy(c)),
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"t" => in_t = false,
                    b"rPh" => in_phonetic = false,
                    b"si" => {
                        let Some(start) = item_start.take() else {
                            continue;
                        };
                        // Prefixed markup depends on the source document's
                        // namespace declarations; fall back to plain text.
                        let markup = if prefixed {
                            plain_item(&text)
                        } else {
                            let raw = xml.get(start..reader.buffer_position()).unwrap_or_default();
                            std::str::from_utf8(raw)
                                .map_err(|e| {
                                    XlcloneError::PackageInconsistent(format!(
                                        "shared string {} is not UTF-8: {e}",
                                        table.len()
                                    ))
                                })?
                                .trim()
                                .to_string()
                        };
                        table.push_carried(std::mem::take(&mut text), markup, !rich);
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(table)
    }

    fn push_carried(&mut self, text: String, markup: String, dedup: bool) {
        let idx = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        if dedup {
            self.index.entry(text.clone()).or_insert(idx);
        }
        self.strings.push(text);
        self.carried.push(markup);
    }

    /// Count `n` references made outside [`intern`](Self::intern), such as
    /// cells in worksheets copied unchanged.
    pub fn add_references(&mut self, n: u64) {
        self.references += n;
    }

    /// Number of items carried over from a template table.
    #[must_use]
    pub fn carried_len(&self) -> usize {
        self.carried.len()
    }

    /// Return the index of `value`, appending it if it was not seen before.
    ///
    /// Comparison is exact: no trimming, case folding or Unicode normalization.
    pub fn intern(&mut self, value: &str) -> u32 {
        self.references += 1;
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        // The format caps a workbook well below u32::MAX unique strings.
        let idx = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        self.strings.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    /// Number of unique strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Number of `intern` calls so far.
    #[must_use]
    pub fn reference_count(&self) -> u64 {
        self.references
    }

    #[must_use]
    pub fn get(&self, idx: u32) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
    }

    /// Strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Serialize the table as a shared-strings part.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(128 + self.strings.iter().map(|s| s.len() + 16).sum::<usize>());
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(
            r#"<sst xmlns="{SST_NAMESPACE}" count="{}" uniqueCount="{}">"#,
            self.references,
            self.strings.len()
        ));
        for markup in &self.carried {
            out.push_str(markup);
        }
        for s in self.strings.iter().skip(self.carried.len()) {
            out.push_str(&plain_item(s));
        }
        out.push_str("</sst>");
        out
    }
}

/// `<si><t>text</t></si>`
fn plain_item(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 40);
    if needs_space_preserve(s) {
        out.push_str(r#"<si><t xml:space="preserve">"#);
    } else {
        out.push_str("<si><t>");
    }
    out.push_str(&escape_text(s));
    out.push_str("</t></si>");
    out
}

/// Leading/trailing whitespace is dropped by readers unless `xml:space` says otherwise.
fn needs_space_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace)
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
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intern_dedups() {
        let mut sst = SharedStringTable::new();
        assert_eq!(sst.intern("a"), 0);
        assert_eq!(sst.intern("b"), 1);
        assert_eq!(sst.intern("a"), 0);
        assert_eq!(sst.len(), 2);
        assert_eq!(sst.reference_count(), 3);
        assert_eq!(sst.get(1), Some("b"));
        assert_eq!(sst.get(2), None);
    }

    #[test]
    fn test_intern_is_exact() {
        let mut sst = SharedStringTable::new();
        let a = sst.intern("x");
        let b = sst.intern("x ");
        let c = sst.intern("X");
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn test_sequential_indices() {
        let mut sst = SharedStringTable::new();
        let indices: Vec<u32> = (0..50).map(|i| sst.intern(&format!("s{i}"))).collect();
        assert_eq!(indices, (0..50).collect::<Vec<u32>>());
        assert_eq!(sst.iter().next(), Some("s0"));
    }

    #[test]
    fn test_to_xml() {
        let mut sst = SharedStringTable::new();
        sst.intern("Q1");
        sst.intern("a<b&c");
        sst.intern(" padded");
        sst.intern("Q1");
        assert_eq!(
            sst.to_xml(),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="3">"#,
                "<si><t>Q1</t></si>",
                "<si><t>a&lt;b&amp;c</t></si>",
                r#"<si><t xml:space="preserve"> padded</t></si>"#,
                "</sst>"
            )
        );
    }

    const TEMPLATE_SST: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="9" uniqueCount="4">"#,
        "<si><t>stale</t></si>\n",
        r#"<si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> part</t></r></si>"#,
        "<si><t>a&amp;b</t><rPh sb=\"0\" eb=\"1\"><t>x</t></rPh></si>",
        "<si/>",
        "</sst>"
    );

    #[test]
    fn test_carried_items_keep_indices_and_markup() {
        let mut sst = SharedStringTable::from_template_xml(TEMPLATE_SST.as_bytes()).unwrap();
        assert_eq!(sst.len(), 4);
        assert_eq!(sst.carried_len(), 4);
        assert_eq!(sst.get(0), Some("stale"));
        assert_eq!(sst.get(1), Some("Bold part"));
        assert_eq!(sst.get(2), Some("a&b"));
        assert_eq!(sst.get(3), Some(""));
        assert_eq!(sst.reference_count(), 0);

        // Plain carried items dedup; the rich-text item does not.
        assert_eq!(sst.intern("stale"), 0);
        assert_eq!(sst.intern("a&b"), 2);
        assert_eq!(sst.intern("Bold part"), 4);
        sst.add_references(5);
        assert_eq!(sst.reference_count(), 8);

        assert_eq!(
            sst.to_xml(),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="8" uniqueCount="5">"#,
                "<si><t>stale</t></si>",
                r#"<si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> part</t></r></si>"#,
                "<si><t>a&amp;b</t><rPh sb=\"0\" eb=\"1\"><t>x</t></rPh></si>",
                "<si><t></t></si>",
                "<si><t>Bold part</t></si>",
                "</sst>"
            )
        );
    }

    #[test]
    fn test_prefixed_template_items_become_plain() {
        let xml = r#"<x:sst xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:si><x:t>kept</x:t></x:si></x:sst>"#;
        let sst = SharedStringTable::from_template_xml(xml.as_bytes()).unwrap();
        assert!(sst.to_xml().contains("<si><t>kept</t></si></sst>"));
    }

    #[test]
    fn test_malformed_template_table() {
        let err = SharedStringTable::from_template_xml(b"<sst><si><t>x</si></sst>").unwrap_err();
        assert!(matches!(err, XlcloneError::Xml(_)));
    }

    #[test]
    fn test_empty_table_xml() {
        let xml = SharedStringTable::new().to_xml();
        assert!(xml.ends_with(r#"count="0" uniqueCount="0"></sst>"#));
    }
}
