//! Read-only scan of template worksheets that are copied unchanged.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, XlcloneError};
use crate::xml_helpers::attr_string;

/// Shared-string references (`<c t="s"><v>n</v></c>`) found in worksheets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedStringRefs {
    pub count: u64,
    pub max_index: Option<u32>,
}

impl SharedStringRefs {
    pub fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.max_index = self.max_index.max(other.max_index);
    }
}

/// Count the shared-string cells of one worksheet.
///
/// # Errors
/// [`XlcloneError::Xml`] for malformed XML;
/// [`XlcloneError::PackageInconsistent`] for a `t="s"` value that is not an index.
pub fn shared_string_refs(sheet_xml: &[u8], part: &str) -> Result<SharedStringRefs> {
    let mut reader = Reader::from_reader(sheet_xml);
    reader.trim_text(true);

    let mut refs = SharedStringRefs::default();
    let mut in_shared_cell = false;
    let mut in_value = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"c" => in_shared_cell = attr_string(e, b"t").as_deref() == Some("s"),
                b"v" => in_value = in_shared_cell,
                _ => {}
            },
            Event::Text(ref t) if in_value => {
                let text = t.unescape()?;
                let idx = text.trim().parse::<u32>().map_err(|_| {
                    XlcloneError::PackageInconsistent(format!(
                        "{part} has shared-string cell value {text:?}"
                    ))
                })?;
                refs.count += 1;
                refs.max_index = refs.max_index.max(Some(idx));
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"c" => in_shared_cell = false,
                b"v" => in_value = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(refs)
}
