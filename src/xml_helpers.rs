//! Shared XML utilities: attribute extraction for template parsing and
//! escaping for generated parts.

use quick_xml::events::BytesStart;

/// Extract a string attribute value by its full (possibly prefixed) key.
///
/// Returns `None` if the attribute is missing or not valid UTF-8.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return std::str::from_utf8(&attr.value).ok().map(|s| s.to_string());
        }
    }
    None
}

/// Extract a string attribute by local name (ignoring namespace prefix).
///
/// Used for `r:id`, whose prefix is not fixed by the format.
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return std::str::from_utf8(&attr.value).ok().map(|s| s.to_string());
        }
    }
    None
}

/// Extract a `u32` attribute value by key.
pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.parse().ok())
}

/// Extract a boolean attribute value by key.
///
/// Recognizes `"1"`, `"true"` as true; anything else present is false.
pub fn attr_bool(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr_string(e, key).map(|s| matches!(s.as_str(), "1" | "true"))
}

/// Escape element text content.
///
/// `&`, `<` and `>` become entity references; control characters below
/// U+0020 other than tab and newline become numeric character references.
/// Quotes are left as-is.
pub fn escape_text(s: &str) -> String {
    if !s
        .chars()
        .any(|c| matches!(c, '&' | '<' | '>') || is_escaped_control(c))
    {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c if is_escaped_control(c) => {
                out.push_str(&format!("&#x{:X};", u32::from(c)));
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value (double-quoted).
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_escaped_control(c: char) -> bool {
    c < '\u{20}' && c != '\t' && c != '\n'
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

    fn make_start(xml: &str) -> BytesStart<'_> {
        // Strip < and > / /> to get just the tag content
        let content = xml
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .trim_end();
        BytesStart::from_content(content, content.find(' ').unwrap_or(content.len()))
    }

    #[test]
    fn test_attr_string() {
        let e = make_start(r#"<sheet name="Data" sheetId="3" />"#);
        assert_eq!(attr_string(&e, b"name"), Some("Data".to_string()));
        assert_eq!(attr_u32(&e, b"sheetId"), Some(3));
        assert_eq!(attr_string(&e, b"missing"), None);
    }

    #[test]
    fn test_attr_string_local_ignores_prefix() {
        let e = make_start(r#"<sheet name="A" r:id="rId7"/>"#);
        assert_eq!(attr_string_local(&e, b"id"), Some("rId7".to_string()));
        assert_eq!(attr_string(&e, b"id"), None);
    }

    #[test]
    fn test_attr_bool() {
        let e = make_start(r#"<workbookPr date1904="1"/>"#);
        assert_eq!(attr_bool(&e, b"date1904"), Some(true));
        let e = make_start(r#"<workbookPr date1904="false"/>"#);
        assert_eq!(attr_bool(&e, b"date1904"), Some(false));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("a<b & c>d"), "a&lt;b &amp; c&gt;d");
        assert_eq!(escape_text("say \"hi\" 'x'"), "say \"hi\" 'x'");
        assert_eq!(escape_text("tab\tnl\n"), "tab\tnl\n");
        assert_eq!(escape_text("bell\u{7}"), "bell&#x7;");
        assert_eq!(escape_text("cr\r"), "cr&#xD;");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"a"b&c"#), "a&quot;b&amp;c");
    }
}
