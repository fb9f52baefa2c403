// ABOUTME: Attribute records and the single-pass scanner that extracts them from raw tag text.
// ABOUTME: Tolerates unquoted values, empty values, and stray quotes embedded in quoted values.

use std::fmt;

use crate::text::is_space_byte;

/// One attribute occurrence on an opening tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttr {
    /// Lowercase name, used for lookups.
    pub name: String,
    /// Name as written in the source, used when the tag is rebuilt.
    pub original_name: String,
    pub value: String,
    /// Quote character around the value, `None` for unquoted or bare attributes.
    pub quote: Option<char>,
    /// False for bare attributes such as `disabled`.
    pub has_value: bool,
    pub alive: bool,
}

impl TagAttr {
    fn new(original_name: &str, value: &str, quote: Option<char>, has_value: bool) -> Self {
        Self {
            name: original_name.to_ascii_lowercase(),
            original_name: original_name.to_string(),
            value: value.to_string(),
            quote,
            has_value,
            alive: true,
        }
    }
}

impl fmt::Display for TagAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original_name)?;
        if !self.has_value {
            return Ok(());
        }
        match self.quote {
            Some(q) => write!(f, "={q}{}{q}", self.value),
            None => write!(f, "={}", self.value),
        }
    }
}

/// True at `/` immediately followed by `>`.
fn is_slash_close(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>')
}

/// True where the tag body ends: `>` or the `/>` of a self-closing tag.
fn at_tag_end(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'>' || is_slash_close(bytes, i)
}

/// Index of the quote that closes a value opened at `start - 1`.
///
/// Prefers a quote followed by whitespace or the tag end, so unescaped quotes
/// inside the value do not cut it short. Falls back to the first matching quote,
/// then to the tag end.
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut first = None;
    for k in start..bytes.len() {
        if bytes[k] != quote {
            continue;
        }
        first.get_or_insert(k);
        match bytes.get(k + 1) {
            None => return k,
            Some(&next) if is_space_byte(next) || next == b'>' || next == b'/' => return k,
            _ => {}
        }
    }
    first.unwrap_or_else(|| {
        let mut end = bytes.len();
        while end > start && matches!(bytes[end - 1], b'>' | b'/') {
            end -= 1;
        }
        end
    })
}

/// Scans the raw text of an opening tag (`<name a="1" b=2 c>`) into attribute records.
///
/// The tag name is skipped. Candidates whose name is empty, or that carry an
/// `=` with nothing after it, are discarded.
pub fn parse_attrs(raw: &str) -> Vec<TagAttr> {
    let bytes = raw.as_bytes();
    let len = bytes.len();
    let mut attrs = Vec::new();

    let mut i = usize::from(bytes.first() == Some(&b'<'));
    while i < len && !is_space_byte(bytes[i]) && !at_tag_end(bytes, i) {
        i += 1;
    }

    loop {
        while i < len && (is_space_byte(bytes[i]) || (bytes[i] == b'/' && !is_slash_close(bytes, i))) {
            i += 1;
        }
        if i >= len || at_tag_end(bytes, i) {
            break;
        }

        let name_start = i;
        while i < len && !is_space_byte(bytes[i]) && bytes[i] != b'=' && !at_tag_end(bytes, i) {
            i += 1;
        }
        let name = raw[name_start..i].trim_matches(|c| matches!(c, '"' | '\'' | ' '));

        let mut j = i;
        while j < len && is_space_byte(bytes[j]) {
            j += 1;
        }
        if j >= len || bytes[j] != b'=' {
            if !name.is_empty() {
                attrs.push(TagAttr::new(name, "", None, false));
            }
            if i == name_start {
                // `=` with no name in front; step over it.
                i += 1;
            }
            continue;
        }

        j += 1;
        while j < len && is_space_byte(bytes[j]) {
            j += 1;
        }
        i = j;

        let (value, quote) = if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
            let q = bytes[i];
            let end = closing_quote(bytes, i + 1, q);
            let value = &raw[i + 1..end.max(i + 1)];
            i = (end + 1).min(len);
            (Some(value), Some(q as char))
        } else {
            let start = i;
            while i < len && !is_space_byte(bytes[i]) && bytes[i] != b'=' && !at_tag_end(bytes, i) {
                i += 1;
            }
            let value = &raw[start..i];
            ((!value.trim().is_empty()).then_some(value), None)
        };

        if let Some(value) = value {
            if !name.is_empty() {
                attrs.push(TagAttr::new(name, value, quote, true));
            }
        }
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &str) -> Vec<(String, String)> {
        parse_attrs(raw)
            .into_iter()
            .map(|a| (a.name, a.value))
            .collect()
    }

    #[test]
    fn quoted_and_unquoted_values() {
        let got = pairs(r#"<a href="x.html" target='_blank' rel=nofollow>"#);
        assert_eq!(
            got,
            vec![
                ("href".into(), "x.html".into()),
                ("target".into(), "_blank".into()),
                ("rel".into(), "nofollow".into()),
            ]
        );
    }

    #[test]
    fn names_are_lowercased_but_original_kept() {
        let attrs = parse_attrs(r#"<div CLASS="Big">"#);
        assert_eq!(attrs[0].name, "class");
        assert_eq!(attrs[0].original_name, "CLASS");
        assert_eq!(attrs[0].value, "Big");
        assert_eq!(attrs[0].quote, Some('"'));
    }

    #[test]
    fn empty_quoted_value_is_kept() {
        let attrs = parse_attrs(r#"<td class="" id="x">"#);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].value, "");
        assert!(attrs[0].has_value);
    }

    #[test]
    fn dangling_equals_is_discarded() {
        assert_eq!(pairs("<td width= >"), vec![]);
        assert_eq!(pairs(r#"<td ="x" a="1">"#), vec![("a".into(), "1".into())]);
    }

    #[test]
    fn embedded_quotes_survive() {
        let attrs = parse_attrs(r#"<span title="say "hi"">"#);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].value, r#"say "hi""#);
    }

    #[test]
    fn self_closing_tail_is_not_part_of_value() {
        assert_eq!(
            pairs("<img src=a.png/>"),
            vec![("src".into(), "a.png".into())]
        );
        assert_eq!(
            pairs(r#"<img src="a.png" />"#),
            vec![("src".into(), "a.png".into())]
        );
    }

    #[test]
    fn bare_attributes_are_flags() {
        let attrs = parse_attrs("<input disabled type=checkbox>");
        assert_eq!(attrs.len(), 2);
        assert!(!attrs[0].has_value);
        assert_eq!(attrs[0].to_string(), "disabled");
        assert_eq!(attrs[1].to_string(), "type=checkbox");
    }

    #[test]
    fn spaces_around_equals() {
        assert_eq!(
            pairs(r#"<a href = "x" >"#),
            vec![("href".into(), "x".into())]
        );
    }
}
