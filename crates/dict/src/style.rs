// ABOUTME: Style macro table loaded from a .Style file and expanded inside entry bodies.
// ABOUTME: A `id` marker opens a wrap that lasts until the next marker or the end of the body.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{DictError, Result};

const EDGE_SPACE: &[char] = &['\r', '\n', '\t', ' '];

/// Macro id -> (opening text, closing text).
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    macros: HashMap<String, (String, String)>,
}

impl StyleSheet {
    /// Every three lines form one macro: id, opening text, closing text.
    /// A trailing incomplete group is ignored.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.split('\n').map(|l| l.trim_matches(EDGE_SPACE)).collect();
        let macros = lines
            .chunks_exact(3)
            .map(|group| (group[0].to_string(), (group[1].to_string(), group[2].to_string())))
            .collect();
        Self { macros }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| DictError::read(path, e))?;
        let sheet = Self::parse(&text);
        tracing::debug!(path = %path.display(), macros = sheet.len(), "loaded style sheet");
        Ok(sheet)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<(&str, &str)> {
        self.macros
            .get(id)
            .map(|(open, close)| (open.as_str(), close.as_str()))
    }

    /// Replaces backtick markers with their wrap text.
    ///
    /// Each marker first closes the wrap opened by the previous one. Unknown ids
    /// emit nothing, and a backtick without a partner is kept as text.
    pub fn expand(&self, body: &str) -> String {
        if !body.contains('`') {
            return body.to_string();
        }

        let mut out = String::with_capacity(body.len() + 64);
        let mut active: Option<&str> = None;
        let mut rest = body;

        while let Some(open) = rest.find('`') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('`') else {
                break;
            };
            out.push_str(&rest[..open]);
            if let Some(end) = active.take() {
                out.push_str(end);
            }
            if let Some((start, end)) = self.get(after[..close].trim_matches(EDGE_SPACE)) {
                out.push_str(start);
                active = Some(end);
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        if let Some(end) = active {
            out.push_str(end);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> StyleSheet {
        StyleSheet::parse("1\r\n<b>\r\n</b>\r\n2\r\n<i class=\"ex\">\r\n</i>\r\n")
    }

    #[test]
    fn parses_groups_of_three() {
        let sheet = sheet();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.get("2"), Some(("<i class=\"ex\">", "</i>")));
    }

    #[test]
    fn incomplete_group_is_ignored() {
        assert_eq!(StyleSheet::parse("1\n<b>\n</b>\n2\n<i>").len(), 1);
    }

    #[test]
    fn markers_wrap_until_next_marker() {
        assert_eq!(
            sheet().expand("w\n`1`bold`2`italic"),
            "w\n<b>bold</b><i class=\"ex\">italic</i>"
        );
    }

    #[test]
    fn unknown_marker_closes_and_emits_nothing() {
        assert_eq!(sheet().expand("`1`a`9`b"), "<b>a</b>b");
    }

    #[test]
    fn unpaired_backtick_is_kept() {
        assert_eq!(sheet().expand("`1`it`s"), "<b>it`s</b>");
    }

    #[test]
    fn body_without_markers_is_unchanged() {
        assert_eq!(sheet().expand("plain <p>x</p>"), "plain <p>x</p>");
    }
}
