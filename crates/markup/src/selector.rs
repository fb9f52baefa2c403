// ABOUTME: Compact tag selectors (tag, tag.class, tag#id, tag[attr=value]) and their evaluation.
// ABOUTME: Selectors are parsed once from configuration strings and matched against single tokens.

use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;
use crate::tag::Tag;

/// Which part of a token a selector inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Tag,
    Class,
    Id,
    Attr,
}

/// Test applied to an attribute value by `[attr...]` selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuePredicate {
    /// `[attr]` or `[attr=]`: the attribute is present.
    Exists,
    /// `[attr=*]`: present with a non-empty value.
    NonEmpty,
    /// `[attr=^x]`
    Prefix(String),
    /// `[attr=$x]`
    Suffix(String),
    /// `[attr=~x]`
    Contains(String),
    /// `[attr=x]`
    Exact(String),
}

impl ValuePredicate {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim_matches(|c| matches!(c, '\r' | '\n' | '\t' | '"' | '\'' | ' '));
        if raw.is_empty() {
            return ValuePredicate::Exists;
        }
        if raw == "*" {
            return ValuePredicate::NonEmpty;
        }
        if let Some(rest) = raw.strip_prefix('^') {
            return ValuePredicate::Prefix(rest.to_string());
        }
        if let Some(rest) = raw.strip_prefix('$') {
            return ValuePredicate::Suffix(rest.to_string());
        }
        if let Some(rest) = raw.strip_prefix('~') {
            return ValuePredicate::Contains(rest.to_string());
        }
        ValuePredicate::Exact(raw.to_string())
    }

    pub fn test(&self, value: &str) -> bool {
        match self {
            ValuePredicate::Exists => true,
            ValuePredicate::NonEmpty => !value.is_empty(),
            ValuePredicate::Prefix(p) => value.starts_with(p.as_str()),
            ValuePredicate::Suffix(s) => value.ends_with(s.as_str()),
            ValuePredicate::Contains(s) => value.contains(s.as_str()),
            ValuePredicate::Exact(s) => value == s,
        }
    }
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelector {
    pub kind: SelectorKind,
    /// Lowercase tag-name constraint; `None` matches any tag.
    pub tag: Option<String>,
    /// Attribute inspected by class/id/attr selectors.
    pub attr: String,
    /// Requested class names (class selectors) or the single id (id selectors).
    pub values: Vec<String>,
    /// Value test for attr selectors.
    pub predicate: ValuePredicate,
}

impl TagSelector {
    /// Parses `tag`, `tag.class[.class]`, `tag#id` or `tag[attr=value]`; the tag
    /// part may be empty. The leftmost of `.`, `#`, `[` decides the kind.
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(SelectorError::Empty);
        }

        let Some(pos) = selector.find(['.', '#', '[']) else {
            return Ok(Self::tag(selector));
        };

        let tag = Some(selector[..pos].to_ascii_lowercase()).filter(|t| !t.is_empty());
        let rest = &selector[pos + 1..];

        let parsed = match selector.as_bytes()[pos] {
            b'.' => {
                let values: Vec<String> = rest
                    .split('.')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
                if values.is_empty() {
                    return Err(SelectorError::MissingValue(selector.to_string()));
                }
                Self {
                    kind: SelectorKind::Class,
                    tag,
                    attr: "class".to_string(),
                    values,
                    predicate: ValuePredicate::Exists,
                }
            }
            b'#' => {
                if rest.is_empty() {
                    return Err(SelectorError::MissingValue(selector.to_string()));
                }
                Self {
                    kind: SelectorKind::Id,
                    tag,
                    attr: "id".to_string(),
                    values: vec![rest.to_string()],
                    predicate: ValuePredicate::Exists,
                }
            }
            _ => {
                let inner = rest.trim_end_matches([']', ' ']);
                let (attr, value) = inner.split_once('=').unwrap_or((inner, ""));
                let attr = attr.trim().to_ascii_lowercase();
                if attr.is_empty() {
                    return Err(SelectorError::MissingAttribute(selector.to_string()));
                }
                Self {
                    kind: SelectorKind::Attr,
                    tag,
                    attr,
                    values: Vec::new(),
                    predicate: ValuePredicate::parse(value),
                }
            }
        };

        Ok(parsed)
    }

    /// Bare tag-name selector.
    pub fn tag(name: &str) -> Self {
        Self {
            kind: SelectorKind::Tag,
            tag: Some(name.to_ascii_lowercase()),
            attr: String::new(),
            values: Vec::new(),
            predicate: ValuePredicate::Exists,
        }
    }

    fn name_allows(&self, tag: &Tag) -> bool {
        self.tag.as_deref().map_or(true, |name| name == tag.name)
    }

    /// Evaluates the selector against one token.
    pub fn matches(&self, tag: &Tag) -> bool {
        if self.kind == SelectorKind::Tag {
            return self.tag.as_deref() == Some(tag.name.as_str());
        }
        if !tag.has_attr() || !self.name_allows(tag) {
            return false;
        }

        match self.kind {
            SelectorKind::Class => tag.attr(&self.attr).is_some_and(|attr| {
                attr.value
                    .split_whitespace()
                    .any(|class| self.values.iter().any(|want| want == class))
            }),
            SelectorKind::Id => {
                let want = self.values.first().map(String::as_str);
                ["id", "name"]
                    .iter()
                    .filter_map(|name| tag.attr(name))
                    .any(|attr| Some(attr.value.as_str()) == want)
            }
            SelectorKind::Attr => tag
                .attr(&self.attr)
                .is_some_and(|attr| self.predicate.test(&attr.value)),
            SelectorKind::Tag => false,
        }
    }
}

impl FromStr for TagSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagSelector::parse(s)
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag.as_deref().unwrap_or("");
        match self.kind {
            SelectorKind::Tag => write!(f, "{tag}"),
            SelectorKind::Class => write!(f, "{tag}.{}", self.values.join(".")),
            SelectorKind::Id => write!(f, "{tag}#{}", self.values.join("")),
            SelectorKind::Attr => {
                let value = match &self.predicate {
                    ValuePredicate::Exists => String::new(),
                    ValuePredicate::NonEmpty => "=*".to_string(),
                    ValuePredicate::Prefix(v) => format!("=^{v}"),
                    ValuePredicate::Suffix(v) => format!("=${v}"),
                    ValuePredicate::Contains(v) => format!("=~{v}"),
                    ValuePredicate::Exact(v) => format!("={v}"),
                };
                write!(f, "{tag}[{}{value}]", self.attr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Category;

    fn start(raw: &str) -> Tag {
        let name = raw
            .trim_start_matches('<')
            .split(|c: char| c.is_whitespace() || c == '>')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        Tag::new(Category::Start, name, raw)
    }

    #[test]
    fn parse_kinds() {
        assert_eq!(TagSelector::parse("div").unwrap().kind, SelectorKind::Tag);
        let class = TagSelector::parse("div.a.b").unwrap();
        assert_eq!(class.kind, SelectorKind::Class);
        assert_eq!(class.tag.as_deref(), Some("div"));
        assert_eq!(class.values, vec!["a", "b"]);

        let id = TagSelector::parse("#main").unwrap();
        assert_eq!(id.kind, SelectorKind::Id);
        assert_eq!(id.tag, None);

        let attr = TagSelector::parse("a[href=^http]").unwrap();
        assert_eq!(attr.kind, SelectorKind::Attr);
        assert_eq!(attr.attr, "href");
        assert_eq!(attr.predicate, ValuePredicate::Prefix("http".into()));
    }

    #[test]
    fn leftmost_delimiter_wins() {
        let sel = TagSelector::parse("a[href=x.html]").unwrap();
        assert_eq!(sel.kind, SelectorKind::Attr);
        assert_eq!(sel.predicate, ValuePredicate::Exact("x.html".into()));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(TagSelector::parse("  "), Err(SelectorError::Empty));
        assert!(matches!(
            TagSelector::parse("div."),
            Err(SelectorError::MissingValue(_))
        ));
        assert!(matches!(
            TagSelector::parse("a[=x]"),
            Err(SelectorError::MissingAttribute(_))
        ));
    }

    #[test]
    fn tag_selector_matches_name_only() {
        let sel: TagSelector = "B".parse().unwrap();
        assert!(sel.matches(&start("<b>")));
        assert!(sel.matches(&start(r#"<b class="x">"#)));
        assert!(!sel.matches(&start("<i>")));
    }

    #[test]
    fn class_selector_checks_any_token() {
        let sel: TagSelector = "div.example".parse().unwrap();
        assert!(sel.matches(&start(r#"<div class="example foo">"#)));
        assert!(sel.matches(&start(r#"<div class="foo  example">"#)));
        assert!(!sel.matches(&start(r#"<div class="examples">"#)));
        assert!(!sel.matches(&start(r#"<span class="example">"#)));
        assert!(!sel.matches(&start("<div>")));
    }

    #[test]
    fn id_selector_accepts_name_attribute() {
        let sel: TagSelector = "a#top".parse().unwrap();
        assert!(sel.matches(&start(r#"<a id="top">"#)));
        assert!(sel.matches(&start(r#"<a name="top">"#)));
        assert!(!sel.matches(&start(r#"<a id="bottom">"#)));
    }

    #[test]
    fn attr_predicates() {
        let tag = start(r#"<a href="http://x.org/a.mp3" title="">"#);
        let check = |s: &str| TagSelector::parse(s).unwrap().matches(&tag);
        assert!(check("a[href]"));
        assert!(check("a[href=*]"));
        assert!(check("a[href=^http]"));
        assert!(check("a[href=$.mp3]"));
        assert!(check("a[href=~x.org]"));
        assert!(check("a[href=\"http://x.org/a.mp3\"]"));
        assert!(check("[title]"));
        assert!(!check("a[title=*]"));
        assert!(!check("a[href=^ftp]"));
        assert!(!check("a[rel]"));
        assert!(!check("img[href]"));
    }

    #[test]
    fn display_round_trips() {
        for s in ["div", "div.a.b", "a#top", "a[href=^http]", "[title]"] {
            assert_eq!(TagSelector::parse(s).unwrap().to_string(), s);
        }
    }
}
