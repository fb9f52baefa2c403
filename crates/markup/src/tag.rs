// ABOUTME: Token model for tokenized entry bodies: Category, Tag, and attribute access.
// ABOUTME: Attributes are parsed lazily on first access and cached on the token.

use std::fmt;

use once_cell::unsync::OnceCell;

use crate::attrs::{parse_attrs, TagAttr};

/// Syntactic class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Start,
    Close,
    SelfClosing,
    Content,
    Comment,
    Raw,
}

impl Category {
    /// Start and self-closing tokens are the ones that carry attributes and match selectors.
    pub fn is_opening(self) -> bool {
        matches!(self, Category::Start | Category::SelfClosing)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Start => "start",
            Category::Close => "close",
            Category::SelfClosing => "self",
            Category::Content => "content",
            Category::Comment => "comment",
            Category::Raw => "raw",
        };
        f.write_str(s)
    }
}

/// One token of an entry body.
///
/// `id` orders tokens within a [`crate::Dom`]. `close` is the id of the matching
/// closing token (0 when unmatched or self-closing) and `parent` the id of the
/// enclosing start token (0 at top level).
#[derive(Debug, Clone)]
pub struct Tag {
    pub category: Category,
    pub name: String,
    pub value: String,
    pub id: u64,
    pub close: u64,
    pub parent: u64,
    /// Content tokens only: the source text began with whitespace.
    pub leading_space: bool,
    /// Content tokens only: the source text ended with whitespace.
    pub trailing_space: bool,
    alive: bool,
    has_attr: bool,
    dynamic: bool,
    attrs: OnceCell<Vec<TagAttr>>,
}

impl Tag {
    pub fn new(category: Category, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let has_attr = category.is_opening() && value.find('=').is_some_and(|pos| pos > 0);
        Self {
            category,
            name: name.into(),
            value,
            id: 0,
            close: 0,
            parent: 0,
            leading_space: false,
            trailing_space: false,
            alive: true,
            has_attr,
            dynamic: false,
            attrs: OnceCell::new(),
        }
    }

    /// A content token, remembering whether the raw text had whitespace at its edges.
    pub fn content(value: impl Into<String>) -> Self {
        let value = value.into();
        let bytes = value.as_bytes();
        let leading = bytes.first().is_some_and(|&b| crate::text::is_space_byte(b));
        let trailing = bytes.last().is_some_and(|&b| crate::text::is_space_byte(b));
        let mut tag = Self::new(Category::Content, "", value);
        tag.leading_space = leading;
        tag.trailing_space = trailing;
        tag
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Marks the token dead. Dead tokens stay in the stream but are never serialized.
    pub fn drop_tag(&mut self) {
        self.alive = false;
    }

    pub fn has_attr(&self) -> bool {
        self.has_attr
    }

    /// True once an attribute was removed; serialization then rebuilds the opening tag.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Cached attribute list, parsed from `value` on first use.
    pub fn attrs(&self) -> &[TagAttr] {
        if !self.has_attr {
            return &[];
        }
        self.attrs.get_or_init(|| parse_attrs(&self.value))
    }

    fn attrs_mut(&mut self) -> &mut [TagAttr] {
        if !self.has_attr {
            return &mut [];
        }
        self.attrs.get_or_init(|| parse_attrs(&self.value));
        match self.attrs.get_mut() {
            Some(attrs) => attrs.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Live attribute by lowercase name.
    pub fn attr(&self, name: &str) -> Option<&TagAttr> {
        self.attrs().iter().find(|a| a.alive && a.name == name)
    }

    /// Kills every attribute matching `pred` on an opening tag; returns how many were removed.
    fn strip_where(&mut self, pred: impl Fn(&TagAttr) -> bool) -> usize {
        if !self.has_attr || !self.category.is_opening() {
            return 0;
        }
        let mut removed = 0;
        for attr in self.attrs_mut() {
            if attr.alive && pred(attr) {
                attr.alive = false;
                removed += 1;
            }
        }
        if removed > 0 {
            self.dynamic = true;
        }
        removed
    }

    /// Removes event-handler attributes (`onclick`, `onload`, ...).
    pub fn strip_events(&mut self) -> usize {
        self.strip_where(|a| a.name.starts_with("on"))
    }

    /// Removes attributes written with an empty value (`class=""`).
    pub fn strip_empty(&mut self) -> usize {
        self.strip_where(|a| a.has_value && a.value.is_empty())
    }

    /// Removes attributes whose lowercase name is in `names`.
    pub fn strip_named(&mut self, names: &[String]) -> usize {
        self.strip_where(|a| names.iter().any(|n| *n == a.name))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.dynamic {
            return f.write_str(&self.value);
        }

        write!(f, "<{}", self.name)?;
        let mut written = 0;
        for attr in self.attrs().iter().filter(|a| a.alive) {
            write!(f, " {attr}")?;
            written += 1;
        }
        if self.value.ends_with("/>") {
            if written > 0 {
                f.write_str(" />")
            } else {
                f.write_str("/>")
            }
        } else {
            f.write_str(">")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_attr_requires_equals_after_start() {
        assert!(Tag::new(Category::Start, "a", r#"<a href="x">"#).has_attr());
        assert!(!Tag::new(Category::Start, "b", "<b>").has_attr());
        assert!(!Tag::new(Category::Content, "", "a=b").has_attr());
    }

    #[test]
    fn attr_lookup_is_lazy_and_cached() {
        let tag = Tag::new(Category::Start, "a", r#"<a HREF="x" title='t'>"#);
        assert_eq!(tag.attr("href").map(|a| a.value.as_str()), Some("x"));
        assert_eq!(tag.attr("title").map(|a| a.value.as_str()), Some("t"));
        assert!(tag.attr("missing").is_none());
        assert_eq!(tag.attrs().len(), 2);
    }

    #[test]
    fn strip_events_rebuilds_tag() {
        let mut tag = Tag::new(Category::Start, "a", r#"<a href="x" onclick="y">"#);
        assert_eq!(tag.strip_events(), 1);
        assert!(tag.is_dynamic());
        assert_eq!(tag.to_string(), r#"<a href="x">"#);
    }

    #[test]
    fn strip_after_lookup_reuses_cached_attrs() {
        let mut tag = Tag::new(Category::Start, "a", r#"<a onclick="y" href="x">"#);
        assert_eq!(tag.attrs().len(), 2);
        assert_eq!(tag.strip_events(), 1);
        assert_eq!(tag.strip_events(), 0);
        assert!(tag.attr("onclick").is_none());
        assert_eq!(tag.to_string(), r#"<a href="x">"#);
    }

    #[test]
    fn strip_empty_keeps_self_closing_tail() {
        let mut tag = Tag::new(Category::SelfClosing, "img", r#"<img alt="" src="p.png" />"#);
        tag.strip_empty();
        assert_eq!(tag.to_string(), r#"<img src="p.png" />"#);

        let mut bare = Tag::new(Category::SelfClosing, "br", r#"<br class=""/>"#);
        bare.strip_empty();
        assert_eq!(bare.to_string(), "<br/>");
    }

    #[test]
    fn strip_named_only_touches_listed_attributes() {
        let mut tag = Tag::new(Category::Start, "p", r#"<p style="color:red" class="x">"#);
        assert_eq!(tag.strip_named(&["style".to_string()]), 1);
        assert_eq!(tag.to_string(), r#"<p class="x">"#);
    }

    #[test]
    fn untouched_tag_echoes_source() {
        let tag = Tag::new(Category::Start, "p", r#"<p  class = "x" >"#);
        assert_eq!(tag.to_string(), r#"<p  class = "x" >"#);
    }

    #[test]
    fn content_tracks_edge_whitespace() {
        let tag = Tag::content(" word\n");
        assert!(tag.leading_space);
        assert!(tag.trailing_space);
        let tag = Tag::content("word");
        assert!(!tag.leading_space && !tag.trailing_space);
    }
}
