// ABOUTME: Rule-driven single-pass rewrite of a token stream: drop, unwrap, normalize, and auto-close.
// ABOUTME: TidyRules carries the selector lists and flags; TidyRulesBuilder assembles them fluently.

use std::collections::HashSet;

use aho_corasick::AhoCorasick;

use crate::dom::Dom;
use crate::selector::TagSelector;
use crate::tag::Category;
use crate::text::strip_space_more;

/// Tags that never receive a synthetic close at the end of an entry.
pub const DEFAULT_SELF_TERMINATING: &[&str] =
    &["a", "img", "hr", "br", "tr", "td", "th", "thead", "tbody", "link"];

/// Document wrappers removed from every entry.
const STRUCTURAL_TAGS: &[&str] = &["html", "head", "body", "!doctype"];

/// Elements whose text is only trimmed, never collapsed.
const VERBATIM_TAGS: &[&str] = &["script", "style", "pre"];

/// Elements around which a whitespace-only text run carries no meaning.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul",
];

/// Cleanup rules for one tidy run. Immutable once built and shared across workers.
#[derive(Debug, Clone)]
pub struct TidyRules {
    pub drop: Vec<TagSelector>,
    pub unwrap: Vec<TagSelector>,
    pub skip_content: Vec<String>,
    pub skip_comment: bool,
    pub skip_events: bool,
    pub skip_empty_attr: bool,
    pub strip_attrs: Vec<String>,
    pub escape_brackets: bool,
    pub self_terminating: Vec<String>,
    skip_matcher: Option<AhoCorasick>,
}

impl Default for TidyRules {
    fn default() -> Self {
        TidyRulesBuilder::new().build()
    }
}

impl TidyRules {
    pub fn builder() -> TidyRulesBuilder {
        TidyRulesBuilder::new()
    }

    /// True when `text` contains any skip substring.
    pub fn skips(&self, text: &str) -> bool {
        match &self.skip_matcher {
            Some(matcher) => matcher.is_match(text),
            None => self.skip_content.iter().any(|s| text.contains(s.as_str())),
        }
    }

    fn self_terminates(&self, name: &str) -> bool {
        self.self_terminating.iter().any(|n| n == name)
    }
}

/// Builder for [`TidyRules`].
#[derive(Debug, Clone)]
pub struct TidyRulesBuilder {
    rules: TidyRules,
}

impl TidyRulesBuilder {
    pub fn new() -> Self {
        Self {
            rules: TidyRules {
                drop: Vec::new(),
                unwrap: Vec::new(),
                skip_content: Vec::new(),
                skip_comment: false,
                skip_events: false,
                skip_empty_attr: false,
                strip_attrs: Vec::new(),
                escape_brackets: false,
                self_terminating: DEFAULT_SELF_TERMINATING.iter().map(|s| s.to_string()).collect(),
                skip_matcher: None,
            },
        }
    }

    /// Remove every subtree whose root matches `selector`.
    pub fn drop(mut self, selector: TagSelector) -> Self {
        self.rules.drop.push(selector);
        self
    }

    /// Remove the matching tag and its close, keeping the children.
    pub fn unwrap(mut self, selector: TagSelector) -> Self {
        self.rules.unwrap.push(selector);
        self
    }

    /// Drop text runs containing `text`. Empty strings are ignored.
    pub fn skip_content(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.rules.skip_content.push(text);
        }
        self
    }

    pub fn skip_comment(mut self, on: bool) -> Self {
        self.rules.skip_comment = on;
        self
    }

    /// Strip `on*` event-handler attributes.
    pub fn skip_events(mut self, on: bool) -> Self {
        self.rules.skip_events = on;
        self
    }

    /// Strip attributes written with an empty value.
    pub fn skip_empty_attr(mut self, on: bool) -> Self {
        self.rules.skip_empty_attr = on;
        self
    }

    /// Strip the attribute called `name` wherever it appears.
    pub fn strip_attr(mut self, name: impl Into<String>) -> Self {
        self.rules.strip_attrs.push(name.into().to_ascii_lowercase());
        self
    }

    /// Write literal `<`/`>` in text as `&lt`/`&gt`.
    pub fn escape_brackets(mut self, on: bool) -> Self {
        self.rules.escape_brackets = on;
        self
    }

    /// Replace the list of tags exempt from synthetic closing.
    pub fn self_terminating<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.self_terminating = names
            .into_iter()
            .map(|n| n.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn build(mut self) -> TidyRules {
        if !self.rules.skip_content.is_empty() {
            match AhoCorasick::new(&self.rules.skip_content) {
                Ok(matcher) => self.rules.skip_matcher = Some(matcher),
                Err(err) => {
                    tracing::warn!(error = %err, "skip-content matcher unavailable, using plain search");
                }
            }
        }
        self.rules
    }
}

impl Default for TidyRulesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What one tidy pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TidyReport {
    pub dropped: usize,
    pub orphan_closes: usize,
    pub synthesized_closes: usize,
    pub stripped_attrs: usize,
}

impl Dom {
    /// Rewrites the stream in place according to `rules`.
    ///
    /// The first token (the headword line) is left alone. Afterwards every start
    /// tag outside the self-terminating list has a matching close.
    pub fn tidy(&mut self, rules: &TidyRules) -> TidyReport {
        let mut report = TidyReport::default();
        // Indices of live start tokens awaiting their close.
        let mut open: Vec<usize> = Vec::new();
        let mut drop_until = 0u64;
        let mut unwrap_closes: HashSet<u64> = HashSet::new();
        // Index of the last token that survived processing.
        let mut prev: Option<usize> = None;

        for idx in 0..self.len() {
            let tag = &mut self.tags_mut()[idx];
            if drop_until > 0 {
                if tag.id == drop_until {
                    drop_until = 0;
                }
                if tag.is_alive() {
                    tag.drop_tag();
                    report.dropped += 1;
                }
                continue;
            }

            if tag.is_alive() && tag.category.is_opening() && !tag.name.is_empty() {
                if rules.drop.iter().any(|s| s.matches(tag)) {
                    tag.drop_tag();
                    report.dropped += 1;
                    drop_until = tag.close;
                    continue;
                }
                if rules.unwrap.iter().any(|s| s.matches(tag)) {
                    tag.drop_tag();
                    report.dropped += 1;
                    if tag.close > 0 {
                        unwrap_closes.insert(tag.close);
                    }
                }
            }
            if unwrap_closes.remove(&tag.id) && tag.is_alive() {
                tag.drop_tag();
                report.dropped += 1;
            }
            if !tag.is_alive() {
                continue;
            }
            if STRUCTURAL_TAGS.contains(&tag.name.as_str()) {
                tag.drop_tag();
                report.dropped += 1;
                continue;
            }

            let category = tag.category;
            match category {
                Category::Content if idx > 0 => {
                    self.tidy_content(idx, rules, &mut open, prev, &unwrap_closes, &mut report);
                }
                Category::Comment if rules.skip_comment => {
                    tag.drop_tag();
                    report.dropped += 1;
                }
                Category::Start => open.push(idx),
                Category::Close => {
                    let matched = open
                        .last()
                        .is_some_and(|&top| self.tags()[top].name == self.tags()[idx].name);
                    if matched {
                        open.pop();
                    } else {
                        self.tags_mut()[idx].drop_tag();
                        report.dropped += 1;
                        report.orphan_closes += 1;
                    }
                }
                _ => {}
            }

            let tag = &mut self.tags_mut()[idx];
            if !tag.is_alive() {
                continue;
            }
            if tag.category.is_opening() {
                if rules.skip_events {
                    report.stripped_attrs += tag.strip_events();
                }
                if rules.skip_empty_attr {
                    report.stripped_attrs += tag.strip_empty();
                }
                if !rules.strip_attrs.is_empty() {
                    report.stripped_attrs += tag.strip_named(&rules.strip_attrs);
                }
            }
            prev = Some(idx);
        }

        while let Some(top) = open.pop() {
            let (name, parent) = {
                let tag = &self.tags()[top];
                (tag.name.clone(), tag.parent)
            };
            if rules.self_terminates(&name) {
                continue;
            }
            let close = self.push_close(&name, parent);
            self.tags_mut()[top].close = close;
            report.synthesized_closes += 1;
        }
        self.sort();

        report
    }

    fn tidy_content(
        &mut self,
        idx: usize,
        rules: &TidyRules,
        open: &mut Vec<usize>,
        prev: Option<usize>,
        unwrap_closes: &HashSet<u64>,
        report: &mut TidyReport,
    ) {
        let verbatim = open
            .iter()
            .any(|&i| VERBATIM_TAGS.contains(&self.tags()[i].name.as_str()));

        if verbatim {
            let tag = &mut self.tags_mut()[idx];
            let trimmed = tag.value.trim_matches(['\r', '\n', '\t', ' ']).to_string();
            if trimmed.is_empty() {
                tag.drop_tag();
                report.dropped += 1;
            } else {
                tag.value = trimmed;
            }
            return;
        }

        if rules.skips(&self.tags()[idx].value) {
            self.tags_mut()[idx].drop_tag();
            report.dropped += 1;
            self.drop_emptied_pair(idx, open, report);
            return;
        }

        let after_space = prev.is_some_and(|p| self.ends_in_space(p));
        let text = strip_space_more(&self.tags()[idx].value);
        if text.is_empty() {
            let keep = !after_space && self.is_inline_gap(idx, prev, rules, unwrap_closes);
            let tag = &mut self.tags_mut()[idx];
            if (tag.leading_space || tag.trailing_space) && keep {
                tag.value = " ".to_string();
            } else {
                tag.drop_tag();
                report.dropped += 1;
            }
            return;
        }

        let tag = &mut self.tags_mut()[idx];
        let mut value = String::with_capacity(text.len() + 2);
        if tag.leading_space && !after_space {
            value.push(' ');
        }
        value.push_str(&text);
        if tag.trailing_space {
            value.push(' ');
        }
        if rules.escape_brackets {
            value = value.replace('<', "&lt").replace('>', "&gt");
        }
        tag.value = value;
    }

    /// After the only child of `<x>...</x>` was skipped, removes the pair too.
    fn drop_emptied_pair(&mut self, idx: usize, open: &mut Vec<usize>, report: &mut TidyReport) {
        let Some(&top) = open.last() else {
            return;
        };
        let tags = self.tags();
        let closes_next = tags[top].close > 0
            && tags.get(idx + 1).is_some_and(|next| next.id == tags[top].close);
        if top + 1 != idx || !closes_next {
            return;
        }

        open.pop();
        let tags = self.tags_mut();
        tags[top].drop_tag();
        tags[idx + 1].drop_tag();
        report.dropped += 2;
    }

    /// A kept text token at `idx > 0` that already ends with a space.
    fn ends_in_space(&self, idx: usize) -> bool {
        let tag = &self.tags()[idx];
        idx > 0 && tag.category == Category::Content && tag.value.ends_with(' ')
    }

    /// A whitespace-only run at `idx` separates two inline neighbours.
    fn is_inline_gap(
        &self,
        idx: usize,
        prev: Option<usize>,
        rules: &TidyRules,
        unwrap_closes: &HashSet<u64>,
    ) -> bool {
        let tags = self.tags();
        let inline = |i: usize| !BLOCK_TAGS.contains(&tags[i].name.as_str());
        let before = prev.is_some_and(|p| {
            p > 0
                && matches!(
                    tags[p].category,
                    Category::Close | Category::Content | Category::SelfClosing
                )
                && inline(p)
        });
        let after = self.next_survivor(idx, rules, unwrap_closes).is_some_and(|next| {
            matches!(
                tags[next].category,
                Category::Start | Category::Content | Category::SelfClosing
            ) && inline(next)
        });
        before && after
    }

    /// Index of the first token after `idx` that this pass will keep.
    fn next_survivor(
        &self,
        idx: usize,
        rules: &TidyRules,
        unwrap_closes: &HashSet<u64>,
    ) -> Option<usize> {
        let tags = self.tags();
        let mut unwrapped: HashSet<u64> = HashSet::new();
        let mut next = idx + 1;
        while let Some(tag) = tags.get(next) {
            next += 1;
            if !tag.is_alive() || STRUCTURAL_TAGS.contains(&tag.name.as_str()) {
                continue;
            }
            match tag.category {
                Category::Start | Category::SelfClosing if !tag.name.is_empty() => {
                    if rules.drop.iter().any(|s| s.matches(tag)) {
                        if let Some(end) = self.position(tag.close).filter(|_| tag.close > 0) {
                            next = end + 1;
                        }
                        continue;
                    }
                    if rules.unwrap.iter().any(|s| s.matches(tag)) {
                        unwrapped.insert(tag.close);
                        continue;
                    }
                }
                Category::Close if unwrap_closes.contains(&tag.id) || unwrapped.contains(&tag.id) => {
                    continue;
                }
                Category::Comment if rules.skip_comment => continue,
                Category::Content
                    if strip_space_more(&tag.value).is_empty() || rules.skips(&tag.value) =>
                {
                    continue;
                }
                _ => {}
            }
            return Some(next - 1);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> TagSelector {
        TagSelector::parse(s).unwrap()
    }

    fn tidy(body: &str, rules: &TidyRules) -> String {
        let mut dom = Dom::parse(body);
        dom.tidy(rules);
        dom.to_string()
    }

    #[test]
    fn drop_removes_whole_subtree() {
        let rules = TidyRules::builder().drop(sel("div.ad")).build();
        assert_eq!(
            tidy("w\n<p>a</p><div class=\"ad\"><b>x</b></div><p>b</p>", &rules),
            "w\r\n<p>a</p><p>b</p>"
        );
    }

    #[test]
    fn drop_without_close_removes_only_the_tag() {
        let rules = TidyRules::builder().drop(sel("img")).build();
        assert_eq!(tidy("w\n<p>a<img src=x>b</p>", &rules), "w\r\n<p>ab</p>");
    }

    #[test]
    fn unwrap_keeps_children() {
        let rules = TidyRules::builder().unwrap(sel("span.mark")).build();
        assert_eq!(
            tidy("w\n<p><span class=\"mark\">hello</span></p>", &rules),
            "w\r\n<p>hello</p>"
        );
    }

    #[test]
    fn structural_wrappers_are_removed() {
        let rules = TidyRules::default();
        assert_eq!(
            tidy("w\n<html><body><p>x</p></body></html>", &rules),
            "w\r\n<p>x</p>"
        );
    }

    #[test]
    fn unterminated_tags_are_closed_in_reverse_order() {
        let mut dom = Dom::parse("w\n<div><p>text");
        let report = dom.tidy(&TidyRules::default());
        assert_eq!(dom.to_string(), "w\r\n<div><p>text</p></div>");
        assert_eq!(report.synthesized_closes, 2);
    }

    #[test]
    fn self_terminating_tags_are_not_closed() {
        let rules = TidyRules::default();
        assert_eq!(
            tidy("w\n<div><a href=\"x\">y", &rules),
            "w\r\n<div><a href=\"x\">y</div>"
        );
    }

    #[test]
    fn orphan_close_is_dropped() {
        let mut dom = Dom::parse("w\n<p>a</b></p>");
        let report = dom.tidy(&TidyRules::default());
        assert_eq!(dom.to_string(), "w\r\n<p>a</p>");
        assert_eq!(report.orphan_closes, 1);
    }

    #[test]
    fn whitespace_is_collapsed_with_edge_spaces_kept() {
        let rules = TidyRules::default();
        assert_eq!(
            tidy("w\n<p>a \r\n  b<b>c</b>  d\n</p>", &rules),
            "w\r\n<p>a b<b>c</b> d </p>"
        );
    }

    #[test]
    fn whitespace_between_inline_tags_becomes_one_space() {
        let rules = TidyRules::default();
        assert_eq!(
            tidy("w\n<p><b>a</b>\r\n  <i>b</i></p>", &rules),
            "w\r\n<p><b>a</b> <i>b</i></p>"
        );
        assert_eq!(
            tidy("w\n<div>a</div>\r\n<div>b</div>", &rules),
            "w\r\n<div>a</div><div>b</div>"
        );
    }

    #[test]
    fn verbatim_context_is_only_trimmed() {
        let rules = TidyRules::default();
        assert_eq!(
            tidy("w\n<pre>\n  a\n  b\n</pre>", &rules),
            "w\r\n<pre>a\n  b</pre>"
        );
    }

    #[test]
    fn skip_content_drops_text_and_empty_pair() {
        let rules = TidyRules::builder().skip_content("ADVERT").build();
        assert_eq!(
            tidy("w\n<p>keep<b>ADVERT here</b></p>", &rules),
            "w\r\n<p>keep</p>"
        );
        assert_eq!(
            tidy("w\n<p>keep ADVERT<b>x</b></p>", &rules),
            "w\r\n<p><b>x</b></p>"
        );
    }

    #[test]
    fn comments_are_kept_unless_skipped() {
        let body = "w\n<p>a<!-- note -->b</p>";
        assert_eq!(tidy(body, &TidyRules::default()), "w\r\n<p>a<!-- note -->b</p>");
        let rules = TidyRules::builder().skip_comment(true).build();
        assert_eq!(tidy(body, &rules), "w\r\n<p>ab</p>");
    }

    #[test]
    fn brackets_are_escaped_in_text() {
        let rules = TidyRules::builder().escape_brackets(true).build();
        assert_eq!(tidy("w\n<p>1 < 2</p>", &rules), "w\r\n<p>1 &lt 2</p>");
    }

    #[test]
    fn attribute_stripping() {
        let rules = TidyRules::builder()
            .skip_events(true)
            .skip_empty_attr(true)
            .strip_attr("Style")
            .build();
        let mut dom = Dom::parse("w\n<a href=\"x\" onclick=\"y\" class=\"\" style=\"c\">z</a>");
        let report = dom.tidy(&rules);
        assert_eq!(dom.to_string(), "w\r\n<a href=\"x\">z</a>");
        assert_eq!(report.stripped_attrs, 3);
    }

    #[test]
    fn headword_is_untouched() {
        let rules = TidyRules::builder().skip_content("w").build();
        assert_eq!(tidy("w\n<p>x</p>", &rules), "w\r\n<p>x</p>");
    }

    #[test]
    fn custom_self_terminating_list() {
        let rules = TidyRules::builder().self_terminating(["P"]).build();
        assert_eq!(tidy("w\n<div><p>x", &rules), "w\r\n<div><p>x</div>");
    }
}
