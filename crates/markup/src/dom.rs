// ABOUTME: Flat token stream ("Dom") with id-range queries, selection, splicing, and serialization.
// ABOUTME: Hierarchy is implicit: the children of a start token are the tokens with ids in (id, close).

use std::collections::HashMap;
use std::fmt;

use crate::selector::TagSelector;
use crate::tag::{Category, Tag};

/// Distance between consecutive allocated ids; the gaps leave room for insertions.
pub const ID_STEP: u64 = 10_000;

/// Hands out strictly increasing token ids (`seq * ID_STEP + ID_STEP / 2`).
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    seq: u64,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> u64 {
        self.seq += 1;
        self.seq * ID_STEP + ID_STEP / 2
    }

    /// Makes every later id larger than `id`.
    pub fn advance_past(&mut self, id: u64) {
        self.seq = self.seq.max(id / ID_STEP);
    }

    /// Number of ids handed out so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Token stream of one entry body.
#[derive(Debug, Clone)]
pub struct Dom {
    tags: Vec<Tag>,
    ids: IdAllocator,
}

impl Dom {
    /// Tokenizes an entry body.
    pub fn parse(body: &str) -> Self {
        crate::tokenizer::tokenize(body)
    }

    pub(crate) fn from_parts(tags: Vec<Tag>, ids: IdAllocator) -> Self {
        Self { tags, ids }
    }

    /// All tokens, dead ones included, in id order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub(crate) fn tags_mut(&mut self) -> &mut [Tag] {
        &mut self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Vector index of the token with `id`.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.tags.binary_search_by_key(&id, |t| t.id).ok()
    }

    pub fn get(&self, id: u64) -> Option<&Tag> {
        self.position(id).map(|pos| &self.tags[pos])
    }

    /// Last id covered by the subtree rooted at `tag`.
    pub fn subtree_end(tag: &Tag) -> u64 {
        if tag.close > 0 {
            tag.close
        } else {
            tag.id
        }
    }

    /// Serializes live tokens with ids in `start..=end`; `text_only` keeps content tokens only.
    pub fn range_to_string(&self, start: u64, end: u64, text_only: bool) -> String {
        let mut out = String::new();
        self.write_range(&mut out, start, end, text_only);
        out
    }

    fn write_range(&self, out: &mut String, start: u64, end: u64, text_only: bool) {
        use std::fmt::Write;

        let from = self.tags.partition_point(|t| t.id < start);
        for tag in self.tags[from..].iter().take_while(|t| t.id <= end) {
            if !tag.is_alive() || (text_only && tag.category != Category::Content) {
                continue;
            }
            let _ = write!(out, "{tag}");
        }
    }

    /// Serializes the whole stream.
    pub fn render(&self, text_only: bool) -> String {
        match (self.tags.first(), self.tags.last()) {
            (Some(first), Some(last)) => self.range_to_string(first.id, last.id, text_only),
            _ => String::new(),
        }
    }

    /// Selects live start/self tokens matching `selector`. Matches nested inside an
    /// already selected subtree are not selected separately.
    pub fn find(&self, selector: &TagSelector) -> Selection<'_> {
        let mut ids = Vec::new();
        let mut skip_until = 0;
        for tag in &self.tags {
            if tag.id < skip_until {
                continue;
            }
            if tag.is_alive() && tag.category.is_opening() && selector.matches(tag) {
                skip_until = tag.close;
                ids.push(tag.id);
            }
        }
        Selection { dom: self, ids }
    }

    /// Inserts a raw token next to `anchor`: before its opening token, or with
    /// `after` set, after its closing token (after the token itself when it has none).
    ///
    /// Returns the new token's id, or `None` when `anchor` does not exist.
    pub fn insert(&mut self, value: impl Into<String>, anchor: u64, after: bool) -> Option<u64> {
        let value = value.into();
        let mut slot = self.insert_slot(anchor, after)?;
        if slot.id.is_none() {
            let anchor = self.renumber(anchor);
            slot = self.insert_slot(anchor, after)?;
        }
        let id = slot.id?;

        let mut tag = Tag::new(Category::Raw, "", value);
        tag.id = id;
        tag.parent = slot.parent;
        self.tags.insert(slot.index, tag);
        self.ids.advance_past(id);
        Some(id)
    }

    /// Where an insertion lands: vector index, free id between the neighbours, parent.
    fn insert_slot(&self, anchor: u64, after: bool) -> Option<InsertSlot> {
        let anchor_pos = self.position(anchor)?;
        let anchor_tag = &self.tags[anchor_pos];

        let boundary = if after && anchor_tag.category == Category::Start && anchor_tag.close > 0 {
            self.position(anchor_tag.close).unwrap_or(anchor_pos)
        } else {
            anchor_pos
        };
        let parent = self.tags[boundary].parent;

        let (index, lo, hi) = if after {
            let lo = self.tags[boundary].id;
            let hi = self
                .tags
                .get(boundary + 1)
                .map_or(lo + ID_STEP, |next| next.id);
            (boundary + 1, lo, hi)
        } else {
            let hi = self.tags[boundary].id;
            let lo = boundary
                .checked_sub(1)
                .map_or(0, |prev| self.tags[prev].id);
            (boundary, lo, hi)
        };

        let id = (hi - lo >= 2).then(|| lo + (hi - lo) / 2);
        Some(InsertSlot { index, id, parent })
    }

    /// Reassigns evenly spaced ids in current order, remapping `close` and `parent`.
    /// Returns the new id of `keep`.
    fn renumber(&mut self, keep: u64) -> u64 {
        let mut ids = IdAllocator::default();
        let mapping: HashMap<u64, u64> = self
            .tags
            .iter()
            .map(|t| (t.id, ids.next_id()))
            .collect();
        let remap = |id: u64| if id == 0 { 0 } else { mapping.get(&id).copied().unwrap_or(0) };

        for tag in &mut self.tags {
            tag.id = remap(tag.id);
            tag.close = remap(tag.close);
            tag.parent = remap(tag.parent);
        }
        self.ids = ids;
        remap(keep)
    }

    /// Appends a synthetic closing tag with a fresh trailing id.
    pub(crate) fn push_close(&mut self, name: &str, parent: u64) -> u64 {
        let mut tag = Tag::new(Category::Close, name, format!("</{name}>"));
        tag.id = self.ids.next_id();
        tag.parent = parent;
        let id = tag.id;
        self.tags.push(tag);
        id
    }

    /// Restores id order after out-of-order appends.
    pub(crate) fn sort(&mut self) {
        self.tags.sort_by_key(|t| t.id);
    }
}

impl fmt::Display for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

struct InsertSlot {
    index: usize,
    id: Option<u64>,
    parent: u64,
}

/// Ordered set of selected subtree roots, borrowed from a [`Dom`].
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    dom: &'a Dom,
    ids: Vec<u64>,
}

impl<'a> Selection<'a> {
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn first(&self) -> Option<u64> {
        self.ids.first().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected root tokens.
    pub fn tags(&self) -> impl Iterator<Item = &'a Tag> + '_ {
        let dom = self.dom;
        self.ids.iter().filter_map(move |&id| dom.get(id))
    }

    /// Keeps the roots whose subtree holds a live descendant whose value contains `text`.
    pub fn filter(&self, text: &str) -> Selection<'a> {
        let dom = self.dom;
        let ids = self
            .tags()
            .filter(|root| {
                let end = Dom::subtree_end(root);
                let from = dom.tags.partition_point(|t| t.id <= root.id);
                dom.tags[from..]
                    .iter()
                    .take_while(|t| t.id < end)
                    .any(|t| t.is_alive() && t.value.contains(text))
            })
            .map(|root| root.id)
            .collect();
        Selection { dom, ids }
    }

    /// Concatenated serialization of every selected subtree.
    pub fn render(&self, text_only: bool) -> String {
        let mut out = String::new();
        for root in self.tags() {
            self.dom
                .write_range(&mut out, root.id, Dom::subtree_end(root), text_only);
        }
        out
    }
}

impl fmt::Display for Selection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> TagSelector {
        TagSelector::parse(s).unwrap()
    }

    #[test]
    fn find_returns_whole_subtree() {
        let dom = Dom::parse("w\n<p>a</p><div class=\"example foo\">x</div><p>b</p>");
        let found = dom.find(&sel("div.example"));
        assert_eq!(found.len(), 1);
        assert_eq!(found.to_string(), "<div class=\"example foo\">x</div>");
    }

    #[test]
    fn find_skips_nested_matches() {
        let dom = Dom::parse("w\n<div><div>x</div></div><div>y</div>");
        let found = dom.find(&sel("div"));
        assert_eq!(found.len(), 2);
        assert_eq!(found.render(true), "xy");
    }

    #[test]
    fn find_ignores_dead_tokens() {
        let mut dom = Dom::parse("w\n<b>x</b><b>y</b>");
        dom.tags_mut()[1].drop_tag();
        let found = dom.find(&sel("b"));
        assert_eq!(found.ids(), &[dom.tags()[4].id]);
    }

    #[test]
    fn filter_narrows_by_descendant_text() {
        let dom = Dom::parse("w\n<li><b>apple</b></li><li>pear</li><li>apricot</li>");
        let found = dom.find(&sel("li"));
        assert_eq!(found.len(), 3);
        let narrowed = found.filter("ap");
        assert_eq!(narrowed.len(), 2);
        assert_eq!(narrowed.render(true), "appleapricot");
    }

    #[test]
    fn self_closing_selection_renders_itself() {
        let dom = Dom::parse("w\n<p>a<img src=\"x.png\">b</p>");
        assert_eq!(dom.find(&sel("img")).to_string(), "<img src=\"x.png\">");
    }

    #[test]
    fn range_to_string_text_only() {
        let dom = Dom::parse("w\n<p>a<b>b</b>c</p>");
        let p = &dom.tags()[1];
        assert_eq!(dom.range_to_string(p.id, p.close, true), "abc");
        assert_eq!(dom.range_to_string(p.id, p.close, false), "<p>a<b>b</b>c</p>");
    }

    #[test]
    fn insert_after_paired_tag_lands_after_close() {
        let mut dom = Dom::parse("w\n<div class=\"example\">E</div><p>z</p>");
        let anchor = dom.find(&sel("div.example")).first().unwrap();
        let id = dom.insert("<i>O</i>", anchor, true).unwrap();
        assert!(dom.get(id).is_some());
        assert_eq!(
            dom.to_string(),
            "w\r\n<div class=\"example\">E</div><i>O</i><p>z</p>"
        );
    }

    #[test]
    fn insert_before_anchor() {
        let mut dom = Dom::parse("w\n<p>a</p>");
        let anchor = dom.tags()[1].id;
        dom.insert("<hr>", anchor, false).unwrap();
        assert_eq!(dom.to_string(), "w\r\n<hr><p>a</p>");
    }

    #[test]
    fn repeated_inserts_keep_order_and_unique_ids() {
        let mut dom = Dom::parse("w\n<p>a</p><p>b</p>");
        for n in 0..20 {
            let anchor = dom.find(&sel("p")).first().unwrap();
            dom.insert(format!("[{n}]"), anchor, true).unwrap();
        }
        let rendered = dom.to_string();
        assert!(rendered.starts_with("w\r\n<p>a</p>[19][18]"));
        assert!(rendered.ends_with("[1][0]<p>b</p>"));

        let ids: Vec<u64> = dom.tags().iter().map(|t| t.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn renumber_preserves_links() {
        let mut dom = Dom::parse("w\n<div><b>x</b></div>");
        for _ in 0..20 {
            let anchor = dom.find(&sel("b")).first().unwrap();
            dom.insert("-", anchor, false).unwrap();
        }
        let div = dom.find(&sel("div")).first().unwrap();
        let div = dom.get(div).unwrap();
        assert_eq!(dom.get(div.close).map(|t| t.name.as_str()), Some("div"));
        let b = dom.find(&sel("b")).first().and_then(|id| dom.get(id)).unwrap();
        assert_eq!(b.parent, div.id);
    }

    #[test]
    fn synthetic_closes_follow_tail_inserts() {
        let mut dom = Dom::parse("w\n<div>x");
        for n in 0..3 {
            let tail = dom.tags().last().unwrap().id;
            dom.insert(format!("[{n}]"), tail, true).unwrap();
        }
        dom.tidy(&crate::TidyRules::default());

        let ids: Vec<u64> = dom.tags().iter().map(|t| t.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "{ids:?}");
        let div = dom.find(&sel("div")).first().and_then(|id| dom.get(id)).unwrap();
        assert_eq!(dom.get(div.close).map(|t| t.name.as_str()), Some("div"));
        assert_eq!(dom.to_string(), "w\r\n<div>x[0][1][2]</div>");
    }

    #[test]
    fn advance_past_skips_used_ids() {
        let mut ids = IdAllocator::default();
        ids.advance_past(45_000);
        assert_eq!(ids.next_id(), 55_000);
        ids.advance_past(12_345);
        assert_eq!(ids.next_id(), 65_000);
    }

    #[test]
    fn insert_with_unknown_anchor_is_none() {
        let mut dom = Dom::parse("w\n<p>a</p>");
        assert_eq!(dom.insert("x", 42, true), None);
    }
}
