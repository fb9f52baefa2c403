// ABOUTME: Recovery-oriented scanner that turns an entry body into a flat token stream.
// ABOUTME: Links start/close pairs through an open-tag stack and never fails on malformed input.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::dom::{Dom, IdAllocator};
use crate::tag::{Category, Tag};
use crate::text::{decode_headword, is_space_byte, strip_space_more};

/// Names that never take a closing tag, whatever the source says.
const VOID_TAGS: &[&str] = &["meta", "param", "hr", "br", "img", "input", "source", "link"];

/// Elements whose content is scanned as raw text.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Candidates longer than this must have a plausible tag name.
const MAX_UNCHECKED_TAG_LEN: usize = 15;

/// Characters trimmed from the headword line.
const HEADWORD_TRIM: &[char] = &['\r', '\n', '\t', '"', '`', '\'', ',', ' '];

static TAG_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+[0-9]*\s*$").unwrap());

/// Tokenizes one entry body.
pub fn tokenize(data: &str) -> Dom {
    Tokenizer::new(data).run()
}

struct Tokenizer<'a> {
    data: &'a str,
    bytes: &'a [u8],
    tokens: Vec<Tag>,
    /// Indices into `tokens` of start tags still waiting for their close.
    stack: Vec<usize>,
    ids: IdAllocator,
    parent: u64,
    hit_start: bool,
    hit_end: bool,
    in_comment: bool,
    /// Set while inside `<script>`/`<style>`; holds the element name.
    raw_text: Option<String>,
    start_pos: usize,
    last_start_pos: usize,
    end_pos: usize,
    /// Start of the pending content run.
    last_pos: usize,
    /// Long candidates whose name already passed the plausibility check.
    checked: HashSet<usize>,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            data,
            bytes: data.as_bytes(),
            tokens: Vec::with_capacity(data.len() / 8),
            stack: Vec::new(),
            ids: IdAllocator::default(),
            parent: 0,
            hit_start: false,
            hit_end: false,
            in_comment: false,
            raw_text: None,
            start_pos: 0,
            last_start_pos: 0,
            end_pos: 0,
            last_pos: 0,
            checked: HashSet::new(),
        }
    }

    fn run(mut self) -> Dom {
        for idx in 0..self.bytes.len() {
            let byte = self.bytes[idx];
            if byte == b'<' && !self.open_candidate(idx) {
                continue;
            }
            if byte == b'>' && (self.hit_start || self.in_comment) && !self.close_candidate(idx) {
                continue;
            }

            self.check_candidate(idx);

            if self.hit_start && self.hit_end && self.end_pos > self.start_pos {
                self.emit_tag(idx);
            } else if self.hit_start && self.start_pos > self.last_pos {
                self.emit_content(self.last_pos, idx);
                self.last_pos = idx;
            }
        }

        self.finish()
    }

    /// Handles a `<`. Returns false when it cannot start a tag.
    fn open_candidate(&mut self, idx: usize) -> bool {
        if self.in_comment {
            return false;
        }
        let next = self.bytes.get(idx + 1).copied();

        if let Some(name) = &self.raw_text {
            let rest = &self.bytes[idx + 1..];
            let closes = rest.first() == Some(&b'/')
                && rest.len() > name.len()
                && rest[1..=name.len()].eq_ignore_ascii_case(name.as_bytes());
            if !closes {
                return false;
            }
        }

        match next {
            Some(b'!') => {
                if self.bytes.get(idx + 2) == Some(&b'-') {
                    self.in_comment = true;
                }
            }
            Some(b'/') => {
                if self.bytes.get(idx + 2) == Some(&b'>') {
                    return false;
                }
            }
            Some(n) if n.is_ascii_alphabetic() => {}
            _ => return false,
        }

        self.last_start_pos = self.start_pos;
        self.start_pos = idx;
        self.hit_start = true;
        true
    }

    /// Handles a `>`. Returns false when it cannot end the pending candidate.
    fn close_candidate(&mut self, idx: usize) -> bool {
        let prev = match idx.checked_sub(1) {
            Some(p) => self.bytes[p],
            None => return false,
        };

        if self.in_comment {
            let dashes = idx >= self.start_pos + 5 && self.bytes[idx - 2] == b'-' && prev == b'-';
            if !dashes {
                return false;
            }
        } else if !matches!(prev, b' ' | b'/' | b'\'' | b'"') && !(b'/'..=b'z').contains(&prev) {
            return false;
        }

        self.hit_end = true;
        self.end_pos = idx;
        true
    }

    /// Rejects candidates that look like `<` used as a comparison sign in running text.
    fn check_candidate(&mut self, idx: usize) {
        if !self.hit_start
            || self.hit_end
            || self.in_comment
            || self.raw_text.is_some()
            || self.start_pos + 1 >= idx
        {
            return;
        }

        let span = &self.bytes[self.start_pos..idx];
        if idx - self.start_pos > MAX_UNCHECKED_TAG_LEN {
            if self.checked.contains(&self.start_pos) {
                return;
            }
            let name_end = span
                .iter()
                .position(|&b| is_space_byte(b))
                .unwrap_or(span.len());
            if TAG_NAME_RE.is_match(&span[1..name_end.max(1)]) {
                self.checked.insert(self.start_pos);
            } else {
                self.reject();
            }
        } else if self.bytes[idx] > 127 && !span.iter().any(|&b| is_space_byte(b)) {
            self.reject();
        }
    }

    fn reject(&mut self) {
        self.start_pos = self.last_start_pos;
        self.hit_start = false;
        self.in_comment = false;
    }

    /// Lowercase tag name between `from` and the first whitespace before `to`.
    fn name_between(&self, from: usize, to: usize) -> String {
        let end = self.bytes[from..to]
            .iter()
            .position(|&b| is_space_byte(b))
            .map_or(to, |p| from + p);
        self.data[from..end].trim().to_ascii_lowercase()
    }

    fn emit_tag(&mut self, idx: usize) {
        let (start, end) = (self.start_pos, self.end_pos);
        let data = self.data;
        let raw = &data[start..=end];

        let mut tag = if self.in_comment {
            Tag::new(Category::Comment, "", raw)
        } else if self.bytes[start + 1] == b'/' {
            let name = data[start + 2..end].trim().to_ascii_lowercase();
            if self.raw_text.as_deref() == Some(name.as_str()) {
                self.raw_text = None;
            }
            Tag::new(Category::Close, name, strip_space_more(raw))
        } else if self.bytes[end - 1] == b'/' {
            let name = self.name_between(start + 1, end - 1);
            Tag::new(Category::SelfClosing, name, strip_space_more(raw))
        } else {
            let name = self.name_between(start + 1, end);
            if name.is_empty() {
                Tag::content(raw)
            } else if VOID_TAGS.contains(&name.as_str()) {
                Tag::new(Category::SelfClosing, name, strip_space_more(raw))
            } else {
                if RAW_TEXT_TAGS.contains(&name.as_str()) {
                    self.raw_text = Some(name.clone());
                }
                Tag::new(Category::Start, name, strip_space_more(raw))
            }
        };

        tag.id = self.ids.next_id();
        tag.parent = self.parent;
        match tag.category {
            Category::Start => {
                self.parent = tag.id;
                self.stack.push(self.tokens.len());
            }
            Category::Close => {
                self.link_close(&tag);
                tag.parent = self.parent;
            }
            _ => {}
        }

        self.hit_start = false;
        self.hit_end = false;
        self.in_comment = false;
        self.last_pos = idx + 1;
        self.tokens.push(tag);
    }

    /// Pairs a close token with the open start tag on top of the stack.
    ///
    /// A lone open tag is popped by any close; it is only linked when the names agree.
    /// A close that matches nothing deeper in the stack is left as an orphan.
    fn link_close(&mut self, close: &Tag) {
        match self.stack.len() {
            0 => self.parent = 0,
            1 => {
                let open = self.stack[0];
                if self.tokens[open].name == close.name {
                    self.tokens[open].close = close.id;
                }
                self.stack.clear();
                self.parent = 0;
            }
            n => {
                let open = self.stack[n - 1];
                if self.tokens[open].name == close.name {
                    self.tokens[open].close = close.id;
                    self.parent = self.tokens[self.stack[n - 2]].id;
                    self.stack.pop();
                }
            }
        }
    }

    fn emit_content(&mut self, from: usize, to: usize) {
        let mut tag = Tag::content(&self.data[from..to]);
        tag.id = self.ids.next_id();
        tag.parent = self.parent;
        self.tokens.push(tag);
    }

    fn finish(mut self) -> Dom {
        if self.tokens.is_empty() {
            let mut raw = Tag::new(Category::Raw, "", self.data);
            raw.id = self.ids.next_id();
            return Dom::from_parts(vec![raw], self.ids);
        }

        let len = self.bytes.len();
        if self.last_pos < len {
            if self.hit_start {
                tracing::warn!(
                    fragment = %&self.data[self.last_pos..],
                    offset = self.last_pos,
                    "entry has an unterminated tag"
                );
            }
            self.emit_content(self.last_pos, len);
        }

        if let Some(first) = self.tokens.first_mut() {
            if first.category == Category::Content {
                let headword = decode_headword(&first.value);
                first.value = format!("{}\r\n", headword.trim_matches(HEADWORD_TRIM));
            }
        }

        Dom::from_parts(self.tokens, self.ids)
    }
}
