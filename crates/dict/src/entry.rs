// ABOUTME: Splits an MDict source buffer into per-headword entries and prunes dead redirects.
// ABOUTME: Entries are byte ranges into the buffer plus the headword and optional @@@action=value.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

/// Line that separates two entries.
pub const ENTRY_DELIMITER: &str = "</>";

/// Separator used when entries are written back.
pub const ENTRY_JOIN: &str = "\r\n</>\r\n";

/// Headwords longer than this are reported.
pub const LONG_WORD_LIMIT: usize = 1024;

const WORD_TRIM: &[char] = &['\r', '\n', '\t', '"', '`', ',', ' '];
const EDGE_SPACE: &[char] = &['\r', '\n', '\t', ' '];

/// One headword region of a source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub start: usize,
    pub end: usize,
    pub word: String,
    pub action: Option<String>,
    pub value: Option<String>,
}

impl Entry {
    /// A `@@@LINK=target` alias.
    pub fn is_redirect(&self) -> bool {
        self.action
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case("link"))
    }

    /// Text of the entry inside the buffer it was split from.
    pub fn body<'a>(&self, data: &'a str) -> &'a str {
        &data[self.start..self.end]
    }
}

/// Splits on delimiter lines and prunes redirects that lead nowhere.
pub fn parse_entries(data: &str) -> Vec<Entry> {
    prune_redirects(split_entries(data))
}

/// Cuts `data` into entries at every line consisting of `</>`.
///
/// Regions with no visible text are skipped.
pub fn split_entries(data: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in data.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim_matches(EDGE_SPACE) == ENTRY_DELIMITER {
            entries.extend(parse_entry(data, start, line_start));
            start = offset;
        }
    }
    entries.extend(parse_entry(data, start, data.len()));

    entries
}

/// Reads the headword and optional action line of `data[start..end]`.
fn parse_entry(data: &str, start: usize, end: usize) -> Option<Entry> {
    let body = &data[start..end];
    let mut lines = body.split('\n').filter(|l| !l.trim_matches(EDGE_SPACE).is_empty());

    let word = lines.next()?.trim_matches(WORD_TRIM).to_string();
    if word.is_empty() {
        return None;
    }
    if word.len() > LONG_WORD_LIMIT {
        let preview: String = word.chars().take(64).collect();
        warn!(len = word.len(), word = %preview, "long headword");
    }

    let mut entry = Entry {
        start,
        end,
        word,
        action: None,
        value: None,
    };

    // Only the line right after the headword can carry the action.
    let action = lines
        .next()
        .and_then(|l| l.trim_matches(EDGE_SPACE).strip_prefix("@@@")?.split_once('='));
    if let Some((action, value)) = action {
        entry.action = Some(action.trim_matches(EDGE_SPACE).to_string());
        entry.value = Some(value.trim_matches(EDGE_SPACE).to_string());
    }

    Some(entry)
}

/// Removes redirect entries whose chain never reaches a concrete headword.
///
/// Dangling targets and cycles without a concrete anchor are both removed.
/// Concrete entries and order are untouched.
pub fn prune_redirects(entries: Vec<Entry>) -> Vec<Entry> {
    let keep = live_mask(&entries);

    let before = entries.len();
    let kept: Vec<Entry> = entries
        .into_iter()
        .zip(keep)
        .filter_map(|(e, keep)| keep.then_some(e))
        .collect();
    if kept.len() < before {
        debug!(removed = before - kept.len(), "pruned dangling redirects");
    }
    kept
}

/// Per entry: true unless it is a redirect that never reaches a concrete headword.
fn live_mask(entries: &[Entry]) -> Vec<bool> {
    let concrete: HashSet<&str> = entries
        .iter()
        .filter(|e| !e.is_redirect())
        .map(|e| e.word.as_str())
        .collect();

    // target -> aliases pointing at it
    let mut aliases: HashMap<&str, Vec<&str>> = HashMap::new();
    for entry in entries.iter().filter(|e| e.is_redirect()) {
        let target = entry.value.as_deref().unwrap_or("");
        aliases.entry(target).or_default().push(entry.word.as_str());
    }

    let mut live: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = concrete.iter().copied().collect();
    while let Some(word) = queue.pop_front() {
        for &alias in aliases.get(word).into_iter().flatten() {
            if live.insert(alias) {
                queue.push_back(alias);
            }
        }
    }

    entries
        .iter()
        .map(|e| {
            !e.is_redirect() || {
                let target = e.value.as_deref().unwrap_or("");
                concrete.contains(target) || live.contains(target)
            }
        })
        .collect()
}
