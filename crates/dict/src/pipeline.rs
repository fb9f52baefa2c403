// ABOUTME: The tidy pipeline: read, pre-replace, split, tidy every entry, join, post-replace, write.
// ABOUTME: Entries are processed on scoped worker threads in contiguous chunks and reassembled in order.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use mdtools_markup::text::strip_space;
use mdtools_markup::{Dom, TidyRules};
use tracing::{debug, info, info_span, warn};

use crate::config::TidyConfig;
use crate::entry::{parse_entries, Entry, ENTRY_JOIN};
use crate::error::{DictError, Result};
use crate::style::StyleSheet;

/// Progress is logged every this many entries.
pub const PROGRESS_EVERY: usize = 50_000;

/// Output longer than this multiple of the input suggests a runaway parse.
const GROWTH_LIMIT: f64 = 1.3;

/// Counts from one tidy run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TidySummary {
    /// Entries left after splitting and redirect pruning.
    pub entries: usize,
    /// Entries present in the output.
    pub written: usize,
    /// Entries whose tidied body grew suspiciously.
    pub grown: usize,
}

/// Runs the whole tidy command described by `config`.
pub fn tidy_file(config: &TidyConfig) -> Result<TidySummary> {
    let style = match config.style_path() {
        Some(path) => Some(StyleSheet::load(&path)?),
        None => None,
    };

    info!(path = %config.input.display(), "reading source");
    let data = fs::read_to_string(&config.input).map_err(|e| DictError::read(&config.input, e))?;
    info!(bytes = data.len(), "read source");

    let (content, summary) = tidy_source(&data, config, style.as_ref());

    let output = config.output_path();
    fs::write(&output, content).map_err(|e| DictError::write(&output, e))?;
    info!(
        path = %output.display(),
        entries = summary.entries,
        written = summary.written,
        "wrote output"
    );
    Ok(summary)
}

/// Tidies a whole source buffer and returns the new buffer.
pub fn tidy_source(
    data: &str,
    config: &TidyConfig,
    style: Option<&StyleSheet>,
) -> (String, TidySummary) {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);
    let data = replace_all(data, &config.prepare, "prepare");

    info!("splitting entries");
    let entries = parse_entries(&data);
    let mut summary = TidySummary {
        entries: entries.len(),
        ..TidySummary::default()
    };

    if config.dump_word {
        summary.written = entries.len();
        let words: Vec<&str> = entries.iter().map(|e| e.word.as_str()).collect();
        return (words.join("\r\n"), summary);
    }

    info!(entries = entries.len(), jobs = config.jobs, "processing entries");
    let progress = Progress::new(entries.len());
    let bodies = tidy_entries(&data, &entries, config.rules(), style, config.jobs, &progress);

    let bodies: Vec<String> = bodies.into_iter().flatten().collect();
    summary.written = bodies.len();
    summary.grown = progress.grown.load(Ordering::Relaxed);

    let content = replace_all(&bodies.join(ENTRY_JOIN), &config.post, "post");
    (content, summary)
}

fn replace_all(data: &str, pairs: &[[String; 2]], stage: &str) -> String {
    if pairs.is_empty() {
        return data.to_string();
    }
    info!(stage, replacements = pairs.len(), "applying replacements");
    pairs
        .iter()
        .fold(data.to_string(), |acc, [from, to]| acc.replace(from.as_str(), to))
}

struct Progress {
    total: usize,
    done: AtomicUsize,
    grown: AtomicUsize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            grown: AtomicUsize::new(0),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % PROGRESS_EVERY == 0 || done == self.total {
            info!(done, total = self.total, "processed entries");
        }
    }
}

/// Tidies every entry, `jobs` chunks at a time; results keep entry order.
fn tidy_entries(
    data: &str,
    entries: &[Entry],
    rules: &TidyRules,
    style: Option<&StyleSheet>,
    jobs: usize,
    progress: &Progress,
) -> Vec<Option<String>> {
    let work = |chunk: &[Entry]| -> Vec<Option<String>> {
        chunk
            .iter()
            .map(|entry| {
                let body = tidy_entry(data, entry, rules, style, progress);
                progress.tick();
                body
            })
            .collect()
    };

    let jobs = jobs.clamp(1, entries.len().max(1));
    if jobs == 1 {
        return work(entries);
    }

    let chunk_size = entries.len().div_ceil(jobs);
    let work = &work;
    thread::scope(|s| {
        let handles: Vec<_> = entries
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move || work(chunk)))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

/// Normalizes, expands, tokenizes, and tidies one entry. `None` when nothing is left.
fn tidy_entry(
    data: &str,
    entry: &Entry,
    rules: &TidyRules,
    style: Option<&StyleSheet>,
    progress: &Progress,
) -> Option<String> {
    let body = strip_space(entry.body(data));
    if body.is_empty() {
        return None;
    }
    let _span = info_span!("entry", word = %entry.word).entered();

    let mut dom = match style {
        Some(sheet) => Dom::parse(&sheet.expand(&body)),
        None => Dom::parse(&body),
    };
    let report = dom.tidy(rules);
    if report.orphan_closes > 0 || report.synthesized_closes > 0 {
        debug!(
            orphans = report.orphan_closes,
            closed = report.synthesized_closes,
            "repaired markup"
        );
    }

    let tidied = dom.to_string();
    if tidied.len() as f64 > body.len() as f64 * GROWTH_LIMIT {
        warn!(
            before = body.len(),
            after = tidied.len(),
            "entry grew after tidy, the body may be malformed"
        );
        progress.grown.fetch_add(1, Ordering::Relaxed);
    }

    (!tidied.is_empty()).then_some(tidied)
}
