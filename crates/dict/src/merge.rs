// ABOUTME: Merges a source dictionary into a target by headword.
// ABOUTME: Splices the source's origin block after the target's example block; appends unknown headwords.

use std::collections::HashMap;
use std::fs;

use mdtools_markup::text::strip_space;
use mdtools_markup::{Dom, TagSelector};
use tracing::{debug, info};

use crate::config::MergeConfig;
use crate::entry::{parse_entries, ENTRY_JOIN};
use crate::error::{DictError, Result};

/// Counts from one merge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Target entries that received an origin block.
    pub merged: usize,
    /// Source entries appended because the target lacked the headword.
    pub appended: usize,
}

/// Runs the merge command described by `config`.
pub fn merge_files(config: &MergeConfig) -> Result<MergeSummary> {
    let origin = TagSelector::parse(&config.origin_selector)?;
    let example = TagSelector::parse(&config.example_selector)?;

    let source = fs::read_to_string(&config.source).map_err(|e| DictError::read(&config.source, e))?;
    let target = fs::read_to_string(&config.target).map_err(|e| DictError::read(&config.target, e))?;
    info!(source = source.len(), target = target.len(), "read dictionaries");

    let (content, summary) = merge_sources(&source, &target, &origin, &example);

    let output = config.output_path();
    fs::write(&output, content).map_err(|e| DictError::write(&output, e))?;
    info!(
        path = %output.display(),
        merged = summary.merged,
        appended = summary.appended,
        "wrote merged dictionary"
    );
    Ok(summary)
}

/// Merges `source` into `target` and returns the new target buffer.
///
/// Target entries keep their order; appended entries follow them.
pub fn merge_sources(
    source: &str,
    target: &str,
    origin: &TagSelector,
    example: &TagSelector,
) -> (String, MergeSummary) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let target = target.strip_prefix('\u{feff}').unwrap_or(target);

    let target_entries = parse_entries(target);
    let mut bodies: Vec<String> = Vec::with_capacity(target_entries.len());
    let mut redirect: Vec<bool> = Vec::with_capacity(target_entries.len());
    let mut index: HashMap<String, Vec<usize>> = HashMap::with_capacity(target_entries.len());
    for entry in &target_entries {
        index
            .entry(entry.word.to_lowercase())
            .or_default()
            .push(bodies.len());
        bodies.push(strip_space(entry.body(target)));
        redirect.push(entry.action.is_some());
    }

    let mut summary = MergeSummary::default();
    for entry in parse_entries(source) {
        if entry.action.is_some() {
            continue;
        }
        let word = entry.word.to_lowercase();
        let source_body = strip_space(entry.body(source));

        let Some(slots) = index.get(&word) else {
            index.insert(word, vec![bodies.len()]);
            bodies.push(source_body);
            redirect.push(false);
            summary.appended += 1;
            continue;
        };
        let Some(&slot) = slots.iter().find(|&&i| !redirect[i]) else {
            continue;
        };

        if let Some(merged) = splice(&source_body, &bodies[slot], origin, example) {
            bodies[slot] = merged;
            summary.merged += 1;
        } else {
            debug!(word = %entry.word, "nothing to merge");
        }
    }

    (bodies.join(ENTRY_JOIN), summary)
}

/// Inserts the first `origin` subtree of `source` after the first `example` subtree of `target`.
fn splice(source: &str, target: &str, origin: &TagSelector, example: &TagSelector) -> Option<String> {
    let source_dom = Dom::parse(source);
    let origin_text = {
        let found = source_dom.find(origin);
        let root = source_dom.get(found.first()?)?;
        source_dom.range_to_string(root.id, Dom::subtree_end(root), false)
    };
    if origin_text.is_empty() {
        return None;
    }

    let mut target_dom = Dom::parse(target);
    let anchor = target_dom.find(example).first()?;
    target_dom.insert(origin_text, anchor, true)?;
    Some(target_dom.to_string())
}
