// ABOUTME: JSON rule files for the tidy and merge commands.
// ABOUTME: Keys are PascalCase; validation reports every problem at once and compiles tidy rules.

use std::fs;
use std::path::{Path, PathBuf};

use mdtools_markup::{TagSelector, TidyRules};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{DictError, Result};

/// Settings for `mdtools tidy`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TidyConfig {
    #[serde(default)]
    pub input: PathBuf,
    /// Defaults to the input name with `.new` before the extension.
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Defaults to the input name with `.Style` before the extension, if that file exists.
    #[serde(default)]
    pub style: Option<PathBuf>,
    /// Write the headword list instead of tidied entries.
    #[serde(default)]
    pub dump_word: bool,
    #[serde(default)]
    pub skip_event: bool,
    #[serde(default)]
    pub skip_empty_attr: bool,
    #[serde(default)]
    pub skip_comment: bool,
    #[serde(default)]
    pub escape_bracket: bool,
    #[serde(default)]
    pub strip_attr: Vec<String>,
    #[serde(default)]
    pub drop: Vec<String>,
    #[serde(default, rename = "UnWrap")]
    pub unwrap: Vec<String>,
    #[serde(default)]
    pub skip_content: Vec<String>,
    #[serde(default)]
    pub self_terminating: Option<Vec<String>>,
    /// Literal `[from, to]` replacements applied before splitting.
    #[serde(default)]
    pub prepare: Vec<[String; 2]>,
    /// Literal `[from, to]` replacements applied to the joined output.
    #[serde(default)]
    pub post: Vec<[String; 2]>,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(skip)]
    rules: TidyRules,
}

fn default_jobs() -> usize {
    1
}

impl TidyConfig {
    /// Reads, parses, and validates a tidy rule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings and compiles the selectors into [`TidyRules`].
    pub fn validate(&mut self) -> Result<()> {
        let mut problems = Vec::new();

        if self.input.as_os_str().is_empty() {
            problems.push("Input is required".to_string());
        } else if self.output_path() == self.input {
            problems.push("Output must differ from Input".to_string());
        }
        if self.jobs == 0 {
            problems.push("Jobs must be at least 1".to_string());
        }
        check_replacements("Prepare", &self.prepare, &mut problems);
        check_replacements("Post", &self.post, &mut problems);

        let mut builder = TidyRules::builder()
            .skip_comment(self.skip_comment)
            .skip_events(self.skip_event)
            .skip_empty_attr(self.skip_empty_attr)
            .escape_brackets(self.escape_bracket);
        for selector in parse_selectors("Drop", &self.drop, &mut problems) {
            builder = builder.drop(selector);
        }
        for selector in parse_selectors("UnWrap", &self.unwrap, &mut problems) {
            builder = builder.unwrap(selector);
        }
        for text in &self.skip_content {
            builder = builder.skip_content(text.as_str());
        }
        for name in &self.strip_attr {
            builder = builder.strip_attr(name.as_str());
        }
        if let Some(names) = &self.self_terminating {
            builder = builder.self_terminating(names.iter().map(String::as_str));
        }

        if !problems.is_empty() {
            return Err(DictError::config(problems));
        }
        self.rules = builder.build();
        Ok(())
    }

    /// Compiled rules; defaults until [`TidyConfig::validate`] has run.
    pub fn rules(&self) -> &TidyRules {
        &self.rules
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| with_infix(&self.input, "new"))
    }

    /// The explicit style file, or the conventional one next to the input if present.
    pub fn style_path(&self) -> Option<PathBuf> {
        if let Some(style) = &self.style {
            return Some(style.clone());
        }
        let candidate = with_infix(&self.input, "Style");
        candidate.is_file().then_some(candidate)
    }
}

/// Settings for `mdtools merge`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MergeConfig {
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default)]
    pub target: PathBuf,
    /// Defaults to the target name with `.new` before the extension.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_origin_selector")]
    pub origin_selector: String,
    #[serde(default = "default_example_selector")]
    pub example_selector: String,
}

fn default_origin_selector() -> String {
    "div.origin".to_string()
}

fn default_example_selector() -> String {
    "div.example".to_string()
}

impl MergeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (key, path) in [("Source", &self.source), ("Target", &self.target)] {
            if path.as_os_str().is_empty() {
                problems.push(format!("{key} is required"));
            } else if !path.is_file() {
                problems.push(format!("{key} file {} does not exist", path.display()));
            }
        }
        if !self.target.as_os_str().is_empty() && self.output_path() == self.target {
            problems.push("Output must differ from Target".to_string());
        }
        let selectors = [
            self.origin_selector.clone(),
            self.example_selector.clone(),
        ];
        parse_selectors("Selector", &selectors, &mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DictError::config(problems))
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| with_infix(&self.target, "new"))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| DictError::read(path, e))?;
    serde_json::from_str(&text).map_err(|source| DictError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_selectors(key: &str, raw: &[String], problems: &mut Vec<String>) -> Vec<TagSelector> {
    raw.iter()
        .filter_map(|s| match TagSelector::parse(s) {
            Ok(selector) => Some(selector),
            Err(err) => {
                problems.push(format!("{key}: {err}"));
                None
            }
        })
        .collect()
}

fn check_replacements(key: &str, pairs: &[[String; 2]], problems: &mut Vec<String>) {
    for (idx, [from, _]) in pairs.iter().enumerate() {
        if from.is_empty() {
            problems.push(format!("{key}[{idx}] has an empty search text"));
        }
    }
}

/// `dir/name.ext` -> `dir/name.<infix>.ext`; without an extension the infix is appended.
pub fn with_infix(path: &Path, infix: &str) -> PathBuf {
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_os_string();
            name.push(".");
            name.push(infix);
            name.push(".");
            name.push(ext);
            path.with_file_name(name)
        }
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(infix);
            PathBuf::from(name)
        }
    }
}
