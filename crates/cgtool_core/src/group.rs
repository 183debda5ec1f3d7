use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::metadata::extract_metadata;
use crate::normalize::{clean_conv, strip_lang_wrappers};
use crate::rules::{parse_module_line, parse_template_line};

/// The two wiki authoring conventions for conversion groups. Each needs its
/// own metadata and rule-line grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Module,
    Template,
}

/// Raw page text as supplied by the page source.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub title: String,
    pub kind: PageKind,
    pub text: String,
}

/// One variant mapping. `conv` is free text and may itself contain one or
/// more `from=>to` directives; `original` may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRule {
    pub original: String,
    pub conv: String,
}

/// A named, described collection of conversion rules sourced from one page.
/// A group with zero rules is valid but reported as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionGroup {
    pub name: String,
    pub description: String,
    pub path: String,
    pub rules: Vec<ConversionRule>,
}

/// Per-run accumulator surfaced in the run summary. Never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    pub attempted: usize,
    pub empties: Vec<String>,
    pub failures: Vec<String>,
}

/// Outcome of processing a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Parsed(ConversionGroup),
    /// The group's name was already claimed by an earlier page this run.
    /// Modules are enumerated before templates, so module-defined names win.
    NameCollision,
    /// Neither metadata grammar matched; recorded as a failure.
    MetadataFailed,
}

/// Processes one page: normalize, extract metadata, dedup by name, then run
/// the kind's rule-line parser over every line. `seen` and `stats` belong to
/// the driving run and are threaded through explicitly.
pub fn extract_group(
    page: &RawPage,
    seen: &mut HashSet<String>,
    stats: &mut ExtractionStats,
) -> PageOutcome {
    stats.attempted += 1;
    let text = strip_lang_wrappers(&page.text);

    let Some((name, description)) = extract_metadata(&text, page.kind) else {
        stats.failures.push(page.title.clone());
        return PageOutcome::MetadataFailed;
    };
    if !seen.insert(name.clone()) {
        return PageOutcome::NameCollision;
    }

    let parse_line: fn(&str) -> Option<(String, String)> = match page.kind {
        PageKind::Module => parse_module_line,
        PageKind::Template => parse_template_line,
    };
    let rules = text
        .lines()
        .filter_map(parse_line)
        .map(|(original, conv)| ConversionRule {
            original,
            conv: clean_conv(&conv),
        })
        .collect::<Vec<_>>();

    if rules.is_empty() {
        stats.empties.push(page.title.clone());
    }
    PageOutcome::Parsed(ConversionGroup {
        name,
        description,
        path: page.title.clone(),
        rules,
    })
}

/// Records a page that failed outside the extraction grammar (fetch errors
/// and other per-page faults). Failures never abort the run.
pub fn record_failure(title: &str, stats: &mut ExtractionStats) {
    stats.attempted += 1;
    stats.failures.push(title.to_string());
}
