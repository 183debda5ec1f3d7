use std::collections::HashSet;

use anyhow::Result;
use serde::Serialize;

use crate::client::{NS_MODULE, NS_TEMPLATE, PageSource, SearchHit};
use crate::group::{
    ConversionGroup, ExtractionStats, PageKind, PageOutcome, RawPage, extract_group,
    record_failure,
};

const MODULE_PREFIX: &str = "Module:CGroup/";
const TEMPLATE_PREFIX: &str = "Template:CGroup/";

// Pages this small cannot hold a header plus a rule table.
const MIN_PAGE_SIZE: u64 = 66;

// Infrastructure pages living under the target prefixes.
const EXCLUDED_MODULES: [&str; 2] = ["Module:CGroup/core", "Module:CGroup/preload"];
const EXCLUDED_TEMPLATES: [&str; 7] = [
    "Template:CGroup/doc",
    "Template:CGroup/list",
    "Template:CGroup/preload",
    "Template:CGroup/sandbox",
    "Template:CGroup/CHead",
    "Template:CGroup/editintro",
    "Template:CGroup/New Style",
];

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub title: String,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub groups: Vec<ConversionGroup>,
    pub stats: ExtractionStats,
    pub pages: Vec<PageResult>,
    pub request_count: usize,
}

/// Module candidates: prefix search filtered to top-level conversion-group
/// modules, dropping infrastructure pages, sub-pages, stubs, and modules
/// that just re-export another module.
pub fn module_candidates(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .filter(|hit| hit.title.starts_with(MODULE_PREFIX))
        .filter(|hit| !EXCLUDED_MODULES.contains(&hit.title.as_str()))
        .filter(|hit| !is_sub_page(&hit.title, MODULE_PREFIX))
        .filter(|hit| hit.size >= MIN_PAGE_SIZE && !hit.snippet.contains("return require("))
        .map(|hit| hit.title.clone())
        .collect()
}

/// Template candidates: same shape of filtering, with redirect markers in
/// either language dropping the page.
pub fn template_candidates(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .filter(|hit| hit.title.starts_with(TEMPLATE_PREFIX))
        .filter(|hit| !EXCLUDED_TEMPLATES.contains(&hit.title.as_str()))
        .filter(|hit| !is_sub_page(&hit.title, TEMPLATE_PREFIX))
        .filter(|hit| {
            hit.size >= MIN_PAGE_SIZE
                && !hit.snippet.contains("#重定向")
                && !hit.snippet.contains("#REDIRECT")
        })
        .map(|hit| hit.title.clone())
        .collect()
}

fn is_sub_page(title: &str, prefix: &str) -> bool {
    title
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.contains('/'))
}

/// Runs the whole extraction pipeline against a page source: enumerate
/// modules then templates (discovery order drives name precedence), fetch
/// each page, and assemble groups. Per-page faults are recorded and never
/// abort the run; only enumeration itself is fatal.
pub fn fetch_cgroups(source: &mut dyn PageSource) -> Result<FetchReport> {
    let module_hits = source.search(MODULE_PREFIX, NS_MODULE)?;
    let template_hits = source.search("Template:CGroup", NS_TEMPLATE)?;

    let mut candidates = Vec::new();
    candidates.extend(
        module_candidates(&module_hits)
            .into_iter()
            .map(|title| (title, PageKind::Module)),
    );
    candidates.extend(
        template_candidates(&template_hits)
            .into_iter()
            .map(|title| (title, PageKind::Template)),
    );

    let mut seen = HashSet::new();
    let mut stats = ExtractionStats::default();
    let mut groups = Vec::new();
    let mut pages = Vec::new();

    for (title, kind) in candidates {
        let text = match source.page_text(&title) {
            Ok(text) => text,
            Err(error) => {
                record_failure(&title, &mut stats);
                pages.push(PageResult {
                    title,
                    action: "fetch_failed".to_string(),
                    detail: Some(error.to_string()),
                });
                continue;
            }
        };

        let page = RawPage {
            title: title.clone(),
            kind,
            text,
        };
        match extract_group(&page, &mut seen, &mut stats) {
            PageOutcome::Parsed(group) => {
                let action = if group.rules.is_empty() {
                    "parsed_empty"
                } else {
                    "parsed"
                };
                pages.push(PageResult {
                    title,
                    action: action.to_string(),
                    detail: Some(format!("{} rule(s)", group.rules.len())),
                });
                groups.push(group);
            }
            PageOutcome::NameCollision => pages.push(PageResult {
                title,
                action: "skipped_name_seen".to_string(),
                detail: None,
            }),
            PageOutcome::MetadataFailed => pages.push(PageResult {
                title,
                action: "metadata_failed".to_string(),
                detail: None,
            }),
        }
    }

    Ok(FetchReport {
        groups,
        stats,
        pages,
        request_count: source.request_count(),
    })
}
