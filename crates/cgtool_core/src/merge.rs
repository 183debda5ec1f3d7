use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::Serialize;

use crate::group::{ConversionGroup, ConversionRule};

static REGEX_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(.+?)(\|.+?)?\]\]").expect("link regex"));

/// The single display-ready artifact: a timestamp plus one packed-rule entry
/// per combined display name. Written once per merge run, never re-read here.
#[derive(Debug, Clone, Serialize)]
pub struct MergedArtifact {
    pub timestamp: f64,
    pub data: BTreeMap<String, String>,
}

/// Derives the human-facing label for a group. Substring containment picks
/// the longer of name/description, otherwise the two are joined with " / ".
/// Wiki link markup is then stripped, keeping the target and dropping any
/// label.
pub fn combine_names(name: &str, desc: &str) -> String {
    let name = name.trim();
    let desc = desc.trim();
    let combined = if desc.contains(name) {
        desc
    } else if name.contains(desc) {
        name
    } else {
        return strip_links(&format!("{name} / {desc}"));
    };
    strip_links(combined)
}

fn strip_links(text: &str) -> String {
    REGEX_LINK.replace_all(text, "$1").into_owned()
}

/// Newline-joins a group's conv values in page order. `original` is not
/// needed by the downstream consumer and is dropped.
pub fn pack_rules(rules: &[ConversionRule]) -> String {
    rules
        .iter()
        .map(|rule| rule.conv.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Folds a collection of groups into one artifact. Groups whose combined
/// display names collide overwrite earlier entries (last write wins; distinct
/// from the raw-name dedup applied at extraction time).
pub fn merge_groups(groups: &[ConversionGroup]) -> MergedArtifact {
    let mut data = BTreeMap::new();
    for group in groups {
        data.insert(
            combine_names(&group.name, &group.description),
            pack_rules(&group.rules),
        );
    }
    MergedArtifact {
        timestamp: unix_timestamp(),
        data,
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::{combine_names, merge_groups, pack_rules};
    use crate::group::{ConversionGroup, ConversionRule};

    fn group(name: &str, desc: &str, convs: &[&str]) -> ConversionGroup {
        ConversionGroup {
            name: name.to_string(),
            description: desc.to_string(),
            path: format!("Module:CGroup/{name}"),
            rules: convs
                .iter()
                .map(|conv| ConversionRule {
                    original: String::new(),
                    conv: (*conv).to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn containment_picks_the_longer_string() {
        assert_eq!(combine_names("A", "A long form"), "A long form");
        assert_eq!(combine_names("A long form", "A"), "A long form");
    }

    #[test]
    fn disjoint_names_are_joined() {
        assert_eq!(combine_names("IT", "信息技术"), "IT / 信息技术");
    }

    #[test]
    fn names_are_trimmed_before_combination() {
        assert_eq!(combine_names(" A ", " A long form "), "A long form");
    }

    #[test]
    fn link_markup_is_stripped() {
        assert_eq!(combine_names("X", "见[[ONE PIECE|航海王]]"), "X / 见ONE PIECE");
        assert_eq!(combine_names("X", "见[[ONE PIECE]]"), "X / 见ONE PIECE");
    }

    #[test]
    fn combination_is_idempotent_on_link_free_output() {
        let once = combine_names("A", "B");
        assert_eq!(combine_names(&once, &once), once);
    }

    #[test]
    fn packing_preserves_rule_order() {
        let group = group("G", "d", &["x", "y"]);
        assert_eq!(pack_rules(&group.rules), "x\ny");
    }

    #[test]
    fn packing_empty_group_yields_empty_text() {
        assert_eq!(pack_rules(&[]), "");
    }

    #[test]
    fn merge_keys_by_combined_name() {
        let artifact = merge_groups(&[group("A", "A long form", &["r1"])]);
        assert_eq!(artifact.data.get("A long form").map(String::as_str), Some("r1"));
        assert!(artifact.timestamp > 0.0);
    }

    #[test]
    fn later_group_overwrites_colliding_display_name() {
        let artifact = merge_groups(&[
            group("Same", "Same", &["first"]),
            group("Same", "Same", &["second"]),
        ]);
        assert_eq!(artifact.data.len(), 1);
        assert_eq!(artifact.data.get("Same").map(String::as_str), Some("second"));
    }
}
