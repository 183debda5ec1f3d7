use serde::Serialize;

use crate::group::ConversionGroup;

// Multiple directives inside one conv value. The upstream data has no firm
// delimiter convention; `;` is the MediaWiki rule separator and is the
// best-effort choice here. The check stays advisory either way.
const DIRECTIVE_SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvDiagnostic {
    pub group: String,
    pub conv: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub groups_checked: usize,
    pub rules_checked: usize,
    pub diagnostics: Vec<ConvDiagnostic>,
}

/// Advisory consistency check over multi-directive conv values: every
/// `from=>to` directive within one value must share the same `from` term.
/// Mismatches are diagnostics, never errors; values without `=>` are skipped.
pub fn check_conv(conv: &str) -> Option<String> {
    if !conv.contains("=>") {
        return None;
    }
    let mut first_from: Option<&str> = None;
    for directive in conv
        .split(DIRECTIVE_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
    {
        let Some((from, _)) = directive.split_once("=>") else {
            return Some(format!("no => in directive `{directive}`"));
        };
        let from = from.trim();
        match first_from {
            None => first_from = Some(from),
            Some(expected) if expected != from => {
                return Some(format!("mismatched from terms `{from}` != `{expected}`"));
            }
            Some(_) => {}
        }
    }
    None
}

pub fn check_groups(groups: &[ConversionGroup]) -> CheckReport {
    let mut report = CheckReport::default();
    for group in groups {
        report.groups_checked += 1;
        for rule in &group.rules {
            report.rules_checked += 1;
            if let Some(detail) = check_conv(&rule.conv) {
                report.diagnostics.push(ConvDiagnostic {
                    group: group.name.clone(),
                    conv: rule.conv.clone(),
                    detail,
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::{check_conv, check_groups};
    use crate::group::{ConversionGroup, ConversionRule};

    #[test]
    fn plain_conv_is_skipped() {
        assert_eq!(check_conv("zh-cn:激光;zh-tw:雷射"), None);
    }

    #[test]
    fn consistent_directives_pass() {
        assert_eq!(check_conv("雷射=>zh-cn:激光; 雷射=>zh-hk:鐳射"), None);
    }

    #[test]
    fn mismatched_from_terms_are_flagged() {
        let detail = check_conv("雷射=>zh-cn:激光;激光=>zh-tw:雷射").expect("diagnostic");
        assert!(detail.contains("mismatched from terms"));
    }

    #[test]
    fn directive_without_arrow_is_flagged() {
        let detail = check_conv("雷射=>zh-cn:激光;zh-hk:鐳射").expect("diagnostic");
        assert!(detail.contains("no =>"));
    }

    #[test]
    fn report_collects_per_rule_diagnostics() {
        let groups = vec![ConversionGroup {
            name: "Physics".to_string(),
            description: String::new(),
            path: "Template:CGroup/Physics".to_string(),
            rules: vec![
                ConversionRule {
                    original: String::new(),
                    conv: "zh-cn:激光;zh-tw:雷射".to_string(),
                },
                ConversionRule {
                    original: String::new(),
                    conv: "a=>x;b=>y".to_string(),
                },
            ],
        }];
        let report = check_groups(&groups);
        assert_eq!(report.groups_checked, 1);
        assert_eq!(report.rules_checked, 2);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].group, "Physics");
    }
}
