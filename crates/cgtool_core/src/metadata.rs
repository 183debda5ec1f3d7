use std::sync::LazyLock;

use regex::Regex;

use crate::group::PageKind;

// Single- or double-quoted assignment values; the quote that opens a value
// must close it.
static REGEX_MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name\s*=\s*(?:"(?P<dq>[^"]+)"|'(?P<sq>[^']+)')"#).expect("module name regex")
});
static REGEX_MODULE_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"description\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("module description regex")
});

fn quoted_value(captures: &regex::Captures<'_>) -> String {
    captures
        .name("dq")
        .or_else(|| captures.name("sq"))
        .map(|group| group.as_str().to_string())
        .unwrap_or_default()
}
static REGEX_TEMPLATE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*CGroupH\s*\|\s*name\s*=\s*(?P<name>[^|]+)\s*\|\s*desc\s*=\s*(?P<desc>.*?)\s*}}")
        .expect("template header regex")
});

/// Recovers a group's display name and description from normalized page text.
///
/// Module pages declare both as Lua assignments (`name = "..."`,
/// `description = "..."`); template pages carry a single `{{CGroupH}}`
/// invocation with `name=` before `desc=`. Returns `None` when the grammar
/// for the page kind does not match, which callers record as a failed page.
pub fn extract_metadata(text: &str, kind: PageKind) -> Option<(String, String)> {
    match kind {
        PageKind::Module => {
            let name = REGEX_MODULE_NAME.captures(text)?;
            let desc = REGEX_MODULE_DESCRIPTION.captures(text)?;
            Some((quoted_value(&name), quoted_value(&desc)))
        }
        PageKind::Template => {
            let header = REGEX_TEMPLATE_HEADER.captures(text)?;
            Some((
                header["name"].trim().to_string(),
                header["desc"].trim().to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::extract_metadata;
    use crate::group::PageKind;

    #[test]
    fn module_metadata_ignores_surrounding_lua() {
        let text = r#"
local Item = require('Module:CGroup/core').Item
return {
    name = 'OnePiece',
    description = '日本漫画《[[ONE PIECE]]》',
    content = {
        Item('ルフィ', 'zh-cn:路飞;zh-tw:魯夫'),
    },
}
"#;
        let (name, desc) = extract_metadata(text, PageKind::Module).expect("metadata");
        assert_eq!(name, "OnePiece");
        assert_eq!(desc, "日本漫画《[[ONE PIECE]]》");
    }

    #[test]
    fn module_metadata_first_match_wins() {
        let text = "name = \"First\"\nname = \"Second\"\ndescription = \"d\"";
        let (name, _) = extract_metadata(text, PageKind::Module).expect("metadata");
        assert_eq!(name, "First");
    }

    #[test]
    fn module_metadata_requires_both_fields() {
        assert!(extract_metadata("name = 'Solo'", PageKind::Module).is_none());
        assert!(extract_metadata("description = 'Solo'", PageKind::Module).is_none());
    }

    #[test]
    fn module_metadata_allows_empty_description() {
        let (_, desc) =
            extract_metadata("name = 'X'\ndescription = ''", PageKind::Module).expect("metadata");
        assert_eq!(desc, "");
    }

    #[test]
    fn template_header_trims_values() {
        let text = "{{CGroupH|name= 物理學 |desc= 物理学相关条目 }}\n{{CItem|...}}";
        let (name, desc) = extract_metadata(text, PageKind::Template).expect("metadata");
        assert_eq!(name, "物理學");
        assert_eq!(desc, "物理学相关条目");
    }

    #[test]
    fn template_header_absent_is_none() {
        assert!(extract_metadata("{{CItem|zh-cn:激光;zh-tw:雷射}}", PageKind::Template).is_none());
    }

    #[test]
    fn module_grammar_never_matches_template_kind() {
        let text = "name = 'X'\ndescription = 'Y'";
        assert!(extract_metadata(text, PageKind::Template).is_none());
    }
}
