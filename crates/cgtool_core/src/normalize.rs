use std::sync::LazyLock;

use regex::Regex;

static REGEX_LANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{lang\|[a-zA-Z]{2}\|([^}]+)}}").expect("lang regex"));

// e.g. ※此字在您的系统上可能无法显示，因而变成空白、方块或问号。
static REGEX_SPECIAL_CHAR_NOTICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<span[^>]*>([^>]+)</span>").expect("span regex"));

/// Replaces every `{{lang|xx|payload}}` wrapper with its payload, keeping the
/// text and dropping the language tag. Idempotent once no wrappers remain.
pub fn strip_lang_wrappers(text: &str) -> String {
    REGEX_LANG.replace_all(text, "$1").into_owned()
}

/// Cleans a single rule's conversion value: unescapes the `{{=}}` template
/// marker (used to embed a literal `=` inside template arguments, e.g. the
/// `=>` in conversion directives) and unwraps `<span>` notices flagging
/// glyphs that may not render.
pub fn clean_conv(value: &str) -> String {
    let unescaped = value.replace("{{=}}", "=");
    REGEX_SPECIAL_CHAR_NOTICE
        .replace_all(&unescaped, "$1")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::{clean_conv, strip_lang_wrappers};

    #[test]
    fn strips_lang_wrappers_globally() {
        let text = "前{{lang|ja|ワンピース}}中{{lang|en|One Piece}}后";
        assert_eq!(strip_lang_wrappers(text), "前ワンピース中One Piece后");
    }

    #[test]
    fn strip_is_idempotent_without_wrappers() {
        let text = "name = \"OnePiece\"\nItem(nil, 'zh-tw:魯夫')";
        assert_eq!(strip_lang_wrappers(text), text);
    }

    #[test]
    fn ignores_wrappers_with_long_language_codes() {
        let text = "{{lang|zh-tw|不匹配}}";
        assert_eq!(strip_lang_wrappers(text), text);
    }

    #[test]
    fn clean_conv_unescapes_equals() {
        assert_eq!(clean_conv("巨蟒{{=}}>蟒蛇"), "巨蟒=>蟒蛇");
    }

    #[test]
    fn clean_conv_unwraps_span_notice() {
        assert_eq!(
            clean_conv("zh-cn:<span title=\"此字可能无法显示\">𪚏</span>"),
            "zh-cn:𪚏"
        );
    }

    #[test]
    fn clean_conv_leaves_plain_values_alone() {
        assert_eq!(clean_conv("zh-cn:鲁夫;zh-tw:魯夫"), "zh-cn:鲁夫;zh-tw:魯夫");
    }
}
