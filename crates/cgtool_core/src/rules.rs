use std::sync::LazyLock;

use regex::Regex;

// Template-invocation grammars for rule items, in precedence order. The first
// two share the same outer template names ({{CItem}}, {{CItemHidden}},
// {{CNoteA}}) and are genuinely ambiguous; the `original=`-keyed form must be
// tried before the positional fallback.
static TEMPLATE_RULE_GRAMMARS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(
            r"\{\{\s*(CI(tem(Hidden)?)?|CNoteA)\s*\|(\s*desc\s*=\s*[^|]*\s*\|)?\s*original\s*=\s*(?P<original>[^|]*?)\s*(\|\s*desc\s*=\s*[^|]*\s*)?\|\s*(1=)?\s*(?P<conv>[^\}]+)(\|\s*desc\s*=\s*[^|]*\s*)?(\|\s*)?\}\}",
        )
        .expect("citem keyed grammar"),
        Regex::new(
            r"\{\{\s*(CI(tem(Hidden)?)?|CNoteA)\s*(\|\s*desc\s*=\s*[^|]*\s*)?\|\s*(1=)?\s*(?P<conv>[^|]+)\s*(\|\s*desc\s*=\s*[^|]*\s*)?(\|\s*original\s*=\s*(?P<original>.*?))?\s*(\|\s*)?\}\}",
        )
        .expect("citem positional grammar"),
        Regex::new(
            r"\{\{\s*CItemLan\s*\|\s*([12]=)?\s*(?P<conv>[^|]+)\s*(\|\s*([12]=)?\s*(?P<original>.*?))?\s*(\|\s*)?\}\}",
        )
        .expect("citemlan grammar"),
        Regex::new(
            r"\{\{\s*CItemLan/R\s*\|\s*([12]=)?\s*(?P<original>[^|]+)\|\s*([12]=)?\s*(?P<conv>.*?)\s*(\|\s*)?\}\}",
        )
        .expect("citemlan reversed grammar"),
    ]
});

/// One `(original, conv)` pair recovered from a single line of page text.
pub type RuleLine = (String, String);

/// Parses one line of a template page against the rule-item grammar cascade.
/// First match wins; a line matching no grammar carries no rule.
pub fn parse_template_line(line: &str) -> Option<RuleLine> {
    TEMPLATE_RULE_GRAMMARS.iter().find_map(|grammar| {
        let captures = grammar.captures(line)?;
        let conv = captures.name("conv")?.as_str();
        let original = captures
            .name("original")
            .map(|group| group.as_str())
            .unwrap_or("");
        Some((original.to_string(), conv.to_string()))
    })
}

/// Parses one line of a module page. Two literal shapes carry rules:
///
/// - `{original="X", rule="Y"},` — a keyword table; lines whose table has
///   neither key are not rules (e.g. nested `content` wrappers).
/// - `Item("X", "Y"),` — a positional call needing at least two arguments.
///
/// Arguments go through a restricted expression parser ([`parse_lua_args`])
/// rather than a Lua runtime; any line it cannot read yields no rule.
pub fn parse_module_line(line: &str) -> Option<RuleLine> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
    if trimmed.starts_with("--") {
        return None;
    }

    if let Some(inner) = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    {
        let args = parse_lua_args(inner)?;
        let original = args.keyword("original");
        let rule = args.keyword("rule");
        if original.is_none() && rule.is_none() {
            return None;
        }
        return Some((
            original.map(LuaValue::text).unwrap_or_default(),
            rule.map(LuaValue::text).unwrap_or_default(),
        ));
    }

    if let Some(inner) = trimmed
        .strip_prefix("Item(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let args = parse_lua_args(inner)?;
        if args.positional.len() >= 2 {
            return Some((
                args.positional[0].clone().text(),
                args.positional[1].clone().text(),
            ));
        }
    }

    None
}

/// A value the restricted argument grammar accepts: a quoted string literal
/// or the `nil` placeholder (read as an empty string).
#[derive(Debug, Clone, PartialEq, Eq)]
enum LuaValue {
    Str(String),
    Nil,
}

impl LuaValue {
    fn text(self) -> String {
        match self {
            Self::Str(value) => value,
            Self::Nil => String::new(),
        }
    }
}

#[derive(Debug, Default)]
struct LuaArgs {
    positional: Vec<LuaValue>,
    keyword: Vec<(String, LuaValue)>,
}

impl LuaArgs {
    fn keyword(&self, key: &str) -> Option<LuaValue> {
        self.keyword
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    }
}

/// Restricted parser over a comma-separated Lua argument list. Accepts only
/// string literals (single- or double-quoted, with backslash escapes), `nil`,
/// and `identifier = <value>` keyword pairs; positional arguments may not
/// follow keyword arguments. Everything else fails the whole line. This is an
/// explicit narrow grammar, never an evaluator.
fn parse_lua_args(input: &str) -> Option<LuaArgs> {
    let mut chars = input.chars().peekable();
    let mut args = LuaArgs::default();

    loop {
        skip_whitespace(&mut chars);
        let Some(&next) = chars.peek() else {
            break;
        };

        if next == '\'' || next == '"' {
            chars.next();
            let value = read_string_literal(&mut chars, next)?;
            if !args.keyword.is_empty() {
                return None;
            }
            args.positional.push(LuaValue::Str(value));
        } else if next.is_ascii_alphabetic() || next == '_' {
            let identifier = read_identifier(&mut chars);
            skip_whitespace(&mut chars);
            if chars.peek() == Some(&'=') {
                chars.next();
                skip_whitespace(&mut chars);
                let value = read_value(&mut chars)?;
                args.keyword.push((identifier, value));
            } else if identifier == "nil" {
                if !args.keyword.is_empty() {
                    return None;
                }
                args.positional.push(LuaValue::Nil);
            } else {
                return None;
            }
        } else {
            return None;
        }

        skip_whitespace(&mut chars);
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }

    Some(args)
}

fn read_value(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<LuaValue> {
    match chars.peek() {
        Some(&quote @ ('\'' | '"')) => {
            chars.next();
            read_string_literal(chars, quote).map(LuaValue::Str)
        }
        Some(&ch) if ch.is_ascii_alphabetic() || ch == '_' => {
            let identifier = read_identifier(chars);
            (identifier == "nil").then_some(LuaValue::Nil)
        }
        _ => None,
    }
}

fn read_string_literal(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Option<String> {
    let mut value = String::new();
    loop {
        match chars.next()? {
            ch if ch == quote => return Some(value),
            '\\' => match chars.next()? {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                escaped => value.push(escaped),
            },
            ch => value.push(ch),
        }
    }
}

fn read_identifier(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut identifier = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            identifier.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    identifier
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|ch| ch.is_whitespace()) {
        chars.next();
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_module_line, parse_template_line};

    #[test]
    fn module_keyword_table() {
        let parsed = parse_module_line(r#"{original="激光", rule="zh-cn:激光;zh-tw:雷射"},"#);
        assert_eq!(
            parsed,
            Some(("激光".to_string(), "zh-cn:激光;zh-tw:雷射".to_string()))
        );
    }

    #[test]
    fn module_keyword_table_rule_only() {
        let parsed = parse_module_line(r#"{ rule = 'zh-cn:鲁夫;zh-tw:魯夫' },"#);
        assert_eq!(parsed, Some((String::new(), "zh-cn:鲁夫;zh-tw:魯夫".to_string())));
    }

    #[test]
    fn module_table_without_rule_keys_is_not_a_rule() {
        assert_eq!(parse_module_line(r#"{name = "OnePiece", description = "d"},"#), None);
        assert_eq!(parse_module_line("{}"), None);
    }

    #[test]
    fn module_item_call() {
        let parsed = parse_module_line(r#"Item("ルフィ", "zh-cn:路飞;zh-tw:魯夫"),"#);
        assert_eq!(
            parsed,
            Some(("ルフィ".to_string(), "zh-cn:路飞;zh-tw:魯夫".to_string()))
        );
    }

    #[test]
    fn module_item_nil_original() {
        let parsed = parse_module_line("Item(nil, 'zh-cn:author')");
        assert_eq!(parsed, Some((String::new(), "zh-cn:author".to_string())));
    }

    #[test]
    fn module_item_needs_two_positionals() {
        assert_eq!(parse_module_line(r#"Item("only-one"),"#), None);
        assert_eq!(parse_module_line("Item()"), None);
    }

    #[test]
    fn module_comment_lines_are_skipped() {
        assert_eq!(parse_module_line(r#"-- Item("a", "b"),"#), None);
    }

    #[test]
    fn module_rejects_arbitrary_expressions() {
        // The narrow grammar must never read function calls or numbers.
        assert_eq!(parse_module_line(r#"Item(os.time(), "b"),"#), None);
        assert_eq!(parse_module_line(r#"{original=f(), rule="x"},"#), None);
        assert_eq!(parse_module_line(r#"Item(1, 2),"#), None);
        assert_eq!(parse_module_line("return require('Module:CGroup/core')"), None);
    }

    #[test]
    fn module_parse_is_position_independent() {
        let line = r#"Item("A", "B"),"#;
        assert_eq!(parse_module_line(line), parse_module_line(line));
    }

    #[test]
    fn module_string_escapes() {
        let parsed = parse_module_line(r#"Item('it\'s', "a\\b"),"#);
        assert_eq!(parsed, Some(("it's".to_string(), r"a\b".to_string())));
    }

    #[test]
    fn template_keyed_original_takes_precedence() {
        let parsed = parse_template_line("{{CItem|original=雷射|zh-cn:激光;zh-tw:雷射}}");
        assert_eq!(
            parsed,
            Some(("雷射".to_string(), "zh-cn:激光;zh-tw:雷射".to_string()))
        );
    }

    #[test]
    fn template_positional_fallback() {
        let parsed = parse_template_line("{{CItem|zh-cn:激光;zh-tw:雷射}}");
        assert_eq!(
            parsed,
            Some((String::new(), "zh-cn:激光;zh-tw:雷射".to_string()))
        );
    }

    #[test]
    fn template_positional_with_trailing_original() {
        let parsed = parse_template_line("{{CItem|zh-cn:激光;zh-tw:雷射|original=雷射}}");
        assert_eq!(
            parsed,
            Some(("雷射".to_string(), "zh-cn:激光;zh-tw:雷射".to_string()))
        );
    }

    #[test]
    fn template_desc_arguments_are_ignored() {
        let parsed = parse_template_line("{{CItem|desc=光学|original=雷射|1=zh-cn:激光;zh-tw:雷射}}");
        assert_eq!(
            parsed,
            Some(("雷射".to_string(), "zh-cn:激光;zh-tw:雷射".to_string()))
        );
    }

    #[test]
    fn template_item_families() {
        assert!(parse_template_line("{{CItemHidden|zh-cn:a;zh-tw:b}}").is_some());
        assert!(parse_template_line("{{CNoteA|original=x|zh-cn:a}}").is_some());
        assert!(parse_template_line("{{CI|zh-cn:a;zh-tw:b}}").is_some());
    }

    #[test]
    fn template_language_pair_item() {
        let parsed = parse_template_line("{{CItemLan|zh-cn:东京;zh-tw:東京|東京}}");
        assert_eq!(
            parsed,
            Some(("東京".to_string(), "zh-cn:东京;zh-tw:東京".to_string()))
        );

        let conv_only = parse_template_line("{{CItemLan|zh-cn:东京;zh-tw:東京}}");
        assert_eq!(
            conv_only,
            Some((String::new(), "zh-cn:东京;zh-tw:東京".to_string()))
        );
    }

    #[test]
    fn template_language_pair_item_reversed() {
        let parsed = parse_template_line("{{CItemLan/R|東京|zh-cn:东京;zh-tw:東京}}");
        assert_eq!(
            parsed,
            Some(("東京".to_string(), "zh-cn:东京;zh-tw:東京".to_string()))
        );
    }

    #[test]
    fn template_unmatched_lines_yield_no_rule() {
        assert_eq!(parse_template_line("{{CGroupH|name=X|desc=Y}}"), None);
        assert_eq!(parse_template_line("just prose"), None);
        assert_eq!(parse_template_line(""), None);
    }

    #[test]
    fn template_parse_is_deterministic() {
        let line = "{{CItem|original=P|Q}}";
        assert_eq!(parse_template_line(line), parse_template_line(line));
    }
}
