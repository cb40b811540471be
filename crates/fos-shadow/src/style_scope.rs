//! Style scoping
//!
//! Rewrites `<style>` text found inside a shadow so its rules only match
//! within that shadow's host. Parsing is delegated to a [`StyleParser`];
//! the default one is built on lightningcss.

/// One parsed rule: its selector (style rules only) and full text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: Option<String>,
    pub css_text: String,
}

/// Maps raw style source to rule descriptors
pub trait StyleParser {
    fn parse_rules(&self, source: &str) -> Result<Vec<StyleRule>, String>;
}

/// [`StyleParser`] backed by lightningcss
#[derive(Debug, Default, Clone, Copy)]
pub struct LightningStyleParser;

impl LightningStyleParser {
    pub fn new() -> Self {
        Self
    }
}

impl StyleParser for LightningStyleParser {
    fn parse_rules(&self, source: &str) -> Result<Vec<StyleRule>, String> {
        use lightningcss::printer::PrinterOptions;
        use lightningcss::rules::CssRule;
        use lightningcss::stylesheet::{ParserOptions, StyleSheet};
        use lightningcss::traits::ToCss;

        let stylesheet = StyleSheet::parse(source, ParserOptions::default()).map_err(|e| format!("{:?}", e))?;

        let mut rules = Vec::with_capacity(stylesheet.rules.0.len());
        for rule in stylesheet.rules.0.iter() {
            let css_text = rule
                .to_css_string(PrinterOptions::default())
                .map_err(|e| format!("{:?}", e))?;
            let selector = match rule {
                CssRule::Style(style) => Some(
                    style
                        .selectors
                        .to_css_string(PrinterOptions::default())
                        .map_err(|e| format!("{:?}", e))?,
                ),
                _ => None,
            };
            rules.push(StyleRule { selector, css_text });
        }
        Ok(rules)
    }
}

/// Rewrite `source` so every style rule is confined to `host_selector`.
///
/// `:host`, `:host(X)` and `:host-context(X)` are resolved against the
/// host selector first. Rules already mentioning `[id_attribute` are left
/// as they are; other rules are passed through untouched.
pub fn scope_stylesheet(
    source: &str,
    host_selector: &str,
    id_attribute: &str,
    parser: &dyn StyleParser,
) -> Result<String, String> {
    let resolved = replace_host_pseudos(source, host_selector);
    let rules = parser.parse_rules(&resolved)?;
    let marker = format!("[{}", id_attribute);

    let scoped: Vec<String> = rules
        .into_iter()
        .map(|rule| match rule.selector {
            Some(selector) => {
                let block = rule.css_text.find('{').map(|i| &rule.css_text[i..]).unwrap_or("{}");
                let prefixed: Vec<String> = split_selector_list(&selector)
                    .into_iter()
                    .map(|s| {
                        if s.contains(&marker) {
                            s.to_string()
                        } else {
                            format!("{} {}", host_selector, s)
                        }
                    })
                    .collect();
                format!("{} {}", prefixed.join(", "), block)
            }
            None => rule.css_text,
        })
        .collect();

    Ok(scoped.join("\n"))
}

/// Replace `:host-context(X)`, `:host(X)` and bare `:host`
fn replace_host_pseudos(source: &str, host: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(idx) = rest.find(":host") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + ":host".len()..];

        if let Some(tail) = after.strip_prefix("-context(") {
            if let Some(close) = matching_paren(tail) {
                out.push_str(&format!(":is({}) {}", &tail[..close], host));
                rest = &tail[close + 1..];
                continue;
            }
        } else if let Some(tail) = after.strip_prefix('(') {
            if let Some(close) = matching_paren(tail) {
                out.push_str(&format!("{}:is({})", host, &tail[..close]));
                rest = &tail[close + 1..];
                continue;
            }
        } else if !after.starts_with(|c: char| c == '-' || c.is_alphanumeric()) {
            out.push_str(host);
            rest = after;
            continue;
        }

        // Something like `:hostname`, or an unbalanced paren
        out.push_str(":host");
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Index of the `)` closing an already opened paren
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a selector list on top-level commas
fn split_selector_list(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits `selector { body }` chunks; no at-rules
    struct BraceParser;

    impl StyleParser for BraceParser {
        fn parse_rules(&self, source: &str) -> Result<Vec<StyleRule>, String> {
            source
                .split('}')
                .filter(|chunk| !chunk.trim().is_empty())
                .map(|chunk| {
                    let (selector, body) = chunk.split_once('{').ok_or("missing block")?;
                    Ok(StyleRule {
                        selector: Some(selector.trim().to_string()),
                        css_text: format!("{} {{{}}}", selector.trim(), body),
                    })
                })
                .collect()
        }
    }

    struct FailingParser;

    impl StyleParser for FailingParser {
        fn parse_rules(&self, _source: &str) -> Result<Vec<StyleRule>, String> {
            Err("unparseable".into())
        }
    }

    const HOST: &str = "div[shadow-host-id=\"1\"]";

    #[test]
    fn test_host_pseudos() {
        assert_eq!(replace_host_pseudos(":host { }", HOST), format!("{} {{ }}", HOST));
        assert_eq!(replace_host_pseudos(":host(.on) p", HOST), format!("{}:is(.on) p", HOST));
        assert_eq!(replace_host_pseudos(":host-context(.dark) p", HOST), format!(":is(.dark) {} p", HOST));
        assert_eq!(replace_host_pseudos(":hostile", HOST), ":hostile");
        assert_eq!(replace_host_pseudos(":host(:not(.a))", HOST), format!("{}:is(:not(.a))", HOST));
    }

    #[test]
    fn test_split_selector_list() {
        assert_eq!(split_selector_list("a, b"), vec!["a", "b"]);
        assert_eq!(split_selector_list(":is(a, b) c, d"), vec![":is(a, b) c", "d"]);
        assert_eq!(split_selector_list("[x=\"1\"]"), vec!["[x=\"1\"]"]);
    }

    #[test]
    fn test_scope_prefixes_rules() {
        let out = scope_stylesheet("p { color: red; } a, b { x: y; }", HOST, "shadow-host-id", &BraceParser).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("{} p {{", HOST)));
        assert!(lines[1].starts_with(&format!("{} a, {} b {{", HOST, HOST)));
    }

    #[test]
    fn test_scope_keeps_host_relative_rules() {
        let out = scope_stylesheet(":host { display: block; }", HOST, "shadow-host-id", &BraceParser).unwrap();
        assert!(out.starts_with(&format!("{} {{", HOST)));
        assert!(!out.contains(&format!("{} {}", HOST, HOST)));
    }

    #[test]
    fn test_scope_propagates_parse_failure() {
        assert!(scope_stylesheet("p {}", HOST, "shadow-host-id", &FailingParser).is_err());
    }

    #[test]
    fn test_lightning_parser() {
        let rules = LightningStyleParser
            .parse_rules(".title { color: red; } @media print { p { color: blue; } }")
            .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selector.as_deref(), Some(".title"));
        assert!(rules[0].css_text.contains("color"));
        assert_eq!(rules[1].selector, None);
        assert!(rules[1].css_text.contains("@media"));
    }

    #[test]
    fn test_lightning_scoping() {
        let out = scope_stylesheet(".title { color: red; }", HOST, "shadow-host-id", &LightningStyleParser).unwrap();
        assert!(out.contains("shadow-host-id"));
        assert!(out.contains(".title"));
        assert!(out.contains("red"));
    }
}
