use std::collections::BTreeMap;

use regex::Regex;

/// Replace every occurrence of any `needle` in `content` in one left-to-right pass.
///
/// At each position the longest matching needle wins. Replacement text is never
/// rescanned, so a replacement containing another needle is left as written.
/// Empty needles are ignored.
pub fn replace_longest<F>(
    content: &str,
    needles: &[&str],
    mut replacement: F,
) -> Result<String, regex::Error>
where
    F: FnMut(&str) -> String,
{
    let mut needles: Vec<&str> = needles.iter().copied().filter(|n| !n.is_empty()).collect();
    if needles.is_empty() {
        return Ok(content.to_string());
    }
    // Alternation is leftmost-first, so longer needles must come first.
    needles.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    needles.dedup();
    let pattern = needles
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&pattern)?;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| replacement(&caps[0]))
        .into_owned())
}

/// Replace every key of `values` in `content` with its value.
///
/// Keys are matched longest-first so that a key which is a substring of a
/// longer key cannot corrupt it. An empty value is written as a single space.
/// `escape` transforms each value before insertion (XML escaping for docx).
pub fn substitute(
    content: &str,
    values: &BTreeMap<String, String>,
    escape: fn(&str) -> String,
) -> Result<String, regex::Error> {
    let keys: Vec<&str> = values.keys().map(String::as_str).collect();
    replace_longest(content, &keys, |key| match values.get(key) {
        Some(value) if !value.is_empty() => escape(value),
        _ => " ".to_string(),
    })
}

pub fn plain(value: &str) -> String {
    value.to_string()
}

pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
