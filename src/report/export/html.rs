use lazy_static::lazy_static;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

/// Print stylesheet injected into every exported report.
pub const PRINT_HEAD: &str = r#"<head>
<meta charset="UTF-8">
<style>
body { font-family: "Microsoft YaHei", sans-serif; font-size: 20pt; line-height: 1.5; }
h1 { font-size: 36pt; margin: 24pt 0 12pt; }
h2 { font-size: 32pt; margin: 20pt 0 10pt; }
h3 { font-size: 28pt; margin: 16pt 0 8pt; }
p { font-size: 20pt; }
table { border-collapse: collapse; width: 100%; font-size: 9pt; }
th, td { border: 1px solid #ddd; padding: 8pt; text-align: left; }
th { background-color: #f2f2f2; }
</style>
</head>"#;

lazy_static! {
    static ref HTML_OPEN_TAG: Regex = Regex::new(r"(?i)<html[^>]*>").unwrap();
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Insert the print head right after the opening `<html>` tag, or prepend it.
pub fn inject_print_head(body: &str) -> String {
    match HTML_OPEN_TAG.find(body) {
        Some(m) => {
            let mut out = String::with_capacity(body.len() + PRINT_HEAD.len());
            out.push_str(&body[..m.end()]);
            out.push_str(PRINT_HEAD);
            out.push_str(&body[m.end()..]);
            out
        }
        None => format!("{}{}", PRINT_HEAD, body),
    }
}

pub fn printable_html(markdown: &str) -> String {
    inject_print_head(&markdown_to_html(markdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_rendered() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_head_is_prepended_without_html_tag() {
        let out = printable_html("# 标题");
        assert!(out.starts_with("<head>"));
        assert!(out.contains("<h1>标题</h1>"));
    }

    #[test]
    fn test_head_follows_html_tag() {
        let out = inject_print_head("<html lang=\"zh\"><body>x</body></html>");
        assert!(out.starts_with("<html lang=\"zh\"><head>"));
        assert!(out.ends_with("<body>x</body></html>"));
    }
}
