//! HTML presentation for the host surface
//!
//! Maps each document block to a fixed HTML fragment. Pages for input
//! prompts and redirects are produced here as well so that every HTML
//! string the crate emits lives in one place.

use super::gemtext::{Block, Document};
use std::fmt::Write;
use url::Url;

/// Render a converted document as a complete HTML page
pub fn to_html(doc: &Document, base: &Url) -> String {
    let mut body = String::new();
    let mut in_list = false;

    for block in doc.blocks() {
        let is_item = matches!(block, Block::ListItem(_));
        if in_list && !is_item {
            body.push_str("</ul>\n");
        } else if !in_list && is_item {
            body.push_str("<ul>\n");
        }
        in_list = is_item;

        render_block(&mut body, block, base);
    }

    if in_list {
        body.push_str("</ul>\n");
    }

    page(doc.title(), &body)
}

fn render_block(out: &mut String, block: &Block, base: &Url) {
    // Writing into a String cannot fail
    let _ = match block {
        Block::Heading { level, text } => {
            writeln!(out, "<h{0}>{1}</h{0}>", level, escape(text))
        }
        Block::ListItem(text) => writeln!(out, "<li>{}</li>", escape(text)),
        Block::Link { target, label } => {
            let href = resolve(base, target);
            if label == target {
                writeln!(
                    out,
                    "<p class=\"link\"><a href=\"{}\">{}</a></p>",
                    escape(&href),
                    escape(target)
                )
            } else {
                writeln!(
                    out,
                    "<p class=\"link\"><a href=\"{}\">{}</a> <span class=\"target\">{}</span></p>",
                    escape(&href),
                    escape(label),
                    escape(target)
                )
            }
        }
        Block::Preformatted { alt, lines } => {
            if alt.is_empty() {
                out.push_str("<pre>");
            } else {
                let _ = write!(out, "<pre aria-label=\"{}\">", escape(alt));
            }
            for line in lines {
                out.push_str(&escape(line));
                out.push('\n');
            }
            writeln!(out, "</pre>")
        }
        Block::Paragraph(text) if text.trim().is_empty() => writeln!(out, "<br>"),
        Block::Paragraph(text) => writeln!(out, "<p>{}</p>", escape(text)),
    };
}

/// Submits the answer as the whole query, the same way `Request::with_input` does
const INPUT_SUBMIT: &str =
    "location.href=this.action+'?'+encodeURIComponent(this.elements.answer.value);return false;";

/// Page asking the user for input; submitting it re-requests with a query
///
/// The input has no `name`, so a plain form submission cannot turn the
/// answer into a `name=value` pair.
pub fn input_page(url: &Url, prompt: &str, sensitive: bool) -> String {
    let mut action = url.clone();
    action.set_query(None);
    action.set_fragment(None);

    let kind = if sensitive { "password" } else { "text" };
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<form action=\"{}\" onsubmit=\"{}\">",
        escape(action.as_str()),
        INPUT_SUBMIT
    );
    let _ = writeln!(body, "<label for=\"answer\">{}</label>", escape(prompt));
    let _ = writeln!(body, "<input id=\"answer\" type=\"{}\" autofocus>", kind);
    body.push_str("</form>\n");
    page(prompt, &body)
}

/// Page pointing the host at a redirect target
pub fn redirect_page(url: &Url, target: &str) -> String {
    let href = escape(&resolve(url, target));
    let body = format!("<p class=\"link\"><a href=\"{0}\">{0}</a></p>\n", href);
    let head = format!("<meta http-equiv=\"refresh\" content=\"0; url={}\">\n", href);
    page_with_head(target, &head, &body)
}

fn page(title: &str, body: &str) -> String {
    page_with_head(title, "", body)
}

fn page_with_head(title: &str, head: &str, body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
            "<title>{}</title>\n{}</head>\n<body>\n{}</body>\n</html>\n"
        ),
        escape(title),
        head,
        body
    )
}

/// Resolve a possibly relative link against the page URL
fn resolve(base: &Url, target: &str) -> String {
    base.join(target)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| target.to_string())
}

/// Minimal HTML escaping for text and attribute values.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::gemtext::convert;

    fn base() -> Url {
        Url::parse("gemini://a.example/dir/page.gmi").unwrap()
    }

    fn render(text: &str) -> String {
        to_html(&convert(text, &base()), &base())
    }

    #[test]
    fn test_title_from_heading() {
        let html = render("# Hello <world>\n");
        assert!(html.contains("<title>Hello &lt;world&gt;</title>"));
        assert!(html.contains("<h1>Hello &lt;world&gt;</h1>"));
    }

    #[test]
    fn test_link_label_omitted_when_duplicate() {
        let html = render("=> gemini://a.example/\n");
        assert!(html.contains("<a href=\"gemini://a.example/\">gemini://a.example/</a></p>"));
        assert!(!html.contains("class=\"target\""));
    }

    #[test]
    fn test_link_with_label() {
        let html = render("=> gemini://a.example/ Example\n");
        assert!(html.contains(concat!(
            "<a href=\"gemini://a.example/\">Example</a> ",
            "<span class=\"target\">gemini://a.example/</span>"
        )));
    }

    #[test]
    fn test_relative_link_resolved() {
        let html = render("=> other.gmi Other\n");
        assert!(html.contains("href=\"gemini://a.example/dir/other.gmi\""));
    }

    #[test]
    fn test_list_grouping() {
        let html = render("* a\n* b\ntext\n* c\n");
        assert_eq!(html.matches("<ul>").count(), 2);
        assert_eq!(html.matches("</ul>").count(), 2);
        assert!(html.contains("<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n<p>text</p>"));
    }

    #[test]
    fn test_preformatted_escaped() {
        let html = render("```\n<b>raw</b>\n```\n");
        assert!(html.contains("<pre>&lt;b&gt;raw&lt;/b&gt;\n</pre>"));
    }

    #[test]
    fn test_blank_line() {
        let html = render("a\n\nb\n");
        assert!(html.contains("<p>a</p>\n<br>\n<p>b</p>"));
    }

    #[test]
    fn test_input_page() {
        let url = Url::parse("gemini://a.example/search?old").unwrap();
        let html = input_page(&url, "Query?", true);
        assert!(html.contains("action=\"gemini://a.example/search\""));
        assert!(html.contains("type=\"password\""));
        assert!(html.contains("<title>Query?</title>"));
    }

    #[test]
    fn test_input_submits_raw_query() {
        let url = Url::parse("gemini://a.example/search").unwrap();
        let html = input_page(&url, "Query?", false);
        assert!(!html.contains("name="));
        assert!(!html.contains("method="));
        assert!(html.contains("this.action+'?'+encodeURIComponent("));
        assert!(html.contains("type=\"text\""));
    }

    #[test]
    fn test_redirect_page() {
        let html = redirect_page(&base(), "/moved");
        assert!(html.contains("content=\"0; url=gemini://a.example/moved\""));
    }
}
