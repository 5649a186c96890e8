//! Gemtext conversion
//!
//! `text/gemini` is line oriented. Each line is classified on its own, with
//! one piece of state carried between lines: whether we are inside a
//! preformatted block. Any line containing the fence marker toggles that
//! state and never shows up in the block's content.
//!
//! Outside preformatted blocks the first matching rule wins:
//!
//! | Prefix | Block |
//! |---|---|
//! | `### ` | heading level 3 |
//! | `## ` | heading level 2 |
//! | `# ` | heading level 1 |
//! | `* ` | list item |
//! | `=>` whitespace target [label] | link |
//! | anything else | paragraph |

use percent_encoding::percent_decode_str;
use url::Url;

/// Preformatted block toggle
pub const FENCE: &str = "```";

/// One block of a converted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    ListItem(String),
    /// `label` equals `target` when the source line had no label
    Link { target: String, label: String },
    Preformatted { alt: String, lines: Vec<String> },
    Paragraph(String),
}

/// A converted gemtext page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    title: String,
    blocks: Vec<Block>,
}

impl Document {
    /// Text of the first heading, or the readable request URL
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

/// Convert gemtext into a document
///
/// `url` is the address the text was fetched from; it only provides the
/// fallback title.
pub fn convert(text: &str, url: &Url) -> Document {
    let mut blocks = Vec::new();
    let mut title: Option<String> = None;
    let mut preformatted: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if line.contains(FENCE) {
            match preformatted.take() {
                Some((alt, lines)) => blocks.push(Block::Preformatted { alt, lines }),
                None => preformatted = Some((fence_alt(line), Vec::new())),
            }
            continue;
        }

        if let Some((_, ref mut lines)) = preformatted {
            lines.push(line.to_string());
            continue;
        }

        let block = classify_line(line);
        if let Block::Heading { ref text, .. } = block {
            if title.is_none() {
                title = Some(text.clone());
            }
        }
        blocks.push(block);
    }

    // Close a block the author never fenced off
    if let Some((alt, lines)) = preformatted {
        blocks.push(Block::Preformatted { alt, lines });
    }

    Document {
        title: title.unwrap_or_else(|| display_url(url)),
        blocks,
    }
}

/// Classify a single line outside a preformatted block
pub fn classify_line(line: &str) -> Block {
    const HEADINGS: [(&str, u8); 3] = [("### ", 3), ("## ", 2), ("# ", 1)];

    for (prefix, level) in HEADINGS {
        if let Some(text) = line.strip_prefix(prefix) {
            return Block::Heading {
                level,
                text: text.trim().to_string(),
            };
        }
    }

    if let Some(text) = line.strip_prefix("* ") {
        return Block::ListItem(text.to_string());
    }

    if let Some(link) = parse_link(line) {
        return link;
    }

    Block::Paragraph(line.to_string())
}

/// `=>` + whitespace + target + optional whitespace-separated label
fn parse_link(line: &str) -> Option<Block> {
    let rest = line.strip_prefix("=>")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    let (target, label) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };

    if target.is_empty() {
        return None;
    }

    let label = if label.is_empty() { target } else { label };

    Some(Block::Link {
        target: target.to_string(),
        label: label.to_string(),
    })
}

fn fence_alt(line: &str) -> String {
    line.split_once(FENCE)
        .map(|(_, alt)| alt.trim().to_string())
        .unwrap_or_default()
}

/// Percent-decoded form of a URL for display
pub fn display_url(url: &Url) -> String {
    percent_decode_str(url.as_str()).decode_utf8_lossy().into_owned()
}
