//! Whitelisted inline markup for message text
//!
//! Recognizes `***bold italic***`, `**bold**`, `*italic*`, `` `code` `` and
//! line breaks. Anything else is plain text, so the renderer never sees raw
//! markup it has to trust.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// A node in rendered message text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum InlineNode {
    Text(String),
    Bold(Vec<InlineNode>),
    Italic(Vec<InlineNode>),
    Code(String),
    LineBreak,
}

// Markers never span a newline and never wrap empty content.
static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\*\*\*(?P<both>[^\n]+?)\*\*\*",
        r"|\*\*(?P<bold>[^\n]+?)\*\*",
        r"|\*(?P<italic>[^\n]+?)\*",
        r"|`(?P<code>[^\n]+?)`",
        r"|(?P<br>\n)",
    ))
    .expect("inline markup pattern is valid")
});

/// Parse message text into inline nodes
pub fn parse(text: &str) -> Vec<InlineNode> {
    let mut nodes = Vec::new();
    let mut cursor = 0;

    for caps in INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut nodes, text.get(cursor..whole.start()).unwrap_or_default());
        cursor = whole.end();

        if let Some(inner) = caps.name("both") {
            nodes.push(InlineNode::Bold(vec![InlineNode::Italic(parse(inner.as_str()))]));
        } else if let Some(inner) = caps.name("bold") {
            nodes.push(InlineNode::Bold(parse(inner.as_str())));
        } else if let Some(inner) = caps.name("italic") {
            nodes.push(InlineNode::Italic(parse(inner.as_str())));
        } else if let Some(inner) = caps.name("code") {
            nodes.push(InlineNode::Code(inner.as_str().to_string()));
        } else {
            nodes.push(InlineNode::LineBreak);
        }
    }

    push_text(&mut nodes, text.get(cursor..).unwrap_or_default());
    nodes
}

fn push_text(nodes: &mut Vec<InlineNode>, text: &str) {
    if text.is_empty() {
        return;
    }
    match nodes.last_mut() {
        Some(InlineNode::Text(existing)) => existing.push_str(text),
        _ => nodes.push(InlineNode::Text(text.to_string())),
    }
}

/// Flatten nodes back to their visible text
pub fn plain_text(nodes: &[InlineNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            InlineNode::Text(text) | InlineNode::Code(text) => out.push_str(text),
            InlineNode::Bold(children) | InlineNode::Italic(children) => {
                out.push_str(&plain_text(children));
            }
            InlineNode::LineBreak => out.push('\n'),
        }
    }
    out
}
