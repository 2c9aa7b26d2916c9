//! Converts Notion block objects to markdown.
//!
//! Only the block types this workspace actually uses are handled; anything
//! else renders as nothing rather than failing the page. Rich-text
//! annotations (bold, links, colors) are dropped deliberately — the export
//! keeps the plain text and lets the site's own renderer style the result.

use serde_json::Value;

use crate::notion::rich_text_plain;

/// Renders a list of blocks to one markdown document. Blocks are separated
/// by blank lines; consecutive list items still form one list because
/// markdown tolerates the gaps.
pub fn to_markdown(blocks: &[Value]) -> String {
    let mut chunks = Vec::new();
    for block in blocks {
        if let Some(chunk) = block_to_markdown(block) {
            chunks.push(chunk);
        }
    }
    chunks.join("\n\n")
}

/// Renders one block, or `None` for unsupported or empty blocks.
fn block_to_markdown(block: &Value) -> Option<String> {
    let kind = block.get("type").and_then(Value::as_str)?;
    let body = block.get(kind)?;

    let rendered = match kind {
        "paragraph" => non_empty(plain(body))?,
        "heading_1" => format!("# {}", non_empty(plain(body))?),
        "heading_2" => format!("## {}", non_empty(plain(body))?),
        "heading_3" => format!("### {}", non_empty(plain(body))?),
        "bulleted_list_item" => format!("- {}", non_empty(plain(body))?),
        "numbered_list_item" => format!("1. {}", non_empty(plain(body))?),
        "quote" => format!("> {}", non_empty(plain(body))?),
        "code" => {
            let language = body
                .get("language")
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("```{}\n{}\n```", language, plain(body))
        }
        "image" => {
            let url = image_url(body)?;
            let caption = rich_text_plain(body.get("caption").unwrap_or(&Value::Null));
            format!("![{}]({})", caption, url)
        }
        "divider" => "---".to_owned(),
        "bookmark" => {
            let url = body.get("url").and_then(Value::as_str)?;
            let caption = rich_text_plain(body.get("caption").unwrap_or(&Value::Null));
            let label = if caption.is_empty() { url } else { &caption };
            format!("[{}]({})", label, url)
        }
        _ => {
            log::debug!("skipping unsupported block type {}", kind);
            return None;
        }
    };
    Some(rendered)
}

fn plain(body: &Value) -> String {
    rich_text_plain(body.get("rich_text").unwrap_or(&Value::Null))
}

// Empty paragraphs and headings carry no content worth a blank line.
fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn image_url(body: &Value) -> Option<&str> {
    let url = match body.get("type").and_then(Value::as_str)? {
        "external" => body.get("external")?.get("url")?,
        "file" => body.get("file")?.get("url")?,
        _ => return None,
    };
    url.as_str()
}

/// Derives a page title from its blocks, for pages whose `title` property is
/// empty. The first `heading_1` or `heading_2` wins; failing that, the first
/// paragraph longer than five characters, truncated to fifty.
pub fn title_from_blocks(blocks: &[Value]) -> Option<String> {
    for block in blocks {
        let kind = match block.get("type").and_then(Value::as_str) {
            Some("heading_1") => "heading_1",
            Some("heading_2") => "heading_2",
            _ => continue,
        };
        if let Some(body) = block.get(kind) {
            let text = plain(body);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    for block in blocks {
        if block.get("type").and_then(Value::as_str) != Some("paragraph") {
            continue;
        }
        if let Some(body) = block.get("paragraph") {
            let text = plain(body);
            if text.chars().count() > 5 {
                return Some(text.chars().take(50).collect());
            }
        }
    }
    None
}
