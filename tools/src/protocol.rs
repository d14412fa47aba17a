//! Text protocol for tool calls embedded in model output.
//!
//! ```text
//! <tool_use><tool_name>OP</tool_name><path>P</path><content>C</content></tool_use>
//! ```
//!
//! Only the first `<tool_use>` block is considered. Inner tags may appear in
//! any order; a missing inner tag reads as an empty string. An opening tag
//! without its closing tag fails the whole parse, so no partial invocation is
//! ever produced.

use warden_types::ToolInvocation;

use crate::ToolDefinition;

pub const BLOCK_TAG: &str = "tool_use";
pub const NAME_TAG: &str = "tool_name";
pub const PATH_TAG: &str = "path";
pub const CONTENT_TAG: &str = "content";

/// Parse the first tool-call block from a completion.
///
/// Returns `None` when there is no complete, well-nested block.
#[must_use]
pub fn parse_invocation(text: &str) -> Option<ToolInvocation> {
    let block = first_block(text)?;

    // The payload is located first and masked out, so tag-like text inside
    // file content cannot be mistaken for the name or path fields.
    let (payload, rest) = match tag_span(block, CONTENT_TAG)? {
        Some(span) => {
            let mut rest = String::with_capacity(block.len());
            rest.push_str(&block[..span.outer_start]);
            rest.push_str(&block[span.outer_end..]);
            (block[span.inner_start..span.inner_end].trim(), rest)
        }
        None => ("", block.to_string()),
    };

    let name = field(&rest, NAME_TAG)?;
    let path = field(&rest, PATH_TAG)?;

    tracing::debug!(tool = name, path, payload_bytes = payload.len(), "Parsed tool call");
    Some(ToolInvocation::new(name, path, payload))
}

/// Body of the first `<tool_use>...</tool_use>` block.
///
/// A second opening tag before the first close means the first block is
/// unclosed; that is treated as no match rather than spanning both.
fn first_block(text: &str) -> Option<&str> {
    let open = open_tag(BLOCK_TAG);
    let close = close_tag(BLOCK_TAG);

    let start = text.find(&open)? + open.len();
    let after = &text[start..];
    let end = after.find(&close)?;
    let body = &after[..end];
    if body.contains(&open) {
        return None;
    }
    Some(body)
}

#[derive(Debug, Clone, Copy)]
struct TagSpan {
    outer_start: usize,
    inner_start: usize,
    inner_end: usize,
    outer_end: usize,
}

/// Locate `<tag>...</tag>` in `block`.
///
/// `Some(None)` means the tag is absent; `None` means it is opened but never
/// closed.
fn tag_span(block: &str, tag: &str) -> Option<Option<TagSpan>> {
    let open = open_tag(tag);
    let close = close_tag(tag);

    let Some(outer_start) = block.find(&open) else {
        return Some(None);
    };
    let inner_start = outer_start + open.len();
    let inner_len = block[inner_start..].find(&close)?;
    let inner_end = inner_start + inner_len;
    Some(Some(TagSpan {
        outer_start,
        inner_start,
        inner_end,
        outer_end: inner_end + close.len(),
    }))
}

fn field<'a>(block: &'a str, tag: &str) -> Option<&'a str> {
    Some(match tag_span(block, tag)? {
        Some(span) => block[span.inner_start..span.inner_end].trim(),
        None => "",
    })
}

fn open_tag(tag: &str) -> String {
    format!("<{tag}>")
}

fn close_tag(tag: &str) -> String {
    format!("</{tag}>")
}

/// Build the system preamble describing the protocol and the available tools.
#[must_use]
pub fn build_protocol_instructions(tools: &[ToolDefinition]) -> String {
    let mut tool_descriptions = String::new();
    for tool in tools {
        tool_descriptions.push_str(&format!("### {}\n{}\n\n{}\n\n", tool.name, tool.description, tool.usage));
    }

    format!(
        "You are a coding assistant working inside the user's project folder.\n\
         You can ask to run ONE file operation per reply by including a block like this:\n\n\
         <tool_use><tool_name>OPERATION</tool_name><path>RELATIVE/PATH</path><content>TEXT</content></tool_use>\n\n\
         Rules:\n\
         - Paths are relative to the project folder and must stay inside it.\n\
         - Only the first block in a reply is executed; the user must approve it first.\n\
         - The result is shown to the user after your reply. You will not see it, so do not wait for it.\n\
         - Omit the block entirely when no file operation is needed.\n\n\
         ## Available operations\n\n\
         {tool_descriptions}",
        tool_descriptions = tool_descriptions.trim_end(),
    )
}
