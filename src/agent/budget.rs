use crate::llm::{Message, Role};
use crate::utils::truncate_with_ellipsis;
use std::fmt::Write as _;

/// Default character budget for the conversation sent to the generator.
/// A character count is used as a cheap token-count proxy.
pub const MAX_CONTEXT_CHARS: usize = 12_000;

/// Messages at the head kept verbatim: the system prompt and the original
/// user query.
const HEAD_KEEP: usize = 2;

/// Most recent messages kept verbatim.
const RECENT_KEEP: usize = 4;

/// Cap on each compressed entry inside the summary message.
const SUMMARY_ENTRY_CHARS: usize = 200;

/// Trim the conversation to fit `max_chars`.
///
/// Under budget the list passes through unchanged. Over budget, the system
/// prompt and original query stay verbatim, the last [`RECENT_KEEP`]
/// messages stay verbatim, and everything strictly between collapses into
/// one synthetic user-role summary. Recency is favored over completeness,
/// matching the narrow context windows of small locally-run models.
pub fn budget_context(messages: Vec<Message>, max_chars: usize) -> Vec<Message> {
    let total: usize = messages.iter().map(Message::char_len).sum();
    if total <= max_chars || messages.len() <= HEAD_KEEP + RECENT_KEEP {
        return messages;
    }

    let split = messages.len() - RECENT_KEEP;
    let head = &messages[..HEAD_KEEP];
    let middle = &messages[HEAD_KEEP..split];
    let recent = &messages[split..];

    let mut summary = String::from("[Start of summary of earlier steps]\n");
    for message in middle {
        let label = match message.role {
            Role::Assistant => "Agent",
            Role::System | Role::User => "Tool",
        };
        let _ = writeln!(
            summary,
            "{label}: {}",
            truncate_with_ellipsis(&message.content, SUMMARY_ENTRY_CHARS)
        );
    }
    summary.push_str("[End of summary]");

    let mut trimmed = Vec::with_capacity(HEAD_KEEP + 1 + RECENT_KEEP);
    trimmed.extend_from_slice(head);
    trimmed.push(Message::user(summary));
    trimmed.extend_from_slice(recent);
    trimmed
}
