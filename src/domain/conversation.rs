//! Conversation history records.
//!
//! Only short summaries of past exchanges are fed back to the assistant;
//! the full text is kept for the `history` command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many characters of each side of an exchange go into its summary
const SUMMARY_SNIPPET_CHARS: usize = 50;

/// One completed voice exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,

    pub timestamp: DateTime<Utc>,

    /// What the user said (transcription)
    pub user_message: String,

    /// What the assistant answered
    pub assistant_response: String,

    /// Compact form used as context for later prompts
    pub summary: String,
}

/// Summarize an exchange as `User: ... | Reply: ...`.
pub fn summarize(user_message: &str, response: &str) -> String {
    format!(
        "User: {}... | Reply: {}...",
        snippet(user_message),
        snippet(response)
    )
}

/// Build the context block passed along with a new prompt.
///
/// `summaries` are expected newest first.
pub fn build_context(summaries: &[String]) -> String {
    if summaries.is_empty() {
        "This is the first conversation with the user.".to_string()
    } else {
        format!(
            "Context from previous conversations with the user:\n{}",
            summaries.join("\n")
        )
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(SUMMARY_SNIPPET_CHARS).collect()
}
