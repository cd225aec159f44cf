//! Conversation title derivation
//!
//! Titles come straight from the first user message: no model round-trip.

/// Longest title kept before an ellipsis is appended
pub const MAX_TITLE_CHARS: usize = 20;

const ELLIPSIS: &str = "...";

/// Derive a conversation title from the first user message.
///
/// Messages of up to [`MAX_TITLE_CHARS`] characters are used as-is; longer
/// ones are cut after that many characters and get `"..."` appended. Counting
/// is per character so multi-byte text is never split.
pub fn derive_title(message_text: &str) -> String {
    match message_text.char_indices().nth(MAX_TITLE_CHARS) {
        Some((cut, _)) => {
            let mut title = String::with_capacity(cut + ELLIPSIS.len());
            title.extend(message_text.chars().take(MAX_TITLE_CHARS));
            title.push_str(ELLIPSIS);
            title
        }
        None => message_text.to_string(),
    }
}
