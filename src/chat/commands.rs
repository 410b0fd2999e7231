//! Interpretation of lines typed at the chat prompt.

/// Words that end an interactive chat, with or without a leading `/`.
const EXIT_KEYWORDS: [&str; 3] = ["exit", "quit", "q"];

/// What a line typed at the chat prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// Nothing but whitespace; ignored.
    Empty,

    /// Leave the chat.
    Exit,

    /// Send this text to the model.
    Message(String),
}

/// Returns true if `input` is one of the exit keywords.
///
/// ```
/// # use cligpt::chat::is_exit_keyword;
/// assert!(is_exit_keyword("quit"));
/// assert!(is_exit_keyword(" /q "));
/// assert!(!is_exit_keyword("quit smoking"));
/// ```
pub fn is_exit_keyword(input: &str) -> bool {
    let input = input.trim();
    let word = input.strip_prefix('/').unwrap_or(input);
    EXIT_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Classify a line read at the chat prompt.
pub fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        ChatInput::Empty
    } else if is_exit_keyword(line) {
        ChatInput::Exit
    } else {
        ChatInput::Message(line.to_string())
    }
}

/// Parse a picker answer into an index below `count`.
pub fn parse_selection(input: &str, count: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|index| *index < count)
}
