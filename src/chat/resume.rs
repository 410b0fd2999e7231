//! Picking a stored session to continue.

use crate::chat::commands::parse_selection;
use crate::error::Result;
use crate::render::Renderer;
use crate::types::Session;

const TITLE_WIDTH: usize = 60;

/// Offer `sessions` by index and return the one chosen.
///
/// `read_line` is called with a prompt and returns `None` once the user
/// gives up (end of input or an interrupt), in which case nothing is
/// selected.  Answers that name no listed session are reported and asked
/// again.
pub fn select_session<F>(
    mut sessions: Vec<Session>,
    renderer: &mut dyn Renderer,
    mut read_line: F,
) -> Result<Option<Session>>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    for (index, session) in sessions.iter().enumerate() {
        renderer.print_info(&format!(
            "[{index}] {} ({} messages)",
            short_title(session.title()),
            session.messages.len()
        ));
    }

    let prompt = format!("Session to resume (0-{}): ", sessions.len().saturating_sub(1));
    loop {
        let Some(answer) = read_line(&prompt)? else {
            return Ok(None);
        };
        match parse_selection(&answer, sessions.len()) {
            Some(index) => return Ok(Some(sessions.swap_remove(index))),
            None => renderer.print_error(&format!(
                "{:?} is not one of the listed sessions",
                answer.trim()
            )),
        }
    }
}

fn short_title(title: &str) -> String {
    let line = title.lines().next().unwrap_or("");
    if line.chars().count() > TITLE_WIDTH {
        let cut: String = line.chars().take(TITLE_WIDTH - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
