//! Output rendering for chat replies and session history.
//!
//! The orchestrator and the stream decoder only talk to the [`Renderer`]
//! trait, so the terminal presentation can be swapped for a capturing
//! renderer in tests or a colorless one when output is piped.

use std::io::{self, Stdout, Write};

/// ANSI escape code for bold text (used for user lines).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for green text (used for assistant replies).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for yellow text (used for system lines).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a fragment of a streamed reply.
    ///
    /// This is called incrementally as frames arrive and must make the text
    /// visible immediately.
    fn print_text(&mut self, text: &str);

    /// Print a complete, non-streamed reply.
    fn print_reply(&mut self, text: &str);

    /// Print a raw JSON response body.
    fn print_json(&mut self, json: &str);

    /// Echo a stored user message.
    fn print_user(&mut self, text: &str);

    /// Echo a stored system message.
    fn print_system(&mut self, text: &str);

    /// Echo a stored assistant message.
    fn print_assistant(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a streamed reply is complete.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    in_reply: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_reply: false,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn reset_reply(&mut self) {
        if self.in_reply {
            if self.use_color {
                print!("{ANSI_RESET}");
            }
            self.in_reply = false;
        }
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        if !self.in_reply {
            if self.use_color {
                print!("{ANSI_GREEN}");
            }
            self.in_reply = true;
        }
        print!("{text}");
        self.flush();
    }

    fn print_reply(&mut self, text: &str) {
        self.reset_reply();
        println!("{}", self.styled(ANSI_GREEN, text));
        self.flush();
    }

    fn print_json(&mut self, json: &str) {
        self.reset_reply();
        println!("{json}");
        self.flush();
    }

    fn print_user(&mut self, text: &str) {
        self.reset_reply();
        println!("{}", self.styled(ANSI_BOLD, &format!("> {text}")));
    }

    fn print_system(&mut self, text: &str) {
        self.reset_reply();
        println!("{}", self.styled(ANSI_YELLOW, &format!("[system] {text}")));
    }

    fn print_assistant(&mut self, text: &str) {
        self.reset_reply();
        println!("{}", self.styled(ANSI_GREEN, text));
    }

    fn print_error(&mut self, error: &str) {
        self.reset_reply();
        eprintln!("{}", self.styled(ANSI_RED, &format!("Error: {error}")));
    }

    fn print_info(&mut self, info: &str) {
        self.reset_reply();
        println!("{}", self.styled(ANSI_DIM, info));
    }

    fn finish_response(&mut self) {
        self.reset_reply();
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.reset_reply();
        println!("\n[interrupted]");
        self.flush();
    }
}

/// A renderer that records everything it is asked to print.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub text: String,
    pub lines: Vec<String>,
    pub finished: usize,
    pub interrupted: bool,
}

#[cfg(test)]
impl Renderer for RecordingRenderer {
    fn print_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn print_reply(&mut self, text: &str) {
        self.lines.push(format!("reply: {text}"));
    }

    fn print_json(&mut self, json: &str) {
        self.lines.push(format!("json: {json}"));
    }

    fn print_user(&mut self, text: &str) {
        self.lines.push(format!("user: {text}"));
    }

    fn print_system(&mut self, text: &str) {
        self.lines.push(format!("system: {text}"));
    }

    fn print_assistant(&mut self, text: &str) {
        self.lines.push(format!("assistant: {text}"));
    }

    fn print_error(&mut self, error: &str) {
        self.lines.push(format!("error: {error}"));
    }

    fn print_info(&mut self, info: &str) {
        self.lines.push(format!("info: {info}"));
    }

    fn finish_response(&mut self) {
        self.finished += 1;
    }

    fn print_interrupted(&mut self) {
        self.interrupted = true;
    }
}
