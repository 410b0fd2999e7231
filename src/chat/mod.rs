//! The chat orchestrator.
//!
//! This module drives conversations on top of the completion client:
//!
//! - Single-shot prompts that are answered once and never saved
//! - Interactive sessions that stream every reply and are saved after each
//!   turn
//! - Resuming one of the most recent saved sessions
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and request parameters
//! - [`session`]: Conversation state and the turn loop
//! - [`commands`]: Interpretation of lines typed at the prompt
//! - [`interrupt`]: Ctrl+C delivery to the running turn
//! - [`resume`]: The session picker

mod commands;
mod config;
mod interrupt;
mod resume;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatInput, is_exit_keyword, parse_input, parse_selection};
pub use config::{ChatArgs, ChatConfig, ImageArgs, PromptArgs};
pub use interrupt::Interrupt;
pub use resume::select_session;
pub use session::{ChatSession, prompt_once};
