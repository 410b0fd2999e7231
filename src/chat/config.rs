//! Configuration types for the chat commands.
//!
//! Command-line flags are parsed per subcommand via `arrrg`; the values that
//! shape requests come from the stored [`Settings`].

use arrrg_derive::CommandLine;

use crate::settings::Settings;
use crate::types::{ChatRequest, Message, Model};

/// Command-line arguments for `cligpt chat`.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// First message of the conversation.
    #[arrrg(optional, "Send this prompt before reading from the terminal", "PROMPT")]
    pub prompt: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Command-line arguments for `cligpt prompt`.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct PromptArgs {
    /// Print the raw response body.
    #[arrrg(flag, "Print the response as JSON")]
    pub json: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Command-line arguments for `cligpt image`.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ImageArgs {
    /// Number of images.
    #[arrrg(optional, "Number of images to generate, 1 to 10 (default: 1)", "N")]
    pub n: Option<u32>,

    /// Image dimensions.
    #[arrrg(optional, "Image size: 256x256, 512x512 or 1024x1024 (default: 1024x1024)", "SIZE")]
    pub size: Option<String>,
}

/// Request parameters for a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model that answers.
    pub model: Model,

    /// Sampling temperature; zero is not sent.
    pub temperature: f32,

    /// Reply length limit; zero is not sent.
    pub max_tokens: u32,

    /// Context of the active persona, seeded into new sessions.
    pub persona: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a config with server defaults and no persona.
    pub fn new() -> Self {
        Self {
            model: Model::default(),
            temperature: 0.0,
            max_tokens: 0,
            persona: None,
            use_color: true,
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn with_persona(mut self, context: impl Into<String>) -> Self {
        self.persona = Some(context.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Build a request carrying the whole conversation.
    pub fn request(&self, messages: Vec<Message>, stream: bool) -> ChatRequest {
        ChatRequest::new(self.model.clone(), messages, stream)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&Settings> for ChatConfig {
    fn from(settings: &Settings) -> Self {
        ChatConfig {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            persona: settings.active_persona().map(|p| p.context.clone()),
            use_color: true,
        }
    }
}
