use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Represents a chat model identifier.
///
/// This can be one of the models the settings commands know about or a
/// custom string for anything else the endpoint serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier
    Custom(String),
}

/// Known chat models.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// GPT-3.5 Turbo, also known as `chatgpt`.
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,

    /// GPT-4, also known as `gpt4`.
    #[serde(rename = "gpt-4")]
    Gpt4,
}

impl KnownModel {
    /// All known models, in the order settings prompts list them.
    pub const ALL: [KnownModel; 2] = [KnownModel::Gpt35Turbo, KnownModel::Gpt4];

    /// The short alias accepted by the `model` command.
    pub fn alias(&self) -> &'static str {
        match self {
            KnownModel::Gpt35Turbo => "chatgpt",
            KnownModel::Gpt4 => "gpt4",
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::Gpt35Turbo)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{known_model}"),
            Model::Custom(custom) => write!(f, "{custom}"),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnownModel::Gpt35Turbo => write!(f, "gpt-3.5-turbo"),
            KnownModel::Gpt4 => write!(f, "gpt-4"),
        }
    }
}

/// Error returned when a string names no known model.
#[derive(Debug)]
pub struct ModelParseError {
    /// The string that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for ModelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown model: {}", self.invalid_value)
    }
}

impl std::error::Error for ModelParseError {}

impl FromStr for KnownModel {
    type Err = ModelParseError;

    /// Accepts either the alias (`chatgpt`, `gpt4`) or the full id, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        KnownModel::ALL
            .into_iter()
            .find(|m| m.alias() == lowered || m.to_string() == lowered)
            .ok_or_else(|| ModelParseError {
                invalid_value: s.to_string(),
            })
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        match model.parse::<KnownModel>() {
            Ok(known) => Model::Known(known),
            Err(_) => Model::Custom(model),
        }
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model::from(model.to_string())
    }
}
