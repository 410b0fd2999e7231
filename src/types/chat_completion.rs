use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{FinishReason, Message};

/// A complete (non-streamed) chat completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Response identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that produced the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Alternative replies; this client only ever asks for one.
    pub choices: Vec<Choice>,
}

/// One reply within a [`ChatCompletion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// The reply message.
    pub message: Message,

    /// Why generation ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatCompletion {
    /// Returns the message of the first choice.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the server sent no choices.
    pub fn first_message(&self) -> Result<&Message> {
        self.choices
            .first()
            .map(|choice| &choice.message)
            .ok_or_else(|| Error::serialization("response contained no choices", None))
    }

    /// Consumes the response and returns the first choice's text.
    pub fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::serialization("response contained no choices", None))
    }
}
