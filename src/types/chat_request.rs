use serde::{Deserialize, Serialize};

use crate::types::{Message, Model};

/// Body of a `POST /chat/completions` request.
///
/// The whole conversation is resent on every call.  Sampling parameters are
/// only sent when non-zero; zero means "let the server decide".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model that will complete the conversation.
    pub model: Model,

    /// The full ordered message history.
    pub messages: Vec<Message>,

    /// Whether the reply is streamed as server-sent events.
    pub stream: bool,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens in the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Creates a request with no sampling parameters.
    pub fn new(model: Model, messages: Vec<Message>, stream: bool) -> Self {
        Self {
            model,
            messages,
            stream,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the temperature; zero leaves it unset.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature == 0.0 {
            None
        } else {
            Some(temperature)
        };
        self
    }

    /// Sets the max-token limit; zero leaves it unset.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = if max_tokens == 0 {
            None
        } else {
            Some(max_tokens)
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;
    use serde_json::{json, to_value};

    fn hello() -> Vec<Message> {
        vec![Message::user("Hello")]
    }

    #[test]
    fn zero_sampling_parameters_are_omitted() {
        let request = ChatRequest::new(KnownModel::Gpt35Turbo.into(), hello(), true)
            .with_temperature(0.0)
            .with_max_tokens(0);
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true
            })
        );
    }

    #[test]
    fn non_zero_sampling_parameters_are_verbatim() {
        let request = ChatRequest::new(KnownModel::Gpt4.into(), hello(), false)
            .with_temperature(0.5)
            .with_max_tokens(256);
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": false,
                "temperature": 0.5,
                "max_tokens": 256
            })
        );
    }
}
