use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons why the model stopped generating a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model reached the end of its reply.
    Stop,

    /// The reply reached the `max_tokens` limit.
    Length,

    /// Content was omitted by the provider's content filter.
    ContentFilter,

    /// The model wants to call a tool.
    ToolCalls,

    /// The model wants to call a function (legacy form of `tool_calls`).
    FunctionCall,

    /// Any reason this client does not know about.
    #[serde(other)]
    Other,
}

impl FinishReason {
    /// Returns true for the marker that completes a streamed reply.
    pub fn is_stop(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::FunctionCall => write!(f, "function_call"),
            FinishReason::Other => write!(f, "other"),
        }
    }
}
