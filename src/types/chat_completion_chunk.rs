use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{FinishReason, Role};

/// One `data:` frame of a streamed chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Incremental choices; a well-formed frame carries exactly one.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// The incremental part of a [`ChatCompletionChunk`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Newly generated text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChunkDelta>,

    /// Set on the frame that ends the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Content delta carried by a stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, present on the first frame only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Content fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Returns the first choice of the frame.
    ///
    /// # Errors
    ///
    /// A frame without choices is malformed and yields a streaming error.
    pub fn first_choice(&self) -> Result<&ChunkChoice> {
        self.choices
            .first()
            .ok_or_else(|| Error::streaming("stream frame contained no choices", None))
    }
}

impl ChunkChoice {
    /// Returns the delta content when it is present and non-empty.
    pub fn content(&self) -> Option<&str> {
        self.delta
            .as_ref()
            .and_then(|delta| delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }

    /// Returns true if this frame ends the reply.
    pub fn is_stop(&self) -> bool {
        self.finish_reason.is_some_and(|reason| reason.is_stop())
    }
}
