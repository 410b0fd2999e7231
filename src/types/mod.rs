// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod chat_request;
pub mod finish_reason;
pub mod image;
pub mod message;
pub mod model;
pub mod session;

// Re-exports
pub use chat_completion::{ChatCompletion, Choice};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_request::ChatRequest;
pub use finish_reason::FinishReason;
pub use image::{
    DEFAULT_IMAGE_COUNT, ImageData, ImageRequest, ImageResponse, ImageSize, MAX_IMAGE_COUNT,
};
pub use message::{Message, Role, RoleParseError};
pub use model::{KnownModel, Model, ModelParseError};
pub use session::{Session, SessionId};
