// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod indicator;
pub mod observability;
pub mod render;
pub mod settings;
pub mod sse;
pub mod store;
pub mod types;

// Re-exports
pub use client::{ByteStream, CompletionBackend, OpenAi, read_body};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use settings::{Persona, Settings};
pub use store::SessionStore;
pub use types::*;
