//! LLM provider implementations.

pub mod gemini;
pub mod shared;

pub use shared::{
    ChatMessage, ChatRole, ProviderError, ProviderErrorKind, ProviderResult, ProviderStream,
    StreamEvent, resolve_api_key, resolve_base_url,
};
