//! Gemini provider (Generative Language API, API key auth).

pub mod api;
pub mod shared;
mod sse;

pub use api::{GeminiClient, GeminiConfig};
pub use sse::GeminiSseParser;
