//! Core module: UI-agnostic domain and runtime.
//!
//! This module contains:
//! - `session`: Streaming chat session and its model backend seam
//! - `outline`: Outline accumulation and fence sanitization
//! - `conversation`: Transcript and current outline state
//! - `events`: Application events for front-ends
//! - `mindmap`: Send handler wiring everything together

pub mod conversation;
pub mod events;
pub mod mindmap;
pub mod outline;
pub mod session;
