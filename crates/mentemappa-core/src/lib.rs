//! Core mentemappa library (session, outline pipeline, renderer, exports).

pub mod config;
pub mod core;
pub mod export;
pub mod images;
pub mod prompts;
pub mod providers;
pub mod render;
