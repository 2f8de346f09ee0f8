//! Runtime execution modes.
//!
//! - `chat`: Interactive line-based chat (stdin/stdout)
//! - `exec`: Single prompt, outline to stdout, progress to stderr

pub mod chat;
pub mod exec;
