//! Outline accumulation and fence sanitization.
//!
//! The model is told not to wrap its answer in a code fence but sometimes does
//! anyway. Fragments are appended to one running text and the whole text is
//! sanitized again after every fragment, so fence markers split across
//! fragment boundaries are handled the same way as complete ones.

use std::sync::LazyLock;

use regex::Regex;

/// A complete opener line: three backticks, optional language tag, newline.
static FENCE_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A```[^\s`]*[ \t]*\r?\n").expect("valid fence opener regex")
});

/// Text that may still grow into an opener once more bytes arrive.
static PENDING_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:`{1,2}|```[^\s`]*[ \t]*\r?)\z")
        .expect("valid pending opener regex")
});

/// A closing fence alone on the last non-blank line (possibly still partial).
static FENCE_CLOSER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\r?\n)[ \t]*`{1,3}\s*\z").expect("valid fence closer regex")
});

/// A closing fence glued to the end of the last line.
static GLUED_CLOSER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`{1,3}\s*\z").expect("valid glued closer regex"));

/// Removes delivery fences from accumulated model output.
///
/// Strips any leading opener lines (with or without a language tag), yields
/// an empty outline while the text is only a partial opener, and strips any
/// trailing fence-close lines. Once an opener was removed, a closer glued to
/// the end of the last line is stripped too. Text without fences is returned
/// unchanged.
pub fn sanitize(text: &str) -> String {
    let mut current = text;
    loop {
        if PENDING_OPENER.is_match(current) {
            return String::new();
        }
        match FENCE_OPENER.find(current) {
            Some(opener) => current = &current[opener.end()..],
            None => break,
        }
    }

    let fenced = current.len() < text.len();
    let mut end = current.len();
    loop {
        let tail = &current[..end];
        if let Some(newline) = FENCE_CLOSER.captures(tail).and_then(|caps| caps.get(1)) {
            end = newline.end();
        } else if fenced && let Some(glued) = GLUED_CLOSER.find(tail) {
            end = glued.start();
        } else {
            break;
        }
    }

    current[..end].to_string()
}

/// Running text of one exchange plus its sanitized view.
#[derive(Debug, Clone, Default)]
pub struct OutlineAccumulator {
    raw: String,
    outline: String,
}

impl OutlineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment and returns the sanitized outline of everything
    /// received so far.
    pub fn push(&mut self, fragment: &str) -> &str {
        self.raw.push_str(fragment);
        self.outline = sanitize(&self.raw);
        &self.outline
    }

    /// Everything received so far, fences included.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn outline(&self) -> &str {
        &self.outline
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
