//! Outline renderer.
//!
//! Turns the current outline into a mind-map diagram: `tree` parses the
//! Markdown into a node hierarchy, `layout` positions the nodes, `svg` draws
//! them and fits the drawing into a viewport.

pub mod layout;
pub mod svg;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use svg::SvgMindMap;
pub use tree::{OutlineNode, parse_outline};

/// Size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

/// Something that displays the current outline.
///
/// `render_or_update` is called after every fragment, so implementations
/// must accept partial and malformed Markdown without failing.
pub trait OutlineRenderer {
    /// Draws `outline` on first use, updates the existing diagram afterwards.
    fn render_or_update(&mut self, outline: &str);

    /// Re-fits the current diagram into the viewport.
    ///
    /// The layout is settled when this returns.
    fn refit(&mut self);
}

/// Read access to what a renderer currently shows.
pub trait DiagramSnapshot {
    /// Self-contained SVG document, or `None` when nothing has been drawn.
    fn svg_markup(&self) -> Option<String>;

    fn viewport(&self) -> Viewport;
}
