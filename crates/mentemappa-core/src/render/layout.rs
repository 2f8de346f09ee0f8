//! Horizontal tree layout.
//!
//! The root sits on the left and each level grows to the right. Leaves are
//! stacked top to bottom in document order and every parent is centered on
//! the span of its children, so sibling subtrees never overlap.

use unicode_width::UnicodeWidthStr;

use super::tree::OutlineNode;

/// Gap between a parent's right edge and its children's left edge.
pub const LEVEL_GAP: f64 = 56.0;
/// Vertical gap between neighbouring leaves.
pub const SIBLING_GAP: f64 = 10.0;
/// Horizontal padding inside a node label.
pub const LABEL_PADDING: f64 = 8.0;
/// Average glyph advance relative to the font size.
const GLYPH_ADVANCE: f64 = 0.6;

/// Branch colors, assigned to the root's children in order.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];
/// Color of the root node.
pub const ROOT_COLOR: &str = "#555555";

pub fn font_size(depth: usize) -> f64 {
    match depth {
        0 => 20.0,
        1 => 16.0,
        _ => 14.0,
    }
}

/// A positioned node. `x`/`y` is the left end of the node's baseline rule.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub label: String,
    pub depth: usize,
    pub parent: Option<usize>,
    pub color: &'static str,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacedNode {
    pub fn font_size(&self) -> f64 {
        font_size(self.depth)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Axis-aligned extent of a layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Nodes in pre-order; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeLayout {
    pub nodes: Vec<PlacedNode>,
}

impl TreeLayout {
    pub fn compute(root: &OutlineNode) -> Self {
        let mut layout = Self { nodes: Vec::new() };
        let mut next_leaf_top = 0.0;
        layout.place(root, None, 0, 0.0, ROOT_COLOR, &mut next_leaf_top);
        layout
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for node in &self.nodes {
            bounds.min_x = bounds.min_x.min(node.x);
            bounds.max_x = bounds.max_x.max(node.right());
            bounds.min_y = bounds.min_y.min(node.y - node.height / 2.0);
            bounds.max_y = bounds.max_y.max(node.y + node.height / 2.0);
        }
        bounds
    }

    /// Places `node` and its subtree, returning the node's index.
    fn place(
        &mut self,
        node: &OutlineNode,
        parent: Option<usize>,
        depth: usize,
        x: f64,
        color: &'static str,
        next_leaf_top: &mut f64,
    ) -> usize {
        let size = font_size(depth);
        let width = label_width(&node.label, size);
        let height = size * 1.6;

        let index = self.nodes.len();
        self.nodes.push(PlacedNode {
            label: node.label.clone(),
            depth,
            parent,
            color,
            x,
            y: 0.0,
            width,
            height,
        });

        let child_x = x + width + LEVEL_GAP;
        let mut first_child_y = None;
        let mut last_child_y = 0.0;
        for (i, child) in node.children.iter().enumerate() {
            let child_color = if depth == 0 {
                PALETTE[i % PALETTE.len()]
            } else {
                color
            };
            let child_index =
                self.place(child, Some(index), depth + 1, child_x, child_color, next_leaf_top);
            let y = self.nodes[child_index].y;
            first_child_y.get_or_insert(y);
            last_child_y = y;
        }

        self.nodes[index].y = match first_child_y {
            Some(first) => f64::midpoint(first, last_child_y),
            None => {
                let y = *next_leaf_top + height / 2.0;
                *next_leaf_top += height + SIBLING_GAP;
                y
            }
        };
        index
    }
}

/// Rendered width of a label, padding included.
pub fn label_width(label: &str, font_size: f64) -> f64 {
    let columns = u32::try_from(label.width()).unwrap_or(u32::MAX);
    f64::from(columns) * font_size * GLYPH_ADVANCE + 2.0 * LABEL_PADDING
}
