//! SVG mind-map drawing with viewport fitting.

use std::fmt::Write as _;

use super::layout::{Bounds, TreeLayout};
use super::tree::parse_outline;
use super::{DiagramSnapshot, OutlineRenderer, Viewport};

/// Space kept free around the diagram when fitting.
pub const FIT_PADDING: f64 = 20.0;
/// Fitting never magnifies beyond this factor.
pub const MAX_SCALE: f64 = 2.0;

/// Placement of the layout inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Fit {
    /// Centers `bounds` in `viewport`, shrinking to fit inside the padding
    /// and magnifying at most `MAX_SCALE` times.
    pub fn compute(bounds: Bounds, viewport: Viewport) -> Self {
        let view_w = f64::from(viewport.width);
        let view_h = f64::from(viewport.height);
        let avail_w = (view_w - 2.0 * FIT_PADDING).max(1.0);
        let avail_h = (view_h - 2.0 * FIT_PADDING).max(1.0);

        let content_w = bounds.width().max(1.0);
        let content_h = bounds.height().max(1.0);
        let scale = (avail_w / content_w).min(avail_h / content_h).min(MAX_SCALE);

        Self {
            scale,
            translate_x: (view_w - content_w * scale) / 2.0 - bounds.min_x * scale,
            translate_y: (view_h - content_h * scale) / 2.0 - bounds.min_y * scale,
        }
    }
}

/// Mind-map renderer producing a standalone SVG document.
#[derive(Debug, Clone)]
pub struct SvgMindMap {
    viewport: Viewport,
    source: Option<String>,
    layout: Option<TreeLayout>,
    fit: Option<Fit>,
    markup: Option<String>,
}

impl SvgMindMap {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            source: None,
            layout: None,
            fit: None,
            markup: None,
        }
    }

    /// Changes the drawing surface size. Takes effect on the next `refit`.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn layout(&self) -> Option<&TreeLayout> {
        self.layout.as_ref()
    }

    pub fn fit(&self) -> Option<Fit> {
        self.fit
    }

    fn draw(&self) -> String {
        let Viewport { width, height } = self.viewport;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif">"#
        );
        svg.push('\n');

        if let (Some(layout), Some(fit)) = (&self.layout, self.fit) {
            let _ = writeln!(
                svg,
                r#"<g transform="translate({:.2},{:.2}) scale({:.4})">"#,
                fit.translate_x, fit.translate_y, fit.scale
            );
            draw_links(&mut svg, layout);
            draw_nodes(&mut svg, layout);
            svg.push_str("</g>\n");
        }

        svg.push_str("</svg>\n");
        svg
    }
}

impl Default for SvgMindMap {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl OutlineRenderer for SvgMindMap {
    fn render_or_update(&mut self, outline: &str) {
        if self.source.as_deref() == Some(outline) {
            return;
        }
        self.source = Some(outline.to_string());
        self.layout = parse_outline(outline).map(|root| TreeLayout::compute(&root));
        self.refit();
    }

    fn refit(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.fit = self
            .layout
            .as_ref()
            .map(|layout| Fit::compute(layout.bounds(), self.viewport));
        self.markup = Some(self.draw());
    }
}

impl DiagramSnapshot for SvgMindMap {
    fn svg_markup(&self) -> Option<String> {
        self.markup.clone()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}

fn draw_links(svg: &mut String, layout: &TreeLayout) {
    for node in &layout.nodes {
        let Some(parent) = node.parent.map(|p| &layout.nodes[p]) else {
            continue;
        };
        let (x1, y1) = (parent.right(), parent.y);
        let (x2, y2) = (node.x, node.y);
        let mid = f64::midpoint(x1, x2);
        let _ = writeln!(
            svg,
            r#"<path d="M{x1:.2},{y1:.2} C{mid:.2},{y1:.2} {mid:.2},{y2:.2} {x2:.2},{y2:.2}" fill="none" stroke="{}" stroke-width="1.5"/>"#,
            node.color
        );
    }
}

fn draw_nodes(svg: &mut String, layout: &TreeLayout) {
    for node in &layout.nodes {
        let baseline = node.y + node.height / 2.0 - 4.0;
        let _ = writeln!(
            svg,
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="2"/>"#,
            node.x,
            node.y + node.height / 2.0,
            node.right(),
            node.y + node.height / 2.0,
            node.color
        );
        if node.label.is_empty() {
            continue;
        }
        let weight = if node.depth == 0 { "bold" } else { "normal" };
        let _ = writeln!(
            svg,
            r##"<text x="{:.2}" y="{baseline:.2}" font-size="{}" font-weight="{weight}" fill="#333333">{}</text>"##,
            node.x + super::layout::LABEL_PADDING,
            node.font_size(),
            escape_xml(&node.label)
        );
    }
}

/// Escapes text for use in SVG content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}
