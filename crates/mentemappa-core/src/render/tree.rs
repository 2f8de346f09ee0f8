//! Markdown outline to node hierarchy.
//!
//! Headings nest by level, list items nest under the closest preceding
//! heading (and under each other by list depth), and paragraphs outside of
//! lists become leaves of the current heading. Code blocks, HTML and rules
//! are not part of the map and are skipped.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// One node of the mind map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutlineNode {
    pub label: String,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// Number of nodes in this subtree, itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::node_count).sum::<usize>()
    }

    /// Depth of the deepest leaf, counting this node as 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::depth).max().unwrap_or(0)
    }
}

/// Parses an outline into a single-rooted tree.
///
/// Returns `None` when the text contains no map content. Several top-level
/// nodes are gathered under an unlabeled root.
pub fn parse_outline(text: &str) -> Option<OutlineNode> {
    if text.trim().is_empty() {
        return None;
    }

    let mut builder = TreeBuilder::new();
    for event in Parser::new(text) {
        builder.process_event(event);
    }
    builder.finish()
}

/// Heading ranks are 1..=6; list items rank below every heading.
const LIST_RANK_BASE: usize = 6;

/// Deepest nesting kept in the tree; deeper nodes become siblings at this level.
pub const MAX_NESTING: usize = 64;

struct Slot {
    label: String,
    children: Vec<usize>,
}

struct TreeBuilder {
    /// Flat node storage; index 0 is the synthetic root.
    slots: Vec<Slot>,
    /// Open ancestors as (rank, slot index).
    stack: Vec<(usize, usize)>,
    /// Node currently receiving text.
    collecting: Option<usize>,
    list_depth: usize,
    in_code_block: bool,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            slots: vec![Slot {
                label: String::new(),
                children: Vec::new(),
            }],
            stack: vec![(0, 0)],
            collecting: None,
            list_depth: 0,
            in_code_block: false,
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(&tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) | Event::Code(text) => {
                if !self.in_code_block {
                    self.add_text(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => self.add_text(" "),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: &Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                let rank = *level as usize;
                let index = self.open_node(rank);
                self.collecting = Some(index);
            }
            Tag::List(_) => {
                // Text after a nested list belongs to no label.
                self.collecting = None;
                self.list_depth += 1;
            }
            Tag::Item => {
                let rank = LIST_RANK_BASE + self.list_depth;
                let index = self.open_node(rank);
                self.collecting = Some(index);
            }
            Tag::Paragraph => {
                if self.list_depth == 0 {
                    let index = self.new_slot();
                    self.attach(index);
                    self.collecting = Some(index);
                }
            }
            Tag::CodeBlock(_) => {
                self.collecting = None;
                self.in_code_block = true;
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => self.collecting = None,
            TagEnd::Paragraph => {
                if self.list_depth == 0 {
                    self.collecting = None;
                }
            }
            TagEnd::Item => {
                let rank = LIST_RANK_BASE + self.list_depth;
                self.close_from(rank);
                self.collecting = None;
            }
            TagEnd::List(_) => self.list_depth = self.list_depth.saturating_sub(1),
            TagEnd::CodeBlock => self.in_code_block = false,
            _ => {}
        }
    }

    fn add_text(&mut self, text: &str) {
        if let Some(index) = self.collecting {
            self.slots[index].label.push_str(text);
        }
    }

    /// Closes every open node ranked at or below `rank`, then opens a new one.
    fn open_node(&mut self, rank: usize) -> usize {
        self.close_from(rank);
        self.stack.truncate(MAX_NESTING);
        let index = self.new_slot();
        self.attach(index);
        self.stack.push((rank, index));
        index
    }

    fn close_from(&mut self, rank: usize) {
        while self.stack.len() > 1 && self.stack.last().is_some_and(|(r, _)| *r >= rank) {
            self.stack.pop();
        }
    }

    fn new_slot(&mut self) -> usize {
        self.slots.push(Slot {
            label: String::new(),
            children: Vec::new(),
        });
        self.slots.len() - 1
    }

    fn attach(&mut self, index: usize) {
        let parent = self.stack.last().map_or(0, |(_, p)| *p);
        self.slots[parent].children.push(index);
    }

    fn finish(self) -> Option<OutlineNode> {
        let mut root = self.build(0);
        match root.children.len() {
            0 => None,
            1 => root.children.pop(),
            _ => Some(root),
        }
    }

    fn build(&self, index: usize) -> OutlineNode {
        let slot = &self.slots[index];
        OutlineNode {
            label: normalize_label(&slot.label),
            children: slot.children.iter().map(|&c| self.build(c)).collect(),
        }
    }
}

fn normalize_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
