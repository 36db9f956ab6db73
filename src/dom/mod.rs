//! Read-only page snapshot
//!
//! A parsed page is flattened into document order once. Rules then work on
//! cheap [`DomNode`] handles, so a snapshot can be shared between threads and
//! scored by several rulesets without re-parsing.

mod style;

use std::borrow::Cow;
use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use style::{parse_length, tag_font_scale, InlineStyle};

pub use style::ROOT_FONT_SIZE;

/// Index of a node in document order.
pub type NodeId = usize;

/// Elements whose content is never rendered.
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "title", "meta", "link",
];

/// Longest rendered text a snapshot keeps precomputed for every node.
pub const SHORT_TEXT_LEN: usize = 64;

const PENDING: NodeId = usize::MAX;

/// Bounding box in CSS pixels, relative to the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Size of the window the page is assumed to be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1680.0,
            height: 950.0,
        }
    }
}

/// Geometry supplied by a host that has real layout information.
///
/// Every element matching `selector` takes the given values in place of what
/// could be derived from markup alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutHint {
    pub selector: String,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone)]
enum Content {
    Text(String),
    Child(NodeId),
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attrs: Vec<(String, String)>,
    parent: Option<NodeId>,
    content: Vec<Content>,
    size: Option<(f64, f64)>,
    rect: Option<Rect>,
    font_size: f64,
    hidden: bool,
    text: TextSummary,
}

/// Shape of a subtree's collapsed text, with the text itself kept when short.
#[derive(Debug, Clone, Default)]
struct TextSummary {
    /// Characters after whitespace collapsing, edge spaces included.
    chars: usize,
    leading_space: bool,
    trailing_space: bool,
    /// Collapsed text, present when the trimmed length is at most
    /// [`SHORT_TEXT_LEN`].
    short: Option<String>,
}

impl TextSummary {
    fn trimmed_len(&self) -> usize {
        self.chars
            .saturating_sub(usize::from(self.leading_space))
            .saturating_sub(usize::from(self.trailing_space))
    }

    /// Account for collapsed text of `chars` characters appended to the end.
    fn append(&mut self, chars: usize, leading_space: bool, trailing_space: bool) {
        if chars == 0 {
            return;
        }
        if self.chars == 0 {
            self.chars = chars;
            self.leading_space = leading_space;
        } else {
            self.chars += chars - usize::from(self.trailing_space && leading_space);
        }
        self.trailing_space = trailing_space;
    }
}

/// An element tree flattened into document order.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    nodes: Vec<NodeData>,
    viewport: Viewport,
    largest_image: Option<NodeId>,
}

struct Pending<'a> {
    element: ElementRef<'a>,
    parent: Option<(NodeId, usize)>,
    font_size: f64,
    hidden: bool,
}

impl PageSnapshot {
    /// Parse a page using markup-derived geometry and the default viewport.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        Self::build(&document, Viewport::default(), |_| Vec::new())
    }

    /// Parse a page, applying host layout hints on top of markup geometry.
    pub fn parse_with(
        html: &str,
        viewport: Viewport,
        hints: &[LayoutHint],
    ) -> Result<Self, ConfigurationError> {
        let document = Html::parse_document(html);

        let mut hinted = HashMap::new();
        for hint in hints {
            let selector = Selector::parse(&hint.selector).map_err(|e| {
                ConfigurationError::InvalidSelector {
                    selector: hint.selector.clone(),
                    reason: e.to_string(),
                }
            })?;
            for element in document.select(&selector) {
                hinted
                    .entry(element.id())
                    .or_insert_with(Vec::new)
                    .push(hint);
            }
        }

        Ok(Self::build(&document, viewport, |element| {
            hinted.get(&element.id()).cloned().unwrap_or_default()
        }))
    }

    fn build<'h, F>(document: &Html, viewport: Viewport, hints_for: F) -> Self
    where
        F: Fn(ElementRef<'_>) -> Vec<&'h LayoutHint>,
    {
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut stack = vec![Pending {
            element: document.root_element(),
            parent: None,
            font_size: ROOT_FONT_SIZE,
            hidden: false,
        }];

        while let Some(pending) = stack.pop() {
            let id = nodes.len();
            let element = pending.element;
            let el = element.value();
            let tag = el.name().to_ascii_lowercase();
            let attrs: Vec<(String, String)> = el
                .attrs()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            let style = el.attr("style").map(InlineStyle::parse).unwrap_or_default();
            let hints = hints_for(element);

            let font_size = hints
                .iter()
                .rev()
                .find_map(|h| h.font_size)
                .or_else(|| style.length("font-size", pending.font_size))
                .unwrap_or(pending.font_size * tag_font_scale(&tag));

            let hinted_rect = hints.iter().rev().find_map(|h| h.rect);
            let (size, rect) = match hinted_rect {
                Some(rect) => (Some((rect.width, rect.height)), Some(rect)),
                None => markup_geometry(&style, el.attr("width"), el.attr("height"), font_size),
            };

            let own_hidden = hints.iter().rev().find_map(|h| h.hidden).unwrap_or_else(|| {
                NON_RENDERED.contains(&tag.as_str())
                    || el.attr("hidden").is_some()
                    || style.hides()
                    || (tag == "input"
                        && el
                            .attr("type")
                            .is_some_and(|t| t.eq_ignore_ascii_case("hidden")))
                    || size.is_some_and(|(w, h)| w * h <= 0.0)
            });
            let hidden = pending.hidden || own_hidden;

            let mut content = Vec::new();
            let mut children = Vec::new();
            for child in element.children() {
                if let Some(text) = child.value().as_text() {
                    let collapsed = collapse_whitespace(text);
                    if !collapsed.is_empty() {
                        content.push(Content::Text(collapsed));
                    }
                } else if let Some(child_element) = ElementRef::wrap(child) {
                    children.push((child_element, content.len()));
                    content.push(Content::Child(PENDING));
                }
            }

            if let Some((parent, slot)) = pending.parent {
                if let Some(Content::Child(child)) = nodes[parent].content.get_mut(slot) {
                    *child = id;
                }
            }

            nodes.push(NodeData {
                tag,
                attrs,
                parent: pending.parent.map(|(parent, _)| parent),
                content,
                size,
                rect,
                font_size,
                hidden,
                text: TextSummary::default(),
            });

            // Reversed so the stack pops children in document order.
            for (child_element, slot) in children.into_iter().rev() {
                stack.push(Pending {
                    element: child_element,
                    parent: Some((id, slot)),
                    font_size,
                    hidden,
                });
            }
        }

        summarize_text(&mut nodes);

        let mut largest_image: Option<(NodeId, f64)> = None;
        for (id, node) in nodes.iter().enumerate() {
            if node.tag != "img" || node.hidden {
                continue;
            }
            if let Some((w, h)) = node.size {
                let area = w * h;
                if largest_image.map_or(true, |(_, best)| area > best) {
                    largest_image = Some((id, area));
                }
            }
        }

        Self {
            nodes,
            viewport,
            largest_image: largest_image.map(|(id, _)| id),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<DomNode<'_>> {
        (id < self.nodes.len()).then_some(DomNode { page: self, id })
    }

    /// All element nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = DomNode<'_>> + '_ {
        (0..self.nodes.len()).map(move |id| DomNode { page: self, id })
    }

    /// Largest visible `<img>` with a known size; earlier wins on equal area.
    pub fn largest_image(&self) -> Option<DomNode<'_>> {
        self.largest_image.and_then(|id| self.node(id))
    }
}

/// Box geometry from `width`/`height`/`left`/`top` in style or attributes.
///
/// A position is only reported when the markup states one; a bare size still
/// feeds area-based rules.
fn markup_geometry(
    style: &InlineStyle,
    width_attr: Option<&str>,
    height_attr: Option<&str>,
    font_size: f64,
) -> (Option<(f64, f64)>, Option<Rect>) {
    let dimension = |property: &str, attr: Option<&str>| {
        style
            .get(property)
            .filter(|v| !v.ends_with('%'))
            .and_then(|v| parse_length(v, font_size))
            .or_else(|| {
                attr.filter(|v| !v.trim().ends_with('%'))
                    .and_then(|v| parse_length(v, font_size))
            })
    };

    let size = match (dimension("width", width_attr), dimension("height", height_attr)) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => None,
    };

    let left = style.length("left", font_size);
    let top = style.length("top", font_size);
    let rect = match (size, left, top) {
        (Some(_), None, None) | (None, _, _) => None,
        (Some((w, h)), left, top) => Some(Rect::new(left.unwrap_or(0.0), top.unwrap_or(0.0), w, h)),
    };

    (size, rect)
}

/// Fill in every node's [`TextSummary`] in one pass, children first.
fn summarize_text(nodes: &mut [NodeData]) {
    // Document order puts every child after its parent.
    for id in (0..nodes.len()).rev() {
        let data = &nodes[id];
        let rendered_child = |child: &NodeId| {
            nodes
                .get(*child)
                .filter(|c| !(c.hidden && !data.hidden))
        };

        let mut summary = TextSummary::default();
        for item in &data.content {
            match item {
                Content::Text(text) => summary.append(
                    text.chars().count(),
                    text.starts_with(' '),
                    text.ends_with(' '),
                ),
                Content::Child(child) => {
                    if let Some(child) = rendered_child(child) {
                        summary.append(
                            child.text.chars,
                            child.text.leading_space,
                            child.text.trailing_space,
                        );
                    }
                }
            }
        }

        if summary.trimmed_len() <= SHORT_TEXT_LEN {
            let mut short = String::new();
            for item in &data.content {
                let piece = match item {
                    Content::Text(text) => Some(text.as_str()),
                    Content::Child(child) => {
                        rendered_child(child).and_then(|c| c.text.short.as_deref())
                    }
                };
                if let Some(piece) = piece {
                    push_collapsed(&mut short, piece);
                }
            }
            summary.short = Some(short);
        }

        nodes[id].text = summary;
    }
}

/// Append already-collapsed text without doubling a space at the seam.
fn push_collapsed(out: &mut String, piece: &str) {
    match piece.strip_prefix(' ') {
        Some(rest) if out.ends_with(' ') => out.push_str(rest),
        _ => out.push_str(piece),
    }
}

/// Collapse whitespace runs to one space, keeping a space at either edge.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Handle to one element of a [`PageSnapshot`].
#[derive(Clone, Copy)]
pub struct DomNode<'a> {
    page: &'a PageSnapshot,
    id: NodeId,
}

impl<'a> DomNode<'a> {
    fn data(&self) -> &'a NodeData {
        &self.page.nodes[self.id]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn page(&self) -> &'a PageSnapshot {
        self.page
    }

    /// Lowercase tag name.
    pub fn tag(&self) -> &'a str {
        &self.data().tag
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn parent(&self) -> Option<DomNode<'a>> {
        self.data().parent.and_then(|id| self.page.node(id))
    }

    /// Parent, grandparent, ... up to the root element.
    pub fn ancestors(&self) -> impl Iterator<Item = DomNode<'a>> + 'a {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    pub fn children(&self) -> impl Iterator<Item = DomNode<'a>> + 'a {
        let page = self.page;
        self.data().content.iter().filter_map(move |item| match item {
            Content::Child(id) => page.node(*id),
            Content::Text(_) => None,
        })
    }

    /// Whether the element directly holds non-whitespace text.
    pub fn has_own_text(&self) -> bool {
        self.data().content.iter().any(|item| match item {
            Content::Text(text) => !text.trim().is_empty(),
            Content::Child(_) => false,
        })
    }

    /// Text of the element's direct text children only.
    pub fn own_text(&self) -> String {
        let raw: String = self
            .data()
            .content
            .iter()
            .filter_map(|item| match item {
                Content::Text(text) => Some(text.as_str()),
                Content::Child(_) => None,
            })
            .collect();
        collapse_whitespace(&raw).trim().to_string()
    }

    /// Rendered text of the subtree; hidden descendants of a visible element
    /// are skipped.
    pub fn text(&self) -> String {
        self.text_cow().into_owned()
    }

    /// Like [`text`](Self::text), borrowing from the snapshot when the text
    /// is short.
    pub fn text_cow(&self) -> Cow<'a, str> {
        match self.short_text() {
            Some(text) => Cow::Borrowed(text),
            None => Cow::Owned(self.collect_text()),
        }
    }

    /// Rendered text, when it is at most [`SHORT_TEXT_LEN`] characters.
    pub fn short_text(&self) -> Option<&'a str> {
        self.data().text.short.as_deref().map(str::trim)
    }

    /// Character count of the rendered text.
    pub fn text_len(&self) -> usize {
        self.data().text.trimmed_len()
    }

    fn collect_text(&self) -> String {
        let nodes = &self.page.nodes;
        let mut raw = String::new();
        let mut stack = vec![(self.id, 0usize)];

        while let Some((id, pos)) = stack.pop() {
            let Some(data) = nodes.get(id) else {
                continue;
            };
            let Some(item) = data.content.get(pos) else {
                continue;
            };
            stack.push((id, pos + 1));
            match item {
                Content::Text(text) => raw.push_str(text),
                Content::Child(child) => {
                    let skip = nodes
                        .get(*child)
                        .map_or(true, |c| c.hidden && !data.hidden);
                    if !skip {
                        stack.push((*child, 0));
                    }
                }
            }
        }

        collapse_whitespace(&raw).trim().to_string()
    }

    /// Width and height, when known.
    pub fn size(&self) -> Option<(f64, f64)> {
        self.data().size
    }

    /// Bounding box, when both size and position are known.
    pub fn rect(&self) -> Option<Rect> {
        self.data().rect
    }

    /// Computed font size in pixels.
    pub fn font_size(&self) -> f64 {
        self.data().font_size
    }

    pub fn is_visible(&self) -> bool {
        !self.data().hidden
    }
}

impl std::fmt::Debug for DomNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomNode")
            .field("id", &self.id)
            .field("tag", &self.tag())
            .finish()
    }
}

impl PartialEq for DomNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.page, other.page) && self.id == other.id
    }
}
