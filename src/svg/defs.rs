//! Addressable definitions (gradients, patterns, markers, masks, filters,
//! clip paths, symbols) and the effects built from them.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;

use crate::canvas::{ColorSpace, PaintTarget};
use crate::types::{BlendMode, Matrix};

use super::bounding_box::calculate_bounding_box;
use super::document::Renderer;
use super::geometry::{Viewport, preserve_ratio, size, transform};
use super::node::Node;
use super::paint::url_fragment;

const CATEGORIES: [&str; 8] = [
    "filter", "gradient", "image", "marker", "mask", "pattern", "path", "symbol",
];

type NodeMap = HashMap<String, Rc<Node>>;

/// Definitions by `id`, one map per category. Gradient and pattern entries
/// have their `href` chains already merged in.
#[derive(Debug, Default)]
pub(crate) struct DefsRegistry {
    filters: NodeMap,
    gradients: NodeMap,
    images: NodeMap,
    markers: NodeMap,
    masks: NodeMap,
    patterns: NodeMap,
    paths: NodeMap,
    symbols: NodeMap,
}

impl DefsRegistry {
    pub(crate) fn collect(root: &Rc<Node>) -> DefsRegistry {
        let mut registry = DefsRegistry::default();
        let mut order = Vec::new();
        registry.scan(root, &mut order);
        registry.gradients = resolve_inheritance(&registry.gradients, &order);
        registry.patterns = resolve_inheritance(&registry.patterns, &order);
        registry
    }

    /// Registers ids depth-first; `order` receives them in document order.
    fn scan(&mut self, node: &Rc<Node>, order: &mut Vec<String>) {
        if let Some(id) = node.get("id") {
            order.push(id.to_string());
            let tag = node.tag().to_lowercase();
            for category in CATEGORIES {
                if !tag.contains(category) {
                    continue;
                }
                let map = match category {
                    "filter" => &mut self.filters,
                    "gradient" => &mut self.gradients,
                    "image" => &mut self.images,
                    "marker" => &mut self.markers,
                    "mask" => &mut self.masks,
                    "pattern" => &mut self.patterns,
                    "path" => &mut self.paths,
                    _ => &mut self.symbols,
                };
                map.entry(id.to_string()).or_insert_with(|| node.clone());
            }
        }
        for child in node.children() {
            self.scan(child, order);
        }
    }

    pub(crate) fn filter(&self, id: &str) -> Option<Rc<Node>> {
        self.filters.get(id).cloned()
    }

    pub(crate) fn gradient(&self, id: &str) -> Option<Rc<Node>> {
        self.gradients.get(id).cloned()
    }

    pub(crate) fn image(&self, id: &str) -> Option<Rc<Node>> {
        self.images.get(id).cloned()
    }

    pub(crate) fn marker(&self, id: &str) -> Option<Rc<Node>> {
        self.markers.get(id).cloned()
    }

    pub(crate) fn mask(&self, id: &str) -> Option<Rc<Node>> {
        self.masks.get(id).cloned()
    }

    pub(crate) fn pattern(&self, id: &str) -> Option<Rc<Node>> {
        self.patterns.get(id).cloned()
    }

    /// Paths and clip paths.
    pub(crate) fn path(&self, id: &str) -> Option<Rc<Node>> {
        self.paths.get(id).cloned()
    }

    pub(crate) fn symbol(&self, id: &str) -> Option<Rc<Node>> {
        self.symbols.get(id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        [
            &self.filters,
            &self.gradients,
            &self.images,
            &self.markers,
            &self.masks,
            &self.patterns,
            &self.paths,
            &self.symbols,
        ]
        .iter()
        .map(|map| map.len())
        .sum()
    }
}

// Entries resolve in document order, so the edge dropped from a cycle is
// always the one closing back onto the earliest element.
fn resolve_inheritance(raw: &NodeMap, order: &[String]) -> NodeMap {
    let mut resolved = NodeMap::new();
    for id in order.iter().filter(|id| raw.contains_key(id.as_str())) {
        resolve_entry(id, raw, &mut resolved, &mut Vec::new());
    }
    resolved
}

fn resolve_entry(
    id: &str,
    raw: &NodeMap,
    resolved: &mut NodeMap,
    visiting: &mut Vec<String>,
) -> Option<Rc<Node>> {
    if let Some(node) = resolved.get(id) {
        return Some(node.clone());
    }
    let node = raw.get(id)?.clone();
    let parent_id = node
        .href()
        .and_then(|href| href.trim().strip_prefix('#'))
        .map(str::to_string);
    let merged = match parent_id {
        Some(parent_id) if parent_id == id || visiting.iter().any(|v| *v == parent_id) => {
            warn!(id, href = %parent_id, "dropping cyclic href");
            node
        }
        Some(parent_id) => {
            visiting.push(id.to_string());
            let parent = resolve_entry(&parent_id, raw, resolved, visiting);
            visiting.pop();
            match parent {
                Some(parent) => Rc::new(node.inherit_from(&parent)),
                None => node,
            }
        }
        None => node,
    };
    resolved.insert(id.to_string(), merged.clone());
    Some(merged)
}

impl Renderer<'_> {
    /// Fills or strokes `node` with a pattern tile.
    pub(crate) fn draw_pattern(
        &mut self,
        node: &Node,
        pattern: &Node,
        font_size: f32,
        opacity: f32,
        stroke: bool,
    ) -> bool {
        let bbox = calculate_bounding_box(node, node.tag(), &self.state.viewport, font_size, stroke);
        let (x, y, width, height) = if pattern.get("patternUnits") == Some("userSpaceOnUse") {
            let viewport = self.state.viewport;
            let (x, y) = viewport.point(pattern.get("x"), pattern.get("y"), font_size);
            let (width, height) = viewport.point(pattern.get("width"), pattern.get("height"), font_size);
            (x, y, width, height)
        } else {
            let Some(bbox) = bbox else {
                return false;
            };
            let fraction = |name: &str| size(pattern.get(name), font_size, Some(1.0));
            (
                fraction("x") * bbox.width + bbox.x,
                fraction("y") * bbox.height + bbox.y,
                fraction("width") * bbox.width,
                fraction("height") * bbox.height,
            )
        };
        if width <= 0.0 || height <= 0.0 {
            return false;
        }

        let mut matrix = Matrix::translate(x, y);
        if pattern.has("patternTransform") {
            let pattern_transform = transform(
                pattern.get("patternTransform"),
                font_size,
                self.state.viewport.diagonal(),
            );
            matrix = matrix * pattern_transform;
        }
        matrix = matrix * self.canvas.ctm();

        let content = if let Some(viewbox) = pattern.viewbox() {
            let ratio = preserve_ratio(
                pattern,
                "pattern",
                &self.state.viewport,
                font_size,
                width,
                height,
                Some(viewbox),
                None,
            );
            (ratio.matrix(), Viewport::new(viewbox[2], viewbox[3]))
        } else if pattern.get("patternContentUnits") == Some("objectBoundingBox") {
            let Some(bbox) = bbox else {
                return false;
            };
            (
                Matrix::scale(bbox.width, bbox.height),
                Viewport::new(1.0, 1.0),
            )
        } else {
            (Matrix::identity(), self.state.viewport)
        };

        let tile = self
            .canvas
            .begin_pattern([0.0, 0.0, width, height], width, height, matrix);
        self.canvas.set_alpha(opacity, PaintTarget::Both);
        self.canvas.transform(content.0);
        let saved = std::mem::replace(&mut self.state.viewport, content.1);
        for child in pattern.children() {
            self.draw_node(child, font_size, true);
        }
        self.state.viewport = saved;
        self.canvas.end_pattern();

        self.canvas.color_space(ColorSpace::Pattern, stroke);
        self.canvas.set_color_special(tile, stroke);
        true
    }

    /// Luminosity soft mask from `mask="url(#id)"`.
    pub(crate) fn apply_mask(&mut self, node: &Node, font_size: f32) {
        let Some(id) = node.get("mask").and_then(url_fragment) else {
            return;
        };
        let Some(mask) = self.document.defs.mask(id) else {
            self.note_unresolved("mask", id);
            return;
        };
        let (x, y, width, height) = if mask.get("maskUnits") == Some("userSpaceOnUse") {
            let viewport = self.state.viewport;
            (
                size(Some(mask.get("x").unwrap_or("-10%")), font_size, Some(viewport.width)),
                size(Some(mask.get("y").unwrap_or("-10%")), font_size, Some(viewport.height)),
                size(Some(mask.get("width").unwrap_or("120%")), font_size, Some(viewport.width)),
                size(Some(mask.get("height").unwrap_or("120%")), font_size, Some(viewport.height)),
            )
        } else {
            let reference = calculate_bounding_box(node, node.tag(), &self.state.viewport, font_size, false)
                .map(|bbox| (bbox.x, bbox.y, bbox.width, bbox.height))
                .unwrap_or_else(|| {
                    let (w, h) = self.state.viewport.point(node.get("width"), node.get("height"), font_size);
                    (0.0, 0.0, w, h)
                });
            let fraction = |name: &str, default: &str, reference: f32| {
                size(Some(mask.get(name).unwrap_or(default)), font_size, Some(reference))
            };
            (
                reference.0 + fraction("x", "-10%", reference.2),
                reference.1 + fraction("y", "-10%", reference.3),
                fraction("width", "120%", reference.2),
                fraction("height", "120%", reference.3),
            )
        };

        let soft_mask = self.canvas.begin_soft_mask([x, y, x + width, y + height]);
        self.canvas.rectangle(x, y, width, height);
        self.canvas.clip(false);
        self.canvas.end_path();
        for child in mask.children() {
            self.draw_node(child, font_size, true);
        }
        self.canvas.end_soft_mask();
        self.canvas.set_soft_mask(soft_mask);
    }

    /// `feOffset` and `feBlend` primitives of `filter="url(#id)"`.
    pub(crate) fn apply_filters(&mut self, node: &Node, font_size: f32) {
        let Some(id) = node.get("filter").and_then(url_fragment) else {
            return;
        };
        let Some(filter) = self.document.defs.filter(id) else {
            self.note_unresolved("filter", id);
            return;
        };
        for primitive in filter.children() {
            match primitive.tag() {
                "feOffset" => {
                    let (dx, dy) = if filter.get("primitiveUnits") == Some("objectBoundingBox") {
                        match calculate_bounding_box(node, node.tag(), &self.state.viewport, font_size, false) {
                            Some(bbox) => (
                                size(primitive.get("dx"), font_size, Some(1.0)) * bbox.width,
                                size(primitive.get("dy"), font_size, Some(1.0)) * bbox.height,
                            ),
                            None => (0.0, 0.0),
                        }
                    } else {
                        self.state
                            .viewport
                            .point(primitive.get("dx"), primitive.get("dy"), font_size)
                    };
                    self.canvas.transform(Matrix::translate(dx, dy));
                }
                "feBlend" => {
                    let mode = BlendMode::from_keyword(primitive.get("mode").unwrap_or("normal"));
                    self.canvas.set_blend_mode(mode);
                }
                _ => {}
            }
        }
    }
}
