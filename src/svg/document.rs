//! Parsed SVG documents and the per-node drawing traversal.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::RenderOptions;
use crate::assets::{Fetcher, resolve_url, split_fragment};
use crate::canvas::{Canvas, PaintTarget};
use crate::debug::DebugLogger;
use crate::error::{ParseFault, SvgError};
use crate::font::TextShaper;
use crate::images::ImageDecoder;
use crate::types::Matrix;

use super::bounding_box::{BoundingBox, calculate_bounding_box};
use super::css::SvgStylesheet;
use super::defs::DefsRegistry;
use super::geometry::{Viewport, size, transform, with_origin};
use super::node::{Element, ElementIndex, Node, build_elements};
use super::paint::{alpha_value, url_fragment};
use super::text::padded_text_box;

/// Tags whose children are only drawn through a reference.
const DEF_TYPES: &[&str] = &[
    "clipPath",
    "filter",
    "linearGradient",
    "marker",
    "mask",
    "pattern",
    "radialGradient",
    "symbol",
];

const TEXT_TAGS: &[&str] = &["a", "text", "textPath", "tspan"];

fn is_text(tag: &str) -> bool {
    TEXT_TAGS.contains(&tag)
}

/// A parsed and cascaded SVG document with its definitions collected.
#[derive(Debug)]
pub struct SvgDocument {
    pub(crate) root: Rc<Node>,
    root_element: Rc<Element>,
    pub(crate) elements: ElementIndex,
    pub(crate) defs: DefsRegistry,
    url: Option<String>,
}

impl SvgDocument {
    /// Parses `bytes`, matches embedded stylesheets (imports go through
    /// `fetcher`), cascades every node and collects definitions.
    pub fn parse(
        bytes: &[u8],
        url: Option<&str>,
        fetcher: &dyn Fetcher,
    ) -> Result<SvgDocument, SvgError> {
        let text = std::str::from_utf8(bytes)?;
        let text = text.trim_start_matches('\u{feff}');
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options)?;
        if doc.root_element().tag_name().name() != "svg" {
            return Err(SvgError::MissingRoot);
        }
        let sheet = SvgStylesheet::from_document(&doc, url, fetcher);
        let (root_element, elements) = build_elements(&doc, &sheet);
        let root = Rc::new(Node::build(&root_element, None, &elements));
        let defs = DefsRegistry::collect(&root);
        debug!(
            url = url.unwrap_or("<inline>"),
            elements = elements.len(),
            rules = sheet.len(),
            definitions = defs.len(),
            "svg document parsed"
        );
        Ok(SvgDocument {
            root,
            root_element,
            elements,
            defs,
            url: url.map(str::to_string),
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn viewbox(&self) -> Option<[f32; 4]> {
        self.root.viewbox()
    }

    /// Root `width`/`height`; percentages leave the dimension unknown.
    pub fn intrinsic_size(&self, font_size: f32) -> (Option<f32>, Option<f32>) {
        let dimension = |name: &str| {
            let raw = self.root.get(name).unwrap_or("100%");
            (!raw.contains('%')).then(|| size(Some(raw), font_size, None))
        };
        (dimension("width"), dimension("height"))
    }

    /// Inner size of the root viewport drawn at `width` x `height`.
    fn inner_viewport(&self, width: f32, height: f32, font_size: f32) -> Viewport {
        if let Some(viewbox) = self.viewbox() {
            return Viewport::new(viewbox[2], viewbox[3]);
        }
        match self.intrinsic_size(font_size) {
            (Some(w), Some(h)) => Viewport::new(w, h),
            _ => Viewport::new(width, height),
        }
    }

    /// Draws the whole document into a `width` x `height` box of `canvas`.
    pub(crate) fn draw(&self, canvas: &mut Canvas, width: f32, height: f32, context: &RenderContext<'_>) {
        let mut renderer = Renderer {
            document: self,
            canvas,
            context,
            state: DrawState::default(),
        };
        renderer.draw_root(width, height);
    }
}

/// Collaborators and options shared by every document drawn in one render.
pub(crate) struct RenderContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub images: &'a dyn ImageDecoder,
    pub shaper: &'a dyn TextShaper,
    pub options: &'a RenderOptions,
    pub debug: Option<&'a DebugLogger>,
}

/// Mutable state of one top-level draw call.
#[derive(Debug, Default)]
pub(crate) struct DrawState {
    pub concrete: (f32, f32),
    pub viewport: Viewport,
    pub cursor_position: (f32, f32),
    pub cursor_d_position: (f32, f32),
    // External documents referenced by `use`, by URL.
    pub use_cache: HashMap<String, Rc<SvgDocument>>,
    pub use_stack: Vec<String>,
    pub depth: usize,
    // Open text-anchor chunks, innermost last; text inside them is not
    // shifted again.
    pub anchor_chunks: Vec<AnchorChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("middle") => Anchor::Middle,
            Some("end") => Anchor::End,
            _ => Anchor::Start,
        }
    }
}

/// Text drawn since the last absolute `x`/`y`, recorded into its own group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnchorChunk {
    anchor: Anchor,
    bbox: BoundingBox,
    font_size: f32,
}

fn has_anchored_text(node: &Node) -> bool {
    Anchor::from_attribute(node.get("text-anchor")) != Anchor::Start
        || node
            .children().iter()
            .any(|child| is_text(child.tag()) && has_anchored_text(child))
}

fn starts_text_chunk(node: &Node) -> bool {
    is_text(node.tag()) && (node.has("x") || node.has("y"))
}

pub(crate) struct Renderer<'r> {
    pub(crate) document: &'r SvgDocument,
    pub(crate) canvas: &'r mut Canvas,
    pub(crate) context: &'r RenderContext<'r>,
    pub(crate) state: DrawState,
}

impl Renderer<'_> {
    pub(crate) fn length(&self, value: Option<&str>, font_size: f32) -> f32 {
        self.state.viewport.length(value, font_size)
    }

    pub(crate) fn is_root(&self, node: &Node) -> bool {
        std::ptr::eq(node, Rc::as_ptr(&self.document.root))
    }

    /// Logs a reference that could not be resolved.
    pub(crate) fn note_unresolved(&self, kind: &str, id: &str) {
        warn!(kind, id, "unresolved svg reference");
        if let Some(logger) = self.context.debug {
            logger.increment(&format!("svg.unresolved.{kind}"), 1);
            logger.log_event("unresolved", &[("kind", kind), ("id", id)]);
        }
    }

    /// Runs `draw` against another document, keeping the canvas and the
    /// draw state.
    pub(crate) fn with_document<R>(
        &mut self,
        document: &SvgDocument,
        draw: impl FnOnce(&mut Renderer<'_>) -> R,
    ) -> R {
        let state = std::mem::take(&mut self.state);
        let mut nested = Renderer {
            document,
            canvas: &mut *self.canvas,
            context: self.context,
            state,
        };
        let result = draw(&mut nested);
        self.state = nested.state;
        result
    }

    /// Draws this renderer's document root in a `width` x `height` viewport.
    pub(crate) fn draw_root(&mut self, width: f32, height: f32) {
        let font_size = self.context.options.default_font_size;
        let saved = (
            self.state.concrete,
            self.state.viewport,
            self.state.cursor_position,
            self.state.cursor_d_position,
            std::mem::take(&mut self.state.anchor_chunks),
        );
        self.state.concrete = (width, height);
        self.state.viewport = self.document.inner_viewport(width, height, font_size);
        self.state.cursor_position = (0.0, 0.0);
        self.state.cursor_d_position = (0.0, 0.0);

        let root = self.document.root.clone();
        self.draw_node(&root, font_size, true);

        (
            self.state.concrete,
            self.state.viewport,
            self.state.cursor_position,
            self.state.cursor_d_position,
            self.state.anchor_chunks,
        ) = saved;
    }

    pub(crate) fn draw_node(&mut self, node: &Node, font_size: f32, fill_stroke: bool) {
        self.draw_node_as(node, node.tag(), font_size, fill_stroke);
    }

    /// Draws `node` with the callback of `tag`, which differs from the
    /// node's own tag for `use`d symbols and clip paths.
    pub(crate) fn draw_node_as(&mut self, node: &Node, tag: &str, font_size: f32, fill_stroke: bool) {
        if tag == "defs" {
            return;
        }
        if self.state.depth >= self.context.options.max_depth {
            warn!(tag, depth = self.state.depth, "svg nesting too deep, node skipped");
            return;
        }
        self.state.depth += 1;
        if let Some(logger) = self.context.debug {
            logger.increment(&format!("svg.node.{tag}"), 1);
        }

        let font_size = size(
            Some(node.get("font-size").unwrap_or("1em")),
            font_size,
            Some(font_size),
        );
        let initial_ctm = self.canvas.ctm();
        if fill_stroke {
            self.canvas.push_state();
        }

        self.apply_filters(node, font_size);
        self.apply_transform(node, font_size);

        let opacity = alpha_value(node.get("opacity"));
        let opacity_group = fill_stroke && (0.0..1.0).contains(&opacity);
        if opacity_group {
            let bbox = calculate_bounding_box(node, tag, &self.state.viewport, font_size, true)
                .map(|bbox| bbox.to_array())
                .unwrap_or([0.0, 0.0, self.state.viewport.width, self.state.viewport.height]);
            self.canvas.begin_group(bbox);
        }

        self.apply_clip(node, tag, font_size);

        let anchored = tag == "text" && has_anchored_text(node);
        if anchored {
            self.open_anchor_chunk(Anchor::from_attribute(node.get("text-anchor")), font_size);
        }

        if node.is_displayed() && is_text(tag) {
            node.set_text_bounding_box(BoundingBox::EMPTY);
        }

        let saved_size = (tag == "svg").then_some((self.state.concrete, self.state.viewport));

        if node.is_visible() {
            if let Err(fault) = self.draw_callback(node, tag, font_size) {
                debug!(tag, %fault, "shape stopped at a coordinate fault");
            }
        }

        if node.is_displayed() && !DEF_TYPES.contains(&tag) {
            for child in node.children() {
                if anchored && starts_text_chunk(child) {
                    self.split_anchor_chunk(
                        Anchor::from_attribute(child.get("text-anchor")),
                        font_size,
                    );
                }
                self.draw_node(child, font_size, fill_stroke);
                if is_text(tag) && is_text(child.tag()) && child.is_visible() {
                    let child_box = child.text_bounding_box();
                    if child_box.is_valid() {
                        node.set_text_bounding_box(node.text_bounding_box().union(child_box));
                    }
                }
            }
        }

        if let Some((concrete, viewport)) = saved_size {
            self.state.concrete = concrete;
            self.state.viewport = viewport;
        }

        self.apply_mask(node, font_size);
        if fill_stroke && self.canvas.has_path() {
            self.fill_stroke(node, font_size, false);
        }
        self.draw_markers(node, font_size, fill_stroke);

        if anchored {
            self.close_anchor_chunk();
        }

        if opacity_group {
            if let Some(group) = self.canvas.end_group() {
                self.canvas.set_alpha(opacity, PaintTarget::Both);
                self.canvas.draw_x_object(group);
            }
        }

        if tag == "text" {
            self.state.cursor_position = (0.0, 0.0);
            self.state.cursor_d_position = (0.0, 0.0);
        }

        if fill_stroke {
            self.canvas.pop_state();
        } else {
            // Clip content shares one path, so undo this node's transforms.
            self.restore_ctm(initial_ctm);
        }
        self.state.depth -= 1;
    }

    fn draw_callback(&mut self, node: &Node, tag: &str, font_size: f32) -> Result<(), ParseFault> {
        match tag {
            "a" | "text" | "textPath" | "tspan" => self.draw_text(node, font_size),
            "circle" => self.draw_circle(node, font_size),
            "ellipse" => self.draw_ellipse(node, font_size),
            "image" => self.draw_image(node, font_size),
            "line" => self.draw_line(node, font_size),
            "path" => self.draw_path(node, font_size),
            "polyline" => self.draw_polyline(node, font_size, false),
            "polygon" => self.draw_polyline(node, font_size, true),
            "rect" => self.draw_rect(node, font_size),
            "svg" => self.draw_svg(node, font_size),
            "use" => self.draw_use(node, font_size),
            _ => Ok(()),
        }
    }

    fn open_anchor_chunk(&mut self, anchor: Anchor, font_size: f32) {
        self.canvas.begin_group([0.0; 4]);
        self.state.anchor_chunks.push(AnchorChunk {
            anchor,
            bbox: BoundingBox::EMPTY,
            font_size,
        });
    }

    /// Closes the innermost chunk and draws it shifted by its own width.
    fn close_anchor_chunk(&mut self) {
        let Some(chunk) = self.state.anchor_chunks.pop() else {
            return;
        };
        let Some(group) = self.canvas.end_group() else {
            return;
        };
        self.canvas.push_state();
        if chunk.bbox.is_valid() {
            self.canvas
                .set_group_bbox(group, padded_text_box(chunk.bbox, chunk.font_size));
            let shift = match chunk.anchor {
                Anchor::Start => 0.0,
                Anchor::Middle => chunk.bbox.width / 2.0,
                Anchor::End => chunk.bbox.width,
            };
            if shift != 0.0 {
                self.canvas.transform(Matrix::translate(-shift, 0.0));
            }
        }
        self.canvas.draw_x_object(group);
        self.canvas.pop_state();
    }

    /// Starts a new chunk at an absolute text position. A chunk holding no
    /// text yet only takes the new anchor.
    fn split_anchor_chunk(&mut self, anchor: Anchor, font_size: f32) {
        let Some(chunk) = self.state.anchor_chunks.last_mut() else {
            return;
        };
        if chunk.bbox.is_empty() {
            chunk.anchor = anchor;
            return;
        }
        self.close_anchor_chunk();
        self.open_anchor_chunk(anchor, font_size);
    }

    pub(crate) fn extend_anchor_chunk(&mut self, bbox: BoundingBox) {
        if let Some(chunk) = self.state.anchor_chunks.last_mut() {
            chunk.bbox = chunk.bbox.union(bbox);
        }
    }

    fn restore_ctm(&mut self, target: Matrix) {
        let current = self.canvas.ctm();
        if current == target {
            return;
        }
        if let Some(inverse) = current.invert() {
            self.canvas.transform(target * inverse);
        }
    }

    fn apply_transform(&mut self, node: &Node, font_size: f32) {
        if !node.has("transform") {
            return;
        }
        let viewport = self.state.viewport;
        let matrix = transform(node.get("transform"), font_size, viewport.diagonal());
        let matrix = with_origin(matrix, node.get("transform-origin"), &viewport, font_size);
        if matrix.invert().is_some() {
            self.canvas.transform(matrix);
        } else {
            debug!(tag = node.tag(), "singular transform ignored");
        }
    }

    /// Clips to `clip-path`. Missing references clip everything away.
    fn apply_clip(&mut self, node: &Node, tag: &str, font_size: f32) {
        let Some(id) = node.get("clip-path").and_then(url_fragment) else {
            return;
        };
        let Some(clip_path) = self.document.defs.path(id) else {
            self.note_unresolved("clip-path", id);
            self.canvas.rectangle(0.0, 0.0, 0.0, 0.0);
            self.canvas.clip(false);
            self.canvas.end_path();
            return;
        };

        let initial_ctm = self.canvas.ctm();
        if clip_path.get("clipPathUnits") == Some("objectBoundingBox") {
            let bbox = calculate_bounding_box(node, tag, &self.state.viewport, font_size, false)
                .unwrap_or_else(|| {
                    let viewport = self.state.viewport;
                    let (x, y) = viewport.point(node.get("x"), node.get("y"), font_size);
                    let (w, h) = viewport.point(node.get("width"), node.get("height"), font_size);
                    BoundingBox::new(x, y, w, h)
                });
            self.canvas.transform(Matrix::new(bbox.width, 0.0, 0.0, bbox.height, bbox.x, bbox.y));
        }
        self.draw_node_as(&clip_path, "g", font_size, false);
        self.canvas.rectangle(0.0, 0.0, 0.0, 0.0);
        let evenodd = clip_path
            .children()
            .first()
            .and_then(|child| child.get("clip-rule"))
            .or(clip_path.get("clip-rule"))
            == Some("evenodd");
        self.canvas.clip(evenodd);
        self.canvas.end_path();
        self.restore_ctm(initial_ctm);
    }

    /// Draws the target of a `use`, local or in an external document.
    pub(crate) fn draw_use(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let Some(href) = node.href() else {
            return Ok(());
        };
        let (document_part, fragment) = split_fragment(href);
        let external = if document_part.is_empty() {
            None
        } else {
            let base = node.get("xml:base").or(self.document.url());
            let url = resolve_url(base, document_part);
            match self.external_document(&url) {
                Some(document) => Some(document),
                None => return Ok(()),
            }
        };
        let key = match &external {
            Some(document) => format!("{}#{}", document.url().unwrap_or_default(), fragment.unwrap_or_default()),
            None => format!("#{}", fragment.unwrap_or_default()),
        };
        if self.state.use_stack.contains(&key) {
            warn!(href, "recursive use skipped");
            return Ok(());
        }

        let document = external.as_deref().unwrap_or(self.document);
        let element = match fragment {
            Some(id) => document.elements.get(id).cloned(),
            None => Some(document.root_element.clone()),
        };
        let Some(element) = element else {
            self.note_unresolved("use", href);
            return Ok(());
        };

        let mut instance = Node::build(&element, Some(node), &document.elements);
        let tag = if matches!(element.tag.as_str(), "svg" | "symbol") {
            if let (Some(width), Some(height)) = (node.get("width"), node.get("height")) {
                instance.set_attribute("width", width);
                instance.set_attribute("height", height);
            }
            "svg"
        } else {
            element.tag.as_str()
        };

        let (x, y) = self.state.viewport.point(node.get("x"), node.get("y"), font_size);
        self.canvas.push_state();
        self.canvas.transform(Matrix::translate(x, y));
        self.state.use_stack.push(key);
        match &external {
            Some(document) => self.with_document(document, |nested| {
                nested.draw_node_as(&instance, tag, font_size, true);
            }),
            None => self.draw_node_as(&instance, tag, font_size, true),
        }
        self.state.use_stack.pop();
        self.canvas.pop_state();
        Ok(())
    }

    fn external_document(&mut self, url: &str) -> Option<Rc<SvgDocument>> {
        if let Some(document) = self.state.use_cache.get(url) {
            return Some(document.clone());
        }
        let parsed = self
            .context
            .fetcher
            .fetch(url)
            .and_then(|bytes| SvgDocument::parse(&bytes, Some(url), self.context.fetcher));
        match parsed {
            Ok(document) => {
                let document = Rc::new(document);
                self.state.use_cache.insert(url.to_string(), document.clone());
                Some(document)
            }
            Err(err) => {
                warn!(url, error = %err, "external use target not loaded");
                self.note_unresolved("use", url);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::{Asset, AssetBundle, AssetKind};
    use crate::canvas::{Command, Drawing, Resource};
    use crate::font::FontRegistry;
    use crate::images::RasterImages;

    pub(crate) fn render_with_assets(svg: &str, assets: &[(&str, &[u8])]) -> Drawing {
        let mut bundle = AssetBundle::default();
        for (name, data) in assets {
            bundle.add(Asset::new(*name, AssetKind::Svg, data.to_vec()));
        }
        let document = SvgDocument::parse(svg.as_bytes(), None, &bundle).expect("valid svg");
        let options = RenderOptions::default();
        let shaper = FontRegistry::new();
        let context = RenderContext {
            fetcher: &bundle,
            images: &RasterImages,
            shaper: &shaper,
            options: &options,
            debug: None,
        };
        let (width, height) = match document.intrinsic_size(16.0) {
            (Some(w), Some(h)) => (w, h),
            _ => (100.0, 100.0),
        };
        let mut canvas = Canvas::new();
        document.draw(&mut canvas, width, height, &context);
        canvas.finish()
    }

    pub(crate) fn render(svg: &str) -> Drawing {
        render_with_assets(svg, &[])
    }

    /// Runs `draw` with a renderer over a document rooted at `root`.
    pub(crate) fn with_renderer(root: &Rc<Node>, canvas: &mut Canvas, draw: impl FnOnce(&mut Renderer<'_>)) {
        let document = SvgDocument {
            root: root.clone(),
            root_element: Rc::new(Element::default()),
            elements: ElementIndex::new(),
            defs: DefsRegistry::collect(root),
            url: None,
        };
        let bundle = AssetBundle::default();
        let options = RenderOptions::default();
        let shaper = FontRegistry::new();
        let context = RenderContext {
            fetcher: &bundle,
            images: &RasterImages,
            shaper: &shaper,
            options: &options,
            debug: None,
        };
        let mut renderer = Renderer {
            document: &document,
            canvas,
            context: &context,
            state: DrawState {
                concrete: (100.0, 100.0),
                viewport: Viewport::new(100.0, 100.0),
                ..DrawState::default()
            },
        };
        draw(&mut renderer);
    }

    fn count(drawing: &Drawing, predicate: impl Fn(&Command) -> bool) -> usize {
        drawing.all_commands().filter(|c| predicate(c)).count()
    }

    #[test]
    fn symbols_render_as_svg_with_use_size() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <symbol id="s" viewBox="0 0 10 10"><rect width="10" height="10"/></symbol>
                <use href="#s" x="5" y="5" width="20" height="20"/>
            </svg>"##,
        );
        assert!(drawing.commands.iter().any(|c| matches!(
            c,
            Command::ConcatMatrix { a, d, .. } if *a == 2.0 && *d == 2.0
        )));
        assert!(drawing.commands.iter().any(|c| matches!(
            c,
            Command::ConcatMatrix { e, f, .. } if e.to_f32() == 5.0 && f.to_f32() == 5.0
        )));
        assert_eq!(count(&drawing, |c| matches!(c, Command::Rectangle { .. })), 2);
    }

    #[test]
    fn use_cascades_onto_its_target() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <defs><rect id="r" width="10" height="10"/></defs>
                <use href="#r" fill="none" stroke="red"/>
            </svg>"##,
        );
        assert_eq!(count(&drawing, |c| matches!(c, Command::Stroke)), 1);
        assert_eq!(count(&drawing, |c| matches!(c, Command::Fill)), 0);
    }

    #[test]
    fn recursive_use_terminates() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <g id="loop"><rect width="1" height="1"/><use href="#loop"/></g>
            </svg>"##,
        );
        assert_eq!(count(&drawing, |c| matches!(c, Command::Rectangle { .. })), 2);
    }

    #[test]
    fn external_use_targets_are_fetched() {
        let other = r#"<svg xmlns="http://www.w3.org/2000/svg"><circle id="c" r="3"/></svg>"#;
        let drawing = render_with_assets(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><use href="other.svg#c"/></svg>"##,
            &[("other.svg", other.as_bytes())],
        );
        assert_eq!(count(&drawing, |c| matches!(c, Command::CurveTo { .. })), 4);
    }

    #[test]
    fn defs_are_never_drawn() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><defs><rect width="10" height="10"/></defs></svg>"#,
        );
        assert_eq!(count(&drawing, |c| matches!(c, Command::Rectangle { .. })), 0);
    }

    #[test]
    fn opacity_opens_a_group() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect width="10" height="10" opacity="0.5"/></svg>"#,
        );
        let group = drawing
            .resources
            .iter()
            .find_map(|r| match r {
                Resource::Group(group) => Some(group),
                _ => None,
            })
            .expect("opacity group");
        assert_eq!(group.bbox, [0.0, 0.0, 10.0, 10.0]);
        assert!(drawing.commands.iter().any(|c| matches!(
            c,
            Command::SetAlpha { alpha, target: PaintTarget::Both } if *alpha == 0.5
        )));
        assert!(drawing.commands.iter().any(|c| matches!(c, Command::DrawXObject(_))));
    }

    #[test]
    fn clip_paths_union_their_children() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <clipPath id="c"><rect width="5" height="5"/><rect x="10" width="5" height="5" transform="translate(1 1)"/></clipPath>
                <rect width="50" height="50" clip-path="url(#c)"/>
            </svg>"##,
        );
        let commands = &drawing.commands;
        let clip = commands
            .iter()
            .position(|c| matches!(c, Command::ClipPath { .. }))
            .expect("clip");
        let rectangles_before = commands[..clip]
            .iter()
            .filter(|c| matches!(c, Command::Rectangle { .. }))
            .count();
        assert_eq!(rectangles_before, 3);
        assert!(!commands[..clip].iter().any(|c| matches!(c, Command::Fill)));
        assert_eq!(count(&drawing, |c| matches!(c, Command::Fill)), 1);
    }

    #[test]
    fn unresolved_clip_hides_everything() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect width="50" height="50" clip-path="url(#none)"/></svg>"##,
        );
        assert!(drawing.commands.iter().any(|c| matches!(
            c,
            Command::Rectangle { width, height, .. } if width.to_f32() == 0.0 && height.to_f32() == 0.0
        )));
        assert!(drawing.commands.iter().any(|c| matches!(c, Command::ClipPath { .. })));
    }

    #[test]
    fn display_none_skips_subtree() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><g display="none"><rect width="1" height="1"/></g></svg>"#,
        );
        assert_eq!(count(&drawing, |c| matches!(c, Command::Rectangle { .. })), 0);
    }

    #[test]
    fn documents_without_svg_root_are_rejected() {
        let result = SvgDocument::parse(b"<html/>", None, &AssetBundle::default());
        assert!(matches!(result, Err(SvgError::MissingRoot)));
        let result = SvgDocument::parse(b"<svg", None, &AssetBundle::default());
        assert!(matches!(result, Err(SvgError::Xml(_))));
    }

    #[test]
    fn intrinsic_size_ignores_percentages() {
        let document = SvgDocument::parse(
            br#"<svg xmlns="http://www.w3.org/2000/svg" width="2in" height="50%"/>"#,
            None,
            &AssetBundle::default(),
        )
        .unwrap();
        assert_eq!(document.intrinsic_size(16.0), (Some(192.0), None));
    }
}
