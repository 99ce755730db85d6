//! Element tree, attribute cascade and text flattening.

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use super::bounding_box::BoundingBox;
use super::css::{MatchedDeclarations, StyleMatcher, parse_declarations};
use super::geometry::{normalize, parse_viewbox};
use super::path::Vertex;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Attributes a child never takes from its parent.
pub(crate) const NOT_INHERITED: &[&str] = &[
    "clip",
    "clip-path",
    "filter",
    "height",
    "id",
    "mask",
    "opacity",
    "overflow",
    "rotate",
    "stop-color",
    "stop-opacity",
    "style",
    "transform",
    "transform-origin",
    "viewBox",
    "width",
    "x",
    "y",
    "dx",
    "dy",
    "href",
];

/// Attributes where `currentColor` resolves to the `color` attribute.
pub(crate) const COLOR_ATTRIBUTES: &[&str] =
    &["fill", "flood-color", "lighting-color", "stop-color", "stroke"];

macro_rules! attr_ids {
    ($($variant:ident => $name:literal,)*) => {
        /// Presentation and geometry attributes with a dedicated slot.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum AttrId {
            $($variant,)*
        }

        impl AttrId {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(AttrId::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<AttrId> {
                match name {
                    $($name => Some(AttrId::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

attr_ids! {
    AlignmentBaseline => "alignment-baseline",
    ClipPath => "clip-path",
    ClipPathUnits => "clipPathUnits",
    ClipRule => "clip-rule",
    Color => "color",
    Cx => "cx",
    Cy => "cy",
    D => "d",
    Display => "display",
    DisplayAnchor => "display-anchor",
    DominantBaseline => "dominant-baseline",
    Dx => "dx",
    Dy => "dy",
    Fill => "fill",
    FillOpacity => "fill-opacity",
    FillRule => "fill-rule",
    Filter => "filter",
    FontFamily => "font-family",
    FontSize => "font-size",
    FontStyle => "font-style",
    FontWeight => "font-weight",
    Fr => "fr",
    Fx => "fx",
    Fy => "fy",
    GradientTransform => "gradientTransform",
    GradientUnits => "gradientUnits",
    Height => "height",
    Href => "href",
    Id => "id",
    LengthAdjust => "lengthAdjust",
    LetterSpacing => "letter-spacing",
    Marker => "marker",
    MarkerEnd => "marker-end",
    MarkerHeight => "markerHeight",
    MarkerMid => "marker-mid",
    MarkerStart => "marker-start",
    MarkerUnits => "markerUnits",
    MarkerWidth => "markerWidth",
    Mask => "mask",
    MaskUnits => "maskUnits",
    Mode => "mode",
    Offset => "offset",
    Opacity => "opacity",
    Orient => "orient",
    Overflow => "overflow",
    PatternContentUnits => "patternContentUnits",
    PatternTransform => "patternTransform",
    PatternUnits => "patternUnits",
    Points => "points",
    PreserveAspectRatio => "preserveAspectRatio",
    PrimitiveUnits => "primitiveUnits",
    R => "r",
    RefX => "refX",
    RefY => "refY",
    Rotate => "rotate",
    Rx => "rx",
    Ry => "ry",
    SpreadMethod => "spreadMethod",
    StopColor => "stop-color",
    StopOpacity => "stop-opacity",
    Stroke => "stroke",
    StrokeDasharray => "stroke-dasharray",
    StrokeDashoffset => "stroke-dashoffset",
    StrokeLinecap => "stroke-linecap",
    StrokeLinejoin => "stroke-linejoin",
    StrokeMiterlimit => "stroke-miterlimit",
    StrokeOpacity => "stroke-opacity",
    StrokeWidth => "stroke-width",
    Style => "style",
    TextAnchor => "text-anchor",
    TextLength => "textLength",
    Transform => "transform",
    TransformOrigin => "transform-origin",
    ViewBox => "viewBox",
    Visibility => "visibility",
    Width => "width",
    X => "x",
    X1 => "x1",
    X2 => "x2",
    XmlSpace => "xml:space",
    Y => "y",
    Y1 => "y1",
    Y2 => "y2",
}

/// Attribute map: typed slots for the attributes the renderer reads, an
/// overflow map for the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    known: BTreeMap<AttrId, String>,
    other: BTreeMap<String, String>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        match AttrId::from_name(name) {
            Some(id) => self.known.get(&id).map(String::as_str),
            None => self.other.get(name).map(String::as_str),
        }
    }

    pub fn get_id(&self, id: AttrId) -> Option<&str> {
        self.known.get(&id).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        match AttrId::from_name(name) {
            Some(id) => {
                self.known.insert(id, value.into());
            }
            None => {
                self.other.insert(name.to_string(), value.into());
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        match AttrId::from_name(name) {
            Some(id) => self.known.remove(&id),
            None => self.other.remove(name),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.known
            .iter()
            .map(|(id, value)| (id.as_str(), value.as_str()))
            .chain(self.other.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned copy of one source element with its matched style declarations.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub tail: String,
    pub children: Vec<Rc<Element>>,
    pub declarations: MatchedDeclarations,
    // Text content already went through whitespace processing.
    flattened: bool,
}

impl Element {
    pub(crate) fn from_xml(node: roxmltree::Node<'_, '_>, matcher: &dyn StyleMatcher) -> Element {
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut xlink_href = None;
        for attribute in node.attributes() {
            let name = match attribute.namespace() {
                Some(XLINK_NS) if attribute.name() == "href" => {
                    xlink_href = Some(attribute.value().to_string());
                    continue;
                }
                Some(XLINK_NS) => format!("xlink:{}", attribute.name()),
                Some(XML_NS) => format!("xml:{}", attribute.name()),
                _ => attribute.name().to_string(),
            };
            attributes.push((name, attribute.value().to_string()));
        }
        if let Some(href) = xlink_href {
            if !attributes.iter().any(|(name, _)| name == "href") {
                attributes.push(("href".to_string(), href));
            }
        }

        Element {
            tag: node.tag_name().name().to_string(),
            attributes,
            text: node.text().unwrap_or_default().to_string(),
            tail: node.tail().unwrap_or_default().to_string(),
            children: node
                .children()
                .filter(|child| child.is_element())
                .map(|child| Rc::new(Element::from_xml(child, matcher)))
                .collect(),
            declarations: matcher.match_element(node, None),
            flattened: false,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Text of the element and all its descendants, in document order.
    pub fn deep_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.deep_text());
            out.push_str(&child.tail);
        }
        out
    }

    fn anonymous_tspan() -> Element {
        Element {
            tag: "tspan".to_string(),
            flattened: true,
            ..Element::default()
        }
    }
}

pub(crate) type ElementIndex = HashMap<String, Rc<Element>>;

/// Registers every element carrying an `id`; the first occurrence wins.
pub(crate) fn index_elements(element: &Rc<Element>, index: &mut ElementIndex) {
    if let Some(id) = element.attribute("id") {
        index
            .entry(id.to_string())
            .or_insert_with(|| element.clone());
    }
    for child in &element.children {
        index_elements(child, index);
    }
}

/// Where a node's children live: built for this node, or shared with the
/// node an `href` chain borrowed them from.
#[derive(Debug)]
pub(crate) enum ChildSource {
    Own(Vec<Rc<Node>>),
    Borrowed(Rc<Node>),
}

/// A cascaded element. Attributes are final once `build` returns.
#[derive(Debug)]
pub struct Node {
    tag: String,
    attrib: Attributes,
    text: String,
    children: ChildSource,
    pub(crate) vertices: RefCell<Vec<Vertex>>,
    fill_box: OnceCell<BoundingBox>,
    text_box: Cell<BoundingBox>,
}

impl Node {
    /// Builds a node and, recursively, its children. The parent must already
    /// be cascaded.
    pub(crate) fn build(element: &Element, parent: Option<&Node>, index: &ElementIndex) -> Node {
        let mut attrib = Attributes::default();
        for (name, value) in &element.attributes {
            attrib.set(name, value.as_str());
        }
        cascade(&mut attrib, parent, &element.declarations);

        let mut node = Node::with_attributes(element.tag.clone(), attrib, ChildSource::Own(Vec::new()));
        let flattened;
        let source = if !element.flattened && matches!(element.tag.as_str(), "text" | "textPath" | "a") {
            let preserve = node.attrib.get("xml:space") == Some("preserve");
            let mut trailing_space = true;
            flattened = flatten_text(
                element,
                preserve,
                &mut trailing_space,
                true,
                &mut Rotation::default(),
                index,
            );
            if let Some(rotate) = flattened.attribute("rotate") {
                node.attrib.set("rotate", rotate);
            }
            &flattened
        } else {
            element
        };
        node.text = source.text.clone();
        let children = source
            .children
            .iter()
            .map(|child| Rc::new(Node::build(child, Some(&node), index)))
            .collect();
        node.children = ChildSource::Own(children);
        node
    }

    fn with_attributes(tag: String, attrib: Attributes, children: ChildSource) -> Node {
        Node {
            tag,
            attrib,
            text: String::new(),
            children,
            vertices: RefCell::new(Vec::new()),
            fill_box: OnceCell::new(),
            text_box: Cell::new(BoundingBox::EMPTY),
        }
    }

    /// Copy of this node whose missing attributes come from `parent`, used to
    /// resolve gradient and pattern `href` chains. Children are borrowed from
    /// the parent when this node has none of its own.
    pub(crate) fn inherit_from(self: &Rc<Self>, parent: &Rc<Node>) -> Node {
        let mut attrib = self.attrib.clone();
        for (name, value) in parent.attrib.iter() {
            if !attrib.contains(name) {
                attrib.set(name, value);
            }
        }
        attrib.remove("href");
        let source = if self.children().is_empty() {
            parent.clone()
        } else {
            self.clone()
        };
        let mut node = Node::with_attributes(self.tag.clone(), attrib, ChildSource::Borrowed(source));
        node.text = self.text.clone();
        node
    }

    /// Construction-time override, for `use` instances sized by the `use`.
    pub(crate) fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attrib.set(name, value);
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrib.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrib.contains(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrib
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Rc<Node>] {
        match &self.children {
            ChildSource::Own(children) => children,
            ChildSource::Borrowed(source) => source.children(),
        }
    }

    pub fn is_displayed(&self) -> bool {
        self.get("display") != Some("none")
    }

    pub fn is_visible(&self) -> bool {
        self.is_displayed() && self.get("visibility") != Some("hidden")
    }

    pub fn viewbox(&self) -> Option<[f32; 4]> {
        parse_viewbox(self.get("viewBox"))
    }

    pub fn href(&self) -> Option<&str> {
        self.get("href")
    }

    pub(crate) fn fill_box_cache(&self) -> &OnceCell<BoundingBox> {
        &self.fill_box
    }

    pub(crate) fn text_bounding_box(&self) -> BoundingBox {
        self.text_box.get()
    }

    pub(crate) fn set_text_bounding_box(&self, bbox: BoundingBox) {
        self.text_box.set(bbox);
    }
}

/// Inheritance, matched declarations, `currentColor` and `inherit`.
fn cascade(attrib: &mut Attributes, parent: Option<&Node>, declarations: &MatchedDeclarations) {
    if let Some(parent) = parent {
        for (name, value) in parent.attrib.iter() {
            if !NOT_INHERITED.contains(&name) && !attrib.contains(name) {
                attrib.set(name, value);
            }
        }
    }

    let inline = attrib.get("style").map(parse_declarations).unwrap_or_default();
    for declaration in declarations
        .normal
        .iter()
        .chain(&inline.normal)
        .chain(&declarations.important)
        .chain(&inline.important)
    {
        attrib.set(&declaration.name, declaration.value.trim());
    }

    for name in COLOR_ATTRIBUTES {
        if attrib.get(name) == Some("currentColor") {
            let color = attrib.get("color").unwrap_or("black").to_string();
            attrib.set(name, color);
        }
    }

    let inherited: Vec<String> = attrib
        .iter()
        .filter(|(_, value)| *value == "inherit")
        .map(|(name, _)| name.to_string())
        .collect();
    for name in inherited {
        match parent.and_then(|parent| parent.attrib.get(&name)) {
            Some(value) => attrib.set(&name, value),
            None => {
                attrib.remove(&name);
            }
        }
    }
}

/// `rotate` values still to be handed out to characters. Once exhausted the
/// last value repeats.
#[derive(Debug, Default)]
struct Rotation {
    values: Vec<String>,
    pending: VecDeque<String>,
}

impl Rotation {
    fn from_attribute(raw: &str) -> Rotation {
        let values: Vec<String> = normalize(raw)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Rotation {
            pending: values.iter().cloned().collect(),
            values,
        }
    }

    fn assign(&mut self, element: &mut Element) {
        let count = element.text.chars().count();
        if count == 0 {
            return;
        }
        let Some(last) = self.values.last().cloned() else {
            return;
        };
        let taken: Vec<String> = (0..count)
            .map(|_| self.pending.pop_front().unwrap_or_else(|| last.clone()))
            .collect();
        element.set_attribute("rotate", taken.join(" "));
    }
}

fn process_whitespace(text: &str, preserve: bool, trailing_space: &mut bool) -> String {
    if text.is_empty() {
        return String::new();
    }
    let processed = if preserve {
        text.replace(['\n', '\r', '\t'], " ")
    } else {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '\n' | '\r' => {}
                '\t' | ' ' => {
                    let skip = out.ends_with(' ') || (out.is_empty() && *trailing_space);
                    if !skip {
                        out.push(' ');
                    }
                }
                _ => out.push(ch),
            }
        }
        out
    };
    if !processed.is_empty() {
        *trailing_space = processed.ends_with(' ');
    }
    processed
}

/// Rebuilds a text subtree: whitespace processed, tails turned into anonymous
/// `tspan`s, `tref` replaced by the referenced text, `rotate` split per
/// character.
fn flatten_text(
    element: &Element,
    preserve: bool,
    trailing_space: &mut bool,
    text_root: bool,
    rotation: &mut Rotation,
    index: &ElementIndex,
) -> Element {
    let preserve = match element.attribute("xml:space") {
        Some(space) => space == "preserve",
        None => preserve,
    };
    let mut own_rotation;
    let rotation = match element.attribute("rotate") {
        Some(raw) => {
            own_rotation = Rotation::from_attribute(raw);
            &mut own_rotation
        }
        None => rotation,
    };

    let mut flat = Element {
        tag: element.tag.clone(),
        attributes: element.attributes.clone(),
        declarations: element.declarations.clone(),
        flattened: true,
        ..Element::default()
    };
    flat.text = process_whitespace(&element.text, preserve, trailing_space);
    rotation.assign(&mut flat);

    for child in &element.children {
        let flat_child = if child.tag == "tref" {
            let referenced = child
                .attribute("href")
                .map(|href| href.trim_start_matches('#'))
                .and_then(|id| index.get(id))
                .map(|target| target.deep_text())
                .unwrap_or_default();
            let mut tspan = Element::anonymous_tspan();
            tspan.attributes = child
                .attributes
                .iter()
                .filter(|(name, _)| name != "href")
                .cloned()
                .collect();
            tspan.declarations = child.declarations.clone();
            tspan.text = process_whitespace(&referenced, preserve, trailing_space);
            rotation.assign(&mut tspan);
            tspan
        } else {
            flatten_text(child, preserve, trailing_space, false, rotation, index)
        };
        flat.children.push(Rc::new(flat_child));

        if !child.tail.is_empty() {
            let mut anonymous = Element::anonymous_tspan();
            anonymous.text = process_whitespace(&child.tail, preserve, trailing_space);
            rotation.assign(&mut anonymous);
            flat.children.push(Rc::new(anonymous));
        }
    }

    if text_root && flat.children.is_empty() && !preserve {
        let trimmed = flat.text.trim_end_matches(' ').len();
        flat.text.truncate(trimmed);
    }
    flat
}

/// Copies the document into owned elements, matching styles along the way.
pub(crate) fn build_elements(
    doc: &roxmltree::Document<'_>,
    matcher: &dyn StyleMatcher,
) -> (Rc<Element>, ElementIndex) {
    let root = Rc::new(Element::from_xml(doc.root_element(), matcher));
    let mut index = ElementIndex::new();
    index_elements(&root, &mut index);
    (root, index)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::AssetBundle;
    use crate::svg::css::SvgStylesheet;

    pub(crate) fn parse_root(svg: &str) -> Rc<Node> {
        let doc = roxmltree::Document::parse(svg).expect("valid xml");
        let sheet = SvgStylesheet::from_document(&doc, None, &AssetBundle::default());
        let (root, index) = build_elements(&doc, &sheet);
        Rc::new(Node::build(&root, None, &index))
    }

    fn child(node: &Node, index: usize) -> Rc<Node> {
        node.children()[index].clone()
    }

    #[test]
    fn inherit_resolves_against_the_parent() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g fill="red"><rect style="fill:inherit"/></g><rect style="fill:inherit"/></svg>"#,
        );
        let nested = child(&child(&root, 0), 0);
        assert_eq!(nested.get("fill"), Some("red"));
        let orphan = child(&root, 1);
        assert_eq!(orphan.get("fill"), None);
    }

    #[test]
    fn inheritance_skips_non_inherited_attributes() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g transform="scale(2)" opacity=".5" stroke="blue"><rect/></g></svg>"#,
        );
        let rect = child(&child(&root, 0), 0);
        assert_eq!(rect.get("stroke"), Some("blue"));
        assert!(!rect.has("transform"));
        assert!(!rect.has("opacity"));
    }

    #[test]
    fn declarations_apply_in_cascade_order() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                <style>rect { fill: red; stroke: green !important; opacity: .1 }</style>
                <rect fill="black" style="fill: blue; stroke: black; opacity: .3"/>
            </svg>"#,
        );
        let rect = root
            .children()
            .iter()
            .find(|node| node.tag() == "rect")
            .cloned()
            .unwrap();
        assert_eq!(rect.get("fill"), Some("blue"));
        assert_eq!(rect.get("stroke"), Some("green"));
        assert_eq!(rect.get("opacity"), Some(".3"));
    }

    #[test]
    fn current_color_uses_the_color_attribute() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg" color="teal"><rect fill="currentColor"/><g color="inherit"><rect stroke="currentColor"/></g></svg>"#,
        );
        assert_eq!(child(&root, 0).get("fill"), Some("teal"));
        let nested = child(&child(&root, 1), 0);
        assert_eq!(nested.get("stroke"), Some("teal"));

        let plain = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="currentColor"/></svg>"#,
        );
        assert_eq!(child(&plain, 0).get("fill"), Some("black"));
    }

    #[test]
    fn xlink_href_maps_to_href() {
        let root = parse_root(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#a"/><use href="#b" xlink:href="#c"/></svg>"##,
        );
        assert_eq!(child(&root, 0).href(), Some("#a"));
        assert_eq!(child(&root, 1).href(), Some("#b"));
    }

    #[test]
    fn text_whitespace_and_tails_are_flattened() {
        let root = parse_root(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><text>\n  Hello\t  <tspan>big</tspan>  world  </text></svg>",
        );
        let text = child(&root, 0);
        assert_eq!(text.text(), "Hello ");
        assert_eq!(text.children().len(), 2);
        assert_eq!(child(&text, 0).text(), "big");
        assert_eq!(child(&text, 1).tag(), "tspan");
        assert_eq!(child(&text, 1).text(), " world ");
    }

    #[test]
    fn preserved_space_keeps_runs() {
        let root = parse_root(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><text xml:space=\"preserve\"> a\n  b </text></svg>",
        );
        assert_eq!(child(&root, 0).text(), " a   b ");
    }

    #[test]
    fn lone_text_is_trimmed_at_the_end() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text>  a  b  </text></svg>"#,
        );
        assert_eq!(child(&root, 0).text(), "a b");
    }

    #[test]
    fn tref_pulls_in_referenced_text() {
        let root = parse_root(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><defs><text id="src">Hi <tspan>there</tspan></text></defs><text><tref xlink:href="#src" fill="red"/></text></svg>"##,
        );
        let text = child(&root, 1);
        let tspan = child(&text, 0);
        assert_eq!(tspan.tag(), "tspan");
        assert_eq!(tspan.text(), "Hi there");
        assert_eq!(tspan.get("fill"), Some("red"));
        assert!(!tspan.has("href"));
    }

    #[test]
    fn rotate_values_are_distributed_per_character() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text rotate="1 2 3">ab<tspan>cd</tspan></text></svg>"#,
        );
        let text = child(&root, 0);
        assert_eq!(text.get("rotate"), Some("1 2"));
        assert_eq!(child(&text, 0).get("rotate"), Some("3 3"));
    }

    #[test]
    fn inherit_from_copies_missing_attributes_and_borrows_children() {
        let root = parse_root(
            r##"<svg xmlns="http://www.w3.org/2000/svg"><linearGradient id="a" x1="1" spreadMethod="pad"><stop offset="0"/><stop offset="1"/></linearGradient><linearGradient id="b" href="#a" x1="5"/></svg>"##,
        );
        let parent = child(&root, 0);
        let base = child(&root, 1);
        let merged = base.inherit_from(&parent);
        assert_eq!(merged.get("x1"), Some("5"));
        assert_eq!(merged.get("spreadMethod"), Some("pad"));
        assert_eq!(merged.get("id"), Some("b"));
        assert!(!merged.has("href"));
        assert_eq!(merged.children().len(), 2);
    }

    #[test]
    fn attributes_keep_unknown_names() {
        let mut attrib = Attributes::default();
        attrib.set("fill", "red");
        attrib.set("data-x", "1");
        assert_eq!(attrib.get_id(AttrId::Fill), Some("red"));
        assert_eq!(attrib.get("data-x"), Some("1"));
        assert_eq!(attrib.len(), 2);
        assert_eq!(attrib.remove("data-x").as_deref(), Some("1"));
        assert_eq!(AttrId::from_name("stroke-width"), Some(AttrId::StrokeWidth));
    }
}
