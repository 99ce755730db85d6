//! Bounding boxes of shapes, groups and text.

use super::geometry::{Viewport, point_list, size};
use super::node::Node;
use super::paint::get_paint;
use super::path::{Segment, parse_path};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Identity for `extend` and `union`.
    pub const EMPTY: BoundingBox = BoundingBox {
        x: f32::INFINITY,
        y: f32::INFINITY,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x == f32::INFINITY || self.y == f32::INFINITY
    }

    pub fn is_valid(&self) -> bool {
        !self.is_empty()
            && self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 0.0
            && self.height >= 0.0
    }

    pub fn extend(self, points: impl IntoIterator<Item = (f32, f32)>) -> BoundingBox {
        let (mut min_x, mut min_y, mut max_x, mut max_y) = if self.is_empty() {
            (
                f32::INFINITY,
                f32::INFINITY,
                f32::NEG_INFINITY,
                f32::NEG_INFINITY,
            )
        } else {
            (self.x, self.y, self.x + self.width, self.y + self.height)
        };
        let mut merged = !self.is_empty();
        for (x, y) in points {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            merged = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if !merged {
            return BoundingBox::EMPTY;
        }
        BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn union(self, other: BoundingBox) -> BoundingBox {
        if other.is_empty() {
            return self;
        }
        self.extend(other.corners())
    }

    pub fn corners(&self) -> [(f32, f32); 4] {
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [(self.x, self.y), (x1, self.y), (x1, y1), (self.x, y1)]
    }

    pub fn grow(self, amount: f32) -> BoundingBox {
        BoundingBox::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }

    /// `[x0, y0, x1, y1]`, the form canvas groups take.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

/// Box of `node` drawn as `tag`, widened by half the stroke width when
/// `stroke` is requested and a stroke paint is set.
pub(crate) fn bounding_box(
    node: &Node,
    tag: &str,
    viewport: &Viewport,
    font_size: f32,
    stroke: bool,
) -> BoundingBox {
    let bbox = match tag {
        "rect" => {
            let (x, y) = viewport.point(node.get("x"), node.get("y"), font_size);
            let width = size(node.get("width"), font_size, Some(viewport.width));
            let height = size(node.get("height"), font_size, Some(viewport.height));
            BoundingBox::new(x, y, width, height)
        }
        "circle" => {
            let (cx, cy) = viewport.point(node.get("cx"), node.get("cy"), font_size);
            let r = viewport.length(node.get("r"), font_size);
            BoundingBox::new(cx - r, cy - r, 2.0 * r, 2.0 * r)
        }
        "ellipse" => {
            let (cx, cy) = viewport.point(node.get("cx"), node.get("cy"), font_size);
            let (rx, ry) = viewport.point(node.get("rx"), node.get("ry"), font_size);
            BoundingBox::new(cx - rx, cy - ry, 2.0 * rx, 2.0 * ry)
        }
        "line" => {
            let start = viewport.point(node.get("x1"), node.get("y1"), font_size);
            let end = viewport.point(node.get("x2"), node.get("y2"), font_size);
            BoundingBox::EMPTY.extend([start, end])
        }
        "polyline" | "polygon" => {
            let points = point_list(viewport, node.get("points").unwrap_or_default(), font_size);
            BoundingBox::EMPTY.extend(points)
        }
        "path" => path_box(node.get("d").unwrap_or_default(), viewport, font_size),
        "text" => node.text_bounding_box(),
        "g" | "marker" | "svg" | "a" => node
            .children()
            .iter()
            .filter_map(|child| {
                calculate_bounding_box(child, child.tag(), viewport, font_size, stroke)
            })
            .fold(BoundingBox::EMPTY, BoundingBox::union),
        _ => BoundingBox::EMPTY,
    };

    if stroke && bbox.is_valid() && !get_paint(node.get("stroke")).is_none() {
        let stroke_width = viewport.length(Some(node.get("stroke-width").unwrap_or("1px")), font_size);
        return bbox.grow(stroke_width / 2.0);
    }
    bbox
}

fn path_box(d: &str, viewport: &Viewport, font_size: f32) -> BoundingBox {
    let data = parse_path(d, viewport, font_size);
    let mut bbox = BoundingBox::EMPTY;
    for segment in &data.segments {
        bbox = match segment {
            Segment::MoveTo(p) | Segment::LineTo(p) => bbox.extend([*p]),
            Segment::CurveTo(c1, c2, end) => bbox.extend([*c1, *c2, *end]),
            Segment::Arc(arc) => bbox.extend(arc.extent_points()),
            Segment::Close => bbox,
        };
    }
    bbox
}

/// Usable (valid, non-degenerate) box of a node. Fill boxes are memoized on
/// the node; stroke boxes are recomputed and fall back to the memoized fill
/// box when degenerate.
pub(crate) fn calculate_bounding_box(
    node: &Node,
    tag: &str,
    viewport: &Viewport,
    font_size: f32,
    stroke: bool,
) -> Option<BoundingBox> {
    if !stroke {
        if let Some(cached) = node.fill_box_cache().get() {
            return Some(*cached);
        }
    }
    let bbox = bounding_box(node, tag, viewport, font_size, stroke);
    if bbox.is_valid() && bbox.width != 0.0 && bbox.height != 0.0 {
        if !stroke {
            let _ = node.fill_box_cache().set(bbox);
        }
        return Some(bbox);
    }
    if stroke {
        node.fill_box_cache().get().copied()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::node::tests::parse_root;

    fn viewport() -> Viewport {
        Viewport::new(100.0, 100.0)
    }

    fn first_child_box(svg: &str, stroke: bool) -> Option<BoundingBox> {
        let root = parse_root(svg);
        let child = root.children()[0].clone();
        calculate_bounding_box(&child, child.tag(), &viewport(), 16.0, stroke)
    }

    fn close(a: BoundingBox, b: BoundingBox) -> bool {
        (a.x - b.x).abs() < 1e-3
            && (a.y - b.y).abs() < 1e-3
            && (a.width - b.width).abs() < 1e-3
            && (a.height - b.height).abs() < 1e-3
    }

    #[test]
    fn extend_contains_every_point() {
        let points = [(3.0, -2.0), (-1.0, 5.0), (4.5, 0.0), (0.0, 0.0)];
        let mut bbox = BoundingBox::EMPTY;
        assert!(bbox.is_empty());
        for point in points {
            bbox = bbox.extend([point]);
        }
        assert!(!bbox.is_empty());
        for (x, y) in points {
            assert!(x >= bbox.x && x <= bbox.x + bbox.width);
            assert!(y >= bbox.y && y <= bbox.y + bbox.height);
        }
        assert!(close(bbox, BoundingBox::new(-1.0, -2.0, 5.5, 7.0)));
        assert!(BoundingBox::EMPTY.extend([]).is_empty());
        assert_eq!(bbox.union(BoundingBox::EMPTY), bbox);
    }

    #[test]
    fn shapes_have_boxes() {
        let rect = first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect x="10" y="20" width="50%" height="5"/></svg>"#,
            false,
        )
        .unwrap();
        assert!(close(rect, BoundingBox::new(10.0, 20.0, 50.0, 5.0)));

        let circle = first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><circle cx="5" cy="5" r="2"/></svg>"#,
            false,
        )
        .unwrap();
        assert!(close(circle, BoundingBox::new(3.0, 3.0, 4.0, 4.0)));

        let polygon = first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><polygon points="0,0 10,2 4,8 7"/></svg>"#,
            false,
        )
        .unwrap();
        assert!(close(polygon, BoundingBox::new(0.0, 0.0, 10.0, 8.0)));
    }

    #[test]
    fn degenerate_boxes_are_unusable() {
        assert!(first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><line x1="0" y1="5" x2="10" y2="5"/></svg>"#,
            false,
        )
        .is_none());
        let stroked = first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><line x1="0" y1="5" x2="10" y2="5" stroke="red" stroke-width="2"/></svg>"#,
            true,
        )
        .unwrap();
        assert!(close(stroked, BoundingBox::new(-1.0, 4.0, 12.0, 2.0)));
    }

    #[test]
    fn stroke_widens_only_with_a_stroke_paint() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10" stroke-width="4"/></svg>"#;
        let plain = first_child_box(svg, true).unwrap();
        assert!(close(plain, BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10" stroke="blue" stroke-width="4"/></svg>"#;
        let stroked = first_child_box(svg, true).unwrap();
        assert!(close(stroked, BoundingBox::new(-2.0, -2.0, 14.0, 14.0)));
    }

    #[test]
    fn arc_box_includes_extrema() {
        let bbox = first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M 0 0 A 5 5 0 0 1 10 0"/></svg>"#,
            false,
        )
        .unwrap();
        assert!(close(bbox, BoundingBox::new(0.0, -5.0, 10.0, 5.0)));
    }

    #[test]
    fn groups_combine_children() {
        let bbox = first_child_box(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect x="0" y="0" width="2" height="2"/><circle cx="10" cy="10" r="1"/></g></svg>"#,
            false,
        )
        .unwrap();
        assert!(close(bbox, BoundingBox::new(0.0, 0.0, 11.0, 11.0)));
    }

    #[test]
    fn fill_box_is_memoized() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="3" height="4"/></svg>"#,
        );
        let rect = root.children()[0].clone();
        assert!(rect.fill_box_cache().get().is_none());
        calculate_bounding_box(&rect, "rect", &viewport(), 16.0, false);
        assert!(rect.fill_box_cache().get().is_some());
    }
}
