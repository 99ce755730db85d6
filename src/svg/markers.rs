//! Marker placement along recorded path vertices.

use std::f32::consts::PI;

use crate::types::Matrix;

use super::document::Renderer;
use super::geometry::preserve_ratio;
use super::node::Node;
use super::paint::url_fragment;
use super::path::Vertex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerPosition {
    Start,
    Mid,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub position: MarkerPosition,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Classifies each recorded point and computes its automatic orientation.
/// Stray angle pairs and breaks without a preceding point are ignored.
pub(crate) fn placements(vertices: &[Vertex]) -> Vec<Placement> {
    let mut out = Vec::new();
    let mut position = MarkerPosition::Start;
    let mut previous_end = 0.0f32;
    let mut iter = vertices.iter().peekable();
    while let Some(vertex) = iter.next() {
        let Vertex::Point(x, y) = *vertex else {
            continue;
        };
        let angles = match iter.peek() {
            Some(Vertex::Angles(start, end)) => {
                let pair = (*start, *end);
                iter.next();
                Some(pair)
            }
            Some(Vertex::Break) => {
                iter.next();
                None
            }
            _ => None,
        };
        let angle = match angles {
            Some((start, end)) => {
                let angle = if position == MarkerPosition::Start {
                    PI - start
                } else {
                    (previous_end + PI - start) / 2.0
                };
                previous_end = end;
                angle
            }
            None => {
                position = MarkerPosition::End;
                previous_end
            }
        };
        out.push(Placement {
            position,
            x,
            y,
            angle,
        });
        position = if angles.is_some() {
            MarkerPosition::Mid
        } else {
            MarkerPosition::Start
        };
    }
    out
}

impl Renderer<'_> {
    pub(crate) fn draw_markers(&mut self, node: &Node, font_size: f32, fill_stroke: bool) {
        let vertices = node.vertices.borrow().clone();
        if vertices.is_empty() {
            return;
        }
        let common = node.get("marker").and_then(url_fragment);
        let pick = |name: &str| match node.get(name) {
            Some(value) => url_fragment(value),
            None => common,
        };
        let (start, mid, end) = (pick("marker-start"), pick("marker-mid"), pick("marker-end"));

        for placement in placements(&vertices) {
            let id = match placement.position {
                MarkerPosition::Start => start,
                MarkerPosition::Mid => mid,
                MarkerPosition::End => end,
            };
            let Some(id) = id else {
                continue;
            };
            match self.document.defs.marker(id) {
                Some(marker) => self.draw_marker(node, &marker, placement, font_size, fill_stroke),
                None => self.note_unresolved("marker", id),
            }
        }
    }

    fn draw_marker(
        &mut self,
        node: &Node,
        marker: &Node,
        placement: Placement,
        font_size: f32,
        fill_stroke: bool,
    ) {
        let viewport = self.state.viewport;
        let (marker_width, marker_height) = viewport.point(
            Some(marker.get("markerWidth").unwrap_or("3")),
            Some(marker.get("markerHeight").unwrap_or("3")),
            font_size,
        );
        if marker_width <= 0.0 || marker_height <= 0.0 {
            return;
        }

        let (mut scale_x, mut scale_y, translate, clip) = match marker.viewbox() {
            Some(viewbox) => {
                let ratio = preserve_ratio(
                    marker,
                    "marker",
                    &viewport,
                    font_size,
                    marker_width,
                    marker_height,
                    Some(viewbox),
                    None,
                );
                if ratio.scale_x == 0.0 || ratio.scale_y == 0.0 {
                    return;
                }
                let clip_width = marker_width / ratio.scale_x;
                let clip_height = marker_height / ratio.scale_y;
                let align = marker
                    .get("preserveAspectRatio")
                    .and_then(|raw| raw.split_whitespace().next())
                    .unwrap_or("xMidYMid");
                let (x_position, y_position) = if align == "none" {
                    ("min", "min")
                } else {
                    (align.get(1..4).unwrap_or("Mid"), align.get(5..).unwrap_or("Mid"))
                };
                let offset = |position: &str, available: f32, used: f32| {
                    match position.to_ascii_lowercase().as_str() {
                        "mid" => (available - used) / 2.0,
                        "max" => available - used,
                        _ => 0.0,
                    }
                };
                (
                    ratio.scale_x,
                    ratio.scale_y,
                    (ratio.translate_x, ratio.translate_y),
                    [
                        viewbox[0] + offset(x_position, viewbox[2], clip_width),
                        viewbox[1] + offset(y_position, viewbox[3], clip_height),
                        clip_width,
                        clip_height,
                    ],
                )
            }
            None => (
                1.0,
                1.0,
                viewport.point(marker.get("refX"), marker.get("refY"), font_size),
                [0.0, 0.0, marker_width, marker_height],
            ),
        };

        if marker.get("markerUnits") != Some("userSpaceOnUse") {
            let stroke_width = viewport.length(Some(node.get("stroke-width").unwrap_or("1")), font_size);
            scale_x *= stroke_width;
            scale_y *= stroke_width;
        }

        let angle = match marker.get("orient").map(str::trim) {
            Some("auto") => placement.angle,
            Some("auto-start-reverse") if placement.position == MarkerPosition::Start => {
                placement.angle + PI
            }
            Some("auto-start-reverse") => placement.angle,
            Some(raw) => raw
                .trim_end_matches("deg")
                .trim()
                .parse::<f32>()
                .map(f32::to_radians)
                .unwrap_or(0.0),
            None => 0.0,
        };
        let clipped = !matches!(marker.get("overflow"), Some("visible" | "auto"));

        for child in marker.children() {
            self.canvas.push_state();
            self.canvas.transform(Matrix::translate(placement.x, placement.y));
            self.canvas.transform(Matrix::rotate(angle));
            self.canvas.transform(Matrix::scale(scale_x, scale_y));
            self.canvas.transform(Matrix::translate(-translate.0, -translate.1));
            if clipped {
                self.canvas.rectangle(clip[0], clip[1], clip[2], clip[3]);
                self.canvas.clip(false);
                self.canvas.end_path();
            }
            self.draw_node(child, font_size, fill_stroke);
            self.canvas.pop_state();
        }
    }
}
