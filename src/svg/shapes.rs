//! Basic shape callbacks. Each one only builds the path; painting happens in
//! the orchestrator.

use std::f32::consts::PI;

use crate::error::ParseFault;

use super::document::Renderer;
use super::geometry::point_list;
use super::node::Node;
use super::path::{Point, Vertex, parse_path};

// Control-point distance for a quarter circle of radius 1.
const ARC_TO_BEZIER: f32 = 4.0 * (std::f32::consts::SQRT_2 - 1.0) / 3.0;
const KAPPA: f32 = 0.552_284_75;

fn record_polyline(points: &[Point]) -> Vec<Vertex> {
    let mut vertices = Vec::with_capacity(points.len() * 2);
    let Some(first) = points.first() else {
        return vertices;
    };
    vertices.push(Vertex::Point(first.0, first.1));
    for pair in points.windows(2) {
        let angle = libm::atan2f(pair[1].1 - pair[0].1, pair[1].0 - pair[0].0);
        vertices.push(Vertex::Angles(PI - angle, angle));
        vertices.push(Vertex::Point(pair[1].0, pair[1].1));
    }
    vertices
}

impl Renderer<'_> {
    pub(crate) fn draw_rect(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let viewport = self.state.viewport;
        let (width, height) = viewport.point(node.get("width"), node.get("height"), font_size);
        if width <= 0.0 || height <= 0.0 {
            return Ok(());
        }
        let (x, y) = viewport.point(node.get("x"), node.get("y"), font_size);
        let radius = |name: &str| node.get(name).filter(|value| value.trim() != "auto");
        let (rx, ry) = match (radius("rx"), radius("ry")) {
            (Some(rx), None) => (Some(rx), Some(rx)),
            (None, Some(ry)) => (Some(ry), Some(ry)),
            other => other,
        };
        let (rx, ry) = viewport.point(rx, ry, font_size);
        if rx <= 0.0 || ry <= 0.0 {
            self.canvas.rectangle(x, y, width, height);
            return Ok(());
        }
        let rx = rx.min(width / 2.0);
        let ry = ry.min(height / 2.0);
        let (c1, c2) = (ARC_TO_BEZIER * rx, ARC_TO_BEZIER * ry);
        let (right, bottom) = (x + width, y + height);

        let canvas = &mut *self.canvas;
        canvas.move_to(x + rx, y);
        canvas.line_to(right - rx, y);
        canvas.curve_to(right - rx + c1, y, right, y + ry - c2, right, y + ry);
        canvas.line_to(right, bottom - ry);
        canvas.curve_to(right, bottom - ry + c2, right - rx + c1, bottom, right - rx, bottom);
        canvas.line_to(x + rx, bottom);
        canvas.curve_to(x + rx - c1, bottom, x, bottom - ry + c2, x, bottom - ry);
        canvas.line_to(x, y + ry);
        canvas.curve_to(x, y + ry - c2, x + rx - c1, y, x + rx, y);
        canvas.close_path();
        Ok(())
    }

    pub(crate) fn draw_circle(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let viewport = self.state.viewport;
        let r = viewport.length(node.get("r"), font_size);
        if r <= 0.0 {
            return Ok(());
        }
        let (cx, cy) = viewport.point(node.get("cx"), node.get("cy"), font_size);
        self.ellipse_path(cx, cy, r, r);
        Ok(())
    }

    pub(crate) fn draw_ellipse(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let viewport = self.state.viewport;
        let (rx, ry) = viewport.point(node.get("rx"), node.get("ry"), font_size);
        if rx <= 0.0 || ry <= 0.0 {
            return Ok(());
        }
        let (cx, cy) = viewport.point(node.get("cx"), node.get("cy"), font_size);
        self.ellipse_path(cx, cy, rx, ry);
        Ok(())
    }

    fn ellipse_path(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        let (kx, ky) = (KAPPA * rx, KAPPA * ry);
        let canvas = &mut *self.canvas;
        canvas.move_to(cx + rx, cy);
        canvas.curve_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
        canvas.curve_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
        canvas.curve_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
        canvas.curve_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
        canvas.close_path();
    }

    pub(crate) fn draw_line(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let viewport = self.state.viewport;
        let start = viewport.point(node.get("x1"), node.get("y1"), font_size);
        let end = viewport.point(node.get("x2"), node.get("y2"), font_size);
        self.canvas.move_to(start.0, start.1);
        self.canvas.line_to(end.0, end.1);
        *node.vertices.borrow_mut() = record_polyline(&[start, end]);
        Ok(())
    }

    pub(crate) fn draw_polyline(
        &mut self,
        node: &Node,
        font_size: f32,
        closed: bool,
    ) -> Result<(), ParseFault> {
        let points = point_list(
            &self.state.viewport,
            node.get("points").unwrap_or_default(),
            font_size,
        );
        let Some(first) = points.first().copied() else {
            node.vertices.borrow_mut().clear();
            return Ok(());
        };
        self.canvas.move_to(first.0, first.1);
        for (x, y) in &points[1..] {
            self.canvas.line_to(*x, *y);
        }
        let mut vertices = record_polyline(&points);
        if closed {
            if let Some(last) = points.last().copied() {
                let angle = libm::atan2f(first.1 - last.1, first.0 - last.0);
                vertices.push(Vertex::Angles(PI - angle, angle));
                vertices.push(Vertex::Point(first.0, first.1));
            }
            self.canvas.close_path();
        }
        *node.vertices.borrow_mut() = vertices;
        Ok(())
    }

    /// Emits whatever was read before a fault, then reports the fault.
    pub(crate) fn draw_path(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let d = node.get("d").unwrap_or_default();
        let data = parse_path(d, &self.state.viewport, font_size);
        data.emit(self.canvas);
        *node.vertices.borrow_mut() = data.vertices;
        match data.fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}
