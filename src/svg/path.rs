//! `d` attribute interpreter.

use std::f32::consts::PI;

use tracing::debug;

use crate::canvas::Canvas;
use crate::error::ParseFault;

use super::geometry::{Viewport, normalize, number, point};

const PATH_LETTERS: &str = "achlmqstvzACHLMQSTVZ";

pub(crate) type Point = (f32, f32);

/// Marker placement record. Points alternate with the tangent pair of the
/// segment that leaves them, or with `Break` where a subpath ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Vertex {
    Point(f32, f32),
    // (pi - start tangent, end tangent) of the following segment.
    Angles(f32, f32),
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ArcSegment {
    pub from: Point,
    pub rx: f32,
    pub ry: f32,
    // x-axis rotation, radians
    pub rotation: f32,
    pub large: bool,
    pub sweep: bool,
    pub to: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Segment {
    MoveTo(Point),
    LineTo(Point),
    CurveTo(Point, Point, Point),
    Arc(ArcSegment),
    Close,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PathData {
    pub segments: Vec<Segment>,
    pub vertices: Vec<Vertex>,
    pub current: Point,
    pub fault: Option<ParseFault>,
}

impl PathData {
    /// Replays the segments as canvas path operators.
    pub(crate) fn emit(&self, canvas: &mut Canvas) {
        for segment in &self.segments {
            match segment {
                Segment::MoveTo((x, y)) => canvas.move_to(*x, *y),
                Segment::LineTo((x, y)) => canvas.line_to(*x, *y),
                Segment::CurveTo(c1, c2, end) => {
                    canvas.curve_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1)
                }
                Segment::Arc(arc) => match arc.to_cubics() {
                    Some(curves) => {
                        for [x1, y1, x2, y2, x, y] in curves {
                            canvas.curve_to(x1, y1, x2, y2, x, y);
                        }
                    }
                    None => canvas.line_to(arc.to.0, arc.to.1),
                },
                Segment::Close => canvas.close_path(),
            }
        }
    }
}

/// Center parameterization of an elliptical arc.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArcCenter {
    pub cx: f32,
    pub cy: f32,
    pub rx: f32,
    pub ry: f32,
    pub sin_phi: f32,
    pub cos_phi: f32,
    pub theta1: f32,
    pub delta: f32,
}

impl ArcCenter {
    fn at(&self, theta: f32) -> Point {
        let x = self.rx * libm::cosf(theta);
        let y = self.ry * libm::sinf(theta);
        (
            self.cx + self.cos_phi * x - self.sin_phi * y,
            self.cy + self.sin_phi * x + self.cos_phi * y,
        )
    }

    fn tangent(&self, theta: f32) -> f32 {
        let dx = -self.rx * libm::sinf(theta);
        let dy = self.ry * libm::cosf(theta);
        let direction = if self.delta < 0.0 { -1.0 } else { 1.0 };
        libm::atan2f(
            direction * (self.sin_phi * dx + self.cos_phi * dy),
            direction * (self.cos_phi * dx - self.sin_phi * dy),
        )
    }

    fn covers(&self, theta: f32) -> bool {
        let span = self.delta.abs();
        let offset = if self.delta < 0.0 {
            self.theta1 - theta
        } else {
            theta - self.theta1
        };
        offset.rem_euclid(2.0 * PI) <= span + 1e-5
    }
}

impl ArcSegment {
    /// None when the arc degrades to a straight line.
    pub(crate) fn center(&self) -> Option<ArcCenter> {
        let (x0, y0) = self.from;
        let (x1, y1) = self.to;
        let mut rx = self.rx.abs();
        let mut ry = self.ry.abs();
        if rx == 0.0 || ry == 0.0 || (x0 == x1 && y0 == y1) {
            return None;
        }
        let sin_phi = libm::sinf(self.rotation);
        let cos_phi = libm::cosf(self.rotation);

        let dx2 = (x0 - x1) / 2.0;
        let dy2 = (y0 - y1) / 2.0;
        let x1p = cos_phi * dx2 + sin_phi * dy2;
        let y1p = -sin_phi * dx2 + cos_phi * dy2;

        let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
        if lambda > 1.0 {
            let s = libm::sqrtf(lambda);
            rx *= s;
            ry *= s;
        }

        let rx2 = rx * rx;
        let ry2 = ry * ry;
        let num = rx2 * ry2 - rx2 * y1p * y1p - ry2 * x1p * x1p;
        let den = rx2 * y1p * y1p + ry2 * x1p * x1p;
        let coef = if den != 0.0 {
            let sign = if self.large == self.sweep { -1.0 } else { 1.0 };
            sign * libm::sqrtf((num / den).max(0.0))
        } else {
            0.0
        };
        let cxp = coef * (rx * y1p / ry);
        let cyp = coef * (-ry * x1p / rx);
        let cx = cos_phi * cxp - sin_phi * cyp + (x0 + x1) / 2.0;
        let cy = sin_phi * cxp + cos_phi * cyp + (y0 + y1) / 2.0;

        fn angle(ux: f32, uy: f32, vx: f32, vy: f32) -> f32 {
            libm::atan2f(ux * vy - uy * vx, ux * vx + uy * vy)
        }
        let ux = (x1p - cxp) / rx;
        let uy = (y1p - cyp) / ry;
        let vx = (-x1p - cxp) / rx;
        let vy = (-y1p - cyp) / ry;
        let theta1 = angle(1.0, 0.0, ux, uy);
        let mut delta = angle(ux, uy, vx, vy);
        if !self.sweep && delta > 0.0 {
            delta -= 2.0 * PI;
        } else if self.sweep && delta < 0.0 {
            delta += 2.0 * PI;
        }

        Some(ArcCenter {
            cx,
            cy,
            rx,
            ry,
            sin_phi,
            cos_phi,
            theta1,
            delta,
        })
    }

    /// One cubic, or three equal-angle cubics for large arcs spanning more than pi.
    pub(crate) fn to_cubics(&self) -> Option<Vec<[f32; 6]>> {
        let center = self.center()?;
        let count = if self.large && center.delta.abs() > PI {
            3
        } else {
            1
        };
        let step = center.delta / count as f32;
        let handle = 4.0 / 3.0 * libm::tanf(step / 4.0);
        let mut curves = Vec::with_capacity(count);
        let mut theta = center.theta1;
        for _ in 0..count {
            let next = theta + step;
            let (s1, c1) = (libm::sinf(theta), libm::cosf(theta));
            let (s2, c2) = (libm::sinf(next), libm::cosf(next));
            let map = |x: f32, y: f32| -> Point {
                let x = center.rx * x;
                let y = center.ry * y;
                (
                    center.cx + center.cos_phi * x - center.sin_phi * y,
                    center.cy + center.sin_phi * x + center.cos_phi * y,
                )
            };
            let (x1, y1) = map(c1 - handle * s1, s1 + handle * c1);
            let (x2, y2) = map(c2 + handle * s2, s2 - handle * c2);
            let (x, y) = map(c2, s2);
            curves.push([x1, y1, x2, y2, x, y]);
            theta = next;
        }
        Some(curves)
    }

    /// Start and end tangent angles in the direction of travel.
    pub(crate) fn tangents(&self) -> (f32, f32) {
        match self.center() {
            Some(center) => (
                center.tangent(center.theta1),
                center.tangent(center.theta1 + center.delta),
            ),
            None => {
                let chord = libm::atan2f(self.to.1 - self.from.1, self.to.0 - self.from.0);
                (chord, chord)
            }
        }
    }

    /// Endpoints plus every axis extremum the arc actually passes through.
    pub(crate) fn extent_points(&self) -> Vec<Point> {
        let mut points = vec![self.from, self.to];
        let Some(center) = self.center() else {
            return points;
        };
        let theta_x = libm::atan2f(-center.ry * center.sin_phi, center.rx * center.cos_phi);
        let theta_y = libm::atan2f(center.ry * center.cos_phi, center.rx * center.sin_phi);
        for theta in [theta_x, theta_x + PI, theta_y, theta_y + PI] {
            if center.covers(theta) {
                points.push(center.at(theta));
            }
        }
        points
    }
}

fn direction(from: Point, to: Point) -> f32 {
    libm::atan2f(to.1 - from.1, to.0 - from.0)
}

fn reflect(control: Point, around: Point) -> Point {
    (2.0 * around.0 - control.0, 2.0 * around.1 - control.1)
}

/// Interprets path data. On a coordinate fault, everything read so far is kept
/// and the fault is recorded.
pub(crate) fn parse_path(d: &str, viewport: &Viewport, font_size: f32) -> PathData {
    let mut spaced = String::with_capacity(d.len() + 16);
    for ch in d.chars() {
        if PATH_LETTERS.contains(ch) {
            spaced.push(' ');
            spaced.push(ch);
            spaced.push(' ');
        } else {
            spaced.push(ch);
        }
    }
    let normalized = normalize(&spaced);
    let mut data = PathData::default();
    if let Err(fault) = interpret(&normalized, viewport, font_size, &mut data) {
        data.fault = Some(fault);
    }
    data
}

fn interpret(
    input: &str,
    viewport: &Viewport,
    font_size: f32,
    data: &mut PathData,
) -> Result<(), ParseFault> {
    let mut rest = input;
    let mut letter: Option<char> = None;
    let mut last_letter: Option<char> = None;
    let mut current: Point = (0.0, 0.0);
    let mut subpath_start: Point = (0.0, 0.0);
    let mut last_cubic_control: Point = (0.0, 0.0);
    let mut last_quad_control: Point = (0.0, 0.0);

    loop {
        rest = rest.trim_start();
        let Some(head) = rest.chars().next() else {
            break;
        };
        let explicit = PATH_LETTERS.contains(head);
        if explicit {
            letter = Some(head);
            rest = &rest[head.len_utf8()..];
            if matches!(last_letter, None | Some('z' | 'Z')) && !matches!(head, 'm' | 'M' | 'z' | 'Z')
            {
                data.segments.push(Segment::MoveTo(current));
                data.vertices.push(Vertex::Point(current.0, current.1));
                subpath_start = current;
            }
        } else if letter == Some('M') {
            letter = Some('L');
        } else if letter == Some('m') {
            letter = Some('l');
        }
        let Some(command) = letter else {
            return Err(ParseFault::InvalidNumber);
        };
        let relative = command.is_ascii_lowercase();
        let offset = |p: Point, base: Point| -> Point {
            if relative { (p.0 + base.0, p.1 + base.1) } else { p }
        };

        match command.to_ascii_uppercase() {
            'M' => {
                let (x, y, tail) = point(viewport, rest, font_size)?;
                rest = tail;
                if last_letter.is_some_and(|last| !matches!(last, 'z' | 'Z')) {
                    data.vertices.push(Vertex::Break);
                }
                current = offset((x, y), current);
                subpath_start = current;
                data.segments.push(Segment::MoveTo(current));
                data.vertices.push(Vertex::Point(current.0, current.1));
            }
            'L' | 'H' | 'V' => {
                let target = match command.to_ascii_uppercase() {
                    'L' => {
                        let (x, y, tail) = point(viewport, rest, font_size)?;
                        rest = tail;
                        offset((x, y), current)
                    }
                    'H' => {
                        let (x, tail) = number(rest)?;
                        rest = tail;
                        (if relative { current.0 + x } else { x }, current.1)
                    }
                    _ => {
                        let (y, tail) = number(rest)?;
                        rest = tail;
                        (current.0, if relative { current.1 + y } else { y })
                    }
                };
                let angle = direction(current, target);
                data.vertices.push(Vertex::Angles(PI - angle, angle));
                data.vertices.push(Vertex::Point(target.0, target.1));
                data.segments.push(Segment::LineTo(target));
                current = target;
            }
            'C' | 'S' => {
                let c1 = if command.eq_ignore_ascii_case(&'C') {
                    let (x, y, tail) = point(viewport, rest, font_size)?;
                    rest = tail;
                    offset((x, y), current)
                } else if matches!(last_letter, Some('c' | 'C' | 's' | 'S')) {
                    reflect(last_cubic_control, current)
                } else {
                    current
                };
                let (x, y, tail) = point(viewport, rest, font_size)?;
                let c2 = offset((x, y), current);
                let (x, y, tail) = point(viewport, tail, font_size)?;
                rest = tail;
                let end = offset((x, y), current);
                let (start_angle, end_angle) = (direction(current, c1), direction(c2, end));
                data.vertices.push(Vertex::Angles(PI - start_angle, end_angle));
                data.vertices.push(Vertex::Point(end.0, end.1));
                data.segments.push(Segment::CurveTo(c1, c2, end));
                last_cubic_control = c2;
                current = end;
            }
            'Q' | 'T' => {
                let control = if command.eq_ignore_ascii_case(&'Q') {
                    let (x, y, tail) = point(viewport, rest, font_size)?;
                    rest = tail;
                    offset((x, y), current)
                } else if matches!(last_letter, Some('q' | 'Q' | 't' | 'T')) {
                    reflect(last_quad_control, current)
                } else {
                    current
                };
                let (x, y, tail) = point(viewport, rest, font_size)?;
                rest = tail;
                let end = offset((x, y), current);
                let c1 = (
                    current.0 + 2.0 / 3.0 * (control.0 - current.0),
                    current.1 + 2.0 / 3.0 * (control.1 - current.1),
                );
                let c2 = (
                    end.0 + 2.0 / 3.0 * (control.0 - end.0),
                    end.1 + 2.0 / 3.0 * (control.1 - end.1),
                );
                let (start_angle, end_angle) = (direction(current, control), direction(control, end));
                data.vertices.push(Vertex::Angles(PI - start_angle, end_angle));
                data.vertices.push(Vertex::Point(end.0, end.1));
                data.segments.push(Segment::CurveTo(c1, c2, end));
                last_quad_control = control;
                current = end;
            }
            'A' => {
                let (rx, ry, tail) = point(viewport, rest, font_size)?;
                let (rotation, tail) = number(tail)?;
                let (large, tail) = flag(tail)?;
                let (sweep, tail) = flag(tail)?;
                let (x, y, tail) = point(viewport, tail, font_size)?;
                rest = tail;
                let (large, sweep) = match (large, sweep) {
                    (Ok(large), Ok(sweep)) => (large, sweep),
                    (Err(fault), _) | (_, Err(fault)) => {
                        debug!(%fault, "arc command skipped");
                        last_letter = Some(command);
                        continue;
                    }
                };
                let arc = ArcSegment {
                    from: current,
                    rx,
                    ry,
                    rotation: rotation.to_radians(),
                    large,
                    sweep,
                    to: offset((x, y), current),
                };
                let (start_angle, end_angle) = arc.tangents();
                data.vertices.push(Vertex::Angles(PI - start_angle, end_angle));
                data.vertices.push(Vertex::Point(arc.to.0, arc.to.1));
                data.segments.push(if arc.center().is_some() {
                    Segment::Arc(arc)
                } else {
                    Segment::LineTo(arc.to)
                });
                current = arc.to;
            }
            'Z' => {
                if !explicit {
                    return Err(ParseFault::InvalidNumber);
                }
                data.segments.push(Segment::Close);
                data.vertices.push(Vertex::Break);
                current = subpath_start;
            }
            _ => return Err(ParseFault::InvalidNumber),
        }
        data.current = current;
        last_letter = Some(command);
    }
    data.current = current;
    Ok(())
}

/// Reads a one-character arc flag. A character other than 0/1 yields
/// `InvalidFlag` alongside the rest of the input, so only that arc is lost.
fn flag(input: &str) -> Result<(Result<bool, ParseFault>, &str), ParseFault> {
    let input = input.trim_start();
    let ch = input.chars().next().ok_or(ParseFault::MissingCoordinate)?;
    let rest = input[ch.len_utf8()..].trim_start();
    let value = match ch {
        '0' => Ok(false),
        '1' => Ok(true),
        _ => Err(ParseFault::InvalidFlag),
    };
    Ok((value, rest))
}
