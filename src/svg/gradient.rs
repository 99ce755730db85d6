//! Linear and radial gradients, painted as shading patterns.

use tracing::warn;

use crate::canvas::{ColorSpace, PaintTarget};
use crate::types::{
    Color, Matrix, Rgba, Shading, ShadingColorSpace, ShadingGeometry, ShadingSegment,
};

use super::bounding_box::{BoundingBox, calculate_bounding_box};
use super::document::Renderer;
use super::geometry::{Viewport, size, transform};
use super::node::Node;
use super::paint::{alpha_value, parse_color};

// Upper bound on stops produced by repeat/reflect tiling.
const MAX_TILED_STOPS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradientStop {
    pub position: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Spread {
    Pad,
    Repeat,
    Reflect,
}

impl Spread {
    fn from_attribute(raw: Option<&str>) -> Spread {
        match raw.map(str::trim) {
            Some("repeat") => Spread::Repeat,
            Some("reflect") => Spread::Reflect,
            _ => Spread::Pad,
        }
    }
}

/// Stops of a gradient: positions clamped to [0, 1] and non-decreasing,
/// colors premultiplied by `stop-opacity` and the paint opacity.
pub(crate) fn collect_stops(gradient: &Node, font_size: f32, opacity: f32) -> Vec<GradientStop> {
    let mut stops: Vec<GradientStop> = Vec::new();
    for child in gradient.children().iter().filter(|child| child.tag() == "stop") {
        let previous = stops.last().map_or(0.0, |stop| stop.position);
        let position = size(Some(child.get("offset").unwrap_or("0")), font_size, Some(1.0))
            .clamp(0.0, 1.0)
            .max(previous);
        let color = child
            .get("stop-color")
            .and_then(parse_color)
            .unwrap_or(Rgba::BLACK);
        let alpha = color.a * alpha_value(child.get("stop-opacity")) * opacity;
        stops.push(GradientStop {
            position,
            color: color.with_alpha(alpha),
        });
    }
    stops
}

/// Alpha-weighted mean color of a stop list.
pub(crate) fn average_color(stops: &[GradientStop]) -> Rgba {
    let count = stops.len();
    if count == 0 {
        return Rgba::BLACK.with_alpha(0.0);
    }
    if count == 1 {
        return stops[0].color;
    }
    let mut positions: Vec<f32> = stops.iter().map(|stop| stop.position).collect();
    let mut total = positions[count - 1] - positions[0];
    if total == 0.0 {
        positions = (0..count).map(|i| i as f32).collect();
        total = (count - 1) as f32;
    }
    let (mut r, mut g, mut b, mut a) = (0.0, 0.0, 0.0, 0.0);
    for i in 0..count - 1 {
        let weight = (positions[i + 1] - positions[i]) / total;
        for stop in &stops[i..i + 2] {
            let color = stop.color;
            r += color.r * color.a * weight / 2.0;
            g += color.g * color.a * weight / 2.0;
            b += color.b * color.a * weight / 2.0;
            a += color.a * weight / 2.0;
        }
    }
    if a == 0.0 {
        return Rgba::BLACK.with_alpha(0.0);
    }
    Rgba::new(r / a, g / a, b / a, a)
}

fn lerp_color(from: Rgba, to: Rgba, weight: f32) -> Rgba {
    Rgba::new(
        from.r + (to.r - from.r) * weight,
        from.g + (to.g - from.g) * weight,
        from.b + (to.b - from.b) * weight,
        from.a + (to.a - from.a) * weight,
    )
}

/// Applies the spread method so that `[t_min, t_max]` is covered. Returns a
/// flat color when repetition collapses to a single position.
pub(crate) fn spread_stops(
    stops: &mut Vec<GradientStop>,
    spread: Spread,
    t_min: f32,
    t_max: f32,
    radial: bool,
) -> Option<Rgba> {
    if stops.len() < 2 {
        return stops.first().map(|stop| stop.color);
    }

    if spread == Spread::Pad {
        if stops[0].position == stops[1].position {
            let first = stops[0];
            if !radial {
                stops.insert(
                    0,
                    GradientStop {
                        position: first.position - 1.0,
                        color: first.color,
                    },
                );
            } else if first.position > 0.0 {
                stops.insert(
                    0,
                    GradientStop {
                        position: 0.0,
                        color: first.color,
                    },
                );
            }
        }
        let count = stops.len();
        if stops[count - 2].position == stops[count - 1].position {
            let last = stops[count - 1];
            stops.push(GradientStop {
                position: last.position + 1.0,
                color: last.color,
            });
        }
        return None;
    }

    let mut first = stops[0].position;
    let mut last = stops[stops.len() - 1].position;
    if first == last {
        return Some(average_color(stops));
    }

    let colors: Vec<Rgba> = stops.iter().map(|stop| stop.color).collect();
    let steps: Vec<f32> = stops
        .windows(2)
        .map(|pair| pair[1].position - pair[0].position)
        .collect();
    let reversed_steps: Vec<f32> = steps.iter().rev().copied().collect();
    let reversed_colors: Vec<Rgba> = colors.iter().rev().copied().collect();

    let chain = |a: &[f32], b: &[f32]| -> Vec<f32> {
        std::iter::once(0.0)
            .chain(a.iter().copied())
            .chain(std::iter::once(0.0))
            .chain(b.iter().copied())
            .collect()
    };
    let (next_steps, next_colors, previous_steps, previous_colors) = match spread {
        Spread::Repeat => (
            std::iter::once(0.0).chain(steps.iter().copied()).collect::<Vec<f32>>(),
            colors.clone(),
            std::iter::once(0.0)
                .chain(reversed_steps.iter().copied())
                .collect::<Vec<f32>>(),
            reversed_colors.clone(),
        ),
        _ => (
            chain(&reversed_steps, &steps),
            [reversed_colors.as_slice(), colors.as_slice()].concat(),
            chain(&steps, &reversed_steps),
            [colors.as_slice(), reversed_colors.as_slice()].concat(),
        ),
    };

    let mut index = 0;
    while last < t_max && stops.len() < MAX_TILED_STOPS {
        let step = next_steps[index % next_steps.len()];
        let color = next_colors[index % next_colors.len()];
        last += step;
        stops.push(GradientStop {
            position: last,
            color,
        });
        index += 1;
    }

    let lower = if radial { t_min.max(0.0) } else { t_min };
    index = 0;
    while first > lower && stops.len() < MAX_TILED_STOPS {
        let step = previous_steps[index % previous_steps.len()];
        let color = previous_colors[index % previous_colors.len()];
        first -= step;
        stops.insert(
            0,
            GradientStop {
                position: first,
                color,
            },
        );
        index += 1;
    }
    if stops.len() >= MAX_TILED_STOPS {
        warn!("gradient tiling truncated");
    }

    if radial && stops[0].position < 0.0 {
        let (outer, inner) = (stops[0], stops[1]);
        let span = inner.position - outer.position;
        let weight = if span > 0.0 { -outer.position / span } else { 1.0 };
        stops[0] = GradientStop {
            position: 0.0,
            color: lerp_color(outer.color, inner.color, weight),
        };
    }
    None
}

/// Color functions for consecutive stop pairs. Fully transparent stops take
/// their neighbor's color; unequal alphas get an `a0 / a1` exponent.
pub(crate) fn shading_segments(stops: &[GradientStop]) -> Vec<ShadingSegment> {
    let mut segments: Vec<ShadingSegment> = stops
        .windows(2)
        .map(|pair| ShadingSegment {
            c0: pair[0].color.rgb(),
            c1: pair[1].color.rgb(),
            exponent: 1.0,
        })
        .collect();
    for (i, stop) in stops.iter().enumerate() {
        if stop.color.a == 0.0 {
            if i > 0 {
                segments[i - 1].c1 = segments[i - 1].c0;
            }
            if i < segments.len() {
                segments[i].c0 = segments[i].c1;
            }
        }
    }
    for (i, pair) in stops.windows(2).enumerate() {
        let (a0, a1) = (pair[0].color.a, pair[1].color.a);
        if a0 != 0.0 && a1 != 0.0 && (a0, a1) != (1.0, 1.0) {
            segments[i].exponent = a0 / a1;
        }
    }
    segments
}

impl Renderer<'_> {
    fn flat_paint(&mut self, color: Rgba, stroke: bool) -> bool {
        self.canvas.set_color(color.rgb(), stroke);
        self.canvas.set_alpha(color.a, PaintTarget::from_stroke(stroke));
        true
    }

    /// Paints `node` with a gradient; `false` when the gradient cannot apply.
    pub(crate) fn draw_gradient(
        &mut self,
        node: &Node,
        gradient: &Node,
        font_size: f32,
        opacity: f32,
        stroke: bool,
    ) -> bool {
        let Some(bbox) =
            calculate_bounding_box(node, node.tag(), &self.state.viewport, font_size, stroke)
        else {
            return false;
        };
        let mut stops = collect_stops(gradient, font_size, opacity);
        match stops.len() {
            0 => return false,
            1 => return self.flat_paint(stops[0].color, stroke),
            _ => {}
        }

        let (viewport, mut matrix) = if gradient.get("gradientUnits") == Some("userSpaceOnUse") {
            (self.state.viewport, Matrix::identity())
        } else {
            (
                Viewport::new(1.0, 1.0),
                Matrix::new(bbox.width, 0.0, 0.0, bbox.height, bbox.x, bbox.y),
            )
        };
        if gradient.has("gradientTransform") {
            let gradient_transform = transform(
                gradient.get("gradientTransform"),
                font_size,
                self.state.viewport.diagonal(),
            );
            matrix = gradient_transform * matrix;
        }
        let Some(inverse) = matrix.invert() else {
            return false;
        };
        let corners = bbox.corners().map(|(x, y)| inverse.apply(x, y));
        let spread = Spread::from_attribute(gradient.get("spreadMethod"));

        let radial = gradient.tag() == "radialGradient";
        let geometry_at = if radial {
            let (cx, cy) = viewport.point(
                Some(gradient.get("cx").unwrap_or("50%")),
                Some(gradient.get("cy").unwrap_or("50%")),
                font_size,
            );
            let r = viewport.length(Some(gradient.get("r").unwrap_or("50%")), font_size);
            let fx = size(gradient.get("fx"), font_size, Some(viewport.width));
            let fy = size(gradient.get("fy"), font_size, Some(viewport.height));
            let (fx, fy) = (
                if gradient.has("fx") { fx } else { cx },
                if gradient.has("fy") { fy } else { cy },
            );
            let fr = viewport.length(gradient.get("fr"), font_size);
            if r <= 0.0 {
                let last = stops[stops.len() - 1].color;
                return self.flat_paint(last, stroke);
            }
            let reach = corners
                .iter()
                .map(|(x, y)| libm::hypotf(x - fx, y - fy))
                .fold(0.0f32, f32::max)
                + libm::hypotf(cx - fx, cy - fy);
            let t_max = reach / r;
            if let Some(color) = spread_stops(&mut stops, spread, 0.0, t_max, true) {
                return self.flat_paint(color, stroke);
            }
            GradientGeometry::Radial {
                focal: (fx, fy, fr),
                center: (cx, cy, r),
            }
        } else {
            let (x1, y1) = viewport.point(gradient.get("x1"), gradient.get("y1"), font_size);
            let (x2, y2) = viewport.point(
                Some(gradient.get("x2").unwrap_or("100%")),
                gradient.get("y2"),
                font_size,
            );
            let (dx, dy) = (x2 - x1, y2 - y1);
            let length2 = dx * dx + dy * dy;
            if length2 == 0.0 {
                let last = stops[stops.len() - 1].color;
                return self.flat_paint(last, stroke);
            }
            let projections = corners.map(|(x, y)| ((x - x1) * dx + (y - y1) * dy) / length2);
            let t_min = projections.iter().copied().fold(f32::INFINITY, f32::min);
            let t_max = projections.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if let Some(color) = spread_stops(&mut stops, spread, t_min, t_max, false) {
                return self.flat_paint(color, stroke);
            }
            GradientGeometry::Linear {
                start: (x1, y1),
                end: (x2, y2),
            }
        };

        let first = stops[0].position;
        let last = stops[stops.len() - 1].position;
        let span = last - first;
        if span <= 0.0 {
            return self.flat_paint(average_color(&stops), stroke);
        }
        let geometry = geometry_at.shading(first, last);
        let bounds: Vec<f32> = stops[1..stops.len() - 1]
            .iter()
            .map(|stop| (stop.position - first) / span)
            .collect();
        let extend = spread == Spread::Pad;

        let tile = BoundingBox::EMPTY.extend(corners);
        let tile_box = tile.to_array();
        let pattern_matrix = matrix * self.canvas.ctm();
        let pattern = self.canvas.begin_pattern(
            tile_box,
            tile.width.max(f32::EPSILON),
            tile.height.max(f32::EPSILON),
            pattern_matrix,
        );
        if stops.iter().any(|stop| stop.color.a != 1.0) {
            let mask = self.canvas.begin_soft_mask(tile_box);
            let alpha_shading = Shading {
                geometry,
                color_space: ShadingColorSpace::Gray,
                domain: (0.0, 1.0),
                bounds: bounds.clone(),
                segments: stops
                    .windows(2)
                    .map(|pair| ShadingSegment {
                        c0: Color::gray(pair[0].color.a),
                        c1: Color::gray(pair[1].color.a),
                        exponent: 1.0,
                    })
                    .collect(),
                extend,
            };
            let alpha_id = self.canvas.add_shading(alpha_shading);
            self.canvas.paint_shading(alpha_id);
            self.canvas.end_soft_mask();
            self.canvas.set_soft_mask(mask);
        }
        let shading = self.canvas.add_shading(Shading {
            geometry,
            color_space: ShadingColorSpace::Rgb,
            domain: (0.0, 1.0),
            bounds,
            segments: shading_segments(&stops),
            extend,
        });
        self.canvas.paint_shading(shading);
        self.canvas.end_pattern();

        self.canvas.color_space(ColorSpace::Pattern, stroke);
        self.canvas.set_color_special(pattern, stroke);
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum GradientGeometry {
    Linear {
        start: (f32, f32),
        end: (f32, f32),
    },
    Radial {
        focal: (f32, f32, f32),
        center: (f32, f32, f32),
    },
}

impl GradientGeometry {
    /// Shading coordinates for the `[first, last]` part of the gradient vector.
    fn shading(self, first: f32, last: f32) -> ShadingGeometry {
        let at = |from: f32, to: f32, t: f32| from + (to - from) * t;
        match self {
            GradientGeometry::Linear { start, end } => ShadingGeometry::Axial {
                x0: at(start.0, end.0, first),
                y0: at(start.1, end.1, first),
                x1: at(start.0, end.0, last),
                y1: at(start.1, end.1, last),
            },
            GradientGeometry::Radial { focal, center } => ShadingGeometry::Radial {
                x0: at(focal.0, center.0, first),
                y0: at(focal.1, center.1, first),
                r0: at(focal.2, center.2, first).max(0.0),
                x1: at(focal.0, center.0, last),
                y1: at(focal.1, center.1, last),
                r1: at(focal.2, center.2, last).max(0.0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Resource};
    use crate::svg::document::tests::render;
    use crate::svg::node::tests::parse_root;

    fn stop(position: f32, a: f32) -> GradientStop {
        GradientStop {
            position,
            color: Rgba::new(position, 0.0, 0.0, a),
        }
    }

    fn positions(stops: &[GradientStop]) -> Vec<f32> {
        stops.iter().map(|stop| stop.position).collect()
    }

    #[test]
    fn stop_positions_are_clamped_non_decreasing() {
        let root = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><linearGradient>
                <stop offset="40%"/><stop offset="0.2"/><stop offset="1.5"/><stop offset="-1"/>
            </linearGradient></svg>"#,
        );
        let stops = collect_stops(&root.children()[0], 16.0, 1.0);
        let found = positions(&stops);
        assert_eq!(found, vec![0.4, 0.4, 1.0, 1.0]);
        assert!(found.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn pad_injects_boundary_stops() {
        let mut stops = vec![stop(0.5, 1.0), stop(0.5, 1.0)];
        assert!(spread_stops(&mut stops, Spread::Pad, 0.0, 1.0, false).is_none());
        assert_eq!(positions(&stops), vec![-0.5, 0.5, 0.5, 1.5]);

        let mut radial = vec![stop(0.3, 1.0), stop(0.3, 1.0), stop(0.8, 1.0)];
        spread_stops(&mut radial, Spread::Pad, 0.0, 1.0, true);
        assert_eq!(positions(&radial), vec![0.0, 0.3, 0.3, 0.8]);
    }

    #[test]
    fn repeat_tiles_until_covered() {
        let mut stops = vec![stop(0.0, 1.0), stop(0.5, 1.0)];
        assert!(spread_stops(&mut stops, Spread::Repeat, -0.4, 1.2, false).is_none());
        let found = positions(&stops);
        assert!(found[0] <= -0.4);
        assert!(*found.last().unwrap() >= 1.2);
        assert!(found.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn reflect_mirrors_colors() {
        let mut stops = vec![stop(0.0, 1.0), stop(1.0, 1.0)];
        spread_stops(&mut stops, Spread::Reflect, 0.0, 2.0, false);
        assert_eq!(positions(&stops), vec![0.0, 1.0, 1.0, 2.0]);
        assert_eq!(stops[3].color, stops[0].color);
    }

    #[test]
    fn repeat_with_one_position_collapses_to_average() {
        let mut stops = vec![
            GradientStop {
                position: 0.5,
                color: Rgba::new(1.0, 0.0, 0.0, 1.0),
            },
            GradientStop {
                position: 0.5,
                color: Rgba::new(0.0, 0.0, 1.0, 1.0),
            },
        ];
        let color = spread_stops(&mut stops, Spread::Repeat, 0.0, 1.0, false).unwrap();
        assert!((color.r - 0.5).abs() < 1e-5);
        assert!((color.b - 0.5).abs() < 1e-5);
        assert!((color.a - 1.0).abs() < 1e-5);
    }

    #[test]
    fn radial_tiling_never_goes_below_zero() {
        let mut stops = vec![stop(0.5, 1.0), stop(1.0, 1.0)];
        spread_stops(&mut stops, Spread::Repeat, 0.0, 1.0, true);
        assert_eq!(stops[0].position, 0.0);
    }

    #[test]
    fn transparent_stops_borrow_neighbor_colors() {
        let stops = vec![
            GradientStop {
                position: 0.0,
                color: Rgba::new(1.0, 0.0, 0.0, 0.0),
            },
            GradientStop {
                position: 1.0,
                color: Rgba::new(0.0, 0.0, 1.0, 0.5),
            },
        ];
        let segments = shading_segments(&stops);
        assert_eq!(segments[0].c0, segments[0].c1);
        assert_eq!(segments[0].exponent, 1.0);

        let halves = vec![stop(0.0, 0.5), stop(1.0, 0.25)];
        assert_eq!(shading_segments(&halves)[0].exponent, 2.0);
    }

    #[test]
    fn one_stop_gradient_is_a_flat_fill() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
                <linearGradient id="g"><stop offset="0" stop-color="red" stop-opacity="0.25"/></linearGradient>
                <rect width="10" height="10" fill="url(#g)"/>
            </svg>"##,
        );
        let commands: Vec<&Command> = drawing.all_commands().collect();
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::SetFillColor(color) if *color == Color::rgb(1.0, 0.0, 0.0))));
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::SetAlpha { target: PaintTarget::Fill, alpha } if (*alpha - 0.25).abs() < 1e-5
        )));
        assert!(!drawing.resources.iter().any(|r| matches!(r, Resource::Pattern(_))));
    }

    #[test]
    fn two_stop_gradient_becomes_a_pattern() {
        let drawing = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
                <linearGradient id="g"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue" stop-opacity=".5"/></linearGradient>
                <rect width="10" height="10" fill="url(#g)"/>
            </svg>"##,
        );
        let pattern = drawing
            .resources
            .iter()
            .find_map(|r| match r {
                Resource::Pattern(tile) => Some(tile),
                _ => None,
            })
            .expect("pattern");
        assert!(pattern.commands.iter().any(|c| matches!(c, Command::SetSoftMask(_))));
        assert!(drawing.all_commands().any(|c| matches!(c, Command::SetPattern { stroke: false, .. })));
        let shading = drawing
            .resources
            .iter()
            .find_map(|r| match r {
                Resource::Shading(s) if s.color_space == ShadingColorSpace::Rgb => Some(s),
                _ => None,
            })
            .expect("shading");
        assert!(shading.extend);
        assert_eq!(shading.segments.len(), 1);
        assert_eq!(
            shading.geometry,
            ShadingGeometry::Axial {
                x0: 0.0,
                y0: 0.0,
                x1: 1.0,
                y1: 0.0
            }
        );
    }
}
