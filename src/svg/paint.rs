//! Fill and stroke resolution.

use lightningcss::traits::Parse;
use lightningcss::values::color::{CssColor, SRGB};
use tracing::debug;

use crate::canvas::PaintTarget;
use crate::types::Rgba;

use super::document::Renderer;
use super::geometry::normalize;
use super::node::Node;

/// Parsed `fill` or `stroke` value.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintSource {
    None,
    Color(Rgba),
    /// Paint server id, with the color to use when it cannot be resolved.
    Reference { id: String, fallback: Option<Rgba> },
}

impl PaintSource {
    pub fn is_none(&self) -> bool {
        matches!(self, PaintSource::None)
    }
}

pub fn get_paint(value: Option<&str>) -> PaintSource {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty() && *v != "none") else {
        return PaintSource::None;
    };
    if value.starts_with("url(") {
        let close = value.find(')').unwrap_or(value.len() - 1);
        let id = parse_url(&value[..=close])
            .map(|url| url.rsplit_once('#').map_or(url, |(_, id)| id).to_string())
            .unwrap_or_default();
        let rest = value[close + 1..].trim();
        let fallback = if rest.is_empty() || rest == "none" {
            None
        } else {
            parse_color(rest)
        };
        return PaintSource::Reference { id, fallback };
    }
    match parse_color(value) {
        Some(color) => PaintSource::Color(color),
        None => {
            debug!(value, "unparsable paint");
            PaintSource::None
        }
    }
}

pub fn parse_color(raw: &str) -> Option<Rgba> {
    let color = CssColor::parse_string(raw.trim()).ok()?;
    if let CssColor::RGBA(rgba) = &color {
        return Some(Rgba::new(
            rgba.red as f32 / 255.0,
            rgba.green as f32 / 255.0,
            rgba.blue as f32 / 255.0,
            (rgba.alpha as f32 / 255.0).clamp(0.0, 1.0),
        ));
    }
    let srgb = SRGB::try_from(&color).ok()?;
    Some(Rgba::new(srgb.r, srgb.g, srgb.b, srgb.alpha.clamp(0.0, 1.0)))
}

/// Contents of a `url(...)` reference, unquoted.
pub fn parse_url(raw: &str) -> Option<&str> {
    let inner = raw.trim().strip_prefix("url(")?;
    let inner = inner.strip_suffix(')').unwrap_or(inner).trim();
    Some(inner.trim_matches(|c| c == '"' || c == '\''))
}

/// Fragment id of a `url(#id)` reference.
pub fn url_fragment(raw: &str) -> Option<&str> {
    let url = parse_url(raw)?;
    let (_, id) = url.rsplit_once('#')?;
    Some(id).filter(|id| !id.is_empty())
}

/// Opacity value: number or percentage, clamped to [0, 1]; 1 when absent.
pub fn alpha_value(value: Option<&str>) -> f32 {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return 1.0;
    };
    let parsed = match raw.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f32>().map(|v| v / 100.0),
        None => raw.parse::<f32>(),
    };
    parsed.map(|v| v.clamp(0.0, 1.0)).unwrap_or(1.0)
}

/// Text rendering mode for the given paint state.
pub(crate) fn text_rendering_mode(fill: bool, stroke: bool) -> u8 {
    match (fill, stroke) {
        (true, true) => 2,
        (false, true) => 1,
        (true, false) => 0,
        (false, false) => 3,
    }
}

impl Renderer<'_> {
    /// Sets the paint state of `node` and paints the current path, or, for
    /// text, selects the matching text rendering mode.
    pub(crate) fn fill_stroke(&mut self, node: &Node, font_size: f32, text: bool) {
        let fill = self.apply_paint(node, font_size, false);
        let stroke_width = self.length(Some(node.get("stroke-width").unwrap_or("1px")), font_size);
        let stroke = stroke_width > 0.0 && self.apply_paint(node, font_size, true);
        if stroke {
            self.canvas.set_line_width(stroke_width);
        }

        let dashes: Vec<f32> = node
            .get("stroke-dasharray")
            .map(normalize)
            .unwrap_or_default()
            .split_whitespace()
            .filter(|token| *token != "none")
            .map(|token| self.length(Some(token), font_size))
            .collect();
        let total: f32 = dashes.iter().sum();
        if !dashes.is_empty() && total != 0.0 && !dashes.iter().any(|dash| *dash < 0.0) {
            let mut offset = self.length(node.get("stroke-dashoffset"), font_size);
            if offset < 0.0 {
                offset = total - offset.abs() % total;
            }
            self.canvas.set_dash(&dashes, offset);
        }

        let cap = match node.get("stroke-linecap") {
            Some("round") => 1,
            Some("square") => 2,
            _ => 0,
        };
        self.canvas.set_line_cap(cap);
        let join = match node.get("stroke-linejoin") {
            Some("round") => 1,
            Some("bevel") => 2,
            _ => 0,
        };
        self.canvas.set_line_join(join);
        let miter_limit = node
            .get("stroke-miterlimit")
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|limit| *limit >= 0.0)
            .unwrap_or(4.0);
        self.canvas.set_miter_limit(miter_limit);

        if text {
            self.canvas.set_text_rendering(text_rendering_mode(fill, stroke));
            return;
        }
        let evenodd = node.get("fill-rule") == Some("evenodd");
        match (fill, stroke) {
            (true, true) => self.canvas.fill_and_stroke(evenodd),
            (false, true) => self.canvas.stroke(),
            (true, false) => self.canvas.fill(evenodd),
            (false, false) => self.canvas.end_path(),
        }
    }

    /// Resolves and sets one paint; `false` when nothing is painted.
    fn apply_paint(&mut self, node: &Node, font_size: f32, stroke: bool) -> bool {
        let (value, opacity) = if stroke {
            (node.get("stroke"), alpha_value(node.get("stroke-opacity")))
        } else {
            (
                Some(node.get("fill").unwrap_or("black")),
                alpha_value(node.get("fill-opacity")),
            )
        };
        let color = match get_paint(value) {
            PaintSource::None => return false,
            PaintSource::Color(color) => color,
            PaintSource::Reference { id, fallback } => {
                if self.draw_paint_server(node, &id, font_size, opacity, stroke) {
                    return true;
                }
                match fallback {
                    Some(color) => color,
                    None => {
                        self.note_unresolved("paint", &id);
                        return false;
                    }
                }
            }
        };
        self.canvas.set_color(color.rgb(), stroke);
        self.canvas
            .set_alpha(color.a * opacity, PaintTarget::from_stroke(stroke));
        true
    }

    fn draw_paint_server(
        &mut self,
        node: &Node,
        id: &str,
        font_size: f32,
        opacity: f32,
        stroke: bool,
    ) -> bool {
        let defs = &self.document.defs;
        if let Some(gradient) = defs.gradient(id) {
            return self.draw_gradient(node, &gradient, font_size, opacity, stroke);
        }
        if let Some(pattern) = defs.pattern(id) {
            return self.draw_pattern(node, &pattern, font_size, opacity, stroke);
        }
        false
    }
}
