//! Lengths, coordinate pairs, aspect ratios and transform strings.

use tracing::warn;

use crate::error::ParseFault;
use crate::types::Matrix;

use super::node::Node;

const UNITS: &[(&str, f32)] = &[
    ("px", 1.0),
    ("in", 96.0),
    ("cm", 96.0 / 2.54),
    ("mm", 96.0 / 25.4),
    ("pt", 96.0 / 72.0),
    ("pc", 16.0),
    ("q", 96.0 / 101.6),
];

/// Canonical separator form: one space between tokens, `-` and adjacent
/// decimals split into their own tokens.
pub fn normalize(input: &str) -> String {
    let mut spaced = String::with_capacity(input.len() + 8);
    let mut prev: Option<char> = None;
    for ch in input.chars() {
        let ch = if ch == 'E' { 'e' } else { ch };
        if ch == '-' && prev != Some('e') {
            spaced.push(' ');
        }
        spaced.push(ch);
        prev = Some(ch);
    }

    let mut out = String::with_capacity(spaced.len());
    let mut in_separator = false;
    // Length of the digit run after the last '.', None outside a decimal.
    let mut decimal_run: Option<usize> = None;
    for ch in spaced.chars() {
        if matches!(ch, ' ' | ',' | '\n' | '\r' | '\t') {
            if !in_separator {
                out.push(' ');
                in_separator = true;
            }
            decimal_run = None;
            continue;
        }
        in_separator = false;
        if ch == '.' {
            if decimal_run.is_some_and(|run| run > 0) {
                out.push(' ');
            }
            decimal_run = Some(0);
        } else if ch.is_ascii_digit() || ch == '-' {
            decimal_run = decimal_run.map(|run| run + 1);
        } else {
            decimal_run = None;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

fn parse_number(raw: &str) -> Option<f32> {
    let raw = raw.trim();
    let first = raw.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    raw.parse::<f32>().ok().filter(|value| value.is_finite())
}

/// Resolves a length to pixels. Unknown units and unparsable numbers are 0.
pub fn size(value: Option<&str>, font_size: f32, percentage_reference: Option<f32>) -> f32 {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return 0.0;
    };
    if let Some(number) = parse_number(raw) {
        return number;
    }
    let normalized = normalize(raw);
    let token = normalized.split(' ').next().unwrap_or_default();
    let lower = token.to_ascii_lowercase();

    if let Some(number) = lower.strip_suffix('%') {
        let Some(reference) = percentage_reference else {
            warn!(value = raw, "percentage length without a reference size");
            return 0.0;
        };
        return parse_number(number).unwrap_or(0.0) * reference / 100.0;
    }
    if let Some(number) = lower.strip_suffix("rem") {
        return font_size * parse_number(number).unwrap_or(0.0);
    }
    if let Some(number) = lower.strip_suffix("em") {
        return font_size * parse_number(number).unwrap_or(0.0);
    }
    if let Some(number) = lower.strip_suffix("ex") {
        return font_size * parse_number(number).unwrap_or(0.0) / 2.0;
    }
    for (unit, factor) in UNITS {
        if let Some(number) = lower.strip_suffix(unit) {
            return parse_number(number).unwrap_or(0.0) * factor;
        }
    }
    0.0
}

/// Inner viewport of the element being drawn; percentage reference for
/// coordinates and lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn diagonal(&self) -> f32 {
        libm::hypotf(self.width, self.height) / std::f32::consts::SQRT_2
    }

    pub fn point(&self, x: Option<&str>, y: Option<&str>, font_size: f32) -> (f32, f32) {
        (
            size(x, font_size, Some(self.width)),
            size(y, font_size, Some(self.height)),
        )
    }

    pub fn length(&self, value: Option<&str>, font_size: f32) -> f32 {
        size(value, font_size, Some(self.diagonal()))
    }
}

/// Pops a coordinate pair off a normalized string.
pub fn point<'a>(
    viewport: &Viewport,
    input: &'a str,
    font_size: f32,
) -> Result<(f32, f32, &'a str), ParseFault> {
    let input = input.trim_start();
    let (x, rest) = input.split_once(' ').ok_or(ParseFault::MissingCoordinate)?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Err(ParseFault::MissingCoordinate);
    }
    let (y, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    if parse_number(x).is_none() && !x.ends_with('%') && !x.chars().any(|c| c.is_ascii_digit()) {
        return Err(ParseFault::InvalidNumber);
    }
    if parse_number(y).is_none() && !y.chars().any(|c| c.is_ascii_digit()) {
        return Err(ParseFault::InvalidNumber);
    }
    let (x, y) = viewport.point(Some(x), Some(y), font_size);
    Ok((x, y, rest))
}

/// Coordinate pairs of a `points` list; an unpaired trailing value is dropped.
pub fn point_list(viewport: &Viewport, raw: &str, font_size: f32) -> Vec<(f32, f32)> {
    let normalized = normalize(raw);
    let mut rest = normalized.as_str();
    let mut points = Vec::new();
    while let Ok((x, y, tail)) = point(viewport, rest, font_size) {
        points.push((x, y));
        rest = tail;
    }
    points
}

/// Pops a single number off a normalized string.
pub fn number(input: &str) -> Result<(f32, &str), ParseFault> {
    let input = input.trim_start();
    if input.is_empty() {
        return Err(ParseFault::MissingCoordinate);
    }
    let (token, rest) = input.split_once(' ').unwrap_or((input, ""));
    let value = parse_number(token).ok_or(ParseFault::InvalidNumber)?;
    Ok((value, rest))
}

/// `viewBox` as `[min_x, min_y, width, height]`.
pub fn parse_viewbox(raw: Option<&str>) -> Option<[f32; 4]> {
    let normalized = normalize(raw?);
    let values: Vec<f32> = normalized
        .split(' ')
        .filter_map(parse_number)
        .collect();
    match values.as_slice() {
        [x, y, w, h] => Some([*x, *y, *w, *h]),
        _ => None,
    }
}

/// Scale and translation mapping a viewBox onto `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl RatioTransform {
    pub const IDENTITY: RatioTransform = RatioTransform {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// Scale, then translate.
    pub fn matrix(self) -> Matrix {
        Matrix::new(
            self.scale_x,
            0.0,
            0.0,
            self.scale_y,
            self.translate_x,
            self.translate_y,
        )
    }
}

/// `preserveAspectRatio` resolution. `intrinsic` stands in for a missing
/// viewBox on the document root when both of its dimensions are known.
#[allow(clippy::too_many_arguments)]
pub fn preserve_ratio(
    node: &Node,
    tag: &str,
    viewport: &Viewport,
    font_size: f32,
    width: f32,
    height: f32,
    viewbox: Option<[f32; 4]>,
    intrinsic: Option<(f32, f32)>,
) -> RatioTransform {
    let (viewbox_width, viewbox_height) = match (viewbox, intrinsic) {
        (Some(viewbox), _) => (viewbox[2], viewbox[3]),
        (None, Some(size)) => size,
        (None, None) => return RatioTransform::IDENTITY,
    };
    let mut scale_x = if viewbox_width != 0.0 {
        width / viewbox_width
    } else {
        1.0
    };
    let mut scale_y = if viewbox_height != 0.0 {
        height / viewbox_height
    } else {
        1.0
    };

    let aspect_ratio = node.get("preserveAspectRatio").unwrap_or("xMidYMid");
    let mut parts = aspect_ratio.split_whitespace();
    let align = parts.next().unwrap_or("xMidYMid");
    let (x_position, y_position) = if align == "none" {
        ("min".to_string(), "min".to_string())
    } else {
        let scale = if parts.next() == Some("slice") {
            scale_x.max(scale_y)
        } else {
            scale_x.min(scale_y)
        };
        scale_x = scale;
        scale_y = scale;
        (
            align.get(1..4).unwrap_or("mid").to_ascii_lowercase(),
            align.get(5..).unwrap_or("mid").to_ascii_lowercase(),
        )
    };

    let (mut translate_x, mut translate_y) = if tag == "marker" {
        viewport.point(node.get("refX"), Some(node.get("refY").unwrap_or("0")), font_size)
    } else {
        let align_offset = |position: &str, available: f32, used: f32| match position {
            "mid" => (available - used) / 2.0,
            "max" => available - used,
            _ => 0.0,
        };
        (
            align_offset(&x_position, width, viewbox_width * scale_x),
            align_offset(&y_position, height, viewbox_height * scale_y),
        )
    };

    if let Some(viewbox) = viewbox {
        translate_x -= viewbox[0] * scale_x;
        translate_y -= viewbox[1] * scale_y;
    }

    RatioTransform {
        scale_x,
        scale_y,
        translate_x,
        translate_y,
    }
}

/// Composes an SVG `transform` list. Each function applies before the ones
/// listed to its left, so the result maps element space to parent space.
pub fn transform(input: Option<&str>, font_size: f32, diagonal: f32) -> Matrix {
    let Some(input) = input.filter(|raw| !raw.trim().is_empty()) else {
        return Matrix::identity();
    };
    let normalized = normalize(input);
    let mut matrix = Matrix::identity();
    let mut rest = normalized.as_str();

    while let Some(open) = rest.find('(') {
        let name = rest[..open].trim().rsplit(' ').next().unwrap_or_default();
        let Some(close) = rest[open + 1..].find(')') else {
            break;
        };
        let args: Vec<&str> = rest[open + 1..open + 1 + close]
            .split(' ')
            .filter(|arg| !arg.is_empty())
            .collect();
        let length = |idx: usize| size(args.get(idx).copied(), font_size, Some(diagonal));
        let angle = |idx: usize| {
            args.get(idx)
                .and_then(|raw| parse_number(raw.trim_end_matches("deg")))
                .unwrap_or(0.0)
                .to_radians()
        };

        let step = match name {
            "matrix" if args.len() >= 6 => Matrix::new(
                length(0),
                length(1),
                length(2),
                length(3),
                length(4),
                length(5),
            ),
            "rotate" => {
                let rotation = Matrix::rotate(angle(0));
                if args.len() >= 3 {
                    let (x, y) = (length(1), length(2));
                    Matrix::translate(-x, -y) * rotation * Matrix::translate(x, y)
                } else {
                    rotation
                }
            }
            "skewX" => Matrix::new(1.0, 0.0, libm::tanf(angle(0)), 1.0, 0.0, 0.0),
            "skewY" => Matrix::new(1.0, libm::tanf(angle(0)), 0.0, 1.0, 0.0, 0.0),
            "skew" => {
                let y_angle = if args.len() > 1 { angle(1) } else { 0.0 };
                Matrix::new(1.0, libm::tanf(y_angle), libm::tanf(angle(0)), 1.0, 0.0, 0.0)
            }
            "translate" => Matrix::translate(length(0), length(1)),
            "translateX" => Matrix::translate(length(0), 0.0),
            "translateY" => Matrix::translate(0.0, length(0)),
            "scale" => {
                let sx = parse_number(args.first().copied().unwrap_or("1")).unwrap_or(1.0);
                let sy = args
                    .get(1)
                    .and_then(|raw| parse_number(raw))
                    .unwrap_or(sx);
                Matrix::scale(sx, sy)
            }
            "scaleX" => Matrix::scale(parse_number(args.first().copied().unwrap_or("1")).unwrap_or(1.0), 1.0),
            "scaleY" => Matrix::scale(1.0, parse_number(args.first().copied().unwrap_or("1")).unwrap_or(1.0)),
            _ => Matrix::identity(),
        };
        matrix = step * matrix;
        rest = &rest[open + 1 + close + 1..];
    }
    matrix
}

/// Wraps `matrix` so it pivots around a `transform-origin`.
pub fn with_origin(
    matrix: Matrix,
    origin: Option<&str>,
    viewport: &Viewport,
    font_size: f32,
) -> Matrix {
    let Some(origin) = origin.filter(|raw| !raw.trim().is_empty()) else {
        return matrix;
    };
    let normalized = normalize(origin);
    let mut tokens = normalized.split(' ');
    let keyword = |token: Option<&str>, reference: f32| -> f32 {
        match token {
            Some("left") | Some("top") => 0.0,
            Some("center") => reference / 2.0,
            Some("right") | Some("bottom") => reference,
            other => size(other, font_size, Some(reference)),
        }
    };
    let ox = keyword(tokens.next(), viewport.width);
    let oy = keyword(tokens.next(), viewport.height);
    Matrix::translate(-ox, -oy) * matrix * Matrix::translate(ox, oy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::node::tests::parse_root;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn normalize_splits_signs_separators_and_decimals() {
        assert_eq!(normalize("10-20"), "10 -20");
        assert_eq!(normalize("1e-3,2E-2"), "1e-3 2e-2");
        assert_eq!(normalize(" 1 ,\n 2\t3 "), "1 2 3");
        assert_eq!(normalize("1.2.3"), "1.2 .3");
        assert_eq!(normalize("M10.5.5"), "M10.5 .5");
    }

    #[test]
    fn size_resolves_units_and_percentages() {
        assert_eq!(size(None, 16.0, None), 0.0);
        assert_eq!(size(Some("12"), 16.0, None), 12.0);
        assert_eq!(size(Some("2em"), 16.0, None), 32.0);
        assert_eq!(size(Some("1rem"), 10.0, None), 10.0);
        assert_eq!(size(Some("2ex"), 16.0, None), 16.0);
        assert!(close(size(Some("1in"), 16.0, None), 96.0));
        assert!(close(size(Some("72pt"), 16.0, None), 96.0));
        assert!(close(size(Some("2.54cm"), 16.0, None), 96.0));
        assert!(close(size(Some("1pc"), 16.0, None), 16.0));
        assert!(close(size(Some("101.6Q"), 16.0, None), 96.0));
        assert_eq!(size(Some("50%"), 16.0, Some(200.0)), 100.0);
        assert_eq!(size(Some("50%"), 16.0, None), 0.0);
        assert_eq!(size(Some("3furlongs"), 16.0, None), 0.0);
    }

    #[test]
    fn point_pops_pairs_and_reports_missing_coordinates() {
        let viewport = Viewport::new(100.0, 50.0);
        let (x, y, rest) = point(&viewport, "10 50% 7 8", 16.0).unwrap();
        assert_eq!((x, y, rest), (10.0, 25.0, "7 8"));
        assert_eq!(point(&viewport, "10", 16.0), Err(ParseFault::MissingCoordinate));
        assert_eq!(point(&viewport, "L 1", 16.0), Err(ParseFault::InvalidNumber));
        assert!(close(viewport.diagonal(), libm::hypotf(100.0, 50.0) / 2f32.sqrt()));
    }

    #[test]
    fn viewbox_needs_four_numbers() {
        assert_eq!(parse_viewbox(Some("0,0 10 20")), Some([0.0, 0.0, 10.0, 20.0]));
        assert_eq!(parse_viewbox(Some("0 0 10")), None);
        assert_eq!(parse_viewbox(None), None);
    }

    #[test]
    fn transform_list_applies_rightmost_function_first() {
        let m = transform(Some("translate(10) scale(2)"), 16.0, 1.0);
        let (x, y) = m.apply(1.0, 1.0);
        assert!(close(x, 12.0) && close(y, 2.0));

        let m = transform(Some("rotate(90 10 10)"), 16.0, 1.0);
        let (x, y) = m.apply(20.0, 10.0);
        assert!(close(x, 10.0) && close(y, 20.0));

        let m = transform(Some("skewX(45)"), 16.0, 1.0);
        let (x, _) = m.apply(0.0, 10.0);
        assert!(close(x, 10.0));

        let m = transform(Some("matrix(1,0,0,1,5,6)"), 16.0, 1.0);
        assert_eq!(m.apply(0.0, 0.0), (5.0, 6.0));
        assert!(transform(Some("bogus(3)"), 16.0, 1.0).is_identity());
    }

    #[test]
    fn transform_origin_pivots() {
        let viewport = Viewport::new(100.0, 100.0);
        let m = with_origin(Matrix::scale(2.0, 2.0), Some("10 10"), &viewport, 16.0);
        let (x, y) = m.apply(10.0, 10.0);
        assert!(close(x, 10.0) && close(y, 10.0));
    }

    #[test]
    fn meet_scale_is_bounded_by_the_smaller_axis_and_slice_by_the_larger() {
        let viewport = Viewport::new(100.0, 100.0);
        let meet = parse_root(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 20"/>"#);
        let ratio = preserve_ratio(&meet, "svg", &viewport, 16.0, 100.0, 100.0, Some([0.0, 0.0, 10.0, 20.0]), None);
        assert!(ratio.scale_x <= 10.0f32.min(5.0));
        assert_eq!(ratio.scale_x, ratio.scale_y);
        assert!(close(ratio.translate_x, 25.0));

        let slice = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg" preserveAspectRatio="xMinYMin slice"/>"#,
        );
        let ratio = preserve_ratio(&slice, "svg", &viewport, 16.0, 100.0, 100.0, Some([0.0, 0.0, 10.0, 20.0]), None);
        assert!(ratio.scale_x >= 10.0f32.max(5.0));
        assert_eq!(ratio.translate_x, 0.0);

        let none = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg" preserveAspectRatio="none"/>"#,
        );
        let ratio = preserve_ratio(&none, "svg", &viewport, 16.0, 100.0, 100.0, Some([5.0, 0.0, 10.0, 20.0]), None);
        assert_eq!((ratio.scale_x, ratio.scale_y), (10.0, 5.0));
        assert_eq!(ratio.translate_x, -50.0);
    }

    #[test]
    fn missing_viewbox_is_identity_unless_intrinsic_size_known() {
        let viewport = Viewport::new(100.0, 100.0);
        let node = parse_root(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#);
        let ratio = preserve_ratio(&node, "svg", &viewport, 16.0, 50.0, 50.0, None, None);
        assert_eq!(ratio, RatioTransform::IDENTITY);
        let ratio = preserve_ratio(&node, "svg", &viewport, 16.0, 50.0, 50.0, None, Some((100.0, 100.0)));
        assert_eq!(ratio.scale_x, 0.5);
    }

    #[test]
    fn marker_ratio_translates_by_reference_point() {
        let viewport = Viewport::new(100.0, 100.0);
        let node = parse_root(
            r#"<svg xmlns="http://www.w3.org/2000/svg" refX="3" refY="4"/>"#,
        );
        let ratio = preserve_ratio(&node, "marker", &viewport, 16.0, 10.0, 10.0, Some([0.0, 0.0, 10.0, 10.0]), None);
        assert_eq!((ratio.translate_x, ratio.translate_y), (3.0, 4.0));
    }
}
