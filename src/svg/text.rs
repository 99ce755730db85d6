//! Per-character text positioning for `text`, `tspan`, `textPath` and `a`.

use crate::canvas::GlyphRun;
use crate::error::ParseFault;
use crate::font::{ShapedText, TextStyle};
use crate::types::{Matrix, Pt};

use super::bounding_box::BoundingBox;
use super::document::Renderer;
use super::geometry::{normalize, size};
use super::node::Node;

const ASCENT_RATIO: f32 = 0.8;
const DESCENT_RATIO: f32 = 0.2;

/// Explicit placement of one character. `None` keeps the cursor position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LetterPosition {
    x: Option<f32>,
    y: Option<f32>,
    dx: Option<f32>,
    dy: Option<f32>,
    rotate: Option<f32>,
}

fn lengths(raw: Option<&str>, font_size: f32, reference: f32) -> Vec<f32> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    normalize(raw)
        .split_whitespace()
        .map(|token| size(Some(token), font_size, Some(reference)))
        .collect()
}

fn rotations(raw: Option<&str>) -> Vec<f32> {
    match raw {
        Some(raw) => normalize(raw)
            .split_whitespace()
            .map(|token| token.parse::<f32>().unwrap_or(0.0).to_radians())
            .collect(),
        None => vec![0.0],
    }
}

fn letter_positions(
    count: usize,
    x: &[f32],
    y: &[f32],
    dx: &[f32],
    dy: &[f32],
    rotate: &[f32],
) -> Vec<LetterPosition> {
    (0..count)
        .map(|index| LetterPosition {
            x: x.get(index).copied(),
            y: y.get(index).copied(),
            dx: dx.get(index).copied(),
            dy: dy.get(index).copied(),
            rotate: rotate.get(index).copied(),
        })
        .collect()
}

/// Letter spacing and horizontal glyph scale that make a run of `width`
/// span `text_length`.
pub(crate) fn fit_length(
    width: f32,
    characters: usize,
    letter_spacing: f32,
    text_length: f32,
    spacing_and_glyphs: bool,
) -> (f32, f32) {
    let gaps = characters.saturating_sub(1) as f32;
    if spacing_and_glyphs {
        let spaced_width = width + gaps * letter_spacing;
        let letter_spacing = if spaced_width != 0.0 {
            letter_spacing * text_length / spaced_width
        } else {
            letter_spacing
        };
        let scale_x = if width != 0.0 {
            (text_length - gaps * letter_spacing) / width
        } else {
            1.0
        };
        (letter_spacing, scale_x)
    } else if gaps > 0.0 {
        ((text_length - width) / gaps, 1.0)
    } else {
        (letter_spacing, 1.0)
    }
}

/// Vertical shift of the baseline for the alignment attributes of `node`.
fn baseline_shift(node: &Node, height: f32, ascent: f32, descent: f32) -> f32 {
    match node.get("display-anchor") {
        Some("middle") => return -height / 2.0,
        Some("top") => return 0.0,
        Some("bottom") => return -height,
        _ => {}
    }
    let baseline = node
        .get("dominant-baseline")
        .or_else(|| node.get("alignment-baseline"));
    match baseline {
        Some("central" | "middle") => (ascent + descent) / 2.0 - descent,
        Some("text-before-edge" | "before_edge" | "top" | "hanging" | "text-top") => ascent,
        Some("text-after-edge" | "after_edge" | "bottom" | "text-bottom") => -descent,
        _ => 0.0,
    }
}

impl Renderer<'_> {
    fn text_style<'n>(&'n self, node: &'n Node, font_size: f32) -> TextStyle<'n> {
        TextStyle {
            font_family: node
                .get("font-family")
                .unwrap_or(&self.context.options.font_family),
            font_size,
            font_weight: node.get("font-weight").unwrap_or("normal"),
            font_style: node.get("font-style").unwrap_or("normal"),
        }
    }

    fn shape(&self, text: &str, node: &Node, font_size: f32) -> ShapedText {
        let style = self.text_style(node, font_size);
        self.context.shaper.shape(text, &style)
    }

    pub(crate) fn draw_text(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let viewport = self.state.viewport;
        let x = lengths(node.get("x"), font_size, viewport.width);
        let y = lengths(node.get("y"), font_size, viewport.height);
        let dx = lengths(node.get("dx"), font_size, viewport.width);
        let dy = lengths(node.get("dy"), font_size, viewport.height);
        let rotate = rotations(node.get("rotate"));
        let last_rotation = rotate.last().copied().unwrap_or(0.0);

        let text = node.text();
        if text.is_empty() {
            let (cursor_x, cursor_y) = self.state.cursor_position;
            self.state.cursor_position = (
                x.first().copied().unwrap_or(cursor_x) + dx.first().copied().unwrap_or(0.0),
                y.first().copied().unwrap_or(cursor_y) + dy.first().copied().unwrap_or(0.0),
            );
            return Ok(());
        }

        let letters: Vec<char> = text.chars().collect();
        let positions = letter_positions(letters.len(), &x, &y, &dx, &dy, &rotate);
        let run = self.shape(text, node, font_size);
        let mut width = run.width;
        let ascent = run.ascent.unwrap_or(font_size * ASCENT_RATIO);
        let descent = run.descent.unwrap_or(font_size * DESCENT_RATIO);

        let mut letter_spacing = self.length(node.get("letter-spacing"), font_size);
        let mut scale_x = 1.0;
        let text_length = self.length(node.get("textLength"), font_size);
        if text_length != 0.0 {
            let spacing_and_glyphs = node.get("lengthAdjust") == Some("spacingAndGlyphs");
            (letter_spacing, scale_x) = fit_length(
                width,
                letters.len(),
                letter_spacing,
                text_length,
                spacing_and_glyphs,
            );
            width = text_length;
        }

        // Inside `text`, each chunk is shifted as a whole by its group.
        let x_align = if !self.state.anchor_chunks.is_empty() {
            0.0
        } else {
            match node.get("text-anchor") {
                Some("middle") => -width / 2.0,
                Some("end") => -width,
                _ => 0.0,
            }
        };
        let y_align = baseline_shift(node, run.height, ascent, descent);

        self.canvas.push_state();
        self.canvas.begin_text();
        self.fill_stroke(node, font_size, true);

        let mut run_box = BoundingBox::EMPTY;
        let mut buffer = [0u8; 4];
        for (index, (letter, position)) in letters.iter().zip(positions).enumerate() {
            if position.x.is_some() {
                self.state.cursor_d_position.0 = 0.0;
            }
            if position.y.is_some() {
                self.state.cursor_d_position.1 = 0.0;
            }
            self.state.cursor_d_position.0 += position.dx.unwrap_or(0.0);
            self.state.cursor_d_position.1 += position.dy.unwrap_or(0.0);

            let letter: &str = letter.encode_utf8(&mut buffer);
            let shaped = self.shape(letter, node, font_size);
            let advance = shaped.width * scale_x;
            let mut letter_x = position.x.unwrap_or(self.state.cursor_position.0);
            let letter_y = position.y.unwrap_or(self.state.cursor_position.1);
            if index > 0 {
                letter_x += letter_spacing;
            }
            self.state.cursor_position = (letter_x + advance, letter_y);

            let x_position = letter_x + self.state.cursor_d_position.0 + x_align;
            let y_position = letter_y + self.state.cursor_d_position.1 + y_align;
            run_box = run_box.extend([
                (x_position, y_position),
                (x_position + advance, y_position - shaped.height),
            ]);

            let angle = position.rotate.unwrap_or(last_rotation);
            let mut matrix = Matrix::new(scale_x, 0.0, 0.0, -1.0, x_position, y_position);
            if angle != 0.0 {
                let (sin, cos) = libm::sincosf(angle);
                matrix = Matrix::new(cos, -sin, sin, cos, 0.0, 0.0) * matrix;
            }
            self.canvas.show_text(GlyphRun {
                matrix: matrix.values(),
                font: shaped.font_name,
                size: Pt::from_f32(font_size),
                text: letter.to_string(),
                glyph_ids: shaped.glyph_ids,
            });
        }
        node.set_text_bounding_box(node.text_bounding_box().union(run_box));
        self.extend_anchor_chunk(run_box);

        self.canvas.end_text();
        self.canvas.pop_state();
        Ok(())
    }
}

/// Text box padded by one font size, for anchored text groups.
pub(crate) fn padded_text_box(bbox: BoundingBox, font_size: f32) -> [f32; 4] {
    bbox.grow(font_size).to_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Resource};
    use crate::svg::document::tests::render;

    fn runs(svg: &str) -> Vec<GlyphRun> {
        render(svg)
            .all_commands()
            .filter_map(|c| match c {
                Command::ShowText(run) => Some(run.clone()),
                _ => None,
            })
            .collect()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn letters_advance_with_the_cursor() {
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text x="10" y="20" font-size="10">ab</text></svg>"#,
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "a");
        assert!(close(found[0].matrix[4], 10.0));
        assert!(close(found[0].matrix[5], 20.0));
        assert!(close(found[0].matrix[3], -1.0));
        assert!(close(found[1].matrix[4], 16.0));
    }

    #[test]
    fn explicit_positions_and_deltas_apply_per_letter() {
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text x="0 50" y="10" dx="1 1 1" font-size="10">abc</text></svg>"#,
        );
        assert!(close(found[0].matrix[4], 1.0));
        assert!(close(found[1].matrix[4], 51.0));
        assert!(close(found[2].matrix[4], 58.0));
    }

    #[test]
    fn tspans_continue_from_the_cursor() {
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text x="0" y="10" font-size="10">a<tspan>b</tspan></text></svg>"#,
        );
        assert_eq!(found.len(), 2);
        assert!(close(found[1].matrix[4], 6.0));
    }

    #[test]
    fn text_length_spreads_letters() {
        let (spacing, scale) = fit_length(12.0, 3, 0.0, 20.0, false);
        assert!(close(spacing, 4.0));
        assert_eq!(scale, 1.0);
        let (spacing, scale) = fit_length(12.0, 3, 0.0, 24.0, true);
        assert_eq!(spacing, 0.0);
        assert!(close(scale, 2.0));
    }

    #[test]
    fn last_rotation_repeats() {
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text y="10" rotate="0 90">abc</text></svg>"#,
        );
        assert!(close(found[0].matrix[1], 0.0));
        assert!(close(found[1].matrix[0], 0.0));
        assert!(close(found[2].matrix[0], 0.0));
    }

    #[test]
    fn hanging_baseline_uses_ascent_ratio() {
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text y="10" font-size="10" dominant-baseline="hanging">a</text></svg>"#,
        );
        assert!(close(found[0].matrix[5], 18.0));
    }

    #[test]
    fn anchored_text_is_shifted_as_a_group() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text x="50" y="10" font-size="10" text-anchor="end">ab</text></svg>"#,
        );
        let group = drawing
            .resources
            .iter()
            .find_map(|r| match r {
                Resource::Group(group) => Some(group),
                _ => None,
            })
            .expect("anchor group");
        assert!(group.commands.iter().any(|c| matches!(c, Command::ShowText(_))));
        assert!(drawing.commands.iter().any(|c| matches!(
            c,
            Command::ConcatMatrix { e, .. } if close(e.to_f32(), -12.0)
        )));
        assert!(drawing.commands.iter().any(|c| matches!(c, Command::DrawXObject(_))));
    }

    fn anchor_shifts(svg: &str) -> Vec<f32> {
        render(svg)
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::ConcatMatrix { e, .. } if e.to_f32() < 0.0 => Some(e.to_f32()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn each_text_chunk_is_anchored_by_its_own_width() {
        let shifts = anchor_shifts(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text font-size="10" text-anchor="middle"><tspan x="10" y="10">ab</tspan><tspan x="10" y="30">abcd</tspan></text></svg>"#,
        );
        assert_eq!(shifts.len(), 2);
        assert!(close(shifts[0], -6.0));
        assert!(close(shifts[1], -12.0));
    }

    #[test]
    fn tspan_anchor_applies_to_its_chunk() {
        let shifts = anchor_shifts(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text x="10" y="10" font-size="10">ab<tspan x="50" y="30" text-anchor="end">abcd</tspan></text></svg>"#,
        );
        assert_eq!(shifts.len(), 1);
        assert!(close(shifts[0], -24.0));
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text x="10" y="10" font-size="10">ab<tspan x="50" y="30" text-anchor="end">abcd</tspan></text></svg>"#,
        );
        assert_eq!(found.len(), 6);
        assert!(close(found[0].matrix[4], 10.0));
        assert!(close(found[2].matrix[4], 50.0));
    }

    #[test]
    fn empty_text_only_moves_the_cursor() {
        let found = runs(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><text font-size="10"><tspan x="5" dx="2"></tspan><tspan y="10">a</tspan></text></svg>"#,
        );
        assert_eq!(found.len(), 1);
        assert!(close(found[0].matrix[4], 7.0));
    }
}
