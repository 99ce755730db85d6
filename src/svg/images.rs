//! Nested `svg` viewports and `image` elements.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::assets::resolve_url;
use crate::error::ParseFault;
use crate::images::DecodedImage;
use crate::types::Matrix;

use super::document::{Renderer, SvgDocument};
use super::geometry::{Viewport, preserve_ratio};
use super::node::Node;

const DEFAULT_WIDTH: f32 = 300.0;
const DEFAULT_HEIGHT: f32 = 150.0;

enum ImageSource {
    Raster(DecodedImage),
    Vector(Rc<SvgDocument>),
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg")
        || ((text.starts_with("<?xml") || text.starts_with("<!")) && text.contains("<svg"))
}

/// Fills in whichever intrinsic dimensions are missing, from the ratio and
/// the requested size, falling back to 300x150.
pub(crate) fn resolve_intrinsic_size(
    intrinsic_width: Option<f32>,
    intrinsic_height: Option<f32>,
    ratio: Option<f32>,
    width: f32,
    height: f32,
) -> (f32, f32) {
    let ratio = ratio.filter(|ratio| *ratio > 0.0 && ratio.is_finite());
    match (intrinsic_width, intrinsic_height, ratio) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some(ratio)) => (w, w / ratio),
        (None, Some(h), Some(ratio)) => (ratio * h, h),
        (None, None, Some(ratio)) if width != 0.0 => (width, width / ratio),
        (None, None, Some(ratio)) if height != 0.0 => (ratio * height, height),
        (Some(w), None, None) => (w, DEFAULT_HEIGHT),
        (None, Some(h), None) => (DEFAULT_WIDTH, h),
        _ => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    }
}

impl Renderer<'_> {
    pub(crate) fn draw_svg(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let viewbox = node.viewbox();
        let root = self.is_root(node);
        let viewport = self.state.viewport;
        let (width, height) = if root {
            self.state.concrete
        } else {
            let (x, y) = viewport.point(node.get("x"), node.get("y"), font_size);
            self.canvas.transform(Matrix::translate(x, y));
            viewport.point(
                Some(node.get("width").unwrap_or("100%")),
                Some(node.get("height").unwrap_or("100%")),
                font_size,
            )
        };
        let intrinsic = if root && viewbox.is_none() {
            match self.document.intrinsic_size(self.context.options.default_font_size) {
                (Some(w), Some(h)) => Some((w, h)),
                _ => None,
            }
        } else {
            None
        };
        let ratio = preserve_ratio(
            node, "svg", &viewport, font_size, width, height, viewbox, intrinsic,
        );
        if !root && !matches!(node.get("overflow"), Some("visible" | "auto")) {
            self.canvas.rectangle(0.0, 0.0, width, height);
            self.canvas.clip(false);
            self.canvas.end_path();
        }
        self.canvas.transform(ratio.matrix());

        if !root {
            self.state.concrete = (width, height);
            self.state.viewport = match viewbox {
                Some(viewbox) => Viewport::new(viewbox[2], viewbox[3]),
                None => Viewport::new(width, height),
            };
        }
        Ok(())
    }

    pub(crate) fn draw_image(&mut self, node: &Node, font_size: f32) -> Result<(), ParseFault> {
        let Some(href) = node.href() else {
            return Ok(());
        };
        let base = node.get("xml:base").or(self.document.url());
        let url = resolve_url(base, href);
        let bytes = match self.context.fetcher.fetch(&url) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(url = %url, error = %err, "image not loaded");
                self.note_unresolved("image", &url);
                return Ok(());
            }
        };

        let source = if looks_like_svg(&bytes) {
            match SvgDocument::parse(&bytes, Some(&url), self.context.fetcher) {
                Ok(document) => ImageSource::Vector(Rc::new(document)),
                Err(err) => {
                    warn!(url = %url, error = %err, "svg image not parsed");
                    return Ok(());
                }
            }
        } else {
            match self.context.images.decode(&bytes, &url) {
                Some(decoded) => ImageSource::Raster(decoded),
                None => {
                    debug!(url = %url, "image not decoded");
                    return Ok(());
                }
            }
        };

        let viewport = self.state.viewport;
        let (x, y) = viewport.point(node.get("x"), node.get("y"), font_size);
        let (width, height) = viewport.point(node.get("width"), node.get("height"), font_size);
        let (intrinsic_width, intrinsic_height, ratio) = match &source {
            ImageSource::Raster(decoded) => (decoded.width, decoded.height, decoded.ratio),
            ImageSource::Vector(document) => {
                let (w, h) = document.intrinsic_size(font_size);
                let ratio = match (document.viewbox(), w, h) {
                    (Some(viewbox), _, _) if viewbox[3] != 0.0 => Some(viewbox[2] / viewbox[3]),
                    (_, Some(w), Some(h)) if h != 0.0 => Some(w / h),
                    _ => None,
                };
                (w, h, ratio)
            }
        };
        let (intrinsic_width, intrinsic_height) =
            resolve_intrinsic_size(intrinsic_width, intrinsic_height, ratio, width, height);
        let width = if width != 0.0 { width } else { intrinsic_width };
        let height = if height != 0.0 { height } else { intrinsic_height };
        if width <= 0.0 || height <= 0.0 {
            return Ok(());
        }

        let fit = preserve_ratio(
            node,
            "image",
            &viewport,
            font_size,
            width,
            height,
            Some([0.0, 0.0, intrinsic_width, intrinsic_height]),
            None,
        );
        self.canvas.rectangle(x, y, width, height);
        self.canvas.clip(false);
        self.canvas.end_path();
        self.canvas.push_state();
        self.canvas.transform(Matrix::new(
            fit.scale_x,
            0.0,
            0.0,
            fit.scale_y,
            fit.translate_x + x,
            fit.translate_y + y,
        ));
        match source {
            ImageSource::Raster(decoded) => {
                self.canvas
                    .draw_image(intrinsic_width, intrinsic_height, decoded.resource_id);
            }
            ImageSource::Vector(document) => {
                self.with_document(&document, |nested| {
                    nested.draw_root(intrinsic_width, intrinsic_height);
                });
            }
        }
        self.canvas.pop_state();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::svg::document::tests::{render, render_with_assets};

    #[test]
    fn intrinsic_size_fills_missing_dimensions() {
        assert_eq!(resolve_intrinsic_size(None, None, None, 0.0, 0.0), (300.0, 150.0));
        assert_eq!(resolve_intrinsic_size(Some(40.0), None, Some(2.0), 0.0, 0.0), (40.0, 20.0));
        assert_eq!(resolve_intrinsic_size(None, Some(10.0), Some(2.0), 0.0, 0.0), (20.0, 10.0));
        assert_eq!(resolve_intrinsic_size(None, None, Some(2.0), 0.0, 30.0), (60.0, 30.0));
        assert_eq!(resolve_intrinsic_size(None, None, Some(2.0), 50.0, 0.0), (50.0, 25.0));
    }

    #[test]
    fn nested_svg_clips_and_scales() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <svg x="10" y="10" width="20" height="20" viewBox="0 0 10 10"><rect width="10" height="10"/></svg>
            </svg>"#,
        );
        let commands: Vec<&Command> = drawing.commands.iter().collect();
        assert!(commands.iter().any(|c| matches!(c, Command::ClipPath { .. })));
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::ConcatMatrix { a, d, .. } if *a == 2.0 && *d == 2.0
        )));
    }

    #[test]
    fn root_svg_is_not_clipped() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect width="10" height="10"/></svg>"#,
        );
        assert!(!drawing.commands.iter().any(|c| matches!(c, Command::ClipPath { .. })));
    }

    #[test]
    fn svg_images_are_drawn_inline() {
        let inner = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><circle cx="5" cy="5" r="5"/></svg>"#;
        let drawing = render_with_assets(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><image href="dot.svg" width="20" height="20"/></svg>"#,
            &[("dot.svg", inner.as_bytes())],
        );
        let curves = drawing
            .all_commands()
            .filter(|c| matches!(c, Command::CurveTo { .. }))
            .count();
        assert_eq!(curves, 4);
    }

    #[test]
    fn missing_images_are_skipped() {
        let drawing = render(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><image href="nowhere.png" width="20" height="20"/><rect width="1" height="1"/></svg>"#,
        );
        assert!(!drawing.commands.iter().any(|c| matches!(c, Command::DrawImage { .. })));
        assert!(drawing.commands.iter().any(|c| matches!(c, Command::Rectangle { .. })));
    }
}
