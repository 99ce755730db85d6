mod assets;
mod canvas;
mod debug;
mod error;
mod font;
mod images;
pub mod svg;
mod types;

pub use assets::{Asset, AssetBundle, AssetKind, Fetcher, decode_data_uri, resolve_url};
pub use canvas::{
    Canvas, ColorSpace, Command, Drawing, GlyphRun, Group, ObjectId, PaintTarget, PatternTile,
    Resource, SoftMask,
};
use debug::DebugLogger;
pub use error::{ParseFault, SvgError};
pub use font::{FontRegistry, ShapedText, TextShaper, TextStyle};
pub use images::{DecodedImage, ImageDecoder, RasterImages};
use std::path::PathBuf;
use std::sync::Arc;
pub use svg::SvgDocument;
use svg::document::RenderContext;
pub use types::{
    BlendMode, Color, Matrix, Pt, Rgba, Shading, ShadingColorSpace, ShadingGeometry,
    ShadingSegment,
};

/// Settings that apply to every document a renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Font size of the root element, in user units (12pt).
    pub default_font_size: f32,
    pub font_family: String,
    /// Deepest element nesting followed, counting `use` and nested documents.
    pub max_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            default_font_size: 16.0,
            font_family: "sans-serif".to_string(),
            max_depth: 64,
        }
    }
}

/// Draws SVG documents onto a recording [`Canvas`].
pub struct SvgRenderer {
    options: RenderOptions,
    fetcher: Box<dyn Fetcher>,
    images: Box<dyn ImageDecoder>,
    shaper: Box<dyn TextShaper>,
    debug: Option<Arc<DebugLogger>>,
}

pub struct SvgRendererBuilder {
    options: RenderOptions,
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, String)>,
    asset_bundle: AssetBundle,
    fetcher: Option<Box<dyn Fetcher>>,
    images: Option<Box<dyn ImageDecoder>>,
    shaper: Option<Box<dyn TextShaper>>,
    debug_path: Option<PathBuf>,
}

impl SvgRenderer {
    pub fn builder() -> SvgRendererBuilder {
        SvgRendererBuilder::new()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Parses a document; `base_url` resolves relative references in it.
    pub fn parse(&self, svg: &[u8], base_url: Option<&str>) -> Result<SvgDocument, SvgError> {
        SvgDocument::parse(svg, base_url, self.fetcher.as_ref())
    }

    /// Draws `document` into a `width` x `height` box of `canvas`.
    pub fn draw(&self, document: &SvgDocument, canvas: &mut Canvas, width: f32, height: f32) {
        let context = RenderContext {
            fetcher: self.fetcher.as_ref(),
            images: self.images.as_ref(),
            shaper: self.shaper.as_ref(),
            options: &self.options,
            debug: self.debug.as_deref(),
        };
        document.draw(canvas, width, height, &context);
    }

    /// Parses `svg` and records it at `width` x `height`.
    pub fn render(
        &self,
        svg: &[u8],
        base_url: Option<&str>,
        width: f32,
        height: f32,
    ) -> Result<Drawing, SvgError> {
        let document = self.parse(svg, base_url)?;
        let mut canvas = Canvas::new();
        self.draw(&document, &mut canvas, width, height);
        let drawing = canvas.finish();
        self.emit_debug_summary(base_url.unwrap_or("<inline>"));
        Ok(drawing)
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }
}

impl Default for SvgRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SvgRendererBuilder {
    pub fn new() -> Self {
        Self {
            options: RenderOptions::default(),
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            asset_bundle: AssetBundle::default(),
            fetcher: None,
            images: None,
            shaper: None,
            debug_path: None,
        }
    }

    pub fn default_font_size(mut self, size: f32) -> Self {
        self.options.default_font_size = size;
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.options.font_family = family.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn register_font_bytes(mut self, data: Vec<u8>, name: impl Into<String>) -> Self {
        self.font_bytes.push((data, name.into()));
        self
    }

    // Assets are served to `use`, `image` and `@import` references; font
    // assets are registered with the default shaper.
    pub fn asset(mut self, asset: Asset) -> Self {
        self.asset_bundle.add(asset);
        self
    }

    pub fn assets(mut self, bundle: AssetBundle) -> Self {
        self.asset_bundle.assets.extend(bundle.assets);
        self.asset_bundle.allow_filesystem |= bundle.allow_filesystem;
        self
    }

    pub fn allow_filesystem(mut self, enabled: bool) -> Self {
        self.asset_bundle.allow_filesystem = enabled;
        self
    }

    /// Replaces the asset bundle as the source of external resources.
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn image_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.images = Some(Box::new(decoder));
        self
    }

    /// Replaces the font registry; registered fonts are then ignored.
    pub fn text_shaper(mut self, shaper: impl TextShaper + 'static) -> Self {
        self.shaper = Some(Box::new(shaper));
        self
    }

    // Enable debug logging to a JSONL file for node and reference inspection.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SvgRenderer, SvgError> {
        let font_size = self.options.default_font_size;
        if !font_size.is_finite() || font_size <= 0.0 {
            return Err(SvgError::InvalidConfiguration(format!(
                "default_font_size must be positive, got {font_size}"
            )));
        }
        if self.options.max_depth == 0 {
            return Err(SvgError::InvalidConfiguration(
                "max_depth must be at least 1".to_string(),
            ));
        }

        let shaper: Box<dyn TextShaper> = match self.shaper {
            Some(shaper) => shaper,
            None => {
                let mut registry = FontRegistry::new();
                for dir in &self.font_dirs {
                    registry.register_dir(dir);
                }
                for file in &self.font_files {
                    registry.register_file(file)?;
                }
                for (data, name) in self.font_bytes {
                    registry.register_bytes(data, Some(&name))?;
                }
                for asset in self
                    .asset_bundle
                    .assets
                    .iter()
                    .filter(|asset| asset.kind == AssetKind::Font)
                {
                    registry.register_bytes(asset.data.clone(), Some(&asset.name))?;
                }
                Box::new(registry)
            }
        };
        let fetcher: Box<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(self.asset_bundle),
        };
        let images: Box<dyn ImageDecoder> = self.images.unwrap_or_else(|| Box::new(RasterImages));
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        Ok(SvgRenderer {
            options: self.options,
            fetcher,
            images,
            shaper,
            debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="4" height="4" fill="red"/></svg>"#;

    #[test]
    fn builder_rejects_invalid_options() {
        assert!(matches!(
            SvgRenderer::builder().default_font_size(0.0).build(),
            Err(SvgError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SvgRenderer::builder().max_depth(0).build(),
            Err(SvgError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SvgRenderer::builder()
                .register_font_bytes(b"not a font".to_vec(), "Broken")
                .build(),
            Err(SvgError::Font(_))
        ));
    }

    #[test]
    fn render_records_commands() {
        let renderer = SvgRenderer::builder().build().unwrap();
        let drawing = renderer.render(SQUARE.as_bytes(), None, 10.0, 10.0).unwrap();
        assert!(drawing.commands.contains(&Command::SetFillColor(Color::rgb(1.0, 0.0, 0.0))));
        assert!(drawing.commands.contains(&Command::Fill));
        assert_eq!(drawing.commands.first(), Some(&Command::SaveState));
        assert_eq!(drawing.commands.last(), Some(&Command::RestoreState));
    }

    #[test]
    fn render_reports_document_errors() {
        let renderer = SvgRenderer::builder().build().unwrap();
        assert!(matches!(
            renderer.render(b"<svg", None, 10.0, 10.0),
            Err(SvgError::Xml(_))
        ));
        assert!(matches!(
            renderer.render(&[0xff, 0xfe, 0x00], None, 10.0, 10.0),
            Err(SvgError::Encoding(_))
        ));
    }

    #[test]
    fn assets_are_resolved_against_the_base_url() {
        let shape = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect id="r" width="2" height="2"/></svg>"#;
        let renderer = SvgRenderer::builder()
            .asset(
                Asset::new("shape", AssetKind::Svg, shape.as_bytes().to_vec())
                    .with_source("https://example.test/art/shape.svg"),
            )
            .build()
            .unwrap();
        let drawing = renderer
            .render(
                br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><use href="shape.svg#r"/></svg>"##,
                Some("https://example.test/art/page.svg"),
                10.0,
                10.0,
            )
            .unwrap();
        assert!(drawing.commands.iter().any(|c| matches!(c, Command::Rectangle { .. })));
    }

    #[test]
    fn debug_log_writes_a_summary() {
        let path = std::env::temp_dir().join(format!("fullbleed-svg-debug-{}.jsonl", std::process::id()));
        let renderer = SvgRenderer::builder().debug_log(&path).build().unwrap();
        renderer
            .render(
                br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="1" height="1" fill="url(#missing)"/></svg>"##,
                None,
                10.0,
                10.0,
            )
            .unwrap();
        let log = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(log.contains("\"type\":\"svg.unresolved\""));
        assert!(log.contains("\"type\":\"svg.summary\""));
        assert!(log.contains("\"svg.node.rect\":1"));
    }
}
