use crate::error::SvgError;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Font selection for one text run, taken from the cascaded SVG attributes.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle<'a> {
    pub font_family: &'a str,
    pub font_size: f32,
    pub font_weight: &'a str,
    pub font_style: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapedText {
    pub width: f32,
    pub height: f32,
    // Positive distances from the baseline, when the font reports them.
    pub ascent: Option<f32>,
    pub descent: Option<f32>,
    pub glyph_ids: Vec<u16>,
    pub font_name: String,
}

/// Measures and shapes text for the text positioner.
pub trait TextShaper {
    fn shape(&self, text: &str, style: &TextStyle<'_>) -> ShapedText;
}

#[derive(Debug, Default)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
}

#[derive(Debug)]
struct RegisteredFont {
    name: String,
    data: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dir(&mut self, path: impl AsRef<Path>) {
        let Ok(entries) = fs::read_dir(path.as_ref()) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                let _ = self.register_file(path);
            }
        }
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<Option<String>, SvgError> {
        let path = path.as_ref();
        let Some(ext) = path.extension().and_then(|v| v.to_str()) else {
            return Ok(None);
        };
        if !matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf") {
            return Ok(None);
        }
        let data = fs::read(path)?;
        let source = path.to_string_lossy();
        self.register_bytes(data, Some(&source)).map(Some)
    }

    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, SvgError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|_| SvgError::Font(format!("invalid font data for {source}")))?;
        let (name, aliases) = font_names(&face, Path::new(source));
        let units_per_em = face.units_per_em().max(1) as f32;
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;

        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            units_per_em,
            ascender,
            descender,
        });
        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        Ok(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// First registered face named in a CSS `font-family` list. Bold/italic
    /// variants registered under `<family> Bold` etc. win when requested.
    fn resolve(&self, style: &TextStyle<'_>) -> Option<&RegisteredFont> {
        let bold = matches!(style.font_weight.trim(), "bold" | "bolder" | "600" | "700" | "800" | "900");
        let italic = matches!(style.font_style.trim(), "italic" | "oblique");
        let suffix = match (bold, italic) {
            (true, true) => Some("bold italic"),
            (true, false) => Some("bold"),
            (false, true) => Some("italic"),
            (false, false) => None,
        };
        for family in style.font_family.split(',') {
            let family = normalize_name(family);
            if family.is_empty() {
                continue;
            }
            let variant = suffix.and_then(|suffix| self.lookup.get(&format!("{family} {suffix}")));
            if let Some(index) = variant.or_else(|| self.lookup.get(&family)) {
                return self.fonts.get(*index);
            }
        }
        None
    }
}

impl TextShaper for FontRegistry {
    fn shape(&self, text: &str, style: &TextStyle<'_>) -> ShapedText {
        let size = style.font_size;
        let fallback = || ShapedText {
            width: (size * 0.6).max(0.0) * text.chars().count() as f32,
            height: size,
            ascent: None,
            descent: None,
            glyph_ids: Vec::new(),
            font_name: style
                .font_family
                .split(',')
                .next()
                .map(normalize_name)
                .unwrap_or_default(),
        };
        let Some(font) = self.resolve(style) else {
            return fallback();
        };
        let Some(face) = HbFace::from_slice(&font.data, 0) else {
            return fallback();
        };
        let mut buffer = UnicodeBuffer::new();
        buffer.set_direction(detect_direction(text));
        buffer.push_str(text);
        let output = rustybuzz::shape(&face, &[], buffer);
        let scale = size / font.units_per_em;
        let width = output
            .glyph_positions()
            .iter()
            .map(|position| position.x_advance as f32 * scale)
            .sum();
        let glyph_ids = output
            .glyph_infos()
            .iter()
            .map(|info| info.glyph_id.min(u16::MAX as u32) as u16)
            .collect();
        ShapedText {
            width,
            height: (font.ascender - font.descender) * scale,
            ascent: Some(font.ascender * scale),
            descent: Some(-font.descender * scale),
            glyph_ids,
            font_name: font.name.clone(),
        }
    }
}

fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let code = ch as u32;
        let rtl = matches!(
            code,
            0x0590..=0x08FF
                | 0xFB1D..=0xFDFF
                | 0xFE70..=0xFEFF
                | 0x1EE00..=0x1EEFF
        );
        if rtl {
            return HbDirection::RightToLeft;
        }
    }
    HbDirection::LeftToRight
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = family
        .clone()
        .or_else(|| full.clone())
        .or_else(|| post.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    let aliases = [full, post, stem]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}
