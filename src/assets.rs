use base64::Engine;
use url::Url;

use crate::error::SvgError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Css,
    Font,
    Image,
    Svg,
    Other,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Css => "css",
            AssetKind::Font => "font",
            AssetKind::Image => "image",
            AssetKind::Svg => "svg",
            AssetKind::Other => "other",
        }
    }

    /// Guesses the kind from a media type such as `image/png` or `text/css`.
    pub fn from_media_type(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.starts_with("image/svg") {
            AssetKind::Svg
        } else if raw.starts_with("image/") {
            AssetKind::Image
        } else if raw == "text/css" {
            AssetKind::Css
        } else if raw.starts_with("font/") {
            AssetKind::Font
        } else {
            AssetKind::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
    pub source: Option<String>,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: AssetKind, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Resolves resource URLs (external `use` targets, images, `@import`) to bytes.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SvgError>;
}

/// In-memory assets addressed by name or source URL. `data:` URIs are always
/// decoded; local files are read only when `allow_filesystem` is set.
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    pub assets: Vec<Asset>,
    pub allow_filesystem: bool,
}

impl AssetBundle {
    pub fn add(&mut self, asset: Asset) {
        self.assets.push(asset);
    }

    pub fn find(&self, url: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.name == url || asset.source.as_deref() == Some(url))
    }

    pub fn css_text(&self) -> String {
        self.assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Css)
            .map(|asset| String::from_utf8_lossy(&asset.data).into_owned())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Fetcher for AssetBundle {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SvgError> {
        if url.starts_with("data:") {
            return decode_data_uri(url)
                .map(|(_, bytes)| bytes)
                .ok_or_else(|| SvgError::fetch(truncate(url), "malformed data uri"));
        }
        if let Some(asset) = self.find(url) {
            return Ok(asset.data.clone());
        }
        if self.allow_filesystem {
            let path = match Url::parse(url) {
                Ok(parsed) if parsed.scheme() == "file" => parsed
                    .to_file_path()
                    .map_err(|_| SvgError::fetch(url, "not a local file path"))?,
                Ok(_) => return Err(SvgError::fetch(url, "no asset registered")),
                Err(_) => std::path::PathBuf::from(url),
            };
            return std::fs::read(&path).map_err(|err| SvgError::fetch(url, err.to_string()));
        }
        Err(SvgError::fetch(url, "no asset registered"))
    }
}

/// Splits a `data:` URI into its media type and decoded payload.
pub fn decode_data_uri(source: &str) -> Option<(String, Vec<u8>)> {
    let rest = source.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let media_type = header
        .split(';')
        .next()
        .filter(|value| !value.is_empty())
        .unwrap_or("text/plain")
        .to_string();
    if header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        let compact: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .ok()?;
        return Some((media_type, bytes));
    }
    Some((media_type, percent_decode(payload)))
}

fn percent_decode(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[idx + 1..idx + 3]).ok();
            if let Some(value) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                out.push(value);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    out
}

/// Joins `href` onto `base`. Absolute and `data:` references pass through.
pub fn resolve_url(base: Option<&str>, href: &str) -> String {
    if href.starts_with("data:") {
        return href.to_string();
    }
    if let Ok(absolute) = Url::parse(href) {
        return absolute.to_string();
    }
    base.and_then(|base| Url::parse(base).ok())
        .and_then(|base| base.join(href).ok())
        .map(|joined| joined.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Splits `a.svg#id` into the document part and the fragment.
pub fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((document, fragment)) => (document, Some(fragment).filter(|f| !f.is_empty())),
        None => (url, None),
    }
}

fn truncate(url: &str) -> String {
    url.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uris_decode_base64_and_percent_payloads() {
        let (media, bytes) = decode_data_uri("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(media, "text/plain");
        assert_eq!(bytes, b"hello");
        let (media, bytes) = decode_data_uri("data:image/svg+xml,%3Csvg%2F%3E").unwrap();
        assert_eq!(media, "image/svg+xml");
        assert_eq!(bytes, b"<svg/>");
        assert!(decode_data_uri("data:nocomma").is_none());
    }

    #[test]
    fn bundle_fetches_by_name_or_source() {
        let mut bundle = AssetBundle::default();
        bundle.add(Asset::new("logo", AssetKind::Image, vec![1, 2]).with_source("https://x.test/logo.png"));
        assert_eq!(bundle.fetch("logo").unwrap(), vec![1, 2]);
        assert_eq!(bundle.fetch("https://x.test/logo.png").unwrap(), vec![1, 2]);
        assert!(matches!(bundle.fetch("missing.png"), Err(SvgError::Fetch { .. })));
    }

    #[test]
    fn relative_references_join_onto_base() {
        assert_eq!(
            resolve_url(Some("https://x.test/img/a.svg"), "b.svg#icon"),
            "https://x.test/img/b.svg#icon"
        );
        assert_eq!(resolve_url(None, "b.svg"), "b.svg");
        assert_eq!(split_fragment("b.svg#icon"), ("b.svg", Some("icon")));
        assert_eq!(split_fragment("#"), ("", None));
    }
}
