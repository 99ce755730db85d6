use thiserror::Error;

/// Document-level failures. Anything that goes wrong while drawing a single
/// node degrades locally instead of surfacing here.
#[derive(Debug, Error)]
pub enum SvgError {
    #[error("xml parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("svg data is not valid utf-8")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("document has no <svg> root element")]
    MissingRoot,
    #[error("cannot fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("invalid font data: {0}")]
    Font(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SvgError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        SvgError::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Local coordinate fault: stops the current shape, never the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseFault {
    #[error("expected a coordinate pair")]
    MissingCoordinate,
    #[error("expected a number")]
    InvalidNumber,
    #[error("arc flag must be 0 or 1")]
    InvalidFlag,
}
