pub mod bounding_box;
pub mod css;
pub(crate) mod defs;
pub(crate) mod document;
pub mod geometry;
pub(crate) mod gradient;
pub(crate) mod images;
pub(crate) mod markers;
pub mod node;
pub mod paint;
pub(crate) mod path;
pub(crate) mod shapes;
pub(crate) mod text;

pub use document::SvgDocument;
