use image::GenericImageView;

/// Intrinsic geometry of a decoded raster, plus the id the drawing stream uses to reference it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub ratio: Option<f32>,
    pub resource_id: String,
}

pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8], resource_id: &str) -> Option<DecodedImage>;
}

/// Decodes PNG and JPEG data with the `image` crate; sizes are in pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterImages;

impl ImageDecoder for RasterImages {
    fn decode(&self, bytes: &[u8], resource_id: &str) -> Option<DecodedImage> {
        let decoded = image::load_from_memory(bytes).ok()?;
        let (w, h) = decoded.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        Some(DecodedImage {
            width: Some(w as f32),
            height: Some(h as f32),
            ratio: Some(w as f32 / h as f32),
            resource_id: resource_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_intrinsic_size_and_ratio() {
        let decoded = RasterImages.decode(&png_bytes(4, 2), "img").unwrap();
        assert_eq!(decoded.width, Some(4.0));
        assert_eq!(decoded.height, Some(2.0));
        assert_eq!(decoded.ratio, Some(2.0));
        assert_eq!(decoded.resource_id, "img");
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(RasterImages.decode(b"not an image", "x").is_none());
    }
}
