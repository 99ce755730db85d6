use fixed::types::I32F32;

/// Canvas coordinate, quantized to milli-units so recorded streams are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let milli = milli as i128;
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli_i64(-self.to_milli_i64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(level: f32) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
        }
    }
}

/// Straight (non-premultiplied) RGBA, components in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(self) -> Color {
        Color::rgb(self.r, self.g, self.b)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// 2D affine transform. Points map as `(a*x + c*y + e, b*x + d*y + f)`.
///
/// `m1 * m2` is the transform that applies `m1` first, then `m2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians (clockwise on a y-down surface).
    pub fn rotate(angle: f32) -> Self {
        let s = libm::sinf(angle);
        let c = libm::cosf(angle);
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    pub fn determinant(self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Self {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    pub fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn is_identity(self) -> bool {
        self == Self::identity()
    }

    pub fn values(self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

impl std::ops::Mul for Matrix {
    type Output = Matrix;

    fn mul(self, next: Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Maps an SVG/CSS blend keyword (`color-dodge`, `multiply`, ...). Unknown keywords are `Normal`.
    pub fn from_keyword(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            "color-dodge" => BlendMode::ColorDodge,
            "color-burn" => BlendMode::ColorBurn,
            "hard-light" => BlendMode::HardLight,
            "soft-light" => BlendMode::SoftLight,
            "difference" => BlendMode::Difference,
            "exclusion" => BlendMode::Exclusion,
            "hue" => BlendMode::Hue,
            "saturation" => BlendMode::Saturation,
            "color" => BlendMode::Color,
            "luminosity" => BlendMode::Luminosity,
            _ => BlendMode::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingColorSpace {
    Rgb,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadingGeometry {
    // Axial (linear) shading: (x0,y0) -> (x1,y1).
    Axial {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    },
    // Radial shading: (x0,y0,r0) -> (x1,y1,r1).
    Radial {
        x0: f32,
        y0: f32,
        r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    },
}

/// One interpolation piece of a stitched shading function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingSegment {
    pub c0: Color,
    pub c1: Color,
    pub exponent: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shading {
    pub geometry: ShadingGeometry,
    pub color_space: ShadingColorSpace,
    pub domain: (f32, f32),
    // Inner stitching bounds, `segments.len() - 1` entries.
    pub bounds: Vec<f32>,
    pub segments: Vec<ShadingSegment>,
    // Extend before/after the domain (pad spread).
    pub extend: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn matrix_product_applies_left_operand_first() {
        let m = Matrix::scale(2.0, 2.0) * Matrix::translate(10.0, 0.0);
        assert!(close(m.apply(1.0, 1.0), (12.0, 2.0)));
        let m = Matrix::translate(10.0, 0.0) * Matrix::scale(2.0, 2.0);
        assert!(close(m.apply(1.0, 1.0), (22.0, 2.0)));
    }

    #[test]
    fn matrix_inverse_round_trips_points() {
        let m = Matrix::rotate(0.7) * Matrix::translate(3.0, -4.0) * Matrix::scale(2.0, 0.5);
        let inv = m.invert().expect("invertible");
        let (x, y) = m.apply(5.0, 7.0);
        assert!(close(inv.apply(x, y), (5.0, 7.0)));
        assert!(Matrix::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn pt_quantizes_to_milli_units() {
        assert_eq!(Pt::from_f32(1.23456).to_milli_i64(), 1235);
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
        assert_eq!((-Pt::from_f32(2.0)).to_milli_i64(), -2000);
    }

    #[test]
    fn blend_keywords_map_to_modes() {
        assert_eq!(BlendMode::from_keyword("color-dodge"), BlendMode::ColorDodge);
        assert_eq!(BlendMode::from_keyword("bogus"), BlendMode::Normal);
    }
}
