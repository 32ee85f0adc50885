/// Linear premultiplied RGBA color.
///
/// Invariant: `r`, `g`, `b` never exceed `a`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::from_premul(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::from_premul(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::from_premul(0.0, 0.0, 0.0, 1.0);

    /// Tint used for autotile shadow quadrants (half-transparent black).
    pub const SHADOW: Color = Color::from_premul(0.0, 0.0, 0.0, 0.5);

    #[inline]
    pub const fn from_premul(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a premultiplied color from straight sRGB bytes.
    #[inline]
    pub fn from_srgb_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_straight(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Creates a premultiplied color from straight alpha components.
    #[inline]
    pub fn from_straight(r: f32, g: f32, b: f32, a: f32) -> Self {
        let a = a.clamp(0.0, 1.0);
        Self {
            r: r.clamp(0.0, 1.0) * a,
            g: g.clamp(0.0, 1.0) * a,
            b: b.clamp(0.0, 1.0) * a,
            a,
        }
    }

    /// Scales all channels by `alpha`, keeping premultiplication intact.
    #[inline]
    pub fn with_alpha_factor(self, alpha: f32) -> Self {
        let k = alpha.clamp(0.0, 1.0);
        Self::from_premul(self.r * k, self.g * k, self.b * k, self.a * k)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Packs into straight-alpha RGBA8, the layout of texture uploads.
    pub fn to_rgba8(self) -> [u8; 4] {
        let (r, g, b) = if self.a <= 0.0 {
            (0.0, 0.0, 0.0)
        } else {
            (self.r / self.a, self.g / self.a, self.b / self.a)
        };
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(r), q(g), q(b), q(self.a)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_input_is_premultiplied() {
        let c = Color::from_straight(1.0, 0.5, 0.0, 0.5);
        assert_eq!(c, Color::from_premul(0.5, 0.25, 0.0, 0.5));
    }

    #[test]
    fn rgba8_round_trips_straight_channels() {
        let c = Color::from_srgb_u8(255, 128, 0, 255);
        assert_eq!(c.to_rgba8(), [255, 128, 0, 255]);
    }

    #[test]
    fn alpha_factor_keeps_premultiplication() {
        let c = Color::WHITE.with_alpha_factor(0.25);
        assert!(c.r <= c.a && c.g <= c.a && c.b <= c.a);
        assert_eq!(c.a, 0.25);
    }
}
