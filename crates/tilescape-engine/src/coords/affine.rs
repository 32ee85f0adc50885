use super::{Rect, Vec2};

/// 2D affine matrix in column form:
///
/// ```text
/// | a  c  tx |
/// | b  d  ty |
/// | 0  0  1  |
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    #[inline]
    pub const fn translation(x: f32, y: f32) -> Self {
        Affine { tx: x, ty: y, ..Self::IDENTITY }
    }

    /// Builds a local matrix from decomposed transform parts.
    ///
    /// `pivot` is the local point that lands on `position`.
    pub fn from_parts(position: Vec2, scale: Vec2, rotation: f32, skew: Vec2, pivot: Vec2) -> Self {
        let a = (rotation + skew.y).cos() * scale.x;
        let b = (rotation + skew.y).sin() * scale.x;
        let c = -(rotation - skew.x).sin() * scale.y;
        let d = (rotation - skew.x).cos() * scale.y;

        Affine {
            a,
            b,
            c,
            d,
            tx: position.x - (pivot.x * a + pivot.y * c),
            ty: position.y - (pivot.x * b + pivot.y * d),
        }
    }

    /// Returns `self * local`: `local` is applied first.
    pub fn then(self, local: Affine) -> Affine {
        let p = self;
        Affine {
            a: local.a * p.a + local.b * p.c,
            b: local.a * p.b + local.b * p.d,
            c: local.c * p.a + local.d * p.c,
            d: local.c * p.b + local.d * p.d,
            tx: local.tx * p.a + local.ty * p.c + p.tx,
            ty: local.tx * p.b + local.ty * p.d + p.ty,
        }
    }

    #[inline]
    pub fn apply(self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Axis-aligned bounds of `rect` after transformation.
    pub fn transform_rect(self, rect: Rect) -> Rect {
        let min = rect.min();
        let max = rect.max();
        let corners = [
            self.apply(min),
            self.apply(Vec2::new(max.x, min.y)),
            self.apply(max),
            self.apply(Vec2::new(min.x, max.y)),
        ];
        let mut lo = corners[0];
        let mut hi = corners[0];
        for p in &corners[1..] {
            lo = lo.min(*p);
            hi = hi.max(*p);
        }
        Rect::from_min_max(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn pivot_lands_on_position() {
        let m = Affine::from_parts(
            Vec2::new(100.0, 50.0),
            Vec2::new(2.0, 3.0),
            0.7,
            Vec2::ZERO,
            Vec2::new(8.0, 4.0),
        );
        assert!(approx(m.apply(Vec2::new(8.0, 4.0)), Vec2::new(100.0, 50.0)));
    }

    #[test]
    fn then_applies_local_first() {
        let parent = Affine::translation(10.0, 0.0);
        let local = Affine::from_parts(Vec2::ZERO, Vec2::new(2.0, 2.0), 0.0, Vec2::ZERO, Vec2::ZERO);
        let world = parent.then(local);
        assert!(approx(world.apply(Vec2::new(1.0, 1.0)), Vec2::new(12.0, 2.0)));
    }

    #[test]
    fn transform_rect_of_quarter_turn() {
        let m = Affine::from_parts(
            Vec2::ZERO,
            Vec2::ONE,
            core::f32::consts::FRAC_PI_2,
            Vec2::ZERO,
            Vec2::ZERO,
        );
        let r = m.transform_rect(Rect::new(0.0, 0.0, 10.0, 4.0));
        assert!((r.origin.x + 4.0).abs() < 1e-4);
        assert!((r.size.x - 4.0).abs() < 1e-4);
        assert!((r.size.y - 10.0).abs() < 1e-4);
    }
}
