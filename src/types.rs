use nalgebra::{DMatrix, DVector, Vector3, Vector4};

pub type VecD = DVector<f64>;
pub type MatD = DMatrix<f64>;

/// A cartesian position or direction.
pub type Vec3 = Vector3<f64>;

/// A homogeneous control point `(x, y, z, w)`. The kernel is non-rational, so `w = 1`.
pub type ControlPoint = Vector4<f64>;

/// Evaluations at a repeated knot that differ by more than this are reported as ambiguous.
pub const EVALUATION_TOLERANCE: f64 = 1e-6;

/// Knot values closer than this are considered equal when unifying knot vectors.
pub const KNOT_TOLERANCE: f64 = 1e-10;

pub fn homogeneous(p: &Vec3) -> ControlPoint {
    ControlPoint::new(p.x, p.y, p.z, 1.0)
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = *it.next()?;
        Some(it.fold(BoundingBox { min: first, max: first }, |mut b, p| {
            b.min = b.min.inf(p);
            b.max = b.max.sup(p);
            b
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }

    pub fn contains(&self, p: &Vec3) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }
}
