//! Tilt compensation.
//!
//! Each frame is rotated in 3D by the difference between its capture orientation and the average
//! orientation of the capture, then projected back onto the image plane with a fixed eye distance.
//! The result is a planar homography, so the whole per-frame warp (fill placement included)
//! collapses into one 3x3 matrix and a single resampling pass.

use kurbo::{Affine, Point};
use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::capture::frame::Orientation;
use crate::foundation::core::Canvas;

/// Perspective term of the projection (`m34`): `-1 / eye distance` with the eye 500 px away.
pub const PERSPECTIVE_DEPTH: f64 = -1.0 / 500.0;

const W_EPSILON: f64 = 1e-9;

/// Rotation axis of the compensation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// About the image x axis.
    Roll,
    /// About the image y axis.
    Pitch,
    /// About the viewing (z) axis.
    Yaw,
}

impl Axis {
    /// Axes in application order.
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    fn rotation(self, rad: f64) -> Rotation3<f64> {
        let axis = match self {
            Axis::Roll => Vector3::x_axis(),
            Axis::Pitch => Vector3::y_axis(),
            Axis::Yaw => Vector3::z_axis(),
        };
        Rotation3::from_axis_angle(&axis, rad)
    }
}

/// How the three per-axis rotations combine.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AxisComposition {
    /// Each axis gets its own projected transform, built from a fresh base, and the three are
    /// applied one after another (roll, pitch, yaw). Later axes warp the already-projected image.
    #[default]
    PerAxisReset,
    /// The three rotations are composed in 3D first and projected once.
    Compound,
}

/// Planar projective map, column-vector convention: `[x', y', w]^T = M [x, y, 1]^T`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    /// The identity map.
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Wrap a 3x3 matrix.
    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self { m }
    }

    /// Build from row-major coefficients.
    pub fn from_rows(r: [[f64; 3]; 3]) -> Self {
        Self::from_matrix(Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        ))
    }

    /// Underlying matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Row-major coefficients.
    pub fn rows(&self) -> [[f64; 3]; 3] {
        let m = &self.m;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Lift a 2D affine transform.
    pub fn from_affine(a: Affine) -> Self {
        let [a, b, c, d, e, f] = a.as_coeffs();
        Self::from_matrix(Matrix3::new(a, c, e, b, d, f, 0.0, 0.0, 1.0))
    }

    /// Translation by `(dx, dy)`.
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self::from_matrix(Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0))
    }

    /// `self` followed by `next`.
    pub fn then(self, next: Homography) -> Homography {
        Homography::from_matrix(next.m * self.m)
    }

    /// Map a point. `None` when it lands at or behind the eye plane.
    pub fn apply(&self, p: Point) -> Option<Point> {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        if v.z <= W_EPSILON {
            return None;
        }
        Some(Point::new(v.x / v.z, v.y / v.z))
    }

    /// Inverse map, or `None` when singular.
    pub fn inverse(&self) -> Option<Homography> {
        if !self.m.iter().all(|v| v.is_finite()) || self.m.determinant().abs() < 1e-12 {
            return None;
        }
        self.m.try_inverse().map(Homography::from_matrix)
    }

    /// Return `true` when every coefficient is within `eps` of the identity.
    pub fn is_identity(&self, eps: f64) -> bool {
        (self.m - Matrix3::identity()).amax() <= eps
    }
}

/// Projected rotation of `delta_degrees` about `axis`, centered on the canvas.
pub fn axis_homography(axis: Axis, delta_degrees: f64, canvas: Canvas) -> Homography {
    about_center(project(&axis.rotation(delta_degrees.to_radians())), canvas)
}

/// Canvas-space compensation for a frame captured at `orientation` against `reference`.
pub fn tilt_homography(
    orientation: Orientation,
    reference: Orientation,
    canvas: Canvas,
    composition: AxisComposition,
) -> Homography {
    let delta = orientation.delta_from(reference);
    match composition {
        AxisComposition::PerAxisReset => Axis::ALL
            .iter()
            .fold(Homography::identity(), |acc, &axis| {
                acc.then(axis_homography(axis, delta.axis(axis), canvas))
            }),
        AxisComposition::Compound => {
            let r = Axis::ALL.iter().fold(Rotation3::identity(), |acc, &axis| {
                axis.rotation(delta.axis(axis).to_radians()) * acc
            });
            about_center(project(&r), canvas)
        }
    }
}

// Points on the image plane have z = 0, so only the first two columns of the rotation matter; the
// rotated depth feeds the perspective divide through `PERSPECTIVE_DEPTH`.
fn project(r: &Rotation3<f64>) -> Homography {
    let r = r.matrix();
    Homography::from_matrix(Matrix3::new(
        r[(0, 0)],
        r[(0, 1)],
        0.0,
        r[(1, 0)],
        r[(1, 1)],
        0.0,
        PERSPECTIVE_DEPTH * r[(2, 0)],
        PERSPECTIVE_DEPTH * r[(2, 1)],
        1.0,
    ))
}

fn about_center(h: Homography, canvas: Canvas) -> Homography {
    let c = canvas.center();
    Homography::translate(-c.x, -c.y)
        .then(h)
        .then(Homography::translate(c.x, c.y))
}

#[cfg(test)]
#[path = "../../tests/unit/transform/perspective.rs"]
mod tests;
