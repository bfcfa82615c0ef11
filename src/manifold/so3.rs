//! SO(3), the group of 3D rotations.
//!
//! Elements are stored as unit quaternions; tangent vectors are rotation
//! vectors (axis times angle). Attitude residuals differentiate through
//! [`LieGroup::right_minus`] and the left/right Jacobians below:
//!
//! ```text
//! Jl(θ)   = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
//! Jl⁻¹(θ) = I - ½[θ]ₓ + (1/θ² - (1 + cos θ)/(2θ sin θ)) [θ]ₓ²
//! Jr(θ)   = Jl(θ)ᵀ = Jl(-θ)
//! ```

use crate::manifold::{skew, LieGroup, ManifoldError, ManifoldResult, Tangent};
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use rand::Rng;
use std::fmt;

/// Below this squared angle the series expansions are used
const SMALL_ANGLE_SQUARED: f64 = f64::EPSILON;

#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

/// Rotation vector `θ·u`.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl SO3 {
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    pub fn from_scaled_axis(rotation_vector: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(rotation_vector))
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Angle of the relative rotation, insensitive to the quaternion sign.
    pub fn angle_to(&self, other: &SO3) -> f64 {
        self.quaternion.angle_to(&other.quaternion)
    }
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.log().data;
        write!(f, "SO3[{:.4}, {:.4}, {:.4}]", v.x, v.y, v.z)
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;

    const DOF: usize = 3;

    fn identity() -> Self {
        SO3::new(UnitQuaternion::identity())
    }

    fn inverse(&self, jacobian: Option<&mut Matrix3<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.rotation_matrix();
        }
        SO3::new(self.quaternion.inverse())
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_other: Option<&mut Matrix3<f64>>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = other.rotation_matrix().transpose();
        }
        if let Some(jac) = jacobian_other {
            *jac = Matrix3::identity();
        }
        SO3::new(self.quaternion * other.quaternion)
    }

    /// Rotation vector with angle in `[0, π]`.
    ///
    /// The quaternion is first moved to the `w >= 0` hemisphere; the angle is
    /// then recovered with `atan2`, which stays accurate for small rotations.
    fn log(&self) -> SO3Tangent {
        let q = self.quaternion.quaternion();
        let (w, v) = if q.w < 0.0 {
            (-q.w, -q.imag())
        } else {
            (q.w, q.imag())
        };
        let sin_half = v.norm();
        let scale = if sin_half > f64::EPSILON {
            2.0 * sin_half.atan2(w) / sin_half
        } else {
            2.0 / w
        };
        SO3Tangent::new(v * scale)
    }

    /// `∂/∂X = Exp(φ)ᵀ`, `∂/∂φ = Jr(φ)`
    fn right_plus(
        &self,
        tangent: &SO3Tangent,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_tangent: Option<&mut Matrix3<f64>>,
    ) -> Self {
        let step = tangent.exp(jacobian_tangent);
        if let Some(jac) = jacobian_self {
            *jac = step.rotation_matrix().transpose();
        }
        self.compose(&step, None, None)
    }

    /// `∂/∂self = Jr⁻¹(θ)`, `∂/∂other = -Jl⁻¹(θ)` with `θ` the result
    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_other: Option<&mut Matrix3<f64>>,
    ) -> SO3Tangent {
        let theta = other.inverse(None).compose(self, None, None).log();
        if let Some(jac) = jacobian_self {
            *jac = theta.right_jacobian_inv();
        }
        if let Some(jac) = jacobian_other {
            *jac = -theta.left_jacobian_inv();
        }
        theta
    }

    /// Rotation vector components uniform in `[-1, 1)`, so the angle stays
    /// below √3 and well away from π.
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let v = Vector3::from_fn(|_, _| rng.random_range(-1.0..1.0));
        SO3::from_scaled_axis(v)
    }
}

impl SO3Tangent {
    pub fn new(rotation_vector: Vector3<f64>) -> Self {
        SO3Tangent {
            data: rotation_vector,
        }
    }

    pub fn axis_angle(&self) -> Vector3<f64> {
        self.data
    }

    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    /// `[θ]ₓ`
    pub fn hat(&self) -> Matrix3<f64> {
        skew(&self.data)
    }
}

impl fmt::Display for SO3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "so3[{:.4}, {:.4}, {:.4}]", self.data.x, self.data.y, self.data.z)
    }
}

impl Tangent<SO3> for SO3Tangent {
    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SO3 {
        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }
        if self.data.norm_squared() > SMALL_ANGLE_SQUARED {
            SO3::from_scaled_axis(self.data)
        } else {
            let half = self.data * 0.5;
            SO3::new(UnitQuaternion::from_quaternion(Quaternion::new(
                1.0, half.x, half.y, half.z,
            )))
        }
    }

    fn right_jacobian(&self) -> Matrix3<f64> {
        self.left_jacobian().transpose()
    }

    fn left_jacobian(&self) -> Matrix3<f64> {
        let k = self.hat();
        let theta2 = self.data.norm_squared();
        if theta2 <= SMALL_ANGLE_SQUARED {
            return Matrix3::identity() + 0.5 * k;
        }
        let theta = theta2.sqrt();
        let (s, c) = theta.sin_cos();
        Matrix3::identity() + (1.0 - c) / theta2 * k + (theta - s) / (theta2 * theta) * k * k
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        self.left_jacobian_inv().transpose()
    }

    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let k = self.hat();
        let theta2 = self.data.norm_squared();
        if theta2 <= SMALL_ANGLE_SQUARED {
            return Matrix3::identity() - 0.5 * k;
        }
        let theta = theta2.sqrt();
        let (s, c) = theta.sin_cos();
        let coeff = 1.0 / theta2 - (1.0 + c) / (2.0 * theta * s);
        Matrix3::identity() - 0.5 * k + coeff * k * k
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn from_slice(coords: &[f64]) -> ManifoldResult<Self> {
        if coords.len() != SO3::DOF {
            return Err(ManifoldError::InvalidTangentDimension {
                expected: SO3::DOF,
                actual: coords.len(),
            });
        }
        Ok(SO3Tangent::new(Vector3::from_column_slice(coords)))
    }
}
