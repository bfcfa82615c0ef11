//! Lie-group primitives for the curved elements of a filter state.
//!
//! Curved elements are handled through their tangent space. With the right
//! convention used throughout the crate:
//!
//! ```text
//! X ⊞ φ = X · Exp(φ)
//! Y ⊟ X = Log(X⁻¹ · Y)
//! ```
//!
//! so a perturbation always lives in the tangent space at the element it is
//! applied to. Flat elements (scalars, vectors) need none of this and are
//! handled directly by [`crate::state::Element`].
//!
//! Group operations take optional output Jacobians, filled only when the
//! caller asks for them.

use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use std::fmt::Debug;
use thiserror::Error;

pub mod so3;

pub use so3::{SO3, SO3Tangent};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Tangent coordinates of the wrong length
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },
}

pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// A matrix Lie group used as a state element.
pub trait LieGroup: Clone + Debug + PartialEq {
    type TangentVector: Tangent<Self>;

    /// Square matrix of size `DOF`
    type JacobianMatrix: Clone + Debug + PartialEq;

    /// Tangent space dimension
    const DOF: usize;

    fn identity() -> Self;

    /// `X⁻¹`, with `∂X⁻¹/∂X`
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// `X · Y`, with `∂(X·Y)/∂X` and `∂(X·Y)/∂Y`
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Tangent coordinates of the element
    fn log(&self) -> Self::TangentVector;

    /// `X ⊞ φ`, with `∂/∂X` and `∂/∂φ`
    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// `self ⊟ other`, with `∂/∂self` and `∂/∂other`
    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector;

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

/// Tangent-space vector of a [`LieGroup`].
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    /// `Exp(φ)`, with `∂Exp(φ)/∂φ = Jr(φ)`
    fn exp(&self, jacobian: Option<&mut G::JacobianMatrix>) -> G;

    /// `Exp(φ + δ) ≈ Exp(φ) · Exp(Jr(φ) δ)`
    fn right_jacobian(&self) -> G::JacobianMatrix;

    /// `Exp(φ + δ) ≈ Exp(Jl(φ) δ) · Exp(φ)`
    fn left_jacobian(&self) -> G::JacobianMatrix;

    fn right_jacobian_inv(&self) -> G::JacobianMatrix;

    fn left_jacobian_inv(&self) -> G::JacobianMatrix;

    fn zero() -> Self;

    fn from_slice(coords: &[f64]) -> ManifoldResult<Self>;
}

/// Cross-product matrix: `skew(a) * b == a × b`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
