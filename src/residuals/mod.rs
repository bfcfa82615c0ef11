//! Reference residuals
//!
//! Generic, sensor-agnostic residual models built on
//! [`crate::core::ResidualModel`]:
//! - [`Prior`]: unary absolute measurement of a full state
//! - [`RandomWalk`]: binary random-walk transition over a time step
//! - [`ConstantRate`]: binary attitude propagation with a measured body rate
//!
//! Each comes with a `*Residual` alias for the wrapped
//! [`crate::core::BinaryResidual`] and a `*_residual` constructor.

pub mod constant_rate;
pub mod prior;
pub mod random_walk;

pub use constant_rate::{constant_rate_residual, ConstantRate, ConstantRateResidual, RATE};
pub use prior::{prior_residual, Prior, PriorResidual, PRIOR};
pub use random_walk::{random_walk_residual, RandomWalk, RandomWalkResidual, RANDOM_WALK};

use crate::error::{GifError, GifResult};
use crate::manifold::LieGroup;
use crate::state::{Element, StateDefinition};
use nalgebra::{DMatrix, Matrix3};
use std::sync::Arc;

/// Definition with one vector element per element of `definition`, of the
/// same name and tangent dimension.
pub(crate) fn tangent_definition(definition: &StateDefinition) -> GifResult<Arc<StateDefinition>> {
    definition
        .elements()
        .iter()
        .fold(StateDefinition::builder(), |builder, e| {
            builder.vector(e.name.clone(), e.kind.dim())
        })
        .build()
}

/// Jacobians of `a ⊟ b` with respect to `a` and to `b`.
pub(crate) fn minus_jacobians(a: &Element, b: &Element) -> GifResult<(DMatrix<f64>, DMatrix<f64>)> {
    match (a, b) {
        (Element::Rotation(ra), Element::Rotation(rb)) => {
            let (mut jac_a, mut jac_b) = (Matrix3::zeros(), Matrix3::zeros());
            ra.right_minus(rb, Some(&mut jac_a), Some(&mut jac_b));
            Ok((
                DMatrix::from_column_slice(3, 3, jac_a.as_slice()),
                DMatrix::from_column_slice(3, 3, jac_b.as_slice()),
            ))
        }
        _ if a.kind() == b.kind() => {
            let n = a.dim();
            Ok((DMatrix::identity(n, n), -DMatrix::identity(n, n)))
        }
        _ => Err(GifError::InvalidElement(format!(
            "cannot differentiate {} ⊟ {}",
            a.kind(),
            b.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::SO3;
    use nalgebra::{DVector, Vector3};

    #[test]
    fn test_tangent_definition() -> GifResult<()> {
        let def = StateDefinition::builder()
            .rotation("attitude")
            .scalar("bias")
            .vector("velocity", 3)
            .build()?;
        let tangent = tangent_definition(&def)?;
        assert_eq!(
            tangent.to_string(),
            "[attitude: vector3, bias: vector1, velocity: vector3]"
        );
        assert_eq!(tangent.dim(), def.dim());
        Ok(())
    }

    #[test]
    fn test_minus_jacobians() -> GifResult<()> {
        let a = Element::Vector(DVector::zeros(2));
        let (ja, jb) = minus_jacobians(&a, &a)?;
        assert_eq!(ja, DMatrix::identity(2, 2));
        assert_eq!(jb, -DMatrix::identity(2, 2));

        let r = Element::Rotation(SO3::identity());
        let (ja, jb) = minus_jacobians(&r, &r)?;
        assert!((ja - DMatrix::identity(3, 3)).amax() < 1e-12);
        assert!((jb + DMatrix::identity(3, 3)).amax() < 1e-12);

        let q = Element::Rotation(SO3::from_scaled_axis(Vector3::new(0.1, 0.2, 0.3)));
        assert!(minus_jacobians(&q, &a).is_err());
        assert!(minus_jacobians(&Element::Scalar(1.0), &Element::Scalar(0.0)).is_ok());
        Ok(())
    }
}
