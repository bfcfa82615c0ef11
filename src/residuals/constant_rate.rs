//! Constant-rate attitude propagation.
//!
//! The attitude is propagated over `dt` with a measured body rate `ω`
//! corrupted by additive noise `n`:
//!
//! ```text
//! φ   = dt · (ω + n)
//! res = pos ⊟ (pre ⊞ φ)
//! ```
//!
//! With `θ = res`, the Jacobians are
//!
//! ```text
//! ∂res/∂pos = Jr⁻¹(θ)
//! ∂res/∂pre = -Jl⁻¹(θ) · Exp(φ)ᵀ
//! ∂res/∂n   = -Jl⁻¹(θ) · Jr(φ) · dt
//! ```
//!
//! The measured rate is constant over the interval, so a split hands the same
//! rate to both halves and a merge takes the time-weighted mean.

use crate::core::{
    BinaryResidual, Inputs, JacobianBlocks, MeasurementKind, ResidualDefinitions, ResidualFlags,
    ResidualModel,
};
use crate::error::GifResult;
use crate::manifold::{LieGroup, SO3Tangent, Tangent};
use crate::state::{State, StateDefinition};
use nalgebra::{DVector, Matrix3};
use std::sync::Arc;
use std::time::Duration;

pub const RATE: MeasurementKind = MeasurementKind::new("rate");

pub type ConstantRateResidual = BinaryResidual<ConstantRate>;

#[derive(Debug, Clone)]
pub struct ConstantRate {
    dt: f64,
}

/// Propagated attitude error and its Jacobians
struct Propagation {
    theta: SO3Tangent,
    /// ∂θ/∂pre
    d_pre: Matrix3<f64>,
    /// ∂θ/∂pos
    d_pos: Matrix3<f64>,
    /// ∂θ/∂φ
    d_phi: Matrix3<f64>,
}

impl ConstantRate {
    pub fn new(dt: Duration) -> Self {
        ConstantRate {
            dt: dt.as_secs_f64(),
        }
    }

    /// Time step in seconds
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn set_dt(&mut self, dt: Duration) {
        self.dt = dt.as_secs_f64();
    }

    fn propagate(&self, meas: &State, inputs: &Inputs<'_>) -> GifResult<Propagation> {
        let rate = meas.vector(0)? + inputs.noi.vector(0)?;
        let phi = SO3Tangent::from_slice((rate * self.dt).as_slice())?;

        let (mut pred_pre, mut pred_phi) = (Matrix3::zeros(), Matrix3::zeros());
        let predicted = inputs
            .pre
            .rotation(0)?
            .right_plus(&phi, Some(&mut pred_pre), Some(&mut pred_phi));

        let (mut d_pos, mut d_pred) = (Matrix3::zeros(), Matrix3::zeros());
        let theta = inputs
            .pos
            .rotation(0)?
            .right_minus(&predicted, Some(&mut d_pos), Some(&mut d_pred));

        Ok(Propagation {
            theta,
            d_pre: d_pred * pred_pre,
            d_pos,
            d_phi: d_pred * pred_phi,
        })
    }
}

/// Wrapped constant-rate propagation over `dt`.
pub fn constant_rate_residual(dt: Duration) -> GifResult<ConstantRateResidual> {
    BinaryResidual::new(ConstantRate::new(dt))
}

impl ResidualModel for ConstantRate {
    fn measurement_kind(&self) -> MeasurementKind {
        RATE
    }

    fn definitions(&self) -> GifResult<ResidualDefinitions> {
        let attitude = StateDefinition::builder().rotation("attitude").build()?;
        Ok(ResidualDefinitions {
            res: StateDefinition::builder().vector("attitude", 3).build()?,
            pre: Arc::clone(&attitude),
            pos: attitude,
            noi: StateDefinition::builder().vector("rate_noise", 3).build()?,
            meas: StateDefinition::builder().vector("rate", 3).build()?,
        })
    }

    fn flags(&self) -> ResidualFlags {
        ResidualFlags::binary()
            .with_splitable(true)
            .with_mergeable(true)
    }

    fn eval(&self, meas: &State, inputs: &Inputs<'_>, res: &mut State) -> GifResult<()> {
        let theta = self.propagate(meas, inputs)?.theta;
        res.set_vector(0, DVector::from_column_slice(theta.axis_angle().as_slice()))
    }

    fn jac_pre(
        &self,
        meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        jac.set_block(0, 0, &self.propagate(meas, inputs)?.d_pre)
    }

    fn jac_pos(
        &self,
        meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        jac.set_block(0, 0, &self.propagate(meas, inputs)?.d_pos)
    }

    fn jac_noi(
        &self,
        meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        let d_noise = self.propagate(meas, inputs)?.d_phi * self.dt;
        jac.set_block(0, 0, &d_noise)
    }
}
