//! Random-walk residual.
//!
//! Every element of the state performs an independent random walk over a
//! time step `dt`:
//!
//! ```text
//! res_i = pos_i ⊟ pre_i + √dt · noi_i
//! ```
//!
//! The measurement is empty, so splitting and merging are trivial.

use crate::core::{
    BinaryResidual, Inputs, JacobianBlocks, MeasurementKind, ResidualDefinitions, ResidualFlags,
    ResidualModel,
};
use crate::error::{GifError, GifResult};
use crate::residuals::{minus_jacobians, tangent_definition};
use crate::state::{State, StateDefinition};
use nalgebra::DMatrix;
use std::sync::Arc;
use std::time::Duration;

pub const RANDOM_WALK: MeasurementKind = MeasurementKind::new("random_walk");

pub type RandomWalkResidual = BinaryResidual<RandomWalk>;

#[derive(Debug, Clone)]
pub struct RandomWalk {
    definition: Arc<StateDefinition>,
    dt: f64,
}

impl RandomWalk {
    pub fn new(definition: Arc<StateDefinition>, dt: Duration) -> Self {
        RandomWalk {
            definition,
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

    fn pos_blocks(&self, inputs: &Inputs<'_>) -> GifResult<Vec<(DMatrix<f64>, DMatrix<f64>)>> {
        inputs
            .pos
            .elements()
            .iter()
            .zip(inputs.pre.elements())
            .map(|(pos, pre)| minus_jacobians(pos, pre))
            .collect()
    }
}

/// Wrapped random walk on `definition` over `dt`.
pub fn random_walk_residual(
    definition: Arc<StateDefinition>,
    dt: Duration,
) -> GifResult<RandomWalkResidual> {
    if definition.is_empty() {
        return Err(GifError::InvalidInput(
            "random walk needs at least one element".to_string(),
        ));
    }
    BinaryResidual::new(RandomWalk::new(definition, dt))
}

impl ResidualModel for RandomWalk {
    fn measurement_kind(&self) -> MeasurementKind {
        RANDOM_WALK
    }

    fn definitions(&self) -> GifResult<ResidualDefinitions> {
        let tangent = tangent_definition(&self.definition)?;
        Ok(ResidualDefinitions {
            res: Arc::clone(&tangent),
            pre: Arc::clone(&self.definition),
            pos: Arc::clone(&self.definition),
            noi: tangent,
            meas: StateDefinition::empty(),
        })
    }

    fn flags(&self) -> ResidualFlags {
        ResidualFlags::binary()
            .with_splitable(true)
            .with_mergeable(true)
    }

    fn eval(&self, _meas: &State, inputs: &Inputs<'_>, res: &mut State) -> GifResult<()> {
        let scale = self.dt.sqrt();
        for (i, (pos, pre)) in inputs
            .pos
            .elements()
            .iter()
            .zip(inputs.pre.elements())
            .enumerate()
        {
            let error = pos.boxminus(pre)? + inputs.noi.vector(i)? * scale;
            res.set_vector(i, error)?;
        }
        Ok(())
    }

    fn jac_pre(
        &self,
        _meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        for (i, (_, jac_pre)) in self.pos_blocks(inputs)?.into_iter().enumerate() {
            jac.set_block(i, i, &jac_pre)?;
        }
        Ok(())
    }

    fn jac_pos(
        &self,
        _meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        for (i, (jac_pos, _)) in self.pos_blocks(inputs)?.into_iter().enumerate() {
            jac.set_block(i, i, &jac_pos)?;
        }
        Ok(())
    }

    fn jac_noi(
        &self,
        _meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        let scale = self.dt.sqrt();
        for (i, noise) in inputs.noi.elements().iter().enumerate() {
            let n = noise.dim();
            jac.set_block(i, i, &(DMatrix::<f64>::identity(n, n) * scale))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Residual;
    use nalgebra::DVector;

    fn definition() -> GifResult<Arc<StateDefinition>> {
        StateDefinition::builder()
            .rotation("attitude")
            .vector("gyro_bias", 3)
            .scalar("clock_drift")
            .build()
    }

    #[test]
    fn test_random_walk_eval() -> GifResult<()> {
        let residual = random_walk_residual(definition()?, Duration::from_millis(250))?;
        let pre = residual.new_pre_state();
        let mut pos = residual.new_pos_state();
        pos.set_vector(1, DVector::from_vec(vec![0.1, 0.2, 0.3]))?;
        let mut noi = residual.new_noi_state();
        noi.set_vector(1, DVector::from_vec(vec![1.0, 0.0, -1.0]))?;
        noi.set_vector(2, DVector::from_element(1, 2.0))?;
        let mut res = residual.new_res_state();
        residual.eval_residual(&mut res, &pre, &pos, &noi)?;

        assert!((res.vector(1)? - DVector::from_vec(vec![0.6, 0.2, -0.2])).amax() < 1e-12);
        assert!((res.vector(2)?[0] - 1.0).abs() < 1e-12);
        assert!(res.vector(0)?.amax() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_random_walk_noise_jacobian_scales_with_dt() -> GifResult<()> {
        let mut residual = random_walk_residual(definition()?, Duration::from_secs(4))?;
        let pre = residual.new_pre_state();
        let noi = residual.new_noi_state();
        let mut jac = DMatrix::zeros(0, 0);
        residual.jac_noi(&mut jac, &pre, &pre, &noi)?;
        assert_eq!(jac, DMatrix::identity(7, 7) * 2.0);

        residual.model_mut().set_dt(Duration::from_secs(1));
        residual.jac_noi(&mut jac, &pre, &pre, &noi)?;
        assert_eq!(jac, DMatrix::identity(7, 7));
        Ok(())
    }

    #[test]
    fn test_random_walk_jacobians_random() -> GifResult<()> {
        let mut residual = random_walk_residual(definition()?, Duration::from_millis(10))?;
        for seed in 0..20 {
            assert!(residual.test_jacs_random(seed, 1e-6, 1e-6)?, "seed {seed}");
        }
        Ok(())
    }

    #[test]
    fn test_random_walk_requires_elements() {
        assert!(random_walk_residual(StateDefinition::empty(), Duration::from_secs(1)).is_err());
    }
}
