//! Prior residual: absolute measurement of a full state.
//!
//! For every element `i` of the measured state `D`:
//!
//! ```text
//! res_i = pos_i ⊟ meas_i + noi_i
//! ```
//!
//! The residual is unary (the pre state is empty and ignored).

use crate::core::{
    BinaryResidual, Inputs, JacobianBlocks, MeasurementKind, ResidualDefinitions, ResidualFlags,
    ResidualModel,
};
use crate::error::GifResult;
use crate::residuals::{minus_jacobians, tangent_definition};
use crate::state::{State, StateDefinition};
use nalgebra::DMatrix;
use std::sync::Arc;

pub const PRIOR: MeasurementKind = MeasurementKind::new("prior");

pub type PriorResidual = BinaryResidual<Prior>;

/// Prior on a state of the given layout.
#[derive(Debug, Clone)]
pub struct Prior {
    definition: Arc<StateDefinition>,
}

impl Prior {
    pub fn new(definition: Arc<StateDefinition>) -> Self {
        Prior { definition }
    }

    pub fn definition(&self) -> &Arc<StateDefinition> {
        &self.definition
    }
}

/// Wrapped prior on `definition`.
pub fn prior_residual(definition: Arc<StateDefinition>) -> GifResult<PriorResidual> {
    BinaryResidual::new(Prior::new(definition))
}

impl ResidualModel for Prior {
    fn measurement_kind(&self) -> MeasurementKind {
        PRIOR
    }

    fn definitions(&self) -> GifResult<ResidualDefinitions> {
        let tangent = tangent_definition(&self.definition)?;
        Ok(ResidualDefinitions {
            res: Arc::clone(&tangent),
            pre: StateDefinition::empty(),
            pos: Arc::clone(&self.definition),
            noi: tangent,
            meas: Arc::clone(&self.definition),
        })
    }

    fn flags(&self) -> ResidualFlags {
        ResidualFlags::unary()
            .with_splitable(true)
            .with_mergeable(true)
    }

    fn eval(&self, meas: &State, inputs: &Inputs<'_>, res: &mut State) -> GifResult<()> {
        for (i, (pos, expected)) in inputs
            .pos
            .elements()
            .iter()
            .zip(meas.elements())
            .enumerate()
        {
            let error = pos.boxminus(expected)? + inputs.noi.vector(i)?;
            res.set_vector(i, error)?;
        }
        Ok(())
    }

    fn jac_pos(
        &self,
        meas: &State,
        inputs: &Inputs<'_>,
        jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        for (i, (pos, expected)) in inputs
            .pos
            .elements()
            .iter()
            .zip(meas.elements())
            .enumerate()
        {
            let (jac_pos, _) = minus_jacobians(pos, expected)?;
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
        for (i, noise) in inputs.noi.elements().iter().enumerate() {
            let n = noise.dim();
            jac.set_block(i, i, &DMatrix::<f64>::identity(n, n))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Measurement, Residual};
    use crate::manifold::SO3;
    use nalgebra::{DVector, Vector3};

    fn definition() -> GifResult<Arc<StateDefinition>> {
        StateDefinition::builder()
            .vector("position", 3)
            .rotation("attitude")
            .scalar("clock")
            .build()
    }

    #[test]
    fn test_prior_layout() -> GifResult<()> {
        let residual = prior_residual(definition()?)?;
        assert!(residual.is_unary());
        assert!(residual.is_splitable());
        assert!(residual.is_mergeable());
        assert_eq!(residual.pre_definition().dim(), 0);
        assert_eq!(residual.res_definition().dim(), 7);
        assert_eq!(residual.noi_definition().dim(), 7);
        assert_eq!(residual.r().shape(), (7, 7));
        Ok(())
    }

    #[test]
    fn test_prior_eval() -> GifResult<()> {
        let def = definition()?;
        let mut residual = prior_residual(Arc::clone(&def))?;
        let mut meas = State::new(Arc::clone(&def));
        meas.set_vector(0, DVector::from_vec(vec![1.0, 2.0, 3.0]))?;
        meas.set_scalar(2, 0.5)?;
        residual.set_meas(Measurement::new(PRIOR, meas))?;

        let mut pos = State::new(def);
        pos.set_rotation(1, SO3::from_scaled_axis(Vector3::new(0.0, 0.2, 0.0)))?;
        let pre = residual.new_pre_state();
        let mut noi = residual.new_noi_state();
        noi.set_vector(2, DVector::from_element(1, 0.25))?;
        let mut res = residual.new_res_state();
        residual.eval_residual(&mut res, &pre, &pos, &noi)?;

        assert_eq!(res.vector(0)?, &DVector::from_vec(vec![-1.0, -2.0, -3.0]));
        assert!((res.vector(1)? - DVector::from_vec(vec![0.0, 0.2, 0.0])).amax() < 1e-12);
        assert!((res.vector(2)?[0] + 0.25).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_prior_jacobians_random() -> GifResult<()> {
        let mut residual = prior_residual(definition()?)?;
        for seed in 0..20 {
            assert!(residual.test_jacs_random(seed, 1e-6, 1e-6)?, "seed {seed}");
        }
        Ok(())
    }
}
