//! Binary residuals built from a user-supplied residual model.
//!
//! Residual authors implement [`ResidualModel`]: the argument layouts, the
//! evaluation and the analytic Jacobians written block by block. Wrapping the
//! model in a [`BinaryResidual`] provides everything else a filter needs:
//!
//! - argument validation against the declared layouts,
//! - sizing and zeroing of Jacobian matrices,
//! - ownership and type checking of the current measurement,
//! - the noise covariance,
//! - finite-difference Jacobians and the analytic Jacobian self-test,
//! - time resampling of measurements (split/merge).
//!
//! # Example
//!
//! ```
//! use gif_residual::core::{
//!     BinaryResidual, Inputs, JacobianBlocks, MeasurementKind, Residual, ResidualDefinitions,
//!     ResidualModel,
//! };
//! use gif_residual::state::{State, StateDefinition};
//! use gif_residual::GifResult;
//! use nalgebra::DMatrix;
//!
//! /// Position increment with additive noise: e = pos - pre - n
//! struct Displacement;
//!
//! impl ResidualModel for Displacement {
//!     fn measurement_kind(&self) -> MeasurementKind {
//!         MeasurementKind::new("none")
//!     }
//!
//!     fn definitions(&self) -> GifResult<ResidualDefinitions> {
//!         let x = StateDefinition::builder().vector("p", 2).build()?;
//!         Ok(ResidualDefinitions {
//!             res: x.clone(),
//!             pre: x.clone(),
//!             pos: x.clone(),
//!             noi: x,
//!             meas: StateDefinition::empty(),
//!         })
//!     }
//!
//!     fn eval(&self, _meas: &State, inputs: &Inputs<'_>, res: &mut State) -> GifResult<()> {
//!         let e = inputs.pos.vector(0)? - inputs.pre.vector(0)? - inputs.noi.vector(0)?;
//!         res.set_vector(0, e)
//!     }
//!
//!     fn jac_pre(&self, _: &State, _: &Inputs<'_>, jac: &mut JacobianBlocks<'_>) -> GifResult<()> {
//!         jac.set_block(0, 0, &(-DMatrix::<f64>::identity(2, 2)))
//!     }
//!
//!     fn jac_pos(&self, _: &State, _: &Inputs<'_>, jac: &mut JacobianBlocks<'_>) -> GifResult<()> {
//!         jac.set_block(0, 0, &DMatrix::<f64>::identity(2, 2))
//!     }
//!
//!     fn jac_noi(&self, _: &State, _: &Inputs<'_>, jac: &mut JacobianBlocks<'_>) -> GifResult<()> {
//!         jac.set_block(0, 0, &(-DMatrix::<f64>::identity(2, 2)))
//!     }
//! }
//!
//! let mut residual = BinaryResidual::new(Displacement).unwrap();
//! assert!(residual.test_jacs_random(0, 1e-6, 1e-6).unwrap());
//! ```

use crate::core::model::{Inputs, JacobianBlocks, Model, Slot};
use crate::core::numeric::{DifferenceScheme, JacobianCheckConfig, JacobianReport, SlotCheck};
use crate::core::resample;
use crate::core::residual::{Measurement, MeasurementKind, Residual, ResidualFlags};
use crate::error::{GifError, GifResult};
use crate::state::{State, StateDefinition};
use crate::time::TimePoint;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Argument layouts of a residual model.
#[derive(Debug, Clone)]
pub struct ResidualDefinitions {
    pub res: Arc<StateDefinition>,
    pub pre: Arc<StateDefinition>,
    pub pos: Arc<StateDefinition>,
    pub noi: Arc<StateDefinition>,
    pub meas: Arc<StateDefinition>,
}

/// The author-facing part of a residual.
///
/// Inputs handed to `eval` and the Jacobian methods have already been checked
/// against [`ResidualModel::definitions`], and Jacobian writers start from a
/// correctly sized zero matrix.
pub trait ResidualModel {
    fn measurement_kind(&self) -> MeasurementKind;

    /// Layouts of the residual, its inputs and its measurement. Queried once,
    /// when the model is wrapped.
    fn definitions(&self) -> GifResult<ResidualDefinitions>;

    fn flags(&self) -> ResidualFlags {
        ResidualFlags::binary()
    }

    fn eval(&self, meas: &State, inputs: &Inputs<'_>, res: &mut State) -> GifResult<()>;

    /// Unary models never receive this call.
    fn jac_pre(
        &self,
        _meas: &State,
        _inputs: &Inputs<'_>,
        _jac: &mut JacobianBlocks<'_>,
    ) -> GifResult<()> {
        Err(GifError::UnsupportedOperation(format!(
            "residual '{}' has no pre Jacobian",
            self.measurement_kind()
        )))
    }

    fn jac_pos(&self, meas: &State, inputs: &Inputs<'_>, jac: &mut JacobianBlocks<'_>)
        -> GifResult<()>;

    fn jac_noi(&self, meas: &State, inputs: &Inputs<'_>, jac: &mut JacobianBlocks<'_>)
        -> GifResult<()>;

    /// Split policy for rate-like measurements: both halves equal the input.
    fn split(
        &self,
        input: &State,
        _t0: TimePoint,
        _t1: TimePoint,
        _t2: TimePoint,
    ) -> GifResult<(State, State)> {
        Ok((input.clone(), input.clone()))
    }

    /// Merge policy: interpolation from `in2` towards `in1` by the time ratio.
    fn merge(
        &self,
        in1: &State,
        in2: &State,
        t0: TimePoint,
        t1: TimePoint,
        t2: TimePoint,
    ) -> GifResult<State> {
        resample::interpolate_merge(in1, in2, t0, t1, t2)
    }
}

/// A [`Residual`] composed of a [`ResidualModel`] and its slot bookkeeping.
#[derive(Debug, Clone)]
pub struct BinaryResidual<M: ResidualModel> {
    model: M,
    layout: Model,
    meas_definition: Arc<StateDefinition>,
    flags: ResidualFlags,
    meas: Measurement,
    r: DMatrix<f64>,
}

impl<M: ResidualModel> BinaryResidual<M> {
    /// Wrap `model`. The measurement starts at identity and the noise
    /// covariance at the identity matrix.
    pub fn new(model: M) -> GifResult<Self> {
        let definitions = model.definitions()?;
        let layout = Model::new(
            definitions.res,
            definitions.pre,
            definitions.pos,
            definitions.noi,
        );
        let meas = Measurement::new(
            model.measurement_kind(),
            State::new(Arc::clone(&definitions.meas)),
        );
        let noise_dim = layout.dim(Slot::Noi);
        Ok(BinaryResidual {
            flags: model.flags(),
            model,
            layout,
            meas_definition: definitions.meas,
            meas,
            r: DMatrix::identity(noise_dim, noise_dim),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn layout(&self) -> &Model {
        &self.layout
    }

    /// Finite-difference Jacobian with respect to an input slot.
    #[allow(clippy::too_many_arguments)]
    pub fn jac_fd(
        &self,
        slot: Slot,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
        delta: f64,
        scheme: DifferenceScheme,
    ) -> GifResult<()> {
        let inputs = Inputs::new(pre, pos, noi);
        let meas = self.meas.value();
        self.layout
            .jac_fd(slot, jac, &inputs, delta, scheme, |res, inputs| {
                self.model.eval(meas, inputs, res)
            })
    }

    pub fn jac_fd_pre(
        &self,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
        delta: f64,
    ) -> GifResult<()> {
        self.jac_fd(Slot::Pre, jac, pre, pos, noi, delta, DifferenceScheme::default())
    }

    pub fn jac_fd_pos(
        &self,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
        delta: f64,
    ) -> GifResult<()> {
        self.jac_fd(Slot::Pos, jac, pre, pos, noi, delta, DifferenceScheme::default())
    }

    pub fn jac_fd_noi(
        &self,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
        delta: f64,
    ) -> GifResult<()> {
        self.jac_fd(Slot::Noi, jac, pre, pos, noi, delta, DifferenceScheme::default())
    }

    /// Analytic Jacobian with respect to an input slot.
    pub fn jac_analytic(
        &self,
        slot: Slot,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
    ) -> GifResult<()> {
        let inputs = Inputs::new(pre, pos, noi);
        let meas = self.meas.value();
        match slot {
            Slot::Pre if self.flags.is_unary => self.layout.jac(slot, jac, &inputs, |_, _| Ok(())),
            Slot::Pre => self.layout.jac(slot, jac, &inputs, |blocks, inputs| {
                self.model.jac_pre(meas, inputs, blocks)
            }),
            Slot::Pos => self.layout.jac(slot, jac, &inputs, |blocks, inputs| {
                self.model.jac_pos(meas, inputs, blocks)
            }),
            Slot::Noi => self.layout.jac(slot, jac, &inputs, |blocks, inputs| {
                self.model.jac_noi(meas, inputs, blocks)
            }),
            Slot::Res => Err(GifError::InvalidInput(
                "the residual slot has no Jacobian".to_string(),
            )),
        }
    }

    /// Compare analytic and numeric Jacobians for every input slot.
    ///
    /// Zero-dimension slots are reported as skipped without any evaluation.
    pub fn check_jacobians(
        &self,
        pre: &State,
        pos: &State,
        noi: &State,
        config: &JacobianCheckConfig,
    ) -> GifResult<JacobianReport> {
        self.layout.check_inputs(&Inputs::new(pre, pos, noi))?;
        let rows = self.layout.dim(Slot::Res);
        let mut report = JacobianReport::default();

        for slot in Slot::INPUTS {
            if self.layout.dim(slot) == 0 {
                debug!("Jacobian check '{}' {}: empty slot skipped", self.meas.kind(), slot);
                report.slots.push(SlotCheck::skipped(slot, rows));
                continue;
            }
            let mut analytic = DMatrix::zeros(0, 0);
            let mut numeric = DMatrix::zeros(0, 0);
            self.jac_analytic(slot, &mut analytic, pre, pos, noi)?;
            self.jac_fd(slot, &mut numeric, pre, pos, noi, config.delta, config.scheme)?;
            let check = SlotCheck::compare(slot, analytic, numeric, config.threshold)?;
            debug!(
                "Jacobian check '{}' {}: max error {:.3e}",
                self.meas.kind(),
                slot,
                check.max_abs_error
            );
            if !check.passed {
                warn!(
                    "Jacobian check '{}' failed for {}: max error {:.3e} >= threshold {:.3e}",
                    self.meas.kind(),
                    slot,
                    check.max_abs_error,
                    config.threshold
                );
            }
            report.slots.push(check);
        }
        Ok(report)
    }

    fn check_measurement(&self, meas: &Measurement, operation: &str) -> GifResult<()> {
        let expected = self.model.measurement_kind();
        if meas.kind() != expected {
            warn!(
                "{} rejected: measurement kind '{}' does not match residual kind '{}'",
                operation,
                meas.kind(),
                expected
            );
            return Err(GifError::MeasurementKindMismatch {
                expected: expected.to_string(),
                actual: meas.kind().to_string(),
            });
        }
        if !self.meas_definition.matches(meas.value().definition()) {
            warn!(
                "{} rejected: measurement layout {} does not match {}",
                operation,
                meas.value().definition(),
                self.meas_definition
            );
            return Err(GifError::DefinitionMismatch {
                slot: "measurement".to_string(),
                message: format!(
                    "expected layout {}, got {}",
                    self.meas_definition,
                    meas.value().definition()
                ),
            });
        }
        Ok(())
    }

    fn unsupported(&self, operation: &str) -> GifError {
        warn!(
            "residual '{}' does not support {}",
            self.model.measurement_kind(),
            operation
        );
        GifError::UnsupportedOperation(format!(
            "residual '{}' does not support {operation}",
            self.model.measurement_kind()
        ))
    }
}

impl<M: ResidualModel> Residual for BinaryResidual<M> {
    fn flags(&self) -> ResidualFlags {
        self.flags
    }

    fn measurement_kind(&self) -> MeasurementKind {
        self.model.measurement_kind()
    }

    fn res_definition(&self) -> &Arc<StateDefinition> {
        self.layout.definition(Slot::Res)
    }

    fn pre_definition(&self) -> &Arc<StateDefinition> {
        self.layout.definition(Slot::Pre)
    }

    fn pos_definition(&self) -> &Arc<StateDefinition> {
        self.layout.definition(Slot::Pos)
    }

    fn noi_definition(&self) -> &Arc<StateDefinition> {
        self.layout.definition(Slot::Noi)
    }

    fn meas_definition(&self) -> &Arc<StateDefinition> {
        &self.meas_definition
    }

    fn eval_residual(
        &self,
        res: &mut State,
        pre: &State,
        pos: &State,
        noi: &State,
    ) -> GifResult<()> {
        let meas = self.meas.value();
        self.layout
            .eval(res, &Inputs::new(pre, pos, noi), |res, inputs| {
                self.model.eval(meas, inputs, res)
            })
    }

    fn jac_pre(
        &self,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
    ) -> GifResult<()> {
        self.jac_analytic(Slot::Pre, jac, pre, pos, noi)
    }

    fn jac_pos(
        &self,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
    ) -> GifResult<()> {
        self.jac_analytic(Slot::Pos, jac, pre, pos, noi)
    }

    fn jac_noi(
        &self,
        jac: &mut DMatrix<f64>,
        pre: &State,
        pos: &State,
        noi: &State,
    ) -> GifResult<()> {
        self.jac_analytic(Slot::Noi, jac, pre, pos, noi)
    }

    fn split_measurements(
        &self,
        input: &Measurement,
        t0: TimePoint,
        t1: TimePoint,
        t2: TimePoint,
    ) -> GifResult<(Measurement, Measurement)> {
        if !self.flags.is_splitable {
            return Err(self.unsupported("split"));
        }
        self.check_measurement(input, "split")?;
        resample::validate_split_times(t0, t1, t2)?;
        let (first, second) = self.model.split(input.value(), t0, t1, t2)?;
        Ok((
            Measurement::new(input.kind(), first),
            Measurement::new(input.kind(), second),
        ))
    }

    fn merge_measurements(
        &self,
        in1: &Measurement,
        in2: &Measurement,
        t0: TimePoint,
        t1: TimePoint,
        t2: TimePoint,
    ) -> GifResult<Measurement> {
        if !self.flags.is_mergeable {
            return Err(self.unsupported("merge"));
        }
        self.check_measurement(in1, "merge")?;
        self.check_measurement(in2, "merge")?;
        resample::interval_ratio(t0, t1, t2)?;
        let merged = self.model.merge(in1.value(), in2.value(), t0, t1, t2)?;
        Ok(Measurement::new(in1.kind(), merged))
    }

    fn set_meas(&mut self, meas: Measurement) -> GifResult<()> {
        self.check_measurement(&meas, "set_meas")?;
        self.meas = meas;
        Ok(())
    }

    fn meas(&self) -> &Measurement {
        &self.meas
    }

    fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    fn r_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.r
    }

    fn set_r(&mut self, r: DMatrix<f64>) -> GifResult<()> {
        let n = self.layout.dim(Slot::Noi);
        if r.shape() != (n, n) {
            return Err(GifError::dimension(
                "noise covariance",
                format!("{n}x{n}"),
                format!("{}x{}", r.nrows(), r.ncols()),
            ));
        }
        self.r = r;
        Ok(())
    }

    fn test_jacs(
        &self,
        pre: &State,
        pos: &State,
        noi: &State,
        delta: f64,
        threshold: f64,
    ) -> GifResult<bool> {
        let config = JacobianCheckConfig::new(delta, threshold);
        Ok(self.check_jacobians(pre, pos, noi, &config)?.passed())
    }

    fn test_jacs_random(&mut self, seed: u64, delta: f64, threshold: f64) -> GifResult<bool> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut meas = self.meas.clone();
        meas.value_mut().set_random_with(&mut rng);
        let mut pre = self.new_pre_state();
        pre.set_random_with(&mut rng);
        let mut pos = self.new_pos_state();
        pos.set_random_with(&mut rng);
        let noi = self.new_noi_state();

        let previous = std::mem::replace(&mut self.meas, meas);
        let result = self.test_jacs(&pre, &pos, &noi, delta, threshold);
        self.meas = previous;
        result
    }
}
