//! The residual capability consumed by a filter.
//!
//! A residual relates a state before a transition (`pre`), a state after it
//! (`pos`), an injected noise (`noi`) and a measurement. The filter evaluates
//! it and its Jacobians at every step, and asks it to split or merge
//! measurements when sensor streams are not synchronised.
//!
//! [`Residual`] is object safe: a filter typically holds a
//! `Vec<Box<dyn Residual>>` mixing residuals of different kinds.

use crate::error::GifResult;
use crate::state::{State, StateDefinition};
use crate::time::TimePoint;
use nalgebra::DMatrix;
use std::fmt;
use std::sync::Arc;

/// Static tag naming a measurement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementKind(&'static str);

impl MeasurementKind {
    pub const fn new(name: &'static str) -> Self {
        MeasurementKind(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A tagged measurement value.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    kind: MeasurementKind,
    value: State,
}

impl Measurement {
    pub fn new(kind: MeasurementKind, value: State) -> Self {
        Measurement { kind, value }
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn value(&self) -> &State {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut State {
        &mut self.value
    }

    pub fn into_value(self) -> State {
        self.value
    }
}

/// Capabilities of a residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualFlags {
    /// The pre state is ignored
    pub is_unary: bool,
    pub is_splitable: bool,
    pub is_mergeable: bool,
}

impl ResidualFlags {
    /// Binary residual without resampling support
    pub const fn binary() -> Self {
        ResidualFlags {
            is_unary: false,
            is_splitable: false,
            is_mergeable: false,
        }
    }

    /// Unary residual without resampling support
    pub const fn unary() -> Self {
        ResidualFlags {
            is_unary: true,
            is_splitable: false,
            is_mergeable: false,
        }
    }

    pub const fn with_splitable(mut self, splitable: bool) -> Self {
        self.is_splitable = splitable;
        self
    }

    pub const fn with_mergeable(mut self, mergeable: bool) -> Self {
        self.is_mergeable = mergeable;
        self
    }
}

impl Default for ResidualFlags {
    fn default() -> Self {
        ResidualFlags::binary()
    }
}

/// Residual value and Jacobians at one linearisation point.
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    pub residual: State,
    pub jac_pre: DMatrix<f64>,
    pub jac_pos: DMatrix<f64>,
    pub jac_noi: DMatrix<f64>,
}

/// A differentiable residual relating pre state, post state, noise and a
/// measurement.
///
/// Jacobians have one row per residual tangent coordinate and one column per
/// tangent coordinate of the differentiated argument. Output matrices are
/// resized by the callee.
pub trait Residual {
    fn flags(&self) -> ResidualFlags;

    fn is_unary(&self) -> bool {
        self.flags().is_unary
    }

    fn is_splitable(&self) -> bool {
        self.flags().is_splitable
    }

    fn is_mergeable(&self) -> bool {
        self.flags().is_mergeable
    }

    fn measurement_kind(&self) -> MeasurementKind;

    fn res_definition(&self) -> &Arc<StateDefinition>;
    fn pre_definition(&self) -> &Arc<StateDefinition>;
    fn pos_definition(&self) -> &Arc<StateDefinition>;
    fn noi_definition(&self) -> &Arc<StateDefinition>;
    fn meas_definition(&self) -> &Arc<StateDefinition>;

    /// Evaluate the residual into `res`.
    fn eval_residual(
        &self,
        res: &mut State,
        pre: &State,
        pos: &State,
        noi: &State,
    ) -> GifResult<()>;

    fn jac_pre(&self, jac: &mut DMatrix<f64>, pre: &State, pos: &State, noi: &State)
        -> GifResult<()>;

    fn jac_pos(&self, jac: &mut DMatrix<f64>, pre: &State, pos: &State, noi: &State)
        -> GifResult<()>;

    fn jac_noi(&self, jac: &mut DMatrix<f64>, pre: &State, pos: &State, noi: &State)
        -> GifResult<()>;

    /// Cut a measurement spanning `[t0, t2]` at `t1` into the measurements of
    /// `[t0, t1]` and `[t1, t2]`.
    fn split_measurements(
        &self,
        input: &Measurement,
        t0: TimePoint,
        t1: TimePoint,
        t2: TimePoint,
    ) -> GifResult<(Measurement, Measurement)>;

    /// Combine the measurements of `[t0, t1]` (`in1`) and `[t1, t2]` (`in2`)
    /// into one measurement of `[t0, t2]`.
    fn merge_measurements(
        &self,
        in1: &Measurement,
        in2: &Measurement,
        t0: TimePoint,
        t1: TimePoint,
        t2: TimePoint,
    ) -> GifResult<Measurement>;

    /// Replace the stored measurement. On a kind or layout mismatch the
    /// previous measurement is kept and an error is returned.
    fn set_meas(&mut self, meas: Measurement) -> GifResult<()>;

    fn meas(&self) -> &Measurement;

    /// Noise covariance
    fn r(&self) -> &DMatrix<f64>;

    fn r_mut(&mut self) -> &mut DMatrix<f64>;

    /// Replace the noise covariance; it must be square of the noise dimension.
    fn set_r(&mut self, r: DMatrix<f64>) -> GifResult<()>;

    /// Compare analytic and finite-difference Jacobians at the given point.
    ///
    /// Returns `Ok(true)` iff every non-empty slot agrees within `threshold`.
    fn test_jacs(
        &self,
        pre: &State,
        pos: &State,
        noi: &State,
        delta: f64,
        threshold: f64,
    ) -> GifResult<bool>;

    /// [`Residual::test_jacs`] at a random measurement, random pre and post
    /// states and zero noise, all drawn from one generator seeded with `seed`.
    fn test_jacs_random(&mut self, seed: u64, delta: f64, threshold: f64) -> GifResult<bool>;

    /// Residual and all three Jacobians in one call.
    fn linearize(&self, pre: &State, pos: &State, noi: &State) -> GifResult<Linearization> {
        let mut residual = self.new_res_state();
        self.eval_residual(&mut residual, pre, pos, noi)?;
        let mut jac_pre = DMatrix::zeros(0, 0);
        let mut jac_pos = DMatrix::zeros(0, 0);
        let mut jac_noi = DMatrix::zeros(0, 0);
        self.jac_pre(&mut jac_pre, pre, pos, noi)?;
        self.jac_pos(&mut jac_pos, pre, pos, noi)?;
        self.jac_noi(&mut jac_noi, pre, pos, noi)?;
        Ok(Linearization {
            residual,
            jac_pre,
            jac_pos,
            jac_noi,
        })
    }

    fn new_res_state(&self) -> State {
        State::new(Arc::clone(self.res_definition()))
    }

    fn new_pre_state(&self) -> State {
        State::new(Arc::clone(self.pre_definition()))
    }

    fn new_pos_state(&self) -> State {
        State::new(Arc::clone(self.pos_definition()))
    }

    fn new_noi_state(&self) -> State {
        State::new(Arc::clone(self.noi_definition()))
    }
}
