//! Finite-difference Jacobians and analytic Jacobian verification.
//!
//! The numeric Jacobian of a residual `f` with respect to an input slot is
//! built column by column: the input is perturbed along one tangent basis
//! direction with `⊞`, the residual is re-evaluated and compared to the
//! undisturbed residual with `⊟`.
//!
//! Forward scheme: `J[:, i] = (f(x ⊞ δeᵢ) ⊟ f(x)) / δ`
//!
//! Central scheme: `J[:, i] = ((f(x ⊞ δeᵢ) ⊟ f(x)) - (f(x ⊞ -δeᵢ) ⊟ f(x))) / 2δ`
//!
//! The central scheme has a truncation error of order δ² and is the default
//! used by the self-test, which makes a tolerance equal to the step size
//! meaningful for smooth residuals.

use crate::core::model::{Inputs, Model, Slot};
use crate::error::{GifError, GifResult};
use crate::state::State;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// Default perturbation step
pub const DEFAULT_DELTA: f64 = 1e-6;

/// Default tolerance on the largest absolute Jacobian entry difference
pub const DEFAULT_THRESHOLD: f64 = 1e-6;

/// Finite-difference scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DifferenceScheme {
    /// One-sided difference, one evaluation per column
    Forward,
    /// Two-sided difference, two evaluations per column
    #[default]
    Central,
}

/// Parameters of an analytic-vs-numeric Jacobian comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianCheckConfig {
    pub delta: f64,
    pub threshold: f64,
    pub scheme: DifferenceScheme,
}

impl Default for JacobianCheckConfig {
    fn default() -> Self {
        JacobianCheckConfig {
            delta: DEFAULT_DELTA,
            threshold: DEFAULT_THRESHOLD,
            scheme: DifferenceScheme::default(),
        }
    }
}

impl JacobianCheckConfig {
    pub fn new(delta: f64, threshold: f64) -> Self {
        JacobianCheckConfig {
            delta,
            threshold,
            ..Default::default()
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scheme(mut self, scheme: DifferenceScheme) -> Self {
        self.scheme = scheme;
        self
    }
}

impl Model {
    /// Numeric Jacobian of `f` with respect to `slot`, written into `jac`.
    ///
    /// `f` evaluates the residual for a set of inputs. A slot of dimension 0
    /// yields a `rows × 0` matrix without evaluating anything.
    pub fn jac_fd<F>(
        &self,
        slot: Slot,
        jac: &mut DMatrix<f64>,
        inputs: &Inputs<'_>,
        delta: f64,
        scheme: DifferenceScheme,
        f: F,
    ) -> GifResult<()>
    where
        F: Fn(&mut State, &Inputs<'_>) -> GifResult<()>,
    {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(GifError::InvalidInput(format!(
                "finite-difference step must be positive and finite, got {delta}"
            )));
        }
        self.check_inputs(inputs)?;
        self.prepare_jacobian(slot, jac)?;

        let cols = self.dim(slot);
        if cols == 0 {
            return Ok(());
        }
        let input = inputs.get(slot).ok_or_else(|| {
            GifError::InvalidInput(format!("{slot} is not an input slot"))
        })?;

        let mut nominal = State::new(Arc::clone(self.definition(Slot::Res)));
        f(&mut nominal, inputs)?;
        let mut perturbed = nominal.clone();
        let mut direction = DVector::zeros(cols);

        for i in 0..cols {
            direction[i] = delta;
            let forward_input = input.boxplus(&direction)?;
            f(&mut perturbed, &inputs.replaced(slot, &forward_input))?;
            let forward = perturbed.boxminus(&nominal)?;

            let column = match scheme {
                DifferenceScheme::Forward => forward / delta,
                DifferenceScheme::Central => {
                    direction[i] = -delta;
                    let backward_input = input.boxplus(&direction)?;
                    f(&mut perturbed, &inputs.replaced(slot, &backward_input))?;
                    let backward = perturbed.boxminus(&nominal)?;
                    (forward - backward) / (2.0 * delta)
                }
            };
            jac.set_column(i, &column);
            direction[i] = 0.0;
        }
        Ok(())
    }
}

/// Outcome of the Jacobian comparison for one input slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCheck {
    pub slot: Slot,
    pub analytic: DMatrix<f64>,
    pub numeric: DMatrix<f64>,
    /// Largest absolute entry difference, NaN if either matrix has a NaN
    pub max_abs_error: f64,
    /// Zero-dimension slots are not evaluated and count as passing
    pub skipped: bool,
    pub passed: bool,
}

impl SlotCheck {
    pub fn compare(
        slot: Slot,
        analytic: DMatrix<f64>,
        numeric: DMatrix<f64>,
        threshold: f64,
    ) -> GifResult<Self> {
        if analytic.shape() != numeric.shape() {
            return Err(GifError::dimension(
                format!("{slot} jacobian check"),
                format!("{}x{}", numeric.nrows(), numeric.ncols()),
                format!("{}x{}", analytic.nrows(), analytic.ncols()),
            ));
        }
        let max_abs_error = max_abs_difference(&analytic, &numeric);
        Ok(SlotCheck {
            slot,
            analytic,
            numeric,
            max_abs_error,
            skipped: false,
            passed: max_abs_error < threshold,
        })
    }

    pub fn skipped(slot: Slot, rows: usize) -> Self {
        SlotCheck {
            slot,
            analytic: DMatrix::zeros(rows, 0),
            numeric: DMatrix::zeros(rows, 0),
            max_abs_error: 0.0,
            skipped: true,
            passed: true,
        }
    }
}

/// Per-slot results of a full Jacobian self-test.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JacobianReport {
    pub slots: Vec<SlotCheck>,
}

impl JacobianReport {
    pub fn passed(&self) -> bool {
        self.slots.iter().all(|s| s.passed)
    }

    /// Largest error over the evaluated slots
    pub fn max_abs_error(&self) -> f64 {
        self.slots
            .iter()
            .filter(|s| !s.skipped)
            .map(|s| s.max_abs_error)
            .fold(0.0, nan_max)
    }

    pub fn slot(&self, slot: Slot) -> Option<&SlotCheck> {
        self.slots.iter().find(|s| s.slot == slot)
    }
}

fn nan_max(acc: f64, value: f64) -> f64 {
    if acc.is_nan() || value.is_nan() {
        f64::NAN
    } else {
        acc.max(value)
    }
}

fn max_abs_difference(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, nan_max)
}
