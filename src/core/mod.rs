//! Core residual components for the gif-residual library
//!
//! This module contains the building blocks a filter uses to express what
//! constrains its state:
//! - Slot bookkeeping and block-wise Jacobian assembly
//! - Finite-difference Jacobians and the analytic Jacobian self-test
//! - The residual capability trait and the model-based binary residual
//! - Time resampling (split/merge) of measurements

pub mod binary_residual;
pub mod model;
pub mod numeric;
pub mod resample;
pub mod residual;

pub use binary_residual::{BinaryResidual, ResidualDefinitions, ResidualModel};
pub use model::{Inputs, JacobianBlocks, Model, Slot};
pub use numeric::{
    DifferenceScheme, JacobianCheckConfig, JacobianReport, SlotCheck, DEFAULT_DELTA,
    DEFAULT_THRESHOLD,
};
pub use residual::{Linearization, Measurement, MeasurementKind, Residual, ResidualFlags};
