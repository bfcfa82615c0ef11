//! Residual and model core of a generalized information filter.
//!
//! An estimator built on this crate describes what constrains its state as
//! differentiable residuals relating a state before a transition, a state
//! after it, an injected noise and a measurement. The crate provides:
//!
//! - [`state`]: named manifold composites with `⊞`/`⊟`
//! - [`core`]: slot bookkeeping, the [`core::Residual`] trait, model-based
//!   residuals, Jacobian self-verification and measurement resampling
//! - [`residuals`]: reference residuals (prior, random walk, constant rate)
//! - [`manifold`]: Lie-group primitives (SO(3))
//!
//! Errors are reported through [`GifError`]; library code logs through
//! `tracing` and [`init_logger`] installs a subscriber for binaries and tests.

pub mod core;
pub mod error;
pub mod logger;
pub mod manifold;
pub mod residuals;
pub mod state;
pub mod time;

pub use crate::core::{
    BinaryResidual, Inputs, JacobianBlocks, JacobianCheckConfig, Measurement, MeasurementKind,
    Residual, ResidualFlags, ResidualModel, Slot,
};
pub use error::{GifError, GifResult};
pub use logger::{init_logger, init_logger_with_level};
pub use state::{State, StateDefinition};
pub use time::{to_sec, TimePoint};
