//! Integration test for analytic Jacobian verification
//!
//! This test verifies, through the object-safe `Residual` interface:
//! - Analytic and finite-difference Jacobians agree for every reference
//!   residual over many random linearisation points
//! - Empty argument slots are skipped without evaluating the residual
//! - Inputs of the wrong layout and measurements of the wrong kind are
//!   rejected without corrupting the residual

use gif_residual::core::{
    BinaryResidual, DifferenceScheme, JacobianCheckConfig, Measurement, MeasurementKind, Residual,
    Slot,
};
use gif_residual::residuals::{constant_rate_residual, prior_residual, random_walk_residual, PRIOR};
use gif_residual::state::{State, StateDefinition};
use gif_residual::GifError;
use nalgebra::DMatrix;
use std::time::Duration;

use residual_test_utils::*;

fn reference_residuals() -> Result<Vec<Box<dyn Residual>>, GifError> {
    let mut residuals: Vec<Box<dyn Residual>> = Vec::new();
    residuals.push(Box::new(prior_residual(nav_definition()?)?));
    residuals.push(Box::new(random_walk_residual(
        nav_definition()?,
        Duration::from_millis(20),
    )?));
    residuals.push(Box::new(constant_rate_residual(Duration::from_millis(5))?));
    residuals.push(Box::new(constant_rate_residual(Duration::from_millis(200))?));
    Ok(residuals)
}

#[test]
fn test_reference_residuals_jacobians_100_seeds() -> TestResult {
    gif_residual::init_logger();

    for mut residual in reference_residuals()? {
        let kind = residual.measurement_kind();
        for seed in 0..SEEDS {
            assert!(
                residual.test_jacs_random(seed, 1e-6, 1e-6)?,
                "Jacobian check failed for '{kind}' with seed {seed}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_linearize_matches_individual_calls() -> TestResult {
    for residual in reference_residuals()? {
        let pre = State::random(residual.pre_definition().clone(), 3);
        let pos = State::random(residual.pos_definition().clone(), 4);
        let noi = State::random(residual.noi_definition().clone(), 5);

        let lin = residual.linearize(&pre, &pos, &noi)?;
        let mut res = residual.new_res_state();
        residual.eval_residual(&mut res, &pre, &pos, &noi)?;
        assert_eq!(lin.residual, res);

        let mut jac = DMatrix::zeros(0, 0);
        residual.jac_pos(&mut jac, &pre, &pos, &noi)?;
        assert_eq!(lin.jac_pos, jac);
        assert_eq!(
            lin.jac_pre.shape(),
            (residual.res_definition().dim(), residual.pre_definition().dim())
        );
        assert_eq!(
            lin.jac_noi.shape(),
            (residual.res_definition().dim(), residual.noi_definition().dim())
        );
    }
    Ok(())
}

#[test]
fn test_unary_prior_has_empty_pre_jacobian() -> TestResult {
    let residual = prior_residual(nav_definition()?)?;
    let pre = residual.new_pre_state();
    let pos = State::random(residual.pos_definition().clone(), 1);
    let noi = residual.new_noi_state();

    let mut jac = DMatrix::from_element(2, 2, 1.0);
    residual.jac_pre(&mut jac, &pre, &pos, &noi)?;
    assert_eq!(jac.shape(), (10, 0));

    let report = residual.check_jacobians(&pre, &pos, &noi, &JacobianCheckConfig::default())?;
    assert!(report.passed());
    assert!(report.slot(Slot::Pre).is_some_and(|s| s.skipped));
    Ok(())
}

#[test]
fn test_empty_slot_is_never_evaluated() -> TestResult {
    let residual = BinaryResidual::new(CountingDifference::default())?;
    let pre = State::random(residual.pre_definition().clone(), 1);
    let pos = State::random(residual.pos_definition().clone(), 2);
    let noi = residual.new_noi_state();

    let mut jac = DMatrix::zeros(0, 0);
    residual.jac_fd_noi(&mut jac, &pre, &pos, &noi, 1e-6)?;
    assert_eq!(jac.shape(), (3, 0));
    assert_eq!(residual.model().evaluations.get(), 0);

    let report = residual.check_jacobians(&pre, &pos, &noi, &JacobianCheckConfig::default())?;
    assert!(report.passed());
    let noise = report.slot(Slot::Noi).ok_or("missing noise slot")?;
    assert!(noise.skipped);
    assert_eq!(noise.numeric.shape(), (3, 0));

    // nominal + two central perturbations per column, for pre and pos
    assert_eq!(residual.model().evaluations.get(), 2 * (1 + 2 * 3));
    Ok(())
}

#[test]
fn test_forward_scheme_is_less_accurate_than_central() -> TestResult {
    let residual = constant_rate_residual(Duration::from_secs(1))?;
    let pre = State::random(residual.pre_definition().clone(), 11);
    let pos = State::random(residual.pos_definition().clone(), 12);
    let noi = residual.new_noi_state();

    let central = residual.check_jacobians(&pre, &pos, &noi, &JacobianCheckConfig::default())?;
    let forward = residual.check_jacobians(
        &pre,
        &pos,
        &noi,
        &JacobianCheckConfig::default()
            .with_scheme(DifferenceScheme::Forward)
            .with_threshold(1e-3),
    )?;
    assert!(central.passed());
    assert!(forward.passed());
    assert!(central.max_abs_error() < 1e-6);
    assert!(central.max_abs_error() < forward.max_abs_error());
    Ok(())
}

#[test]
fn test_wrong_input_layout_is_recoverable() -> TestResult {
    let residual: Box<dyn Residual> = Box::new(random_walk_residual(
        nav_definition()?,
        Duration::from_millis(10),
    )?);
    let pre = residual.new_pre_state();
    let wrong = State::new(StateDefinition::builder().vector("x", 10).build()?);
    let noi = residual.new_noi_state();
    let mut res = residual.new_res_state();

    let result = residual.eval_residual(&mut res, &pre, &wrong, &noi);
    assert!(matches!(result, Err(GifError::DefinitionMismatch { .. })));

    let mut jac = DMatrix::zeros(0, 0);
    assert!(residual.jac_noi(&mut jac, &wrong, &pre, &noi).is_err());

    // the residual remains usable
    residual.eval_residual(&mut res, &pre, &pre, &noi)?;
    assert!(res.boxminus(&residual.new_res_state())?.amax() < 1e-12);
    Ok(())
}

#[test]
fn test_set_meas_mismatch_keeps_state() -> TestResult {
    let mut residual = prior_residual(nav_definition()?)?;
    let good = Measurement::new(PRIOR, State::random(nav_definition()?, 8));
    residual.set_meas(good.clone())?;
    residual.set_r(DMatrix::identity(10, 10) * 0.01)?;
    let r_before = residual.r().clone();

    let wrong_kind = Measurement::new(
        MeasurementKind::new("rate"),
        State::random(nav_definition()?, 9),
    );
    match residual.set_meas(wrong_kind) {
        Err(GifError::MeasurementKindMismatch { expected, actual }) => {
            assert_eq!(expected, "prior");
            assert_eq!(actual, "rate");
        }
        other => return Err(format!("expected a kind mismatch, got {other:?}").into()),
    }

    let wrong_layout = Measurement::new(
        PRIOR,
        State::new(StateDefinition::builder().vector("x", 10).build()?),
    );
    assert!(residual.set_meas(wrong_layout).is_err());

    assert_eq!(residual.meas(), &good);
    assert_eq!(residual.r(), &r_before);
    Ok(())
}
