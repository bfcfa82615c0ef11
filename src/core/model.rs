//! Slot bookkeeping shared by every residual.
//!
//! A residual relates three input packs (`Pre`, `Pos`, `Noi`) to one output
//! pack (`Res`). Each pack is described by a [`StateDefinition`]; the [`Model`]
//! turns those descriptions into the numbers a filter needs:
//!
//! - the shape of the Jacobian with respect to each input slot
//!   (residual dimension × input dimension),
//! - the row range of every residual element and the column range of every
//!   input element (prefix sums over the element dimensions),
//! - structural validation of the states handed in by the caller.
//!
//! Residual authors never compute offsets themselves: analytic Jacobians are
//! assembled block by block through [`JacobianBlocks::set_block`].

use crate::error::{GifError, GifResult};
use crate::state::{State, StateDefinition};
use nalgebra::constraint::{SameNumberOfColumns, SameNumberOfRows, ShapeConstraint};
use nalgebra::storage::Storage;
use nalgebra::{DMatrix, Dim, Dyn, Matrix};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Argument slot of a residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Residual output
    Res,
    /// State before the transition
    Pre,
    /// State after the transition
    Pos,
    /// Injected noise
    Noi,
}

impl Slot {
    /// The three input slots in argument order
    pub const INPUTS: [Slot; 3] = [Slot::Pre, Slot::Pos, Slot::Noi];

    /// Argument position of an input slot, `None` for the output
    pub fn input_index(self) -> Option<usize> {
        match self {
            Slot::Res => None,
            Slot::Pre => Some(0),
            Slot::Pos => Some(1),
            Slot::Noi => Some(2),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Res => "residual",
            Slot::Pre => "pre",
            Slot::Pos => "pos",
            Slot::Noi => "noise",
        }
    }

    fn position(self) -> usize {
        match self {
            Slot::Res => 0,
            Slot::Pre => 1,
            Slot::Pos => 2,
            Slot::Noi => 3,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Borrowed input states of one residual evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub pre: &'a State,
    pub pos: &'a State,
    pub noi: &'a State,
}

impl<'a> Inputs<'a> {
    pub fn new(pre: &'a State, pos: &'a State, noi: &'a State) -> Self {
        Inputs { pre, pos, noi }
    }

    pub fn get(&self, slot: Slot) -> Option<&'a State> {
        match slot {
            Slot::Res => None,
            Slot::Pre => Some(self.pre),
            Slot::Pos => Some(self.pos),
            Slot::Noi => Some(self.noi),
        }
    }

    /// Same inputs with the state of `slot` swapped for `state`.
    pub fn replaced<'b>(&self, slot: Slot, state: &'b State) -> Inputs<'b>
    where
        'a: 'b,
    {
        let mut inputs: Inputs<'b> = *self;
        match slot {
            Slot::Res => {}
            Slot::Pre => inputs.pre = state,
            Slot::Pos => inputs.pos = state,
            Slot::Noi => inputs.noi = state,
        }
        inputs
    }
}

/// Dimension bookkeeping and argument dispatch for one residual layout.
#[derive(Debug, Clone)]
pub struct Model {
    definitions: [Arc<StateDefinition>; 4],
}

impl Model {
    pub fn new(
        res: Arc<StateDefinition>,
        pre: Arc<StateDefinition>,
        pos: Arc<StateDefinition>,
        noi: Arc<StateDefinition>,
    ) -> Self {
        Model {
            definitions: [res, pre, pos, noi],
        }
    }

    pub fn definition(&self, slot: Slot) -> &Arc<StateDefinition> {
        &self.definitions[slot.position()]
    }

    /// Total tangent dimension of a slot
    pub fn dim(&self, slot: Slot) -> usize {
        self.definition(slot).dim()
    }

    /// Row range (for `Res`) or column range (for inputs) of element `index`.
    pub fn block_range(&self, slot: Slot, index: usize) -> GifResult<Range<usize>> {
        self.definition(slot).range(index).map_err(|_| {
            GifError::InvalidElement(format!(
                "{slot} pack has no element {index} (layout {})",
                self.definition(slot)
            ))
        })
    }

    /// Shape of the Jacobian of the residual with respect to an input slot.
    pub fn jacobian_shape(&self, slot: Slot) -> GifResult<(usize, usize)> {
        if slot == Slot::Res {
            return Err(GifError::InvalidInput(
                "the residual slot has no Jacobian".to_string(),
            ));
        }
        Ok((self.dim(Slot::Res), self.dim(slot)))
    }

    /// Resize `jac` to the slot's Jacobian shape and zero it.
    pub fn prepare_jacobian(&self, slot: Slot, jac: &mut DMatrix<f64>) -> GifResult<()> {
        let (rows, cols) = self.jacobian_shape(slot)?;
        jac.resize_mut(rows, cols, 0.0);
        jac.fill(0.0);
        Ok(())
    }

    /// Check that `state` was built from a definition matching the slot layout.
    pub fn check_state(&self, slot: Slot, state: &State) -> GifResult<()> {
        let expected = self.definition(slot);
        if expected.matches(state.definition()) {
            Ok(())
        } else {
            Err(GifError::DefinitionMismatch {
                slot: slot.name().to_string(),
                message: format!("expected layout {expected}, got {}", state.definition()),
            })
        }
    }

    pub fn check_inputs(&self, inputs: &Inputs<'_>) -> GifResult<()> {
        self.check_state(Slot::Pre, inputs.pre)?;
        self.check_state(Slot::Pos, inputs.pos)?;
        self.check_state(Slot::Noi, inputs.noi)
    }

    /// Validate the arguments, then evaluate the residual into `res`.
    pub fn eval<F>(&self, res: &mut State, inputs: &Inputs<'_>, f: F) -> GifResult<()>
    where
        F: FnOnce(&mut State, &Inputs<'_>) -> GifResult<()>,
    {
        self.check_state(Slot::Res, res)?;
        self.check_inputs(inputs)?;
        f(res, inputs)
    }

    /// Validate the arguments, size `jac` and let `f` fill it block by block.
    pub fn jac<F>(
        &self,
        slot: Slot,
        jac: &mut DMatrix<f64>,
        inputs: &Inputs<'_>,
        f: F,
    ) -> GifResult<()>
    where
        F: FnOnce(&mut JacobianBlocks<'_>, &Inputs<'_>) -> GifResult<()>,
    {
        self.check_inputs(inputs)?;
        self.prepare_jacobian(slot, jac)?;
        let mut blocks = JacobianBlocks {
            model: self,
            slot,
            matrix: jac,
        };
        f(&mut blocks, inputs)
    }

    /// Writer for the Jacobian of `slot` over an already sized matrix.
    pub fn blocks<'a>(
        &'a self,
        slot: Slot,
        jac: &'a mut DMatrix<f64>,
    ) -> GifResult<JacobianBlocks<'a>> {
        let shape = self.jacobian_shape(slot)?;
        if jac.shape() != shape {
            return Err(GifError::dimension(
                format!("{slot} jacobian"),
                format!("{}x{}", shape.0, shape.1),
                format!("{}x{}", jac.nrows(), jac.ncols()),
            ));
        }
        Ok(JacobianBlocks {
            model: self,
            slot,
            matrix: jac,
        })
    }
}

/// Block-wise writer for the Jacobian with respect to one input slot.
pub struct JacobianBlocks<'a> {
    model: &'a Model,
    slot: Slot,
    matrix: &'a mut DMatrix<f64>,
}

impl<'a> JacobianBlocks<'a> {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Write `block` as the derivative of residual element `n` with respect to
    /// input element `m`.
    pub fn set_block<R, C, S>(
        &mut self,
        n: usize,
        m: usize,
        block: &Matrix<f64, R, C, S>,
    ) -> GifResult<()>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
        ShapeConstraint: SameNumberOfRows<Dyn, R> + SameNumberOfColumns<Dyn, C>,
    {
        let rows = self.model.block_range(Slot::Res, n)?;
        let cols = self.model.block_range(self.slot, m)?;
        if block.nrows() != rows.len() || block.ncols() != cols.len() {
            return Err(GifError::dimension(
                format!("{} block ({n}, {m})", self.slot),
                format!("{}x{}", rows.len(), cols.len()),
                format!("{}x{}", block.nrows(), block.ncols()),
            ));
        }
        self.matrix
            .view_mut((rows.start, cols.start), (rows.len(), cols.len()))
            .copy_from(block);
        Ok(())
    }

    /// [`Self::set_block`] addressing elements by name.
    pub fn set_block_by_name<R, C, S>(
        &mut self,
        residual_element: &str,
        input_element: &str,
        block: &Matrix<f64, R, C, S>,
    ) -> GifResult<()>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
        ShapeConstraint: SameNumberOfRows<Dyn, R> + SameNumberOfColumns<Dyn, C>,
    {
        let n = self.model.definition(Slot::Res).require(residual_element)?;
        let m = self.model.definition(self.slot).require(input_element)?;
        self.set_block(n, m, block)
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut DMatrix<f64> {
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DVector, Matrix2x3, Matrix3};

    fn model() -> GifResult<Model> {
        let res = StateDefinition::builder()
            .vector("position_error", 2)
            .vector("attitude_error", 3)
            .build()?;
        let state = StateDefinition::builder()
            .rotation("attitude")
            .vector("position", 2)
            .build()?;
        let noi = StateDefinition::builder().vector("n", 3).build()?;
        Ok(Model::new(res, Arc::clone(&state), state, noi))
    }

    #[test]
    fn test_dimensions_and_ranges() -> GifResult<()> {
        let model = model()?;
        assert_eq!(model.dim(Slot::Res), 5);
        assert_eq!(model.dim(Slot::Pre), 5);
        assert_eq!(model.dim(Slot::Noi), 3);
        assert_eq!(model.block_range(Slot::Res, 1)?, 2..5);
        assert_eq!(model.block_range(Slot::Pos, 1)?, 3..5);
        assert!(model.block_range(Slot::Noi, 1).is_err());
        assert_eq!(model.jacobian_shape(Slot::Noi)?, (5, 3));
        assert!(model.jacobian_shape(Slot::Res).is_err());
        Ok(())
    }

    #[test]
    fn test_jac_resizes_and_places_blocks() -> GifResult<()> {
        let model = model()?;
        let pre = State::new(Arc::clone(model.definition(Slot::Pre)));
        let noi = State::new(Arc::clone(model.definition(Slot::Noi)));
        let inputs = Inputs::new(&pre, &pre, &noi);

        let mut jac = DMatrix::from_element(1, 1, 7.0);
        model.jac(Slot::Pre, &mut jac, &inputs, |blocks, _| {
            blocks.set_block(1, 0, &(2.0 * Matrix3::identity()))?;
            blocks.set_block_by_name("position_error", "attitude", &Matrix2x3::from_element(1.0))
        })?;

        assert_eq!(jac.shape(), (5, 5));
        assert_eq!(jac[(2, 0)], 2.0);
        assert_eq!(jac[(4, 2)], 2.0);
        assert_eq!(jac[(0, 0)], 1.0);
        assert_eq!(jac[(1, 2)], 1.0);
        // untouched blocks are zero, including the old content
        assert_eq!(jac[(0, 3)], 0.0);
        assert_eq!(jac[(4, 4)], 0.0);
        Ok(())
    }

    #[test]
    fn test_set_block_wrong_shape() -> GifResult<()> {
        let model = model()?;
        let mut jac = DMatrix::zeros(5, 3);
        let mut blocks = model.blocks(Slot::Noi, &mut jac)?;
        let result = blocks.set_block(0, 0, &Matrix3::<f64>::identity());
        assert!(matches!(result, Err(GifError::DimensionMismatch { .. })));
        let dynamic = DMatrix::from_element(2, 3, 1.0);
        blocks.set_block(0, 0, &dynamic)?;
        assert_eq!(blocks.matrix()[(1, 2)], 1.0);
        Ok(())
    }

    #[test]
    fn test_input_validation() -> GifResult<()> {
        let model = model()?;
        let pre = State::new(Arc::clone(model.definition(Slot::Pre)));
        let wrong = State::new(StateDefinition::builder().vector("x", 5).build()?);
        let noi = State::new(Arc::clone(model.definition(Slot::Noi)));
        let mut res = State::new(Arc::clone(model.definition(Slot::Res)));

        let inputs = Inputs::new(&pre, &wrong, &noi);
        let result = model.eval(&mut res, &inputs, |_, _| Ok(()));
        match result {
            Err(GifError::DefinitionMismatch { slot, .. }) => assert_eq!(slot, "pos"),
            other => panic!("expected definition mismatch, got {other:?}"),
        }

        let mut jac = DMatrix::zeros(0, 0);
        assert!(model
            .jac(Slot::Pre, &mut jac, &inputs, |_, _| Ok(()))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_zero_dimension_slot() -> GifResult<()> {
        let res = StateDefinition::builder().vector("e", 2).build()?;
        let model = Model::new(
            Arc::clone(&res),
            StateDefinition::empty(),
            Arc::clone(&res),
            StateDefinition::empty(),
        );
        let empty = State::new(StateDefinition::empty());
        let pos = State::new(res);
        let inputs = Inputs::new(&empty, &pos, &empty);
        let mut jac = DMatrix::zeros(4, 4);
        model.jac(Slot::Noi, &mut jac, &inputs, |_, _| Ok(()))?;
        assert_eq!(jac.shape(), (2, 0));
        Ok(())
    }

    #[test]
    fn test_inputs_replaced() -> GifResult<()> {
        let def = StateDefinition::builder().vector("x", 1).build()?;
        let a = State::new(Arc::clone(&def));
        let mut b = State::new(def);
        b.set_vector(0, DVector::from_element(1, 3.0))?;
        let inputs = Inputs::new(&a, &a, &a);
        let swapped = inputs.replaced(Slot::Pos, &b);
        assert_eq!(swapped.pos.vector(0)?[0], 3.0);
        assert_eq!(swapped.pre.vector(0)?[0], 0.0);
        assert!(inputs.get(Slot::Res).is_none());
        Ok(())
    }
}
