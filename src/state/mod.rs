//! Composite manifold states.
//!
//! A [`State`] is an instance of a [`StateDefinition`]: one [`Element`] per
//! descriptor, in order. States support the generalized increment
//! (`boxplus`) and difference (`boxminus`) element by element, which is all the
//! residual machinery needs to linearise and to differentiate numerically.
//!
//! Round-trip law: `b.boxplus(&v)?.boxminus(&b)? == v` up to numerical
//! tolerance for all tangent vectors `v` within the injectivity radius.

use crate::error::{GifError, GifResult};
use crate::manifold::SO3;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub mod definition;
pub mod element;

pub use definition::{ElementDescriptor, StateDefinition, StateDefinitionBuilder};
pub use element::{Element, ElementKind};

/// A value of a composite manifold described by a [`StateDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    definition: Arc<StateDefinition>,
    elements: Vec<Element>,
}

impl State {
    /// Create a state at the identity of every element.
    pub fn new(definition: Arc<StateDefinition>) -> Self {
        let elements = definition
            .elements()
            .iter()
            .map(|d| d.kind.identity())
            .collect();
        State {
            definition,
            elements,
        }
    }

    /// Create a random state from a seed.
    pub fn random(definition: Arc<StateDefinition>, seed: u64) -> Self {
        let mut state = State::new(definition);
        state.set_random(seed);
        state
    }

    pub fn definition(&self) -> &Arc<StateDefinition> {
        &self.definition
    }

    /// Total tangent dimension
    pub fn dim(&self) -> usize {
        self.definition.dim()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn set_identity(&mut self) {
        for (element, descriptor) in self.elements.iter_mut().zip(self.definition.elements()) {
            *element = descriptor.kind.identity();
        }
    }

    /// Randomise every element from a generator seeded with `seed`.
    pub fn set_random(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.set_random_with(&mut rng);
    }

    /// Randomise every element, drawing from `rng`.
    pub fn set_random_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for (element, descriptor) in self.elements.iter_mut().zip(self.definition.elements()) {
            *element = descriptor.kind.random(rng);
        }
    }

    /// Generalized increment `self ⊞ delta`.
    pub fn boxplus(&self, delta: &DVector<f64>) -> GifResult<State> {
        if delta.len() != self.dim() {
            return Err(GifError::dimension(
                "state boxplus",
                self.dim(),
                delta.len(),
            ));
        }
        let elements = self
            .elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let range = self.definition.range(i)?;
                element.boxplus(&delta.as_slice()[range])
            })
            .collect::<GifResult<Vec<_>>>()?;
        Ok(State {
            definition: Arc::clone(&self.definition),
            elements,
        })
    }

    /// Generalized difference `self ⊟ other` in the tangent space of `other`.
    pub fn boxminus(&self, other: &State) -> GifResult<DVector<f64>> {
        if !self.definition.matches(&other.definition) {
            return Err(GifError::DefinitionMismatch {
                slot: "boxminus".to_string(),
                message: format!(
                    "cannot subtract a state of layout {} from one of layout {}",
                    other.definition, self.definition
                ),
            });
        }
        let mut out = DVector::zeros(self.dim());
        for (i, (a, b)) in self.elements.iter().zip(other.elements.iter()).enumerate() {
            let range = self.definition.range(i)?;
            a.boxminus_into(b, &mut out.as_mut_slice()[range])?;
        }
        Ok(out)
    }

    /// Position of the element called `name`.
    pub fn index_of(&self, name: &str) -> GifResult<usize> {
        self.definition.require(name)
    }

    pub fn element(&self, index: usize) -> GifResult<&Element> {
        self.elements.get(index).ok_or_else(|| self.out_of_range(index))
    }

    /// Replace element `index`; the new value must have the declared kind.
    pub fn set_element(&mut self, index: usize, value: Element) -> GifResult<()> {
        let expected = self.definition.kind(index)?;
        if value.kind() != expected {
            return Err(GifError::InvalidElement(format!(
                "element {index} is a {expected}, cannot store a {}",
                value.kind()
            )));
        }
        self.elements[index] = value;
        Ok(())
    }

    pub fn scalar(&self, index: usize) -> GifResult<f64> {
        self.element(index)?
            .as_scalar()
            .ok_or_else(|| self.wrong_kind(index, "scalar"))
    }

    pub fn vector(&self, index: usize) -> GifResult<&DVector<f64>> {
        self.element(index)?
            .as_vector()
            .ok_or_else(|| self.wrong_kind(index, "vector"))
    }

    pub fn rotation(&self, index: usize) -> GifResult<&SO3> {
        self.element(index)?
            .as_rotation()
            .ok_or_else(|| self.wrong_kind(index, "rotation"))
    }

    pub fn scalar_mut(&mut self, index: usize) -> GifResult<&mut f64> {
        let err = self.wrong_kind(index, "scalar");
        match self.elements.get_mut(index) {
            Some(Element::Scalar(s)) => Ok(s),
            _ => Err(err),
        }
    }

    pub fn vector_mut(&mut self, index: usize) -> GifResult<&mut DVector<f64>> {
        let err = self.wrong_kind(index, "vector");
        match self.elements.get_mut(index) {
            Some(Element::Vector(v)) => Ok(v),
            _ => Err(err),
        }
    }

    pub fn rotation_mut(&mut self, index: usize) -> GifResult<&mut SO3> {
        let err = self.wrong_kind(index, "rotation");
        match self.elements.get_mut(index) {
            Some(Element::Rotation(r)) => Ok(r),
            _ => Err(err),
        }
    }

    pub fn set_scalar(&mut self, index: usize, value: f64) -> GifResult<()> {
        self.set_element(index, Element::Scalar(value))
    }

    pub fn set_vector(&mut self, index: usize, value: DVector<f64>) -> GifResult<()> {
        self.set_element(index, Element::Vector(value))
    }

    pub fn set_rotation(&mut self, index: usize, value: SO3) -> GifResult<()> {
        self.set_element(index, Element::Rotation(value))
    }

    fn out_of_range(&self, index: usize) -> GifError {
        GifError::InvalidElement(format!(
            "element index {index} out of range for {}",
            self.definition
        ))
    }

    fn wrong_kind(&self, index: usize, requested: &str) -> GifError {
        match self.definition.kind(index) {
            Ok(kind) => GifError::InvalidElement(format!(
                "element {index} is a {kind}, not a {requested}"
            )),
            Err(err) => err,
        }
    }
}
