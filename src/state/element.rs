//! Individual state elements and their kinds.

use crate::error::{GifError, GifResult};
use crate::manifold::{LieGroup, SO3Tangent, Tangent, SO3};
use nalgebra::DVector;
use rand::Rng;
use std::fmt;

/// Kind of a state element, fixing its tangent dimension and its plus/minus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Real scalar (dim 1)
    Scalar,
    /// Euclidean vector of the given length
    Vector(usize),
    /// SO(3) rotation (dim 3)
    Rotation,
}

impl ElementKind {
    /// Tangent space dimension of this kind
    pub fn dim(&self) -> usize {
        match self {
            ElementKind::Scalar => 1,
            ElementKind::Vector(n) => *n,
            ElementKind::Rotation => SO3::DOF,
        }
    }

    /// Neutral value: zero for scalars and vectors, identity for rotations
    pub fn identity(&self) -> Element {
        match self {
            ElementKind::Scalar => Element::Scalar(0.0),
            ElementKind::Vector(n) => Element::Vector(DVector::zeros(*n)),
            ElementKind::Rotation => Element::Rotation(SO3::identity()),
        }
    }

    /// Random value; scalar and vector entries are uniform in [-1, 1)
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Element {
        match self {
            ElementKind::Scalar => Element::Scalar(rng.random_range(-1.0..1.0)),
            ElementKind::Vector(n) => {
                Element::Vector(DVector::from_fn(*n, |_, _| rng.random_range(-1.0..1.0)))
            }
            ElementKind::Rotation => Element::Rotation(SO3::random(rng)),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Scalar => write!(f, "scalar"),
            ElementKind::Vector(n) => write!(f, "vector{n}"),
            ElementKind::Rotation => write!(f, "rotation"),
        }
    }
}

/// A value held by one slot of a [`crate::state::State`].
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Scalar(f64),
    Vector(DVector<f64>),
    Rotation(SO3),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Scalar(_) => ElementKind::Scalar,
            Element::Vector(v) => ElementKind::Vector(v.len()),
            Element::Rotation(_) => ElementKind::Rotation,
        }
    }

    pub fn dim(&self) -> usize {
        self.kind().dim()
    }

    /// Generalized increment `self ⊞ delta`.
    ///
    /// `delta` must have exactly `self.dim()` entries.
    pub fn boxplus(&self, delta: &[f64]) -> GifResult<Element> {
        if delta.len() != self.dim() {
            return Err(GifError::dimension(
                format!("{} boxplus", self.kind()),
                self.dim(),
                delta.len(),
            ));
        }
        Ok(match self {
            Element::Scalar(s) => Element::Scalar(s + delta[0]),
            Element::Vector(v) => Element::Vector(v + DVector::from_column_slice(delta)),
            Element::Rotation(r) => {
                Element::Rotation(r.right_plus(&SO3Tangent::from_slice(delta)?, None, None))
            }
        })
    }

    /// Generalized difference `self ⊟ other`, written into `out`.
    pub fn boxminus_into(&self, other: &Element, out: &mut [f64]) -> GifResult<()> {
        if out.len() != self.dim() {
            return Err(GifError::dimension(
                format!("{} boxminus", self.kind()),
                self.dim(),
                out.len(),
            ));
        }
        match (self, other) {
            (Element::Scalar(a), Element::Scalar(b)) => out[0] = a - b,
            (Element::Vector(a), Element::Vector(b)) if a.len() == b.len() => {
                for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
                    *o = x - y;
                }
            }
            (Element::Rotation(a), Element::Rotation(b)) => {
                out.copy_from_slice(a.right_minus(b, None, None).axis_angle().as_slice());
            }
            _ => {
                return Err(GifError::InvalidElement(format!(
                    "cannot take the difference of {} and {}",
                    self.kind(),
                    other.kind()
                )))
            }
        }
        Ok(())
    }

    /// Generalized difference `self ⊟ other`.
    pub fn boxminus(&self, other: &Element) -> GifResult<DVector<f64>> {
        let mut out = DVector::zeros(self.dim());
        self.boxminus_into(other, out.as_mut_slice())?;
        Ok(out)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Element::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&DVector<f64>> {
        match self {
            Element::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rotation(&self) -> Option<&SO3> {
        match self {
            Element::Rotation(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_kind_dimensions() {
        assert_eq!(ElementKind::Scalar.dim(), 1);
        assert_eq!(ElementKind::Vector(4).dim(), 4);
        assert_eq!(ElementKind::Vector(0).dim(), 0);
        assert_eq!(ElementKind::Rotation.dim(), 3);
    }

    #[test]
    fn test_identity_values() {
        assert_eq!(ElementKind::Scalar.identity(), Element::Scalar(0.0));
        assert_eq!(
            ElementKind::Vector(2).identity(),
            Element::Vector(DVector::zeros(2))
        );
        assert_eq!(
            ElementKind::Rotation.identity(),
            Element::Rotation(SO3::identity())
        );
    }

    #[test]
    fn test_vector_boxplus_boxminus() -> GifResult<()> {
        let a = Element::Vector(DVector::from_vec(vec![1.0, 2.0, 3.0]));
        let b = a.boxplus(&[0.5, -1.0, 2.0])?;
        assert_eq!(b.boxminus(&a)?, DVector::from_vec(vec![0.5, -1.0, 2.0]));
        Ok(())
    }

    #[test]
    fn test_rotation_round_trip() -> GifResult<()> {
        let mut rng = StdRng::seed_from_u64(11);
        let a = ElementKind::Rotation.random(&mut rng);
        let delta = [0.3, -0.2, 0.1];
        let b = a.boxplus(&delta)?;
        let back = b.boxminus(&a)?;
        for (x, y) in back.iter().zip(delta.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_boxplus_wrong_length() {
        let a = Element::Scalar(1.0);
        assert!(matches!(
            a.boxplus(&[1.0, 2.0]),
            Err(GifError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_boxminus_kind_mismatch() {
        let a = Element::Scalar(1.0);
        let b = Element::Rotation(SO3::identity());
        assert!(matches!(a.boxminus(&b), Err(GifError::InvalidElement(_))));
    }

    #[test]
    fn test_accessors() {
        let s = Element::Scalar(2.5);
        assert_eq!(s.as_scalar(), Some(2.5));
        assert!(s.as_vector().is_none());
        assert!(s.as_rotation().is_none());
    }
}
