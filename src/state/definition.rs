//! State definitions: the ordered, named element layout shared by states.

use crate::error::{GifError, GifResult};
use crate::state::element::ElementKind;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Name and kind of one element of a state definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub name: String,
    pub kind: ElementKind,
}

/// Ordered list of named elements describing a manifold composite.
///
/// Offsets into the flat tangent vector are the prefix sums of the element
/// dimensions. Definitions are immutable once built and shared through `Arc`
/// by every state that conforms to them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateDefinition {
    elements: Vec<ElementDescriptor>,
    offsets: Vec<usize>,
    dim: usize,
}

impl StateDefinition {
    pub fn builder() -> StateDefinitionBuilder {
        StateDefinitionBuilder::default()
    }

    /// Definition without any element (total dimension 0)
    pub fn empty() -> Arc<StateDefinition> {
        Arc::new(StateDefinition::default())
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Total tangent dimension
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn elements(&self) -> &[ElementDescriptor] {
        &self.elements
    }

    pub fn descriptor(&self, index: usize) -> GifResult<&ElementDescriptor> {
        self.elements.get(index).ok_or_else(|| {
            GifError::InvalidElement(format!(
                "element index {index} out of range for a definition with {} elements",
                self.len()
            ))
        })
    }

    pub fn kind(&self, index: usize) -> GifResult<ElementKind> {
        Ok(self.descriptor(index)?.kind)
    }

    pub fn name(&self, index: usize) -> GifResult<&str> {
        Ok(self.descriptor(index)?.name.as_str())
    }

    /// Offset of element `index` in the flat tangent vector
    pub fn offset(&self, index: usize) -> GifResult<usize> {
        self.descriptor(index)?;
        Ok(self.offsets[index])
    }

    /// Tangent range `offset..offset + dim` of element `index`
    pub fn range(&self, index: usize) -> GifResult<Range<usize>> {
        let kind = self.kind(index)?;
        let start = self.offsets[index];
        Ok(start..start + kind.dim())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Like [`Self::index_of`] but reports unknown names as errors
    pub fn require(&self, name: &str) -> GifResult<usize> {
        self.index_of(name).ok_or_else(|| {
            GifError::InvalidElement(format!("no element named '{name}' in {self}"))
        })
    }

    /// Two definitions match when their element kinds agree position by position.
    pub fn matches(&self, other: &StateDefinition) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(a, b)| a.kind == b.kind)
    }
}

impl fmt::Display for StateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", element.name, element.kind)?;
        }
        write!(f, "]")
    }
}

/// Builder for [`StateDefinition`].
///
/// ```
/// use gif_residual::state::StateDefinition;
///
/// let definition = StateDefinition::builder()
///     .rotation("attitude")
///     .vector("velocity", 3)
///     .scalar("clock_bias")
///     .build()
///     .unwrap();
/// assert_eq!(definition.dim(), 7);
/// assert_eq!(definition.offset(2).unwrap(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StateDefinitionBuilder {
    elements: Vec<ElementDescriptor>,
}

impl StateDefinitionBuilder {
    pub fn element(mut self, name: impl Into<String>, kind: ElementKind) -> Self {
        self.elements.push(ElementDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.element(name, ElementKind::Scalar)
    }

    pub fn vector(self, name: impl Into<String>, len: usize) -> Self {
        self.element(name, ElementKind::Vector(len))
    }

    pub fn rotation(self, name: impl Into<String>) -> Self {
        self.element(name, ElementKind::Rotation)
    }

    /// Finish the definition; element names must be unique.
    pub fn build(self) -> GifResult<Arc<StateDefinition>> {
        let mut seen = HashSet::new();
        for element in &self.elements {
            if !seen.insert(element.name.as_str()) {
                return Err(GifError::InvalidElement(format!(
                    "duplicate element name '{}'",
                    element.name
                )));
            }
        }

        let mut offsets = Vec::with_capacity(self.elements.len());
        let mut dim = 0;
        for element in &self.elements {
            offsets.push(dim);
            dim += element.kind.dim();
        }

        Ok(Arc::new(StateDefinition {
            elements: self.elements,
            offsets,
            dim,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_definition() -> GifResult<Arc<StateDefinition>> {
        StateDefinition::builder()
            .vector("position", 3)
            .rotation("attitude")
            .scalar("scale")
            .build()
    }

    #[test]
    fn test_offsets_are_prefix_sums() -> GifResult<()> {
        let definition = pose_definition()?;
        assert_eq!(definition.len(), 3);
        assert_eq!(definition.dim(), 7);
        assert_eq!(definition.offset(0)?, 0);
        assert_eq!(definition.offset(1)?, 3);
        assert_eq!(definition.offset(2)?, 6);
        assert_eq!(definition.range(1)?, 3..6);
        Ok(())
    }

    #[test]
    fn test_name_lookup() -> GifResult<()> {
        let definition = pose_definition()?;
        assert_eq!(definition.index_of("attitude"), Some(1));
        assert_eq!(definition.index_of("velocity"), None);
        assert!(definition.require("velocity").is_err());
        assert_eq!(definition.name(2)?, "scale");
        Ok(())
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = StateDefinition::builder()
            .scalar("a")
            .vector("a", 2)
            .build();
        assert!(matches!(result, Err(GifError::InvalidElement(_))));
    }

    #[test]
    fn test_empty_definition() {
        let definition = StateDefinition::empty();
        assert!(definition.is_empty());
        assert_eq!(definition.dim(), 0);
        assert!(definition.offset(0).is_err());
    }

    #[test]
    fn test_structural_match_ignores_names() -> GifResult<()> {
        let a = pose_definition()?;
        let b = StateDefinition::builder()
            .vector("p", 3)
            .rotation("q")
            .scalar("s")
            .build()?;
        let c = StateDefinition::builder()
            .vector("p", 2)
            .rotation("q")
            .scalar("s")
            .build()?;
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        Ok(())
    }

    #[test]
    fn test_display() -> GifResult<()> {
        let definition = pose_definition()?;
        assert_eq!(
            definition.to_string(),
            "[position: vector3, attitude: rotation, scale: scalar]"
        );
        Ok(())
    }
}
