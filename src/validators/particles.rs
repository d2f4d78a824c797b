//! Particle model
//!
//! A content model is a tree of particles: element leaves naming a kind, and
//! composite nodes (sequence, choice, all) grouping ordered children. Every
//! particle carries occurrence bounds.

use std::fmt;

use crate::error::{ParseError, Result};
use crate::versions::FileFormatVersion;

use super::registry::ElementKind;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Convert schema-data bounds where a max of 0 means unbounded
    pub fn from_schema(min: u32, max: u32) -> Result<Self> {
        let max = if max == 0 { None } else { Some(max) };
        if let Some(max) = max {
            if min > max {
                return Err(ParseError::new(format!(
                    "minOccurs ({}) must be lesser or equal than maxOccurs ({})",
                    min, max
                ))
                .into());
            }
        }
        Ok(Self { min, max })
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle may repeat
    pub fn is_repeatable(&self) -> bool {
        self.max != Some(1) && self.max != Some(0)
    }

    /// Check if occurrence count is under the minimum
    pub fn is_missing(&self, count: u32) -> bool {
        count < self.min
    }

    /// Check if occurrence count exceeds the maximum
    pub fn is_exceeded(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count > max,
            None => false,
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

/// Helper for combining occurrence bounds along a particle path
#[derive(Debug, Clone, Copy)]
pub struct OccursCalculator {
    /// Calculated minimum occurrences
    pub min_occurs: u32,
    /// Calculated maximum occurrences (None = unbounded)
    pub max_occurs: Option<u32>,
}

impl OccursCalculator {
    /// Create a calculator initialized to (1, 1)
    pub fn new() -> Self {
        Self {
            min_occurs: 1,
            max_occurs: Some(1),
        }
    }

    /// Get as Occurs
    pub fn occurs(&self) -> Occurs {
        Occurs::new(self.min_occurs, self.max_occurs)
    }

    /// Multiply by a nested particle's occurs
    pub fn multiply(&mut self, other: Occurs) {
        self.min_occurs = self.min_occurs.saturating_mul(other.min);
        match (self.max_occurs, other.max) {
            (None, Some(0)) => self.max_occurs = Some(0),
            (Some(0), _) => self.max_occurs = Some(0),
            (Some(_), None) => self.max_occurs = None,
            (None, _) => {}
            (Some(a), Some(b)) => self.max_occurs = Some(a.saturating_mul(b)),
        }
    }
}

impl Default for OccursCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite particle compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParticleType {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set, each member at most once
    All,
}

impl ParticleType {
    /// Parse from a compositor name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Whether members tie for ordering purposes
    pub fn is_unordered(&self) -> bool {
        matches!(self, Self::Choice | Self::All)
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Leaf particle naming an element kind
#[derive(Debug, Clone, PartialEq)]
pub struct ElementParticle {
    /// Referenced kind
    pub kind: ElementKind,
    /// Occurrence constraints
    pub occurs: Occurs,
    /// First version in which this particle exists
    pub version_gate: Option<FileFormatVersion>,
}

impl ElementParticle {
    /// Check if the particle exists under a compile version
    pub fn is_available(&self, version: FileFormatVersion) -> bool {
        self.version_gate.map_or(true, |gate| version.includes(gate))
    }
}

/// Sequence, choice or all over ordered children
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeParticle {
    /// Compositor
    pub particle_type: ParticleType,
    /// Occurrence constraints
    pub occurs: Occurs,
    /// Ordered children
    pub children: Vec<ParticleNode>,
}

/// A node of a content model tree
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleNode {
    /// Element leaf
    Element(ElementParticle),
    /// Composite node
    Composite(CompositeParticle),
}

impl ParticleNode {
    /// Element leaf with schema-data bounds (max 0 = unbounded)
    ///
    /// # Panics
    /// Panics if `min > max` for a bounded `max`. Use [`Occurs::from_schema`]
    /// with [`ParticleNode::element_with`] for untrusted data.
    pub fn element(kind: impl Into<ElementKind>, min: u32, max: u32) -> Self {
        Self::element_with(kind, occurs_or_panic(min, max), None)
    }

    /// Element leaf only present from `since` onwards
    pub fn gated(
        kind: impl Into<ElementKind>,
        min: u32,
        max: u32,
        since: FileFormatVersion,
    ) -> Self {
        Self::element_with(kind, occurs_or_panic(min, max), Some(since))
    }

    /// Element leaf from already validated parts
    pub fn element_with(
        kind: impl Into<ElementKind>,
        occurs: Occurs,
        version_gate: Option<FileFormatVersion>,
    ) -> Self {
        ParticleNode::Element(ElementParticle {
            kind: kind.into(),
            occurs,
            version_gate,
        })
    }

    /// Composite node from already validated parts
    pub fn composite(particle_type: ParticleType, occurs: Occurs, children: Vec<ParticleNode>) -> Self {
        ParticleNode::Composite(CompositeParticle {
            particle_type,
            occurs,
            children,
        })
    }

    /// Sequence with schema-data bounds
    pub fn sequence(min: u32, max: u32, children: Vec<ParticleNode>) -> Self {
        Self::composite(ParticleType::Sequence, occurs_or_panic(min, max), children)
    }

    /// Choice with schema-data bounds
    pub fn choice(min: u32, max: u32, children: Vec<ParticleNode>) -> Self {
        Self::composite(ParticleType::Choice, occurs_or_panic(min, max), children)
    }

    /// All group with schema-data bounds
    pub fn all(min: u32, max: u32, children: Vec<ParticleNode>) -> Self {
        Self::composite(ParticleType::All, occurs_or_panic(min, max), children)
    }

    /// Get the occurrence constraints
    pub fn occurs(&self) -> Occurs {
        match self {
            ParticleNode::Element(e) => e.occurs,
            ParticleNode::Composite(c) => c.occurs,
        }
    }

    /// Visit every element leaf in declaration order
    pub fn for_each_element<'a>(&'a self, f: &mut dyn FnMut(&'a ElementParticle)) {
        match self {
            ParticleNode::Element(e) => f(e),
            ParticleNode::Composite(c) => {
                for child in &c.children {
                    child.for_each_element(f);
                }
            }
        }
    }
}

fn occurs_or_panic(min: u32, max: u32) -> Occurs {
    match Occurs::from_schema(min, max) {
        Ok(occurs) => occurs,
        Err(e) => panic!("invalid particle bounds: {}", e),
    }
}
