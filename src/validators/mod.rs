//! OOXML validators
//!
//! This module contains the element registry, the particle compiler and the
//! validation engine built on them.

// Schema data
pub mod particles;
pub mod simple_types;
pub mod registry;
pub mod compiler;

// Validation engine
pub mod exceptions;
pub mod validation;
pub mod values;
pub mod schema_validation;
pub mod semantic;
pub mod document_validation;

// Re-exports
pub use compiler::{CompiledParticle, ParticleCompiler, ParticlePath};
pub use document_validation::{OpenXmlValidator, ValidationErrors};
pub use exceptions::{NodeRef, ValidationErrorInfo, ValidationErrorType};
pub use particles::{Occurs, ParticleNode, ParticleType};
pub use registry::{
    AttributeDescriptor, Capability, ElementDescriptor, ElementKind, Registry, RegistryCache,
};
pub use schema_validation::SchemaValidator;
pub use semantic::{ConstraintRule, SemanticConstraint, SemanticValidator};
pub use simple_types::{Facet, PrimitiveType, SimpleType};
pub use validation::{ValidationContext, ValueFrame};
