//! # ooxml-schema
//!
//! Schema-driven element registry, particle compiler and validation engine for
//! Office Open XML (OOXML) documents.
//!
//! ## Features
//!
//! - Element registry mapping (namespace, tag) pairs to typed element kinds, per file format version
//! - Content models compiled once into ordered lookups (child ordering and placement)
//! - Structural validation: ordering, cardinality, attributes and simple-type values
//! - Semantic validation: uniqueness, references and relationship ids
//! - Bounded, lazily produced diagnostics for packages, parts and single elements
//! - Schema catalogs built in code or loaded from JSON
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ooxml_schema::catalog::SchemaCatalog;
//! use ooxml_schema::documents::Document;
//! use ooxml_schema::validators::OpenXmlValidator;
//!
//! let cache = Arc::new(SchemaCatalog::wordprocessing_sample()?.into_cache());
//! let validator = OpenXmlValidator::new(cache);
//! let registry = validator.registry()?;
//!
//! let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
//!   <w:body><w:sectPr/><w:p/></w:body>
//! </w:document>"#;
//! let document = Document::parse(xml, &registry)?;
//!
//! let errors: Vec<_> = validator.validate_element(document.root())?.collect();
//! assert_eq!(errors[0].id, "Sch_UnexpectedElementContent");
//! # Ok::<(), ooxml_schema::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod versions;

// Names and namespaces
pub mod namespaces;
pub mod names;

// Object model and package collaborator
pub mod documents;
pub mod packaging;

// Schema data and configuration
pub mod catalog;
pub mod settings;

// Registry, compiler and validation engine
pub mod validators;

// Re-exports for convenience
pub use catalog::SchemaCatalog;
pub use documents::{Document, Element};
pub use error::{Error, ErrorKind, Result};
pub use settings::ValidationSettings;
pub use validators::{OpenXmlValidator, ValidationErrorInfo};
pub use versions::FileFormatVersion;

/// Version of the ooxml-schema library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
