//! Error types for ooxml-schema
//!
//! This module defines the hard failures raised by the library. Findings about
//! the content being validated are not errors: they are reported as
//! [`ValidationErrorInfo`](crate::validators::ValidationErrorInfo) values.

use std::fmt;
use thiserror::Error;

use crate::namespaces::SchemaIdentity;
use crate::versions::FileFormatVersion;

/// Result type alias using the ooxml-schema Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ooxml-schema operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required input is absent
    #[error("value cannot be absent: {0}")]
    ArgumentNull(String),

    /// An input value or kind is outside the accepted set
    #[error("argument '{name}' is out of range: {message}")]
    ArgumentOutOfRange {
        /// Name of the offending argument
        name: String,
        /// Why the value was rejected
        message: String,
    },

    /// The document declares a different target version than the validator
    #[error(
        "the document is processed for {document} but the validator targets {validator}"
    )]
    VersionMismatch {
        /// Version declared by the document's processing settings
        document: FileFormatVersion,
        /// Version configured on the validator
        validator: FileFormatVersion,
    },

    /// The element kind is not defined in the target version
    #[error("element '{kind}' is not defined in {version}")]
    NotInVersion {
        /// Kind name of the element
        kind: String,
        /// Target version
        version: FileFormatVersion,
    },

    /// Two element descriptors claim the same schema identity
    #[error("schema identity {identity} is registered by both '{first}' and '{second}'")]
    DuplicateIdentity {
        /// The colliding identity
        identity: SchemaIdentity,
        /// Kind registered first
        first: String,
        /// Kind that collided
        second: String,
    },

    /// Schema data parsing/building error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Schema catalog error
    #[error("catalog error: {0}")]
    Catalog(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of hard failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required input absent
    ArgumentNull,
    /// Input outside the accepted set
    ArgumentOutOfRange,
    /// Caller configuration mistake or inconsistent schema data
    InvalidOperation,
    /// Malformed input data (schema catalog, XML text, I/O)
    Content,
}

impl Error {
    /// Create an out-of-range error
    pub fn out_of_range(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ArgumentOutOfRange {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ArgumentNull(_) => ErrorKind::ArgumentNull,
            Error::ArgumentOutOfRange { .. } => ErrorKind::ArgumentOutOfRange,
            Error::VersionMismatch { .. }
            | Error::NotInVersion { .. }
            | Error::DuplicateIdentity { .. } => ErrorKind::InvalidOperation,
            _ => ErrorKind::Content,
        }
    }
}

/// Schema data parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema data
    pub location: Option<String>,
    /// Source snippet that caused the error
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}
