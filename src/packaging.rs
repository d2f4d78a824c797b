//! Package collaborator
//!
//! The validator never owns part storage. It reads parts, their processing
//! settings and their relationships through the [`PackageStore`] trait;
//! [`MemoryPackage`] is the in-memory implementation used by the CLI and the
//! tests.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::documents::Element;
use crate::versions::FileFormatVersion;

/// Document family a package belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    /// WordprocessingML
    Word,
    /// SpreadsheetML
    Spreadsheet,
    /// PresentationML
    Presentation,
    /// Any family
    #[default]
    All,
}

impl ApplicationType {
    /// Check whether a rule tagged with `self` applies under `target`
    pub fn applies_to(self, target: ApplicationType) -> bool {
        self == ApplicationType::All || target == ApplicationType::All || self == target
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word => write!(f, "word"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
            Self::Presentation => write!(f, "presentation"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Markup compatibility processing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    /// No markup compatibility processing
    #[default]
    NoProcess,
    /// Process parts as they are loaded
    ProcessLoadedPartsOnly,
    /// Process every part
    ProcessAllParts,
}

/// How markup compatibility content was processed when the package was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkupCompatibilityProcessSettings {
    /// Processing mode
    pub process_mode: ProcessMode,
    /// Version the content was processed for
    pub target_version: FileFormatVersion,
}

impl MarkupCompatibilityProcessSettings {
    /// Create processing settings
    pub fn new(process_mode: ProcessMode, target_version: FileFormatVersion) -> Self {
        Self {
            process_mode,
            target_version,
        }
    }
}

/// Settings a package was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenSettings {
    /// Markup compatibility processing
    pub markup_compatibility: MarkupCompatibilityProcessSettings,
}

/// A relationship id and the part it addresses
///
/// Equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdPartPair {
    /// Relationship id (`rId1`)
    pub relationship_id: String,
    /// URI of the target part
    pub part_uri: String,
}

impl IdPartPair {
    /// Create a pair
    pub fn new(relationship_id: impl Into<String>, part_uri: impl Into<String>) -> Self {
        Self {
            relationship_id: relationship_id.into(),
            part_uri: part_uri.into(),
        }
    }
}

/// A part: a URI, an element tree and outgoing relationships
#[derive(Debug, Clone)]
pub struct Part {
    uri: String,
    root: Option<Element>,
    relationships: Vec<IdPartPair>,
}

impl Part {
    /// Create a part with an element tree
    pub fn new(uri: impl Into<String>, root: Element) -> Self {
        Self {
            uri: uri.into(),
            root: Some(root),
            relationships: Vec::new(),
        }
    }

    /// Create a part with no XML content (e.g. an image)
    pub fn binary(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            root: None,
            relationships: Vec::new(),
        }
    }

    /// Add a relationship
    pub fn with_relationship(mut self, pair: IdPartPair) -> Self {
        self.relationships.push(pair);
        self
    }

    /// Get the URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Get the relationships
    pub fn relationships(&self) -> &[IdPartPair] {
        &self.relationships
    }
}

/// Read access to a package
pub trait PackageStore {
    /// Document family of the package
    fn application_type(&self) -> ApplicationType;

    /// Settings the package was opened with
    fn open_settings(&self) -> &OpenSettings;

    /// URIs of all parts, in package order
    fn part_uris(&self) -> Vec<String>;

    /// Get a part by URI
    fn part(&self, uri: &str) -> Option<&Part>;

    /// Resolve a relationship id of a part
    fn resolve_relationship(&self, part_uri: &str, relationship_id: &str) -> Option<&IdPartPair> {
        self.part(part_uri)?
            .relationships()
            .iter()
            .find(|pair| pair.relationship_id == relationship_id)
    }
}

/// In-memory package
#[derive(Debug, Clone, Default)]
pub struct MemoryPackage {
    application_type: ApplicationType,
    settings: OpenSettings,
    parts: IndexMap<String, Part>,
}

impl MemoryPackage {
    /// Create an empty package of a family
    pub fn new(application_type: ApplicationType) -> Self {
        Self {
            application_type,
            settings: OpenSettings::default(),
            parts: IndexMap::new(),
        }
    }

    /// Set the open settings
    pub fn with_settings(mut self, settings: OpenSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a part, replacing one with the same URI
    pub fn add_part(&mut self, part: Part) {
        self.parts.insert(part.uri.clone(), part);
    }

    /// Builder form of [`MemoryPackage::add_part`]
    pub fn with_part(mut self, part: Part) -> Self {
        self.add_part(part);
        self
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the package has no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl PackageStore for MemoryPackage {
    fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    fn open_settings(&self) -> &OpenSettings {
        &self.settings
    }

    fn part_uris(&self) -> Vec<String> {
        self.parts.keys().cloned().collect()
    }

    fn part(&self, uri: &str) -> Option<&Part> {
        self.parts.get(uri)
    }
}
