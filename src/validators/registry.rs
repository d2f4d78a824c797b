//! Element type registry
//!
//! The registry maps a [`SchemaIdentity`] to the descriptor of an element kind
//! for one target [`FileFormatVersion`], and owns the compiled content model
//! of every kind. It is built once per version, never mutated afterwards, and
//! shared by reference between validation runs.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::names::validate_ncname;
use crate::namespaces::{NamespaceId, NamespaceTable, SchemaIdentity};
use crate::versions::FileFormatVersion;

use super::compiler::CompiledParticle;
use super::particles::ParticleNode;
use super::semantic::SemanticConstraint;
use super::simple_types::SimpleType;

/// Reference to an element kind, by its prefixed name (e.g. `w:document`)
///
/// Cloning is cheap; equality and hashing follow the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKind(Arc<str>);

impl ElementKind {
    /// Create a kind reference
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the kind name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix part of the name
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(p, _)| p)
    }

    /// Local part of the name
    pub fn local_name(&self) -> &str {
        self.0.split_once(':').map_or(&self.0, |(_, l)| l)
    }
}

impl From<&str> for ElementKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ElementKind {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl Borrow<str> for ElementKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an element of a kind may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Capability {
    /// Child elements governed by a content model
    #[default]
    Composite,
    /// Typed text content
    LeafText,
    /// Nothing but attributes
    LeafEmpty,
}

impl Capability {
    /// Parse from a capability name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "composite" => Some(Self::Composite),
            "leafText" | "text" => Some(Self::LeafText),
            "leafEmpty" | "empty" => Some(Self::LeafEmpty),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Composite => write!(f, "composite"),
            Self::LeafText => write!(f, "leafText"),
            Self::LeafEmpty => write!(f, "leafEmpty"),
        }
    }
}

/// A declared attribute of an element kind
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Display name (`w:val`, or `val` when unqualified)
    pub name: Arc<str>,
    /// Namespace id; None for unqualified attributes
    pub namespace_id: Option<NamespaceId>,
    /// Local name
    pub local_name: Arc<str>,
    /// Value type
    pub value_type: SimpleType,
    /// Whether the attribute must be present
    pub required: bool,
    /// First version declaring the attribute
    pub since: Option<FileFormatVersion>,
}

impl AttributeDescriptor {
    /// Unqualified attribute
    pub fn new(local_name: &str, value_type: SimpleType) -> Self {
        Self {
            name: Arc::from(local_name),
            namespace_id: None,
            local_name: Arc::from(local_name),
            value_type,
            required: false,
            since: None,
        }
    }

    /// Namespace-qualified attribute, displayed with `prefix`
    pub fn qualified(
        prefix: &str,
        namespace_id: NamespaceId,
        local_name: &str,
        value_type: SimpleType,
    ) -> Self {
        Self {
            name: Arc::from(format!("{}:{}", prefix, local_name).as_str()),
            namespace_id: Some(namespace_id),
            local_name: Arc::from(local_name),
            value_type,
            required: false,
            since: None,
        }
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Only declared from `version` onwards
    pub fn since(mut self, version: FileFormatVersion) -> Self {
        self.since = Some(version);
        self
    }

    /// Check if declared under a version
    pub fn is_available(&self, version: FileFormatVersion) -> bool {
        self.since.map_or(true, |since| version.includes(since))
    }

    /// Check if this descriptor declares (namespace, local name)
    pub fn matches(&self, namespace_id: Option<NamespaceId>, local_name: &str) -> bool {
        self.namespace_id == namespace_id && &*self.local_name == local_name
    }
}

/// Schema metadata of one element kind
#[derive(Debug, Clone)]
pub struct ElementDescriptor {
    /// Kind reference
    pub kind: ElementKind,
    /// Schema identity
    pub identity: SchemaIdentity,
    /// What instances may contain
    pub capability: Capability,
    /// Content model of composite kinds
    pub content_model: Option<Arc<ParticleNode>>,
    /// Type of the text of leaf-text kinds
    pub text_type: Option<SimpleType>,
    /// Declared attributes
    pub attributes: Vec<AttributeDescriptor>,
    /// Cross-element rules
    pub constraints: Vec<SemanticConstraint>,
    /// First version defining the kind
    pub min_version: FileFormatVersion,
}

impl ElementDescriptor {
    /// Create a descriptor with no content model, attributes or constraints
    pub fn new(kind: impl Into<ElementKind>, identity: SchemaIdentity, capability: Capability) -> Self {
        Self {
            kind: kind.into(),
            identity,
            capability,
            content_model: None,
            text_type: None,
            attributes: Vec::new(),
            constraints: Vec::new(),
            min_version: FileFormatVersion::Office2007,
        }
    }

    /// Set the content model
    pub fn with_content(mut self, particle: ParticleNode) -> Self {
        self.content_model = Some(Arc::new(particle));
        self
    }

    /// Set the text type
    pub fn with_text(mut self, value_type: SimpleType) -> Self {
        self.text_type = Some(value_type);
        self
    }

    /// Declare an attribute
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attach a semantic constraint
    pub fn with_constraint(mut self, constraint: SemanticConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Only defined from `version` onwards
    pub fn since(mut self, version: FileFormatVersion) -> Self {
        self.min_version = version;
        self
    }

    /// Check if defined under a version
    pub fn is_available(&self, version: FileFormatVersion) -> bool {
        version.includes(self.min_version)
    }

    /// Find the attribute declared for (namespace, local name)
    pub fn attribute(
        &self,
        namespace_id: Option<NamespaceId>,
        local_name: &str,
    ) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.matches(namespace_id, local_name))
    }

    /// Find an attribute by display name
    pub fn attribute_named(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| &*a.name == name)
    }
}

#[derive(Debug)]
struct RegistryEntry {
    descriptor: Arc<ElementDescriptor>,
    particle: Option<CompiledParticle>,
}

/// Table from schema identity to element kind, for one version
#[derive(Debug)]
pub struct Registry {
    version: FileFormatVersion,
    namespaces: Arc<NamespaceTable>,
    by_identity: HashMap<SchemaIdentity, ElementKind>,
    entries: IndexMap<ElementKind, RegistryEntry>,
}

impl Registry {
    /// Build the table for a version
    ///
    /// Descriptors not defined in `version` are skipped. Two descriptors
    /// sharing a schema identity fail the build.
    pub fn build<I>(
        version: FileFormatVersion,
        namespaces: Arc<NamespaceTable>,
        descriptors: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<ElementDescriptor>>,
    {
        let mut by_identity: HashMap<SchemaIdentity, ElementKind> = HashMap::new();
        let mut entries: IndexMap<ElementKind, RegistryEntry> = IndexMap::new();
        let mut skipped = 0usize;

        for descriptor in descriptors {
            if !descriptor.is_available(version) {
                skipped += 1;
                continue;
            }

            validate_ncname(descriptor.identity.local_name())?;
            if namespaces.get(descriptor.identity.namespace_id).is_none() {
                return Err(Error::Namespace(format!(
                    "element '{}' uses unregistered namespace id {}",
                    descriptor.kind, descriptor.identity.namespace_id
                )));
            }

            if let Some(first) = by_identity.get(&descriptor.identity) {
                return Err(Error::DuplicateIdentity {
                    identity: descriptor.identity.clone(),
                    first: first.to_string(),
                    second: descriptor.kind.to_string(),
                });
            }
            if entries.contains_key(&descriptor.kind) {
                return Err(Error::Catalog(format!(
                    "element kind '{}' is defined twice",
                    descriptor.kind
                )));
            }

            let particle = match descriptor.capability {
                Capability::Composite => {
                    let model = descriptor
                        .content_model
                        .clone()
                        .unwrap_or_else(|| Arc::new(ParticleNode::sequence(1, 1, Vec::new())));
                    Some(CompiledParticle::new(model, version))
                }
                Capability::LeafText | Capability::LeafEmpty => None,
            };

            by_identity.insert(descriptor.identity.clone(), descriptor.kind.clone());
            entries.insert(
                descriptor.kind.clone(),
                RegistryEntry {
                    descriptor,
                    particle,
                },
            );
        }

        info!(
            version = %version,
            kinds = entries.len(),
            skipped,
            "built element registry"
        );

        Ok(Self {
            version,
            namespaces,
            by_identity,
            entries,
        })
    }

    /// Get the target version
    pub fn version(&self) -> FileFormatVersion {
        self.version
    }

    /// Get the namespace table
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no kind is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create an empty element for (namespace id, tag name)
    ///
    /// Returns None when the pair is not registered for this version.
    pub fn create(&self, namespace_id: NamespaceId, local_name: &str) -> Option<Element> {
        let identity = SchemaIdentity::new(namespace_id, local_name);
        self.kind_of(&identity).and_then(|kind| self.instantiate(kind))
    }

    /// Kind registered under an identity
    pub fn kind_of(&self, identity: &SchemaIdentity) -> Option<&ElementKind> {
        self.by_identity.get(identity)
    }

    /// Descriptor of a kind
    pub fn lookup(&self, kind: &ElementKind) -> Option<&ElementDescriptor> {
        self.entries.get(kind).map(|e| e.descriptor.as_ref())
    }

    /// Descriptor of a kind, by name
    pub fn lookup_name(&self, name: &str) -> Option<&ElementDescriptor> {
        self.entries.get(name).map(|e| e.descriptor.as_ref())
    }

    /// Compiled content model of a composite kind
    pub fn compiled_particle(&self, kind: &ElementKind) -> Option<&CompiledParticle> {
        self.entries.get(kind).and_then(|e| e.particle.as_ref())
    }

    /// Check if a kind is registered
    pub fn contains(&self, kind: &ElementKind) -> bool {
        self.entries.contains_key(kind)
    }

    /// Create an empty element of a registered kind
    pub fn instantiate(&self, kind: &ElementKind) -> Option<Element> {
        self.entries.get_key_value(kind).map(|(kind, entry)| {
            Element::typed(
                kind.clone(),
                entry.descriptor.identity.clone(),
                entry.descriptor.capability,
            )
        })
    }

    /// Iterate over descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.entries.values().map(|e| e.descriptor.as_ref())
    }
}

/// One lazily built registry per file format version
///
/// Each version's registry is built at most once; reads afterwards take no
/// lock.
#[derive(Debug)]
pub struct RegistryCache {
    namespaces: Arc<NamespaceTable>,
    descriptors: Vec<Arc<ElementDescriptor>>,
    slots: [OnceCell<Arc<Registry>>; FileFormatVersion::COUNT],
}

impl RegistryCache {
    /// Create a cache over a descriptor set
    pub fn new(namespaces: Arc<NamespaceTable>, descriptors: Vec<Arc<ElementDescriptor>>) -> Self {
        Self {
            namespaces,
            descriptors,
            slots: Default::default(),
        }
    }

    /// Get the registry for a version, building it on first use
    pub fn get(&self, version: FileFormatVersion) -> Result<Arc<Registry>> {
        self.slots[version.index()]
            .get_or_try_init(|| {
                Registry::build(
                    version,
                    Arc::clone(&self.namespaces),
                    self.descriptors.iter().cloned(),
                )
                .map(Arc::new)
            })
            .map(Arc::clone)
    }

    /// Check whether a version's registry has been built
    pub fn is_built(&self, version: FileFormatVersion) -> bool {
        self.slots[version.index()].get().is_some()
    }

    /// Get the namespace table
    pub fn namespaces(&self) -> &Arc<NamespaceTable> {
        &self.namespaces
    }

    /// Get the descriptor set
    pub fn descriptors(&self) -> &[Arc<ElementDescriptor>] {
        &self.descriptors
    }
}
