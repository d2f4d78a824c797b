//! Namespaces and schema identities
//!
//! OOXML names every namespace it knows with a small integer id. An element
//! kind is identified by the pair (namespace id, local tag name); that pair is
//! the [`SchemaIdentity`] used as the registry key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::error::{Error, Result};

/// Markup compatibility namespace
pub const MC_NAMESPACE: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Relationships namespace used by `r:id` style attributes
pub const RELATIONSHIPS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

lazy_static! {
    /// Well-known OOXML namespaces: (id, prefix, uri)
    static ref STANDARD_NAMESPACES: Vec<(u8, &'static str, &'static str)> = vec![
        (1, "xmlns", XMLNS_NAMESPACE),
        (2, "xml", XML_NAMESPACE),
        (5, "mc", MC_NAMESPACE),
        (10, "a", "http://schemas.openxmlformats.org/drawingml/2006/main"),
        (15, "lc", "http://schemas.openxmlformats.org/drawingml/2006/lockedCanvas"),
        (19, "r", RELATIONSHIPS_NAMESPACE),
        (22, "x", "http://schemas.openxmlformats.org/spreadsheetml/2006/main"),
        (23, "w", "http://schemas.openxmlformats.org/wordprocessingml/2006/main"),
        (24, "p", "http://schemas.openxmlformats.org/presentationml/2006/main"),
        (52, "w14", "http://schemas.microsoft.com/office/word/2010/wordml"),
        (69, "w15", "http://schemas.microsoft.com/office/word/2012/wordml"),
    ];
}

/// Small integer naming a known namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub u8);

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an element kind: namespace id plus local tag name
///
/// Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaIdentity {
    /// Namespace id
    pub namespace_id: NamespaceId,
    /// Local tag name
    pub local_name: Arc<str>,
}

impl SchemaIdentity {
    /// Create a new identity
    pub fn new(namespace_id: NamespaceId, local_name: impl AsRef<str>) -> Self {
        Self {
            namespace_id,
            local_name: Arc::from(local_name.as_ref()),
        }
    }

    /// Get the local name
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.namespace_id, self.local_name)
    }
}

/// Qualified name - namespace URI plus local name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// A registered namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Namespace id
    pub id: NamespaceId,
    /// Conventional prefix
    pub prefix: String,
    /// Namespace URI
    pub uri: String,
}

/// Bidirectional table between namespace URIs, prefixes and ids
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    entries: IndexMap<NamespaceId, NamespaceEntry>,
    by_uri: HashMap<String, NamespaceId>,
    by_prefix: HashMap<String, NamespaceId>,
}

impl NamespaceTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the well-known OOXML namespaces
    pub fn standard() -> Self {
        let mut table = Self::new();
        for (id, prefix, uri) in STANDARD_NAMESPACES.iter() {
            // ids and URIs in the built-in list are distinct
            let _ = table.insert(NamespaceId(*id), *prefix, *uri);
        }
        table
    }

    /// Register a namespace
    ///
    /// Registering the same (id, uri) twice is a no-op; reusing an id or URI
    /// for something else is an error.
    pub fn insert(
        &mut self,
        id: NamespaceId,
        prefix: impl Into<String>,
        uri: impl Into<String>,
    ) -> Result<()> {
        let prefix = prefix.into();
        let uri = uri.into();

        if let Some(existing) = self.entries.get(&id) {
            if existing.uri == uri {
                return Ok(());
            }
            return Err(Error::Namespace(format!(
                "namespace id {} is already bound to '{}'",
                id, existing.uri
            )));
        }
        if let Some(existing) = self.by_uri.get(&uri) {
            return Err(Error::Namespace(format!(
                "namespace '{}' is already registered with id {}",
                uri, existing
            )));
        }

        self.by_uri.insert(uri.clone(), id);
        self.by_prefix.entry(prefix.clone()).or_insert(id);
        self.entries.insert(id, NamespaceEntry { id, prefix, uri });
        Ok(())
    }

    /// Look up the id of a namespace URI
    pub fn id_of(&self, uri: &str) -> Option<NamespaceId> {
        self.by_uri.get(uri).copied()
    }

    /// Look up the id bound to a conventional prefix
    pub fn id_of_prefix(&self, prefix: &str) -> Option<NamespaceId> {
        self.by_prefix.get(prefix).copied()
    }

    /// Get the entry for an id
    pub fn get(&self, id: NamespaceId) -> Option<&NamespaceEntry> {
        self.entries.get(&id)
    }

    /// Get the URI for an id
    pub fn uri(&self, id: NamespaceId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.uri.as_str())
    }

    /// Resolve a `prefix:local` string using conventional prefixes
    pub fn identity(&self, prefixed_name: &str) -> Result<SchemaIdentity> {
        let (prefix, local) = prefixed_name.split_once(':').ok_or_else(|| {
            Error::Namespace(format!("'{}' has no namespace prefix", prefixed_name))
        })?;
        let id = self
            .id_of_prefix(prefix)
            .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
        Ok(SchemaIdentity::new(id, local))
    }

    /// Number of registered namespaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &NamespaceEntry> {
        self.entries.values()
    }
}

/// In-scope prefix bindings while reading a document
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    prefixes: HashMap<String, String>,
    default_namespace: Option<String>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => Some(XML_NAMESPACE),
            "xmlns" => Some(XMLNS_NAMESPACE),
            _ => self.prefixes.get(prefix).map(|s| s.as_str()),
        }
    }

    /// Resolve an element name (`prefix:local` or `local`) to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName {
                namespace: self.default_namespace.clone(),
                local_name: prefixed_name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_equality_is_structural() {
        let a = SchemaIdentity::new(NamespaceId(23), "document");
        let b = SchemaIdentity::new(NamespaceId(23), String::from("document"));
        let c = SchemaIdentity::new(NamespaceId(24), "document");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_standard_table() {
        let table = NamespaceTable::standard();
        let w = table
            .id_of("http://schemas.openxmlformats.org/wordprocessingml/2006/main")
            .unwrap();
        assert_eq!(w, NamespaceId(23));
        assert_eq!(table.id_of_prefix("mc"), Some(NamespaceId(5)));
        assert_eq!(table.uri(NamespaceId(19)), Some(RELATIONSHIPS_NAMESPACE));
    }

    #[test]
    fn test_table_rejects_conflicts() {
        let mut table = NamespaceTable::new();
        table.insert(NamespaceId(1), "a", "urn:a").unwrap();
        table.insert(NamespaceId(1), "a", "urn:a").unwrap();
        assert!(table.insert(NamespaceId(1), "b", "urn:b").is_err());
        assert!(table.insert(NamespaceId(2), "b", "urn:a").is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_identity_from_prefixed_name() {
        let table = NamespaceTable::standard();
        let id = table.identity("w:body").unwrap();
        assert_eq!(id, SchemaIdentity::new(NamespaceId(23), "body"));
        assert!(table.identity("body").is_err());
        assert!(table.identity("zz:body").is_err());
    }

    #[test]
    fn test_context_resolve() {
        let mut ctx = NamespaceContext::new();
        ctx.set_default_namespace("urn:default");
        ctx.add_prefix("w", "urn:w");

        assert_eq!(ctx.resolve("w:p").unwrap(), QName::namespaced("urn:w", "p"));
        assert_eq!(ctx.resolve("p").unwrap(), QName::namespaced("urn:default", "p"));
        assert!(ctx.resolve("x:p").is_err());
    }
}
