//! Schema catalogs
//!
//! A [`SchemaCatalog`] is the element-kind data a [`Registry`] is built from:
//! namespaces, named simple types and one [`ElementDescriptor`] per kind.
//! Catalogs are assembled in code or loaded from JSON.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "namespaces": [{ "id": 80, "prefix": "v", "uri": "urn:schemas-microsoft-com:vml" }],
//!   "simpleTypes": {
//!     "ST_Jc": { "base": "token", "enumeration": ["left", "center", "right"] }
//!   },
//!   "elements": [
//!     {
//!       "name": "w:p",
//!       "kind": "composite",
//!       "content": { "type": "sequence", "children": [
//!         { "element": "w:pPr", "min": 0 },
//!         { "type": "choice", "min": 0, "max": 0, "children": [{ "element": "w:r" }] }
//!       ]},
//!       "attributes": [{ "name": "w14:paraId", "type": "ST_LongHexNumber", "since": "Office2010" }],
//!       "constraints": [{ "rule": "uniqueAttributeValue", "attribute": "w14:paraId" }]
//!     }
//!   ]
//! }
//! ```
//!
//! Occurrence bounds default to 1; a `max` of 0 means unbounded.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, ParseError, Result};
use crate::namespaces::{NamespaceId, NamespaceTable};
use crate::packaging::ApplicationType;
use crate::validators::particles::{Occurs, ParticleNode, ParticleType};
use crate::validators::semantic::{AttributeRef, ConstraintRule, SemanticConstraint};
use crate::validators::simple_types::{Facet, Pattern, PrimitiveType, SimpleType};
use crate::validators::{AttributeDescriptor, Capability, ElementDescriptor, Registry, RegistryCache};
use crate::versions::FileFormatVersion;

const WORDPROCESSING_SAMPLE: &str = include_str!("../schemas/wordprocessingml.json");

/// Element-kind data for building registries
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    namespaces: NamespaceTable,
    simple_types: IndexMap<String, SimpleType>,
    descriptors: Vec<Arc<ElementDescriptor>>,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCatalog {
    /// Create an empty catalog over the standard namespaces
    pub fn new() -> Self {
        Self {
            namespaces: NamespaceTable::standard(),
            simple_types: IndexMap::new(),
            descriptors: Vec::new(),
        }
    }

    /// Get the namespace table
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Register an extra namespace
    pub fn add_namespace(
        &mut self,
        id: NamespaceId,
        prefix: impl Into<String>,
        uri: impl Into<String>,
    ) -> Result<()> {
        self.namespaces.insert(id, prefix, uri)
    }

    /// Get the descriptors, in registration order
    pub fn descriptors(&self) -> &[Arc<ElementDescriptor>] {
        &self.descriptors
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the catalog has no descriptors
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Add a descriptor
    pub fn add(&mut self, descriptor: ElementDescriptor) {
        self.descriptors.push(Arc::new(descriptor));
    }

    /// Register a named simple type
    pub fn add_simple_type(&mut self, name: impl Into<String>, value_type: SimpleType) {
        let name = name.into();
        let value_type = value_type.named(&name);
        self.simple_types.insert(name, value_type);
    }

    /// Resolve a simple type by name, falling back to primitive type names
    pub fn simple_type(&self, name: &str) -> Option<SimpleType> {
        self.simple_types
            .get(name)
            .cloned()
            .or_else(|| PrimitiveType::from_name(name).map(SimpleType::new))
    }

    /// Start a descriptor for a prefixed kind name (`w:body`)
    pub fn element(&self, kind: &str, capability: Capability) -> Result<ElementDescriptor> {
        let identity = self.namespaces.identity(kind)?;
        Ok(ElementDescriptor::new(kind, identity, capability))
    }

    /// Create an attribute descriptor for `prefix:local` or `local`
    pub fn attribute(&self, name: &str, value_type: SimpleType) -> Result<AttributeDescriptor> {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let id = self.namespaces.id_of_prefix(prefix).ok_or_else(|| {
                    Error::Namespace(format!("Unknown prefix in attribute '{}'", name))
                })?;
                Ok(AttributeDescriptor::qualified(prefix, id, local, value_type))
            }
            None => Ok(AttributeDescriptor::new(name, value_type)),
        }
    }

    /// Build the registry of a version
    pub fn build_registry(&self, version: FileFormatVersion) -> Result<Registry> {
        Registry::build(
            version,
            Arc::new(self.namespaces.clone()),
            self.descriptors.iter().cloned(),
        )
    }

    /// Turn the catalog into a per-version registry cache
    pub fn into_cache(self) -> RegistryCache {
        RegistryCache::new(Arc::new(self.namespaces), self.descriptors)
    }

    /// Load a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let data: CatalogData = serde_json::from_str(json)?;
        let mut catalog = Self::new();

        for ns in data.namespaces {
            catalog.add_namespace(NamespaceId(ns.id), ns.prefix, ns.uri)?;
        }
        for (name, dto) in data.simple_types {
            let value_type = dto.into_simple_type(&name)?;
            catalog.add_simple_type(name, value_type);
        }
        for dto in data.elements {
            let descriptor = catalog.load_element(dto)?;
            catalog.add(descriptor);
        }

        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| match e {
            Error::Parse(parse) => Error::Parse(parse.with_location(path.display().to_string())),
            other => other,
        })
    }

    /// Bundled WordprocessingML subset
    pub fn wordprocessing_sample() -> Result<Self> {
        Self::from_json(WORDPROCESSING_SAMPLE)
    }

    fn load_element(&self, dto: ElementData) -> Result<ElementDescriptor> {
        let capability = match dto.kind.as_deref() {
            None => Capability::Composite,
            Some(name) => Capability::from_name(name).ok_or_else(|| {
                Error::Catalog(format!("element '{}' has unknown kind '{}'", dto.name, name))
            })?,
        };

        let mut descriptor = self.element(&dto.name, capability)?;
        if let Some(since) = dto.since {
            descriptor = descriptor.since(since);
        }

        match (capability, dto.content) {
            (Capability::Composite, Some(content)) => {
                let particle = content.into_particle().map_err(|e| match e {
                    Error::Parse(parse) => Error::Parse(parse.with_location(dto.name.clone())),
                    other => other,
                })?;
                descriptor = descriptor.with_content(particle);
            }
            (_, Some(_)) => {
                return Err(Error::Catalog(format!(
                    "leaf element '{}' cannot have a content model",
                    dto.name
                )))
            }
            (_, None) => {}
        }

        if let Some(text) = dto.text {
            if capability != Capability::LeafText {
                return Err(Error::Catalog(format!(
                    "element '{}' is not a text leaf but declares a text type",
                    dto.name
                )));
            }
            descriptor = descriptor.with_text(self.resolve_type(&text, &dto.name)?);
        }

        for attr in dto.attributes {
            let value_type = self.resolve_type(&attr.value_type, &attr.name)?;
            let mut attribute = self.attribute(&attr.name, value_type)?;
            if attr.required {
                attribute = attribute.required();
            }
            if let Some(since) = attr.since {
                attribute = attribute.since(since);
            }
            descriptor = descriptor.with_attribute(attribute);
        }

        for constraint in dto.constraints {
            let rule = constraint.rule.into_rule(&self.namespaces)?;
            descriptor = descriptor
                .with_constraint(SemanticConstraint::new(rule).for_application(constraint.application));
        }

        Ok(descriptor)
    }

    fn resolve_type(&self, name: &str, owner: &str) -> Result<SimpleType> {
        self.simple_type(name).ok_or_else(|| {
            Error::Catalog(format!("'{}' refers to unknown simple type '{}'", owner, name))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogData {
    #[serde(default)]
    namespaces: Vec<NamespaceData>,
    #[serde(default)]
    simple_types: IndexMap<String, SimpleTypeData>,
    #[serde(default)]
    elements: Vec<ElementData>,
}

#[derive(Debug, Deserialize)]
struct NamespaceData {
    id: u8,
    prefix: String,
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimpleTypeData {
    base: String,
    #[serde(default)]
    list: bool,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    min_inclusive: Option<String>,
    max_inclusive: Option<String>,
    #[serde(default)]
    enumeration: Vec<String>,
}

impl SimpleTypeData {
    fn into_simple_type(self, name: &str) -> Result<SimpleType> {
        let primitive = PrimitiveType::from_name(&self.base).ok_or_else(|| {
            Error::Catalog(format!("simple type '{}' has unknown base '{}'", name, self.base))
        })?;
        let mut value_type = if self.list {
            SimpleType::list(primitive)
        } else {
            SimpleType::new(primitive)
        };

        if let Some(n) = self.length {
            value_type = value_type.with_facet(Facet::Length(n));
        }
        if let Some(n) = self.min_length {
            value_type = value_type.with_facet(Facet::MinLength(n));
        }
        if let Some(n) = self.max_length {
            value_type = value_type.with_facet(Facet::MaxLength(n));
        }
        if let Some(pattern) = &self.pattern {
            value_type = value_type.with_facet(Facet::Pattern(Pattern::new(pattern)?));
        }
        if let Some(min) = &self.min_inclusive {
            value_type = value_type.with_facet(Facet::MinInclusive(parse_bound(name, min)?));
        }
        if let Some(max) = &self.max_inclusive {
            value_type = value_type.with_facet(Facet::MaxInclusive(parse_bound(name, max)?));
        }
        if !self.enumeration.is_empty() {
            value_type = value_type.with_enumeration(self.enumeration);
        }
        Ok(value_type)
    }
}

fn parse_bound(name: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| {
        ParseError::new(format!("invalid bound '{}': {}", value, e))
            .with_location(name)
            .into()
    })
}

#[derive(Debug, Deserialize)]
struct ElementData {
    name: String,
    kind: Option<String>,
    since: Option<FileFormatVersion>,
    content: Option<ParticleData>,
    text: Option<String>,
    #[serde(default)]
    attributes: Vec<AttributeData>,
    #[serde(default)]
    constraints: Vec<ConstraintData>,
}

#[derive(Debug, Deserialize)]
struct AttributeData {
    name: String,
    #[serde(rename = "type", default = "default_attribute_type")]
    value_type: String,
    #[serde(default)]
    required: bool,
    since: Option<FileFormatVersion>,
}

fn default_attribute_type() -> String {
    "string".to_string()
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParticleData {
    Element {
        element: String,
        #[serde(default = "one")]
        min: u32,
        #[serde(default = "one")]
        max: u32,
        since: Option<FileFormatVersion>,
    },
    Composite {
        #[serde(rename = "type")]
        particle_type: String,
        #[serde(default = "one")]
        min: u32,
        #[serde(default = "one")]
        max: u32,
        children: Vec<ParticleData>,
    },
}

impl ParticleData {
    fn into_particle(self) -> Result<ParticleNode> {
        match self {
            ParticleData::Element {
                element,
                min,
                max,
                since,
            } => Ok(ParticleNode::element_with(
                element,
                Occurs::from_schema(min, max)?,
                since,
            )),
            ParticleData::Composite {
                particle_type,
                min,
                max,
                children,
            } => {
                let particle_type = ParticleType::from_name(&particle_type).ok_or_else(|| {
                    ParseError::new(format!("unknown compositor '{}'", particle_type))
                })?;
                let children = children
                    .into_iter()
                    .map(ParticleData::into_particle)
                    .collect::<Result<Vec<_>>>()?;
                Ok(ParticleNode::composite(
                    particle_type,
                    Occurs::from_schema(min, max)?,
                    children,
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConstraintData {
    #[serde(flatten)]
    rule: RuleData,
    #[serde(default)]
    application: ApplicationType,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
enum RuleData {
    UniqueAttributeValue {
        attribute: String,
        #[serde(rename = "caseSensitive", default = "yes")]
        case_sensitive: bool,
    },
    ReferenceExist {
        attribute: String,
        #[serde(rename = "targetKind")]
        target_kind: String,
        #[serde(rename = "targetAttribute")]
        target_attribute: String,
    },
    RelationshipExist {
        attribute: String,
    },
    AttributeMutualExclusive {
        attributes: Vec<String>,
    },
    AttributeRequiredConditionToValue {
        required: String,
        condition: String,
        values: Vec<String>,
    },
}

impl RuleData {
    fn into_rule(self, namespaces: &NamespaceTable) -> Result<ConstraintRule> {
        let attr = |name: &str| AttributeRef::parse(name, namespaces);
        Ok(match self {
            RuleData::UniqueAttributeValue {
                attribute,
                case_sensitive,
            } => ConstraintRule::UniqueAttributeValue {
                attribute: attr(&attribute)?,
                case_sensitive,
            },
            RuleData::ReferenceExist {
                attribute,
                target_kind,
                target_attribute,
            } => ConstraintRule::ReferenceExist {
                attribute: attr(&attribute)?,
                target_kind: target_kind.into(),
                target_attribute: attr(&target_attribute)?,
            },
            RuleData::RelationshipExist { attribute } => ConstraintRule::RelationshipExist {
                attribute: attr(&attribute)?,
            },
            RuleData::AttributeMutualExclusive { attributes } => {
                ConstraintRule::AttributeMutualExclusive {
                    attributes: attributes
                        .iter()
                        .map(|a| attr(a))
                        .collect::<Result<Vec<_>>>()?,
                }
            }
            RuleData::AttributeRequiredConditionToValue {
                required,
                condition,
                values,
            } => ConstraintRule::AttributeRequiredConditionToValue {
                required: attr(&required)?,
                condition: attr(&condition)?,
                values,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::validators::ElementKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_code_built_catalog() {
        let mut catalog = SchemaCatalog::new();
        let body = catalog
            .element("w:body", Capability::Composite)
            .unwrap()
            .with_content(ParticleNode::sequence(1, 1, vec![ParticleNode::element("w:p", 0, 0)]));
        catalog.add(body);
        catalog.add(catalog.element("w:p", Capability::LeafEmpty).unwrap());

        let registry = catalog.build_registry(FileFormatVersion::Office2007).unwrap();
        assert_eq!(registry.len(), 2);
        let p = registry.create(NamespaceId(23), "p").unwrap();
        assert_eq!(p.identity().unwrap().local_name(), "p");
    }

    #[test]
    fn test_unknown_prefix() {
        let catalog = SchemaCatalog::new();
        let err = catalog.element("zz:body", Capability::Composite).unwrap_err();
        assert!(matches!(err, Error::Namespace(_)));
        assert!(catalog.attribute("zz:val", SimpleType::string()).is_err());
        assert!(catalog.attribute("val", SimpleType::string()).is_ok());
    }

    #[test]
    fn test_simple_type_resolution() {
        let mut catalog = SchemaCatalog::new();
        catalog.add_simple_type("ST_Jc", SimpleType::token().with_enumeration(["left", "right"]));
        assert_eq!(catalog.simple_type("ST_Jc").unwrap().name(), "ST_Jc");
        assert_eq!(
            catalog.simple_type("unsignedInt").unwrap().primitive(),
            PrimitiveType::UnsignedInt
        );
        assert!(catalog.simple_type("ST_Missing").is_none());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "simpleTypes": {
                "ST_Size": { "base": "unsignedInt", "minInclusive": "1", "maxInclusive": "3276" }
            },
            "elements": [
                { "name": "w:rPr", "content": { "type": "sequence", "children": [
                    { "element": "w:sz", "min": 0 },
                    { "element": "w14:ligatures", "min": 0, "since": "Office2010" }
                ]}},
                { "name": "w:sz", "kind": "leafEmpty",
                  "attributes": [{ "name": "w:val", "type": "ST_Size", "required": true }] },
                { "name": "w14:ligatures", "kind": "leafEmpty", "since": "Office2010" },
                { "name": "w:bookmarkStart", "kind": "leafEmpty",
                  "attributes": [{ "name": "w:id", "type": "integer" }],
                  "constraints": [{ "rule": "uniqueAttributeValue", "attribute": "w:id", "application": "word" }] }
            ]
        }"#;
        let catalog = SchemaCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 4);

        let v2007 = catalog.build_registry(FileFormatVersion::Office2007).unwrap();
        assert_eq!(v2007.len(), 3);
        let rpr = v2007.compiled_particle(&ElementKind::new("w:rPr")).unwrap();
        assert!(rpr.find_path(&ElementKind::new("w14:ligatures")).is_none());

        let v2010 = catalog.build_registry(FileFormatVersion::Office2010).unwrap();
        let rpr = v2010.compiled_particle(&ElementKind::new("w:rPr")).unwrap();
        assert!(rpr.find_path(&ElementKind::new("w14:ligatures")).is_some());

        let sz = v2007.lookup_name("w:sz").unwrap();
        assert!(sz.attribute_named("w:val").unwrap().required);

        let bookmark = v2007.lookup_name("w:bookmarkStart").unwrap();
        assert_eq!(bookmark.constraints[0].application, ApplicationType::Word);
    }

    #[test]
    fn test_json_errors() {
        let bad_occurs = r#"{ "elements": [{ "name": "w:body",
            "content": { "type": "sequence", "children": [{ "element": "w:p", "min": 3, "max": 1 }] } }] }"#;
        let err = SchemaCatalog::from_json(bad_occurs).unwrap_err();
        assert!(err.to_string().contains("w:body"));

        let bad_type = r#"{ "elements": [{ "name": "w:jc", "kind": "leafEmpty",
            "attributes": [{ "name": "w:val", "type": "ST_Nope" }] }] }"#;
        assert!(matches!(SchemaCatalog::from_json(bad_type), Err(Error::Catalog(_))));

        let leaf_content = r#"{ "elements": [{ "name": "w:t", "kind": "leafText",
            "content": { "type": "sequence", "children": [] } }] }"#;
        assert!(matches!(SchemaCatalog::from_json(leaf_content), Err(Error::Catalog(_))));

        assert!(matches!(SchemaCatalog::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_duplicate_identity_fails_build() {
        let json = r#"{ "elements": [
            { "name": "w:p", "kind": "leafEmpty" },
            { "name": "w:p", "kind": "leafEmpty" }
        ] }"#;
        let catalog = SchemaCatalog::from_json(json).unwrap();
        let err = catalog.build_registry(FileFormatVersion::Office2007).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "elements": [{{ "name": "w:p", "kind": "leafEmpty" }}] }}"#).unwrap();
        let catalog = SchemaCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);

        assert!(matches!(
            SchemaCatalog::from_file("/nonexistent/catalog.json"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_wordprocessing_sample() {
        let catalog = SchemaCatalog::wordprocessing_sample().unwrap();
        let cache = catalog.into_cache();
        for version in FileFormatVersion::ALL {
            let registry = cache.get(version).unwrap();
            assert!(registry.lookup_name("w:document").is_some());
        }
        assert!(cache.get(FileFormatVersion::Office2007).unwrap().len()
            < cache.get(FileFormatVersion::Office2010).unwrap().len());
    }
}
