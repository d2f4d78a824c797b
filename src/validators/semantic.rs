//! Semantic validation
//!
//! Cross-element rules that a content model cannot express. The pass runs in
//! two phases over one validated root: attribute values are indexed first,
//! then every constraint of every typed element is checked in document order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::documents::{Element, NodeKind};
use crate::error::{Error, Result};
use crate::namespaces::{NamespaceId, NamespaceTable};
use crate::packaging::ApplicationType;

use super::exceptions::{NodeRef, ValidationErrorType};
use super::registry::{ElementKind, Registry};
use super::validation::ValidationContext;

/// Attribute named by a constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    /// Display name
    pub name: Arc<str>,
    /// Namespace id; None when unqualified
    pub namespace_id: Option<NamespaceId>,
    /// Local name
    pub local_name: Arc<str>,
}

impl AttributeRef {
    /// Unqualified attribute
    pub fn local(local_name: &str) -> Self {
        Self {
            name: Arc::from(local_name),
            namespace_id: None,
            local_name: Arc::from(local_name),
        }
    }

    /// Resolve `prefix:local` (or `local`) with conventional prefixes
    pub fn parse(name: &str, namespaces: &NamespaceTable) -> Result<Self> {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let id = namespaces.id_of_prefix(prefix).ok_or_else(|| {
                    Error::Namespace(format!("Unknown prefix in attribute '{}'", name))
                })?;
                Ok(Self {
                    name: Arc::from(name),
                    namespace_id: Some(id),
                    local_name: Arc::from(local),
                })
            }
            None => Ok(Self::local(name)),
        }
    }

    /// Value of this attribute on an element
    pub fn value_on<'e>(&self, element: &'e Element) -> Option<&'e str> {
        element.attribute_value(self.namespace_id, &self.local_name)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A cross-element rule
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintRule {
    /// Value unique among all elements of the kind
    UniqueAttributeValue {
        /// Checked attribute
        attribute: AttributeRef,
        /// Whether comparison is case sensitive
        case_sensitive: bool,
    },
    /// Value must match an attribute of some element of another kind
    ReferenceExist {
        /// Referring attribute
        attribute: AttributeRef,
        /// Kind of the referenced elements
        target_kind: ElementKind,
        /// Attribute of the referenced elements
        target_attribute: AttributeRef,
    },
    /// Value must be a relationship id of the current part
    RelationshipExist {
        /// Relationship id attribute
        attribute: AttributeRef,
    },
    /// At most one of the attributes may be present
    AttributeMutualExclusive {
        /// Exclusive attributes
        attributes: Vec<AttributeRef>,
    },
    /// `required` must be present when `condition` has one of `values`
    AttributeRequiredConditionToValue {
        /// Conditionally required attribute
        required: AttributeRef,
        /// Condition attribute
        condition: AttributeRef,
        /// Triggering values
        values: Vec<String>,
    },
}

/// A rule and the document family it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticConstraint {
    /// Rule
    pub rule: ConstraintRule,
    /// Document family
    pub application: ApplicationType,
}

impl SemanticConstraint {
    /// Rule applying to every family
    pub fn new(rule: ConstraintRule) -> Self {
        Self {
            rule,
            application: ApplicationType::All,
        }
    }

    /// Restrict to a family
    pub fn for_application(mut self, application: ApplicationType) -> Self {
        self.application = application;
        self
    }
}

struct Visited<'e> {
    element: &'e Element,
    kind: &'e ElementKind,
    node: NodeRef,
}

fn collect<'e>(element: &'e Element, node: NodeRef, out: &mut Vec<Visited<'e>>) {
    let refs = node.children(element.children());
    if let NodeKind::Typed { kind, .. } = element.node() {
        out.push(Visited {
            element,
            kind,
            node,
        });
    }
    for (child, child_ref) in element.children().iter().zip(refs) {
        match child.node() {
            NodeKind::Typed { .. }
            | NodeKind::AlternateContent
            | NodeKind::AlternateContentChoice
            | NodeKind::AlternateContentFallback => collect(child, child_ref, out),
            NodeKind::Unknown { .. } | NodeKind::Misc(_) => {}
        }
    }
}

fn normalize(value: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        value.to_string()
    } else {
        value.to_lowercase()
    }
}

/// Runs the semantic constraints of a registry
pub struct SemanticValidator<'r> {
    registry: &'r Registry,
}

impl<'r> SemanticValidator<'r> {
    /// Create a validator
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Check every constraint under a root
    pub fn validate(&self, root: &Element, ctx: &mut ValidationContext<'_>) {
        let mut visited = Vec::new();
        collect(root, NodeRef::root(root), &mut visited);

        let index = self.index(&visited);
        let application = ctx.application_type();

        for item in &visited {
            let Some(descriptor) = self.registry.lookup(item.kind) else {
                continue;
            };
            for constraint in &descriptor.constraints {
                if !constraint.application.applies_to(application) {
                    continue;
                }
                self.check(item, &constraint.rule, &index, ctx);
            }
        }
    }

    fn index(&self, visited: &[Visited<'_>]) -> ValueIndex {
        let mut index = ValueIndex::default();

        for item in visited {
            let Some(descriptor) = self.registry.lookup(item.kind) else {
                continue;
            };
            for constraint in &descriptor.constraints {
                match &constraint.rule {
                    ConstraintRule::UniqueAttributeValue {
                        attribute,
                        case_sensitive,
                    } => {
                        if let Some(value) = attribute.value_on(item.element) {
                            *index
                                .counts
                                .entry((item.kind.clone(), attribute.clone()))
                                .or_default()
                                .entry(normalize(value, *case_sensitive))
                                .or_default() += 1;
                        }
                    }
                    ConstraintRule::ReferenceExist {
                        target_kind,
                        target_attribute,
                        ..
                    } => {
                        index
                            .targets
                            .entry((target_kind.clone(), target_attribute.clone()))
                            .or_default();
                    }
                    _ => {}
                }
            }
        }

        for item in visited {
            for ((kind, attribute), values) in index.targets.iter_mut() {
                if kind == item.kind {
                    if let Some(value) = attribute.value_on(item.element) {
                        values.insert(value.to_string());
                    }
                }
            }
        }

        index
    }

    fn check(
        &self,
        item: &Visited<'_>,
        rule: &ConstraintRule,
        index: &ValueIndex,
        ctx: &mut ValidationContext<'_>,
    ) {
        match rule {
            ConstraintRule::UniqueAttributeValue {
                attribute,
                case_sensitive,
            } => {
                let Some(value) = attribute.value_on(item.element) else {
                    return;
                };
                let count = index
                    .counts
                    .get(&(item.kind.clone(), attribute.clone()))
                    .and_then(|values| values.get(&normalize(value, *case_sensitive)))
                    .copied()
                    .unwrap_or(0);
                if count > 1 {
                    ctx.create_error(
                        "Sem_UniqueAttributeValue",
                        format!(
                            "The attribute '{}' should have unique value. Its current value '{}' duplicates with others.",
                            attribute, value
                        ),
                        ValidationErrorType::Semantic,
                        item.node.with_attribute(attribute.name.as_ref()),
                    );
                }
            }
            ConstraintRule::ReferenceExist {
                attribute,
                target_kind,
                target_attribute,
            } => {
                let Some(value) = attribute.value_on(item.element) else {
                    return;
                };
                let found = index
                    .targets
                    .get(&(target_kind.clone(), target_attribute.clone()))
                    .map_or(false, |values| values.contains(value));
                if !found {
                    ctx.create_error(
                        "Sem_MissingReferenceElement",
                        format!(
                            "The attribute '{}' has invalid value '{}'. No '{}' element with '{}' equal to it exists.",
                            attribute, value, target_kind, target_attribute
                        ),
                        ValidationErrorType::Semantic,
                        item.node.with_attribute(attribute.name.as_ref()),
                    );
                }
            }
            ConstraintRule::RelationshipExist { attribute } => {
                let Some(value) = attribute.value_on(item.element) else {
                    return;
                };
                let Some((package, part_uri)) = ctx.package() else {
                    return;
                };
                if package.resolve_relationship(part_uri, value).is_none() {
                    ctx.create_error(
                        "Sem_InvalidRelationshipId",
                        format!(
                            "The relationship '{}' referenced by attribute '{}' does not exist.",
                            value, attribute
                        ),
                        ValidationErrorType::Semantic,
                        item.node.with_attribute(attribute.name.as_ref()),
                    );
                }
            }
            ConstraintRule::AttributeMutualExclusive { attributes } => {
                let present: Vec<&AttributeRef> = attributes
                    .iter()
                    .filter(|a| a.value_on(item.element).is_some())
                    .collect();
                if present.len() > 1 {
                    let names: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();
                    ctx.create_error(
                        "Sem_AttributeMutualExclusive",
                        format!(
                            "Attribute {} cannot be present at the same time. Only one of these attributes can be specified: {}.",
                            present.iter().map(|a| format!("'{}'", a)).collect::<Vec<_>>().join(" and "),
                            names.join(", ")
                        ),
                        ValidationErrorType::Semantic,
                        item.node.clone(),
                    );
                }
            }
            ConstraintRule::AttributeRequiredConditionToValue {
                required,
                condition,
                values,
            } => {
                let Some(value) = condition.value_on(item.element) else {
                    return;
                };
                if values.iter().any(|v| v == value) && required.value_on(item.element).is_none() {
                    ctx.create_error(
                        "Sem_AttributeRequiredConditionToValue",
                        format!(
                            "The attribute '{}' is required when attribute '{}' has value '{}'.",
                            required, condition, value
                        ),
                        ValidationErrorType::Semantic,
                        item.node.clone(),
                    );
                }
            }
        }
    }
}

#[derive(Default)]
struct ValueIndex {
    counts: HashMap<(ElementKind, AttributeRef), HashMap<String, usize>>,
    targets: HashMap<(ElementKind, AttributeRef), HashSet<String>>,
}
