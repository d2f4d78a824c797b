//! Structural validation
//!
//! Depth-first walk of an element tree checking, for every typed element, its
//! attributes, its text and the placement of its children against the
//! compiled content model of its kind. Each element's own findings come
//! before the findings of its children.

use std::collections::HashSet;

use crate::documents::{Element, NodeKind};
use crate::namespaces::NamespaceId;

use super::compiler::{CompiledModel, CompiledParticle, ParticlePath, Presence};
use super::exceptions::{NodeRef, ValidationErrorType};
use super::registry::{Capability, ElementDescriptor, ElementKind, Registry};
use super::simple_types::SimpleType;
use super::validation::{ValidationContext, ValueFrame};
use super::values::validate_value;

/// Namespace id of markup compatibility attributes (`mc:Ignorable`)
const MC_NAMESPACE_ID: NamespaceId = NamespaceId(5);

lazy_static::lazy_static! {
    static ref DEFAULT_TEXT_TYPE: SimpleType = SimpleType::string();
}

/// Checks element trees against the content models of a registry
pub struct SchemaValidator<'r> {
    registry: &'r Registry,
}

struct Matched<'p> {
    slot: usize,
    path: &'p ParticlePath,
}

impl<'r> SchemaValidator<'r> {
    /// Create a validator
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Validate a tree
    pub fn validate(&self, root: &Element, ctx: &mut ValidationContext<'r>) {
        let node = NodeRef::root(root);
        self.validate_node(root, &node, ctx);
    }

    fn validate_node(&self, element: &Element, node: &NodeRef, ctx: &mut ValidationContext<'r>) {
        match element.node() {
            NodeKind::Typed {
                kind, capability, ..
            } => {
                let Some(descriptor) = self.registry.lookup(kind) else {
                    return;
                };
                self.validate_attributes(element, descriptor, node, ctx);
                match capability {
                    Capability::Composite => self.validate_composite(element, kind, node, ctx),
                    Capability::LeafText => self.validate_leaf_text(element, descriptor, node, ctx),
                    Capability::LeafEmpty => self.validate_leaf_empty(element, node, ctx),
                }
            }
            NodeKind::AlternateContent
            | NodeKind::AlternateContentChoice
            | NodeKind::AlternateContentFallback => {
                let refs = node.children(element.children());
                for (child, child_ref) in element.children().iter().zip(&refs) {
                    self.validate_node(child, child_ref, ctx);
                }
            }
            NodeKind::Unknown { .. } | NodeKind::Misc(_) => {}
        }
    }

    fn validate_attributes(
        &self,
        element: &Element,
        descriptor: &'r ElementDescriptor,
        node: &NodeRef,
        ctx: &mut ValidationContext<'r>,
    ) {
        let version = ctx.version();

        for declared in &descriptor.attributes {
            if declared.required
                && declared.is_available(version)
                && element
                    .attribute(declared.namespace_id, &declared.local_name)
                    .is_none()
            {
                ctx.create_error(
                    "Sch_MissRequiredAttribute",
                    format!("The required attribute '{}' is missing.", declared.name),
                    ValidationErrorType::Schema,
                    node.clone(),
                );
            }
        }

        for attribute in element.attributes() {
            if attribute.is_namespace_declaration()
                || attribute.is_extension()
                || attribute.namespace_id == Some(MC_NAMESPACE_ID)
            {
                continue;
            }

            let declared = descriptor
                .attribute(attribute.namespace_id, &attribute.local_name)
                .filter(|d| d.is_available(version));
            let attr_node = node.with_attribute(attribute.name());

            match declared {
                Some(declared) => {
                    ctx.push_frame(ValueFrame::new(
                        &declared.name,
                        &declared.value_type,
                        &attribute.value,
                        true,
                        attr_node,
                    ));
                    validate_value(ctx);
                    ctx.pop_frame();
                }
                None => ctx.create_error(
                    "Sch_UndeclaredAttribute",
                    format!("The '{}' attribute is not declared.", attribute.name()),
                    ValidationErrorType::Schema,
                    attr_node,
                ),
            }
        }
    }

    fn validate_leaf_text(
        &self,
        element: &Element,
        descriptor: &'r ElementDescriptor,
        node: &NodeRef,
        ctx: &mut ValidationContext<'r>,
    ) {
        self.reject_element_children(element, node, ctx);

        let value_type = descriptor.text_type.as_ref().unwrap_or(&DEFAULT_TEXT_TYPE);
        ctx.push_frame(ValueFrame::new(
            descriptor.kind.as_str(),
            value_type,
            element.text().unwrap_or(""),
            false,
            node.clone(),
        ));
        validate_value(ctx);
        ctx.pop_frame();
    }

    fn validate_leaf_empty(&self, element: &Element, node: &NodeRef, ctx: &mut ValidationContext<'r>) {
        self.reject_element_children(element, node, ctx);
        if has_text(element) {
            ctx.create_error(
                "Sch_TextNotAllowed",
                format!(
                    "The element '{}' cannot contain text. Content model is empty.",
                    node.element
                ),
                ValidationErrorType::Schema,
                node.clone(),
            );
        }
    }

    fn reject_element_children(&self, element: &Element, node: &NodeRef, ctx: &mut ValidationContext<'r>) {
        let has_children = element
            .children()
            .iter()
            .any(|c| !matches!(c.node(), NodeKind::Misc(_)));
        if has_children {
            ctx.create_error(
                "Sch_InvalidChildinLeafElement",
                format!(
                    "The element '{}' is a leaf element and cannot contain children.",
                    node.element
                ),
                ValidationErrorType::Schema,
                node.clone(),
            );
        }
    }

    fn validate_composite(
        &self,
        element: &Element,
        kind: &ElementKind,
        node: &NodeRef,
        ctx: &mut ValidationContext<'r>,
    ) {
        if has_text(element) {
            ctx.create_error(
                "Sch_TextNotAllowed",
                format!(
                    "The element '{}' cannot contain text. Content model is element-only.",
                    node.element
                ),
                ValidationErrorType::Schema,
                node.clone(),
            );
        }

        let refs = node.children(element.children());
        if let Some(particle) = self.registry.compiled_particle(kind) {
            self.validate_content(element, particle, node, &refs, ctx);
        }

        for (child, child_ref) in element.children().iter().zip(&refs) {
            self.validate_node(child, child_ref, ctx);
        }
    }

    fn validate_content(
        &self,
        element: &Element,
        particle: &CompiledParticle,
        node: &NodeRef,
        refs: &[NodeRef],
        ctx: &mut ValidationContext<'r>,
    ) {
        let model = particle.model();
        let mut counts = vec![0u32; model.slots.len()];
        let mut alternatives: Vec<HashSet<u32>> = vec![HashSet::new(); model.groups.len()];
        let mut matched: Vec<&ParticlePath> = Vec::new();
        let mut previous: Option<Matched<'_>> = None;

        for (child, child_ref) in element.children().iter().zip(refs) {
            let kind = match child.node() {
                NodeKind::Typed { kind, .. } => kind,
                NodeKind::Unknown { .. } => {
                    ctx.create_error(
                        "Sch_InvalidElementContent",
                        format!(
                            "The element '{}' has invalid child element '{}'.{}",
                            node.element,
                            child_ref.element,
                            expected_list(model)
                        ),
                        ValidationErrorType::Schema,
                        child_ref.clone(),
                    );
                    continue;
                }
                _ => continue,
            };

            let Some(slot) = model.index_of(kind) else {
                ctx.create_error(
                    "Sch_InvalidElementContent",
                    format!(
                        "The element '{}' has invalid child element '{}'.{}",
                        node.element,
                        kind,
                        expected_list(model)
                    ),
                    ValidationErrorType::Schema,
                    child_ref.clone(),
                );
                continue;
            };
            let path = &model.lookup[slot].path;
            let info = &model.slots[slot];

            // an out-of-order child still counts toward its slot
            let out_of_sequence = previous
                .as_ref()
                .map_or(false, |prev| is_out_of_sequence(model, prev, path));
            if out_of_sequence {
                ctx.create_error(
                    "Sch_UnexpectedElementContent",
                    format!(
                        "The element '{}' has unexpected child element '{}'.",
                        node.element, kind
                    ),
                    ValidationErrorType::Schema,
                    child_ref.clone(),
                );
            }

            counts[slot] += 1;
            if info.total.is_exceeded(counts[slot]) {
                ctx.create_error(
                    "Sch_TooManyElements",
                    format!(
                        "The element '{}' has too many '{}' child elements.",
                        node.element, kind
                    ),
                    ValidationErrorType::Schema,
                    child_ref.clone(),
                );
            }

            for (group_index, alternative) in &info.choices {
                let group = &model.groups[*group_index];
                let seen = &mut alternatives[*group_index];
                if seen.insert(*alternative) && group.total.is_exceeded(seen.len() as u32) {
                    ctx.create_error(
                        "Sch_TooManyElements",
                        format!(
                            "The element '{}' has too many alternatives: '{}' cannot be combined with {}.",
                            node.element,
                            kind,
                            group
                                .kinds
                                .iter()
                                .filter(|k| *k != kind)
                                .map(|k| format!("'{}'", k))
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        ValidationErrorType::Schema,
                        child_ref.clone(),
                    );
                }
            }

            matched.push(path);
            if !out_of_sequence {
                previous = Some(Matched { slot, path });
            }
        }

        for (slot, info) in model.slots.iter().enumerate() {
            let path = &model.lookup[slot].path;
            if counts[slot] < info.min_count && is_required(info.presence, path, &matched) {
                ctx.create_error(
                    "Sch_IncompleteContent",
                    format!(
                        "The element '{}' has incomplete content. List of possible elements expected: '{}'.",
                        node.element, model.lookup[slot].kind
                    ),
                    ValidationErrorType::Schema,
                    node.clone(),
                );
            }
        }

        for (group_index, group) in model.groups.iter().enumerate() {
            if alternatives[group_index].is_empty() && is_required(group.presence, &group.prefix, &matched) {
                ctx.create_error(
                    "Sch_IncompleteContent",
                    format!(
                        "The element '{}' has incomplete content. List of possible elements expected: {}.",
                        node.element,
                        group
                            .kinds
                            .iter()
                            .map(|k| format!("'{}'", k))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    ValidationErrorType::Schema,
                    node.clone(),
                );
            }
        }
    }
}

/// A later child must not sit at an earlier sequence position, unless some
/// composite enclosing both may repeat.
fn is_out_of_sequence(model: &CompiledModel, prev: &Matched<'_>, next: &ParticlePath) -> bool {
    let Some(depth) = prev.path.divergence(next) else {
        return false;
    };
    let (Some(before), Some(after)) = (prev.path.segments().get(depth), next.segments().get(depth)) else {
        return false;
    };
    if after.position >= before.position {
        return false;
    }
    let repeatable = &model.slots[prev.slot].repeatable;
    !repeatable.iter().take(depth + 1).any(|r| *r)
}

fn is_required(presence: Presence, path: &ParticlePath, matched: &[&ParticlePath]) -> bool {
    match presence {
        Presence::Optional => false,
        Presence::Required => true,
        Presence::Within(len) => matched.iter().any(|m| m.shares_prefix(path, len)),
    }
}

fn expected_list(model: &CompiledModel) -> String {
    if model.lookup.is_empty() {
        return String::new();
    }
    let kinds: Vec<String> = model.lookup.iter().map(|l| l.kind.to_string()).collect();
    format!(" List of possible elements expected: <{}>.", kinds.join(", "))
}

fn has_text(element: &Element) -> bool {
    element.text().map_or(false, |t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Attribute;
    use crate::namespaces::{NamespaceTable, SchemaIdentity};
    use crate::validators::particles::ParticleNode;
    use crate::validators::registry::AttributeDescriptor;
    use crate::validators::simple_types::PrimitiveType;
    use crate::versions::FileFormatVersion;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const T: NamespaceId = NamespaceId(23);

    fn leaf(name: &str) -> Arc<ElementDescriptor> {
        Arc::new(ElementDescriptor::new(
            format!("w:{}", name),
            SchemaIdentity::new(T, name),
            Capability::LeafEmpty,
        ))
    }

    fn registry(model: ParticleNode) -> Registry {
        let root = Arc::new(
            ElementDescriptor::new("w:root", SchemaIdentity::new(T, "root"), Capability::Composite)
                .with_content(model)
                .with_attribute(
                    AttributeDescriptor::qualified("w", T, "val", SimpleType::new(PrimitiveType::Integer))
                        .required(),
                )
                .with_attribute(
                    AttributeDescriptor::qualified("w", T, "newer", SimpleType::string())
                        .since(FileFormatVersion::Office2010),
                ),
        );
        let text = Arc::new(
            ElementDescriptor::new("w:t", SchemaIdentity::new(T, "t"), Capability::LeafText)
                .with_text(SimpleType::new(PrimitiveType::UnsignedInt)),
        );
        let mut descriptors = vec![root, text];
        descriptors.extend(["a", "b", "c", "d"].iter().map(|n| leaf(n)));
        Registry::build(
            FileFormatVersion::Office2007,
            Arc::new(NamespaceTable::standard()),
            descriptors,
        )
        .unwrap()
    }

    fn root_with(registry: &Registry, children: &[&str]) -> Element {
        let mut root = registry
            .create(T, "root")
            .unwrap()
            .with_attribute(Attribute::qualified("w", T, "val", "1"));
        for name in children {
            let child = registry
                .create(T, name)
                .unwrap_or_else(|| Element::unknown(format!("w:{}", name), None));
            root.push_child(child);
        }
        root
    }

    fn ids(registry: &Registry, root: &Element) -> Vec<String> {
        let mut ctx = ValidationContext::new(registry, 0);
        SchemaValidator::new(registry).validate(root, &mut ctx);
        ctx.into_errors().into_iter().map(|e| e.id).collect()
    }

    fn seq_abc() -> ParticleNode {
        ParticleNode::sequence(
            1,
            1,
            vec![
                ParticleNode::element("w:a", 1, 1),
                ParticleNode::element("w:b", 0, 1),
                ParticleNode::element("w:c", 0, 0),
            ],
        )
    }

    #[test]
    fn test_valid_sequence() {
        let reg = registry(seq_abc());
        assert!(ids(&reg, &root_with(&reg, &["a", "b", "c", "c"])).is_empty());
        assert!(ids(&reg, &root_with(&reg, &["a"])).is_empty());
    }

    #[test]
    fn test_out_of_sequence() {
        let reg = registry(seq_abc());
        assert_eq!(
            ids(&reg, &root_with(&reg, &["a", "c", "b"])),
            vec!["Sch_UnexpectedElementContent"]
        );
    }

    #[test]
    fn test_out_of_order_required_child_reported_once() {
        let reg = registry(ParticleNode::sequence(
            1,
            1,
            vec![ParticleNode::element("w:a", 1, 1), ParticleNode::element("w:b", 1, 1)],
        ));
        let root = root_with(&reg, &["b", "a"]);
        let mut ctx = ValidationContext::new(&reg, 0);
        SchemaValidator::new(&reg).validate(&root, &mut ctx);
        let errors: Vec<_> = ctx
            .into_errors()
            .into_iter()
            .map(|e| (e.id, e.node.path))
            .collect();
        assert_eq!(
            errors,
            vec![(
                "Sch_UnexpectedElementContent".to_string(),
                "/w:root[1]/w:a[1]".to_string()
            )]
        );
    }

    #[test]
    fn test_missing_required_child() {
        let reg = registry(seq_abc());
        assert_eq!(
            ids(&reg, &root_with(&reg, &["b"])),
            vec!["Sch_IncompleteContent"]
        );
    }

    #[test]
    fn test_too_many() {
        let reg = registry(seq_abc());
        assert_eq!(
            ids(&reg, &root_with(&reg, &["a", "b", "b", "b"])),
            vec!["Sch_TooManyElements", "Sch_TooManyElements"]
        );
    }

    #[test]
    fn test_invalid_child() {
        let reg = registry(seq_abc());
        assert_eq!(
            ids(&reg, &root_with(&reg, &["a", "d", "zzz"])),
            vec!["Sch_InvalidElementContent", "Sch_InvalidElementContent"]
        );
    }

    #[test]
    fn test_choice_rules() {
        let reg = registry(ParticleNode::sequence(
            1,
            1,
            vec![
                ParticleNode::element("w:a", 0, 1),
                ParticleNode::choice(
                    1,
                    1,
                    vec![ParticleNode::element("w:b", 1, 1), ParticleNode::element("w:c", 1, 1)],
                ),
            ],
        ));

        assert!(ids(&reg, &root_with(&reg, &["a", "c"])).is_empty());
        assert_eq!(
            ids(&reg, &root_with(&reg, &["a"])),
            vec!["Sch_IncompleteContent"]
        );
        assert_eq!(
            ids(&reg, &root_with(&reg, &["b", "c"])),
            vec!["Sch_TooManyElements"]
        );
        assert_eq!(
            ids(&reg, &root_with(&reg, &["c", "a"])),
            vec!["Sch_UnexpectedElementContent"]
        );
    }

    #[test]
    fn test_repeating_sequence_allows_restart() {
        let reg = registry(ParticleNode::sequence(
            1,
            0,
            vec![ParticleNode::element("w:a", 1, 1), ParticleNode::element("w:b", 1, 1)],
        ));
        assert!(ids(&reg, &root_with(&reg, &["a", "b", "a", "b"])).is_empty());
    }

    #[test]
    fn test_optional_group_required_once_entered() {
        let reg = registry(ParticleNode::sequence(
            1,
            1,
            vec![
                ParticleNode::element("w:a", 1, 1),
                ParticleNode::sequence(
                    0,
                    1,
                    vec![ParticleNode::element("w:b", 1, 1), ParticleNode::element("w:c", 1, 1)],
                ),
            ],
        ));
        assert!(ids(&reg, &root_with(&reg, &["a"])).is_empty());
        assert!(ids(&reg, &root_with(&reg, &["a", "b", "c"])).is_empty());
        assert_eq!(
            ids(&reg, &root_with(&reg, &["a", "b"])),
            vec!["Sch_IncompleteContent"]
        );
    }

    #[test]
    fn test_all_group_any_order() {
        let reg = registry(ParticleNode::all(
            1,
            1,
            vec![ParticleNode::element("w:a", 1, 1), ParticleNode::element("w:b", 0, 1)],
        ));
        assert!(ids(&reg, &root_with(&reg, &["b", "a"])).is_empty());
        assert_eq!(ids(&reg, &root_with(&reg, &["b"])), vec!["Sch_IncompleteContent"]);
    }

    #[test]
    fn test_attribute_rules() {
        let reg = registry(seq_abc());
        let mut root = root_with(&reg, &["a"]);
        root.set_attribute(Attribute::qualified("w", T, "val", "x"));
        root.set_attribute(Attribute::qualified("w", T, "newer", "x"));
        root.set_attribute(Attribute::qualified("w", T, "bogus", "x"));
        root.set_attribute(Attribute::qualified("xmlns", NamespaceId(1), "w", "urn:w"));
        root.set_attribute(Attribute::qualified("mc", MC_NAMESPACE_ID, "Ignorable", "w14"));
        root.set_attribute(Attribute {
            prefix: Some("ext".into()),
            local_name: "foo".into(),
            namespace_id: None,
            namespace_uri: Some("urn:ext".into()),
            value: "1".into(),
        });

        assert_eq!(
            ids(&reg, &root),
            vec![
                "Sch_AttributeValueDataTypeDetailed",
                "Sch_UndeclaredAttribute",
                "Sch_UndeclaredAttribute",
            ]
        );

        let bare = reg
            .create(T, "root")
            .unwrap()
            .with_child(reg.create(T, "a").unwrap());
        assert_eq!(ids(&reg, &bare), vec!["Sch_MissRequiredAttribute"]);
    }

    #[test]
    fn test_leaf_rules() {
        let reg = registry(ParticleNode::sequence(
            1,
            1,
            vec![ParticleNode::element("w:a", 0, 0), ParticleNode::element("w:t", 0, 0)],
        ));
        let root = root_with(&reg, &[])
            .with_child(reg.create(T, "a").unwrap().with_text("text"))
            .with_child(
                reg.create(T, "a")
                    .unwrap()
                    .with_child(reg.create(T, "b").unwrap())
                    .with_child(Element::comment("ok")),
            )
            .with_child(reg.create(T, "t").unwrap().with_text("12"))
            .with_child(reg.create(T, "t").unwrap().with_text("-3"))
            .with_child(reg.create(T, "t").unwrap());

        assert_eq!(
            ids(&reg, &root),
            vec![
                "Sch_TextNotAllowed",
                "Sch_InvalidChildinLeafElement",
                "Sch_ElementValueDataTypeDetailed",
                "Sch_ElementValueDataTypeDetailed",
            ]
        );
    }

    #[test]
    fn test_alternate_content_is_transparent() {
        let reg = registry(seq_abc());
        let mut ac = Element::alternate_content();
        ac.push_child(
            Element::new(NodeKind::AlternateContentChoice)
                .with_child(reg.create(T, "t").unwrap().with_text("bad")),
        );
        let mut root = root_with(&reg, &["a"]);
        root.push_child(ac);
        root.push_child(reg.create(T, "c").unwrap());

        let mut ctx = ValidationContext::new(&reg, 0);
        SchemaValidator::new(&reg).validate(&root, &mut ctx);
        let errors = ctx.into_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, "Sch_ElementValueDataTypeDetailed");
        assert_eq!(
            errors[0].node.path,
            "/w:root[1]/mc:AlternateContent[1]/mc:Choice[1]/w:t[1]"
        );
    }

    #[test]
    fn test_node_paths_in_document_order() {
        let reg = registry(seq_abc());
        let root = root_with(&reg, &["a", "c", "b", "c", "a"]);
        let mut ctx = ValidationContext::new(&reg, 0);
        SchemaValidator::new(&reg).validate(&root, &mut ctx);
        let paths: Vec<_> = ctx.errors().iter().map(|e| e.node.path.clone()).collect();
        assert_eq!(
            paths,
            vec!["/w:root[1]/w:b[1]", "/w:root[1]/w:a[2]", "/w:root[1]/w:a[2]"]
        );
    }
}
