//! Element trees
//!
//! One runtime representation serves every element kind: an [`Element`]
//! carries a [`NodeKind`] tag, its attributes, children and text. Registered
//! kinds are `Typed`; anything else read from a document is one of the
//! placeholder kinds.

use std::cmp::Ordering;
use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, NamespaceId, SchemaIdentity, MC_NAMESPACE};
use crate::validators::{Capability, CompiledParticle, ElementKind, Registry};

/// Comment or processing instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiscNode {
    /// `<!-- ... -->`
    Comment(String),
    /// `<?target data?>`
    ProcessingInstruction(String),
}

/// What an element node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A registered kind
    Typed {
        /// Kind reference
        kind: ElementKind,
        /// Schema identity of the kind
        identity: SchemaIdentity,
        /// What the element may contain
        capability: Capability,
    },
    /// An element with no registered kind in its context
    Unknown {
        /// Name as written (`prefix:local`)
        name: String,
        /// Namespace URI
        namespace: Option<String>,
    },
    /// Raw markup that is not an element
    Misc(MiscNode),
    /// `mc:AlternateContent`
    AlternateContent,
    /// `mc:Choice`
    AlternateContentChoice,
    /// `mc:Fallback`
    AlternateContentFallback,
}

impl NodeKind {
    /// Whether the node is one of the kinds no content model governs
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, NodeKind::Typed { .. })
    }
}

/// An attribute as read from a document or set in code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Prefix as written
    pub prefix: Option<String>,
    /// Local name
    pub local_name: String,
    /// Namespace id, when the namespace is a known one
    pub namespace_id: Option<NamespaceId>,
    /// Namespace URI, when the attribute is qualified
    pub namespace_uri: Option<String>,
    /// Value
    pub value: String,
}

impl Attribute {
    /// Unqualified attribute
    pub fn new(local_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local_name: local_name.into(),
            namespace_id: None,
            namespace_uri: None,
            value: value.into(),
        }
    }

    /// Attribute in a known namespace
    pub fn qualified(
        prefix: impl Into<String>,
        namespace_id: NamespaceId,
        local_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local_name: local_name.into(),
            namespace_id: Some(namespace_id),
            namespace_uri: None,
            value: value.into(),
        }
    }

    /// Whether this is an `xmlns` declaration
    pub fn is_namespace_declaration(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.local_name == "xmlns")
    }

    /// Whether the attribute lives in a namespace the table does not know
    pub fn is_extension(&self) -> bool {
        self.namespace_id.is_none() && self.namespace_uri.is_some()
    }

    /// Name as written
    pub fn name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

/// An element node
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    node: NodeKind,
    attributes: Vec<Attribute>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    /// Create an element of a node kind
    pub fn new(node: NodeKind) -> Self {
        Self {
            node,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Create an empty element of a registered kind
    pub fn typed(kind: ElementKind, identity: SchemaIdentity, capability: Capability) -> Self {
        Self::new(NodeKind::Typed {
            kind,
            identity,
            capability,
        })
    }

    /// Create an unknown element
    pub fn unknown(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self::new(NodeKind::Unknown {
            name: name.into(),
            namespace,
        })
    }

    /// Create a comment node
    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Misc(MiscNode::Comment(text.into())))
    }

    /// Create `mc:AlternateContent`
    pub fn alternate_content() -> Self {
        Self::new(NodeKind::AlternateContent)
    }

    /// Get the node kind
    pub fn node(&self) -> &NodeKind {
        &self.node
    }

    /// Kind of a typed element
    pub fn kind(&self) -> Option<&ElementKind> {
        match &self.node {
            NodeKind::Typed { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Identity of a typed element
    pub fn identity(&self) -> Option<&SchemaIdentity> {
        match &self.node {
            NodeKind::Typed { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// Capability of a typed element
    pub fn capability(&self) -> Option<Capability> {
        match &self.node {
            NodeKind::Typed { capability, .. } => Some(*capability),
            _ => None,
        }
    }

    /// Name used in node paths and messages
    pub fn name(&self) -> String {
        match &self.node {
            NodeKind::Typed { kind, .. } => kind.to_string(),
            NodeKind::Unknown { name, .. } => name.clone(),
            NodeKind::Misc(MiscNode::Comment(_)) => "#comment".to_string(),
            NodeKind::Misc(MiscNode::ProcessingInstruction(_)) => "#pi".to_string(),
            NodeKind::AlternateContent => "mc:AlternateContent".to_string(),
            NodeKind::AlternateContentChoice => "mc:Choice".to_string(),
            NodeKind::AlternateContentFallback => "mc:Fallback".to_string(),
        }
    }

    /// Get the attributes
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Find an attribute by namespace id and local name
    pub fn attribute(&self, namespace_id: Option<NamespaceId>, local_name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.namespace_id == namespace_id && a.local_name == local_name && !a.is_extension())
    }

    /// Value of an attribute by namespace id and local name
    pub fn attribute_value(&self, namespace_id: Option<NamespaceId>, local_name: &str) -> Option<&str> {
        self.attribute(namespace_id, local_name).map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing one with the same name
    pub fn set_attribute(&mut self, attribute: Attribute) {
        let existing = self.attributes.iter_mut().find(|a| {
            a.namespace_id == attribute.namespace_id
                && a.namespace_uri == attribute.namespace_uri
                && a.local_name == attribute.local_name
        });
        match existing {
            Some(slot) => *slot = attribute,
            None => self.attributes.push(attribute),
        }
    }

    /// Builder form of [`Element::set_attribute`]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.set_attribute(attribute);
        self
    }

    /// Get the children
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Get the children mutably
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    /// Append a child
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Builder form of [`Element::push_child`]
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Insert a child where the content model places it
    ///
    /// The child goes before the first existing child that sorts after it,
    /// so it lands after any children sharing its slot. Returns the index.
    pub fn insert_child_ordered(&mut self, child: Element, particle: &CompiledParticle) -> usize {
        let index = self
            .children
            .iter()
            .position(|existing| particle.compare_elements(existing, &child) == Ordering::Greater)
            .unwrap_or(self.children.len());
        self.children.insert(index, child);
        index
    }

    /// First child of a kind
    pub fn first_child(&self, kind: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.kind().map_or(false, |k| k.as_str() == kind))
    }

    /// Get the text content
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Set the text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Builder form of [`Element::set_text`]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    fn append_text(&mut self, text: &str) {
        match &mut self.text {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

/// A parsed document: one root element
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

struct OpenElement<'r> {
    element: Element,
    particle: Option<&'r CompiledParticle>,
    scope: NamespaceContext,
}

impl Document {
    /// Wrap a root element
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Get the root element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Get the root element mutably
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Take the root element
    pub fn into_root(self) -> Element {
        self.root
    }

    /// Parse XML text into an element tree
    ///
    /// The root is created through [`Registry::create`]; children through the
    /// compiled content model of their parent, so a known kind in the wrong
    /// place becomes an `Unknown` node.
    pub fn parse(xml: &str, registry: &Registry) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut stack: Vec<OpenElement<'_>> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let open = Self::open_element(&e, &stack, registry)?;
                    stack.push(open);
                }
                Ok(Event::Empty(e)) => {
                    let open = Self::open_element(&e, &stack, registry)?;
                    Self::close_element(open.element, &mut stack, &mut root)?;
                }
                Ok(Event::End(_)) => {
                    if let Some(open) = stack.pop() {
                        Self::close_element(open.element, &mut stack, &mut root)?;
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                        current.element.append_text(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = std::str::from_utf8(&e)
                            .map_err(|e| Error::Xml(format!("Invalid CDATA: {}", e)))?;
                        current.element.append_text(text);
                    }
                }
                Ok(Event::Comment(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = std::str::from_utf8(&e)
                            .map_err(|e| Error::Xml(format!("Invalid comment: {}", e)))?;
                        current.element.push_child(Element::comment(text));
                    }
                }
                Ok(Event::PI(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = std::str::from_utf8(&e)
                            .map_err(|e| Error::Xml(format!("Invalid processing instruction: {}", e)))?;
                        current.element.push_child(Element::new(NodeKind::Misc(
                            MiscNode::ProcessingInstruction(text.to_string()),
                        )));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".to_string()));
        }
        root.map(Self::new)
            .ok_or_else(|| Error::Xml("document has no root element".to_string()))
    }

    fn open_element<'r>(
        start: &BytesStart<'_>,
        stack: &[OpenElement<'r>],
        registry: &'r Registry,
    ) -> Result<OpenElement<'r>> {
        let mut scope = stack.last().map(|o| o.scope.clone()).unwrap_or_default();

        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;
            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();
            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                scope.set_default_namespace(&attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                scope.add_prefix(prefix, &attr_value);
            }
            attributes.push((attr_name, attr_value));
        }

        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();
        let qname = scope.resolve(&name)?;
        let namespaces = registry.namespaces();

        let parent_particle = stack.last().and_then(|o| o.particle);
        let mut element = match (qname.namespace.as_deref(), qname.local_name.as_str()) {
            (Some(MC_NAMESPACE), "AlternateContent") => Element::alternate_content(),
            (Some(MC_NAMESPACE), "Choice") => Element::new(NodeKind::AlternateContentChoice),
            (Some(MC_NAMESPACE), "Fallback") => Element::new(NodeKind::AlternateContentFallback),
            (namespace, local) => {
                let identity = namespace
                    .and_then(|uri| namespaces.id_of(uri))
                    .map(|id| SchemaIdentity::new(id, local));
                let created = match (&identity, stack.is_empty()) {
                    (Some(identity), true) => registry.create(identity.namespace_id, local),
                    (Some(identity), false) => {
                        parent_particle.and_then(|p| p.create_instance(identity, registry))
                    }
                    (None, _) => None,
                };
                created.unwrap_or_else(|| Element::unknown(name.clone(), qname.namespace.clone()))
            }
        };

        for (attr_name, value) in attributes {
            let attribute = match attr_name.split_once(':') {
                Some((prefix, local)) => {
                    let uri = scope.get_namespace(prefix).ok_or_else(|| {
                        Error::Namespace(format!("Unknown prefix: {}", prefix))
                    })?;
                    Attribute {
                        prefix: Some(prefix.to_string()),
                        local_name: local.to_string(),
                        namespace_id: namespaces.id_of(uri),
                        namespace_uri: Some(uri.to_string()),
                        value,
                    }
                }
                None => Attribute::new(attr_name, value),
            };
            element.attributes.push(attribute);
        }

        let particle = match element.node() {
            NodeKind::Typed { kind, .. } => registry.compiled_particle(kind),
            NodeKind::AlternateContent
            | NodeKind::AlternateContentChoice
            | NodeKind::AlternateContentFallback => parent_particle,
            _ => None,
        };

        Ok(OpenElement {
            element,
            particle,
            scope,
        })
    }

    fn close_element(
        mut element: Element,
        stack: &mut [OpenElement<'_>],
        root: &mut Option<Element>,
    ) -> Result<()> {
        if element.capability() != Some(Capability::LeafText)
            && element.text.as_deref().map_or(false, |t| t.trim().is_empty())
        {
            element.text = None;
        }

        match stack.last_mut() {
            Some(parent) => {
                parent.element.push_child(element);
                Ok(())
            }
            None if root.is_none() => {
                *root = Some(element);
                Ok(())
            }
            None => Err(Error::Xml("document has more than one root element".to_string())),
        }
    }
}
