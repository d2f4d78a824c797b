//! Validation diagnostics
//!
//! Findings about validated content are values, not errors: each one is a
//! [`ValidationErrorInfo`] naming the rule that failed and the offending node.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::documents::Element;

/// Level of the rule that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationErrorType {
    /// Content model or simple type rule
    Schema,
    /// Cross-element business rule
    Semantic,
}

impl fmt::Display for ValidationErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// Reference to an element, or one of its attributes, inside a tree
///
/// The path is XPath-like: `/w:document[1]/w:body[1]/w:p[2]`, where the index
/// counts preceding siblings of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeRef {
    /// Path to the element
    pub path: String,
    /// Element name
    pub element: String,
    /// Attribute name, when the finding is about an attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl NodeRef {
    /// Reference to a tree root
    pub fn root(element: &Element) -> Self {
        let name = element.name();
        Self {
            path: format!("/{}[1]", name),
            element: name,
            attribute: None,
        }
    }

    /// References to each child of an element, in order
    pub fn children(&self, children: &[Element]) -> Vec<NodeRef> {
        let mut seen: Vec<(String, usize)> = Vec::new();
        children
            .iter()
            .map(|child| {
                let name = child.name();
                let index = match seen.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, count)) => {
                        *count += 1;
                        *count
                    }
                    None => {
                        seen.push((name.clone(), 1));
                        1
                    }
                };
                NodeRef {
                    path: format!("{}/{}[{}]", self.path, name, index),
                    element: name,
                    attribute: None,
                }
            })
            .collect()
    }

    /// Same element, narrowed to an attribute
    pub fn with_attribute(&self, attribute: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            element: self.element.clone(),
            attribute: Some(attribute.into()),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attribute) => write!(f, "{}/@{}", self.path, attribute),
            None => write!(f, "{}", self.path),
        }
    }
}

/// One diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrorInfo {
    /// Rule id (`Sch_UnexpectedElementContent`)
    pub id: String,
    /// Human readable description
    pub description: String,
    /// Rule level
    pub error_type: ValidationErrorType,
    /// Offending node
    pub node: NodeRef,
    /// URI of the part holding the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_uri: Option<Arc<str>>,
}

impl ValidationErrorInfo {
    /// Create a diagnostic
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        error_type: ValidationErrorType,
        node: NodeRef,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            error_type,
            node,
            part_uri: None,
        }
    }

    /// Set the part URI
    pub fn with_part(mut self, part_uri: Arc<str>) -> Self {
        self.part_uri = Some(part_uri);
        self
    }
}

impl fmt::Display for ValidationErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(part) = &self.part_uri {
            write!(f, "{}:", part)?;
        }
        write!(f, "{} [{}] {}", self.node, self.id, self.description)
    }
}
