//! Validation context
//!
//! A [`ValidationContext`] holds the mutable state of one validation run: the
//! bounded list of collected diagnostics and the stack of value frames. It is
//! owned by the call that created it and never shared between threads.

use std::sync::Arc;

use tracing::trace;

use crate::packaging::{ApplicationType, PackageStore};
use crate::versions::FileFormatVersion;

use super::exceptions::{NodeRef, ValidationErrorInfo, ValidationErrorType};
use super::registry::Registry;
use super::simple_types::{ParsedValue, SimpleType};

/// Bounded list of diagnostics
///
/// Once `max_errors` diagnostics are held (when `max_errors > 0`), further
/// additions are dropped. `max_errors == 0` means unlimited.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    max_errors: usize,
    errors: Vec<ValidationErrorInfo>,
    part_uri: Option<Arc<str>>,
    dropped: usize,
}

impl ErrorCollector {
    /// Create a collector
    pub fn new(max_errors: usize) -> Self {
        Self {
            max_errors,
            ..Default::default()
        }
    }

    /// Tag collected diagnostics with a part URI
    pub fn with_part(mut self, part_uri: Arc<str>) -> Self {
        self.part_uri = Some(part_uri);
        self
    }

    /// Check whether the bound is reached
    pub fn is_full(&self) -> bool {
        self.max_errors > 0 && self.errors.len() >= self.max_errors
    }

    /// Record a diagnostic unless the bound is reached
    pub fn add(
        &mut self,
        id: &str,
        description: String,
        error_type: ValidationErrorType,
        node: NodeRef,
    ) {
        if self.is_full() {
            if self.dropped == 0 {
                trace!(max_errors = self.max_errors, "error budget exhausted");
            }
            self.dropped += 1;
            return;
        }

        let mut info = ValidationErrorInfo::new(id, description, error_type, node);
        if let Some(part) = &self.part_uri {
            info = info.with_part(Arc::clone(part));
        }
        self.errors.push(info);
    }

    /// Number of collected diagnostics
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Check if nothing was collected
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of diagnostics dropped by the bound
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Get the collected diagnostics
    pub fn errors(&self) -> &[ValidationErrorInfo] {
        &self.errors
    }
}

/// Declaration a value is validated against
#[derive(Debug, Clone, Copy)]
pub struct PropertyRef<'a> {
    /// Attribute or element name
    pub name: &'a str,
    /// Declared type
    pub value_type: &'a SimpleType,
}

/// One attribute or text value under validation
#[derive(Debug, Clone)]
pub struct ValueFrame<'a> {
    /// Declaration of the value
    pub property: PropertyRef<'a>,
    /// Parsed value
    pub value: ParsedValue,
    /// Whether the value is an attribute (otherwise element text)
    pub is_attribute: bool,
    /// Node holding the value
    pub node: NodeRef,
}

impl<'a> ValueFrame<'a> {
    /// Parse `raw` against a declaration
    pub fn new(name: &'a str, value_type: &'a SimpleType, raw: &str, is_attribute: bool, node: NodeRef) -> Self {
        Self {
            property: PropertyRef { name, value_type },
            value: value_type.parse(raw),
            is_attribute,
            node,
        }
    }
}

/// Mutable state of one validation run
pub struct ValidationContext<'a> {
    registry: &'a Registry,
    application_type: ApplicationType,
    package: Option<(&'a dyn PackageStore, &'a str)>,
    collector: ErrorCollector,
    stack: Vec<ValueFrame<'a>>,
}

impl<'a> ValidationContext<'a> {
    /// Create a context over a registry with an error bound
    pub fn new(registry: &'a Registry, max_errors: usize) -> Self {
        Self {
            registry,
            application_type: ApplicationType::All,
            package: None,
            collector: ErrorCollector::new(max_errors),
            stack: Vec::new(),
        }
    }

    /// Validate within a part of a package
    pub fn with_part(mut self, package: &'a dyn PackageStore, part_uri: &'a str) -> Self {
        self.application_type = package.application_type();
        self.package = Some((package, part_uri));
        self.collector = std::mem::take(&mut self.collector).with_part(Arc::from(part_uri));
        self
    }

    /// Override the application type used to select semantic rules
    pub fn with_application_type(mut self, application_type: ApplicationType) -> Self {
        self.application_type = application_type;
        self
    }

    /// Get the registry
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Get the target version
    pub fn version(&self) -> FileFormatVersion {
        self.registry.version()
    }

    /// Get the application type
    pub fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    /// Package and part URI, when validating a part
    pub fn package(&self) -> Option<(&'a dyn PackageStore, &'a str)> {
        self.package
    }

    /// Record a diagnostic
    pub fn create_error(
        &mut self,
        id: &str,
        description: String,
        error_type: ValidationErrorType,
        node: NodeRef,
    ) {
        self.collector.add(id, description, error_type, node);
    }

    /// Check whether the error bound is reached
    pub fn is_full(&self) -> bool {
        self.collector.is_full()
    }

    /// Get the collected diagnostics
    pub fn errors(&self) -> &[ValidationErrorInfo] {
        self.collector.errors()
    }

    /// Push a value frame
    pub fn push_frame(&mut self, frame: ValueFrame<'a>) {
        self.stack.push(frame);
    }

    /// Pop the top value frame
    pub fn pop_frame(&mut self) -> Option<ValueFrame<'a>> {
        self.stack.pop()
    }

    /// Get the top value frame
    pub fn current(&self) -> Option<&ValueFrame<'a>> {
        self.stack.last()
    }

    /// Top frame together with the collector, for value validators
    pub fn current_with_errors(&mut self) -> Option<(&ValueFrame<'a>, &mut ErrorCollector)> {
        let frame = self.stack.last()?;
        Some((frame, &mut self.collector))
    }

    /// Finish the run and take the diagnostics
    pub fn into_errors(self) -> Vec<ValidationErrorInfo> {
        self.collector.errors
    }
}
