//! Document Validation
//!
//! Entry points validating a package, one of its parts, or a single element.
//! Preconditions are checked eagerly and reported as [`Error`]s; the findings
//! themselves come back as a lazy [`ValidationErrors`] sequence.

use std::sync::Arc;
use std::vec;

use tracing::debug;

use crate::documents::{Element, NodeKind};
use crate::error::{Error, Result};
use crate::packaging::{PackageStore, ProcessMode};
use crate::settings::ValidationSettings;
use crate::versions::FileFormatVersion;

use super::exceptions::ValidationErrorInfo;
use super::registry::{Registry, RegistryCache};
use super::schema_validation::SchemaValidator;
use super::semantic::SemanticValidator;
use super::validation::ValidationContext;

/// Validator for OOXML content against one target version
///
/// Cloning is cheap; clones share the registry cache.
#[derive(Debug, Clone)]
pub struct OpenXmlValidator {
    settings: ValidationSettings,
    registries: Arc<RegistryCache>,
}

impl OpenXmlValidator {
    /// Create a validator with default settings
    pub fn new(registries: Arc<RegistryCache>) -> Self {
        Self::with_settings(registries, ValidationSettings::default())
    }

    /// Create a validator with explicit settings
    pub fn with_settings(registries: Arc<RegistryCache>, settings: ValidationSettings) -> Self {
        Self {
            settings,
            registries,
        }
    }

    /// Get the settings
    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Target file format version
    pub fn file_format(&self) -> FileFormatVersion {
        self.settings.file_format
    }

    /// Maximum number of diagnostics per call (0 = unlimited)
    pub fn max_number_of_errors(&self) -> usize {
        self.settings.max_errors
    }

    /// Change the diagnostics bound
    ///
    /// # Errors
    /// `ArgumentOutOfRange` when `value` is negative.
    pub fn set_max_number_of_errors(&mut self, value: i64) -> Result<()> {
        self.settings.max_errors = ValidationSettings::check_max_errors(value)?;
        Ok(())
    }

    /// Registry of the target version, built on first use
    pub fn registry(&self) -> Result<Arc<Registry>> {
        self.registries.get(self.settings.file_format)
    }

    /// Validate every part of a package
    ///
    /// Parts without an element tree are skipped. Parts are validated one at a
    /// time as the result is consumed.
    pub fn validate_package<'a>(&self, package: &'a dyn PackageStore) -> Result<ValidationErrors<'a>> {
        self.check_compatibility(package)?;
        let registry = self.registry()?;
        Ok(ValidationErrors::new(
            registry,
            Source::Parts {
                package,
                uris: package.part_uris().into_iter(),
            },
            self.settings.max_errors,
        ))
    }

    /// Validate one part of a package
    ///
    /// # Errors
    /// `ArgumentNull` when the part does not exist or holds no element tree.
    pub fn validate_part<'a>(
        &self,
        package: &'a dyn PackageStore,
        part_uri: &str,
    ) -> Result<ValidationErrors<'a>> {
        let part = package
            .part(part_uri)
            .ok_or_else(|| Error::ArgumentNull(format!("part '{}'", part_uri)))?;
        if part.root().is_none() {
            return Err(Error::ArgumentNull(format!(
                "root element of part '{}'",
                part_uri
            )));
        }
        self.check_compatibility(package)?;
        let registry = self.registry()?;
        Ok(ValidationErrors::new(
            registry,
            Source::Parts {
                package,
                uris: vec![part_uri.to_string()].into_iter(),
            },
            self.settings.max_errors,
        ))
    }

    /// Validate an element, its attributes and its subtree
    ///
    /// # Errors
    /// `ArgumentOutOfRange` for unknown, misc and alternate-content nodes;
    /// `NotInVersion` when the element's kind does not exist in the target
    /// version.
    pub fn validate_element<'a>(&self, element: &'a Element) -> Result<ValidationErrors<'a>> {
        let kind = match element.node() {
            NodeKind::Typed { kind, .. } => kind,
            _ => {
                return Err(Error::out_of_range(
                    "element",
                    format!("'{}' is not governed by a content model", element.name()),
                ))
            }
        };

        let registry = self.registry()?;
        if !registry.contains(kind) {
            return Err(Error::NotInVersion {
                kind: kind.to_string(),
                version: registry.version(),
            });
        }

        Ok(ValidationErrors::new(
            registry,
            Source::Element(Some(element)),
            self.settings.max_errors,
        ))
    }

    fn check_compatibility(&self, package: &dyn PackageStore) -> Result<()> {
        let settings = package.open_settings().markup_compatibility;
        if settings.process_mode != ProcessMode::NoProcess
            && settings.target_version != self.settings.file_format
        {
            return Err(Error::VersionMismatch {
                document: settings.target_version,
                validator: self.settings.file_format,
            });
        }
        Ok(())
    }
}

enum Source<'a> {
    Element(Option<&'a Element>),
    Parts {
        package: &'a dyn PackageStore,
        uris: vec::IntoIter<String>,
    },
}

/// Lazy sequence of diagnostics
///
/// Each validation unit (the element, or one part) runs when the consumer
/// needs its first diagnostic. The error bound is shared by all units of one
/// call.
pub struct ValidationErrors<'a> {
    registry: Arc<Registry>,
    source: Source<'a>,
    pending: vec::IntoIter<ValidationErrorInfo>,
    max_errors: usize,
    emitted: usize,
}

impl<'a> ValidationErrors<'a> {
    fn new(registry: Arc<Registry>, source: Source<'a>, max_errors: usize) -> Self {
        Self {
            registry,
            source,
            pending: Vec::new().into_iter(),
            max_errors,
            emitted: 0,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.max_errors > 0 && self.emitted >= self.max_errors
    }

    /// Validate the next unit; `None` when nothing is left
    fn next_unit(&mut self) -> Option<Vec<ValidationErrorInfo>> {
        let budget = if self.max_errors == 0 {
            0
        } else {
            self.max_errors - self.emitted
        };
        let registry = &*self.registry;

        match &mut self.source {
            Source::Element(element) => {
                let element = element.take()?;
                let mut ctx = ValidationContext::new(registry, budget);
                run_passes(registry, element, &mut ctx);
                Some(ctx.into_errors())
            }
            Source::Parts { package, uris } => {
                let package: &dyn PackageStore = *package;
                for uri in uris.by_ref() {
                    let Some(root) = package.part(&uri).and_then(|p| p.root()) else {
                        continue;
                    };
                    debug!(part = %uri, "validating part");
                    let mut ctx = ValidationContext::new(registry, budget).with_part(package, &uri);
                    run_passes(registry, root, &mut ctx);
                    return Some(ctx.into_errors());
                }
                None
            }
        }
    }
}

impl Iterator for ValidationErrors<'_> {
    type Item = ValidationErrorInfo;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_exhausted() {
                return None;
            }
            if let Some(error) = self.pending.next() {
                self.emitted += 1;
                return Some(error);
            }
            let batch = self.next_unit()?;
            self.pending = batch.into_iter();
        }
    }
}

fn run_passes<'r>(registry: &'r Registry, root: &Element, ctx: &mut ValidationContext<'r>) {
    SchemaValidator::new(registry).validate(root, ctx);
    SemanticValidator::new(registry).validate(root, ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::namespaces::{NamespaceId, NamespaceTable, SchemaIdentity};
    use crate::packaging::{
        ApplicationType, MarkupCompatibilityProcessSettings, MemoryPackage, OpenSettings, Part,
    };
    use crate::validators::particles::ParticleNode;
    use crate::validators::registry::{Capability, ElementDescriptor};
    use pretty_assertions::assert_eq;

    const W: NamespaceId = NamespaceId(23);

    fn cache() -> Arc<RegistryCache> {
        let body = ElementDescriptor::new("w:body", SchemaIdentity::new(W, "body"), Capability::Composite)
            .with_content(ParticleNode::sequence(1, 1, vec![ParticleNode::element("w:p", 0, 1)]));
        let p = ElementDescriptor::new("w:p", SchemaIdentity::new(W, "p"), Capability::LeafEmpty);
        let sdt = ElementDescriptor::new("w:sdt", SchemaIdentity::new(W, "sdt"), Capability::LeafEmpty)
            .since(FileFormatVersion::Office2010);
        Arc::new(RegistryCache::new(
            Arc::new(NamespaceTable::standard()),
            vec![Arc::new(body), Arc::new(p), Arc::new(sdt)],
        ))
    }

    fn body_with_paragraphs(registry: &Registry, count: usize) -> Element {
        let mut body = registry.create(W, "body").unwrap();
        for _ in 0..count {
            body.push_child(registry.create(W, "p").unwrap());
        }
        body
    }

    #[test]
    fn test_element_errors_are_bounded() {
        let mut validator = OpenXmlValidator::new(cache());
        let registry = validator.registry().unwrap();
        let body = body_with_paragraphs(&registry, 50);

        validator.set_max_number_of_errors(0).unwrap();
        assert_eq!(validator.validate_element(&body).unwrap().count(), 49);

        validator.set_max_number_of_errors(10).unwrap();
        assert_eq!(validator.validate_element(&body).unwrap().count(), 10);
    }

    #[test]
    fn test_negative_bound_rejected() {
        let mut validator = OpenXmlValidator::new(cache());
        let err = validator.set_max_number_of_errors(-5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentOutOfRange);
        assert_eq!(validator.max_number_of_errors(), 1000);
    }

    #[test]
    fn test_placeholder_elements_rejected() {
        let validator = OpenXmlValidator::new(cache());
        for element in [
            Element::unknown("w:bogus", None),
            Element::comment("c"),
            Element::alternate_content(),
        ] {
            let err = validator.validate_element(&element).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::ArgumentOutOfRange);
        }
    }

    #[test]
    fn test_kind_not_in_version() {
        let sdt = Element::typed("w:sdt".into(), SchemaIdentity::new(W, "sdt"), Capability::LeafEmpty);

        let validator = OpenXmlValidator::new(cache());
        let err = validator.validate_element(&sdt).err().unwrap();
        assert!(matches!(err, Error::NotInVersion { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        let newer = OpenXmlValidator::with_settings(
            cache(),
            ValidationSettings::new().with_file_format(FileFormatVersion::Office2010),
        );
        assert_eq!(newer.validate_element(&sdt).unwrap().count(), 0);
    }

    #[test]
    fn test_package_parts_tagged_and_budget_shared() {
        let validator = OpenXmlValidator::with_settings(cache(), ValidationSettings::new().with_max_errors(3));
        let registry = validator.registry().unwrap();
        let package = MemoryPackage::new(ApplicationType::Word)
            .with_part(Part::new("/word/a.xml", body_with_paragraphs(&registry, 3)))
            .with_part(Part::binary("/word/media/image1.png"))
            .with_part(Part::new("/word/b.xml", body_with_paragraphs(&registry, 4)));

        let errors: Vec<_> = validator.validate_package(&package).unwrap().collect();
        let parts: Vec<_> = errors.iter().map(|e| e.part_uri.as_deref().unwrap()).collect();
        assert_eq!(parts, vec!["/word/a.xml", "/word/a.xml", "/word/b.xml"]);

        let single: Vec<_> = validator.validate_part(&package, "/word/b.xml").unwrap().collect();
        assert_eq!(single.len(), 3);
        assert!(single.iter().all(|e| e.id == "Sch_TooManyElements"));
    }

    #[test]
    fn test_part_preconditions() {
        let validator = OpenXmlValidator::new(cache());
        let package = MemoryPackage::new(ApplicationType::Word).with_part(Part::binary("/media/x.png"));

        let missing = validator.validate_part(&package, "/word/document.xml").err().unwrap();
        assert_eq!(missing.kind(), ErrorKind::ArgumentNull);
        let rootless = validator.validate_part(&package, "/media/x.png").err().unwrap();
        assert_eq!(rootless.kind(), ErrorKind::ArgumentNull);
    }

    #[test]
    fn test_version_mismatch() {
        let validator = OpenXmlValidator::new(cache());
        let registry = validator.registry().unwrap();
        let settings = OpenSettings {
            markup_compatibility: MarkupCompatibilityProcessSettings::new(
                ProcessMode::ProcessAllParts,
                FileFormatVersion::Office2013,
            ),
        };
        let package = MemoryPackage::new(ApplicationType::Word)
            .with_settings(settings)
            .with_part(Part::new("/word/document.xml", body_with_paragraphs(&registry, 5)));

        let err = validator.validate_package(&package).err().unwrap();
        assert!(matches!(err, Error::VersionMismatch { .. }));
        let err = validator.validate_part(&package, "/word/document.xml").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        let matching = OpenXmlValidator::with_settings(
            cache(),
            ValidationSettings::new().with_file_format(FileFormatVersion::Office2013),
        );
        assert_eq!(matching.validate_package(&package).unwrap().count(), 4);
    }

    #[test]
    fn test_parts_validated_on_demand() {
        let validator = OpenXmlValidator::new(cache());
        let registry = validator.registry().unwrap();
        let package = MemoryPackage::new(ApplicationType::Word)
            .with_part(Part::new("/a.xml", body_with_paragraphs(&registry, 2)))
            .with_part(Part::new("/b.xml", body_with_paragraphs(&registry, 2)));

        let mut errors = validator.validate_package(&package).unwrap();
        let first = errors.next().unwrap();
        assert_eq!(first.part_uri.as_deref(), Some("/a.xml"));
        assert!(errors.pending.as_slice().is_empty());
        assert_eq!(errors.emitted, 1);
        assert!(matches!(&errors.source, Source::Parts { uris, .. } if uris.len() == 1));
    }

    #[test]
    fn test_idempotent() {
        let validator = OpenXmlValidator::new(cache());
        let registry = validator.registry().unwrap();
        let body = body_with_paragraphs(&registry, 4);

        let first: Vec<_> = validator.validate_element(&body).unwrap().collect();
        let second: Vec<_> = validator.validate_element(&body).unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
