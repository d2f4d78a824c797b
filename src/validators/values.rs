//! Value-level validators
//!
//! Each validator inspects the top [`ValueFrame`] of the context and reports
//! what it finds. The data type checks run on every value; facet checks only
//! on values that parsed.

use super::exceptions::ValidationErrorType;
use super::simple_types::{Facet, Variety};
use super::validation::{ErrorCollector, ValidationContext, ValueFrame};

/// A check applied to the current value frame
pub trait ValueValidator: Sync {
    /// Inspect a frame and report findings
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector);

    /// Run against the top frame of a context, if any
    fn validate(&self, ctx: &mut ValidationContext<'_>) {
        if let Some((frame, errors)) = ctx.current_with_errors() {
            self.check(frame, errors);
        }
    }
}

/// Validators run for each value, in order
pub static VALUE_VALIDATORS: [&dyn ValueValidator; 6] = [
    &DataTypeValidator,
    &ListValidator,
    &LengthValidator,
    &PatternValidator,
    &RangeValidator,
    &EnumerationValidator,
];

/// Run every value validator against the top frame
pub fn validate_value(ctx: &mut ValidationContext<'_>) {
    for validator in VALUE_VALIDATORS.iter() {
        validator.validate(ctx);
    }
}

fn report_invalid_data(frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
    let (id, subject, empty_note) = if frame.is_attribute {
        (
            "Sch_AttributeValueDataTypeDetailed",
            "attribute",
            " The attribute value cannot be empty.",
        )
    } else {
        (
            "Sch_ElementValueDataTypeDetailed",
            "element",
            " The text value cannot be empty.",
        )
    };
    let note = if frame.value.is_empty() { empty_note } else { "" };

    errors.add(
        id,
        format!(
            "The {} '{}' has invalid value '{}'.{}",
            subject, frame.property.name, frame.value.raw, note
        ),
        ValidationErrorType::Schema,
        frame.node.clone(),
    );
}

/// Lexical check of atomic values
#[derive(Debug, Clone, Copy)]
pub struct DataTypeValidator;

impl ValueValidator for DataTypeValidator {
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
        if frame.property.value_type.variety() == Variety::Atomic && !frame.value.is_valid {
            report_invalid_data(frame, errors);
        }
    }
}

/// Lexical check of list values
#[derive(Debug, Clone, Copy)]
pub struct ListValidator;

impl ValueValidator for ListValidator {
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
        if frame.property.value_type.variety() == Variety::List && !frame.value.is_valid {
            report_invalid_data(frame, errors);
        }
    }
}

fn subject(frame: &ValueFrame<'_>) -> String {
    if frame.is_attribute {
        format!("attribute '{}'", frame.property.name)
    } else {
        format!("element '{}'", frame.property.name)
    }
}

/// `length`, `minLength` and `maxLength` facets
#[derive(Debug, Clone, Copy)]
pub struct LengthValidator;

impl ValueValidator for LengthValidator {
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
        if !frame.value.is_valid {
            return;
        }
        let value_type = frame.property.value_type;
        let length = frame.value.length(value_type.variety());

        for facet in value_type.facets() {
            let violated = match facet {
                Facet::Length(n) => (length != *n).then(|| format!("must be exactly {}", n)),
                Facet::MinLength(n) => (length < *n).then(|| format!("must be at least {}", n)),
                Facet::MaxLength(n) => (length > *n).then(|| format!("must be at most {}", n)),
                _ => None,
            };
            if let Some(constraint) = violated {
                errors.add(
                    "Sch_StringLengthConstraintFailed",
                    format!(
                        "The {} has invalid value '{}'. Its length {} ({}).",
                        subject(frame),
                        frame.value.raw,
                        constraint,
                        length
                    ),
                    ValidationErrorType::Schema,
                    frame.node.clone(),
                );
            }
        }
    }
}

/// `pattern` facets
#[derive(Debug, Clone, Copy)]
pub struct PatternValidator;

impl ValueValidator for PatternValidator {
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
        if !frame.value.is_valid {
            return;
        }
        for facet in frame.property.value_type.facets() {
            if let Facet::Pattern(pattern) = facet {
                if !pattern.is_match(&frame.value.lexical) {
                    errors.add(
                        "Sch_PatternConstraintFailed",
                        format!(
                            "The {} has invalid value '{}'. The pattern constraint failed. The expected pattern is {}.",
                            subject(frame),
                            frame.value.raw,
                            pattern.as_str()
                        ),
                        ValidationErrorType::Schema,
                        frame.node.clone(),
                    );
                }
            }
        }
    }
}

/// `minInclusive` and `maxInclusive` facets
#[derive(Debug, Clone, Copy)]
pub struct RangeValidator;

impl ValueValidator for RangeValidator {
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
        if !frame.value.is_valid {
            return;
        }
        let numbers: Vec<_> = frame.value.items.iter().filter_map(|v| v.as_decimal()).collect();
        if numbers.is_empty() {
            return;
        }

        for facet in frame.property.value_type.facets() {
            let (id, bound, failed) = match facet {
                Facet::MinInclusive(min) => (
                    "Sch_MinInclusiveConstraintFailed",
                    format!("greater than or equal to {}", min),
                    numbers.iter().any(|n| n < min),
                ),
                Facet::MaxInclusive(max) => (
                    "Sch_MaxInclusiveConstraintFailed",
                    format!("less than or equal to {}", max),
                    numbers.iter().any(|n| n > max),
                ),
                _ => continue,
            };
            if failed {
                errors.add(
                    id,
                    format!(
                        "The {} has invalid value '{}'. The value must be {}.",
                        subject(frame),
                        frame.value.raw,
                        bound
                    ),
                    ValidationErrorType::Schema,
                    frame.node.clone(),
                );
            }
        }
    }
}

/// `enumeration` facet
#[derive(Debug, Clone, Copy)]
pub struct EnumerationValidator;

impl ValueValidator for EnumerationValidator {
    fn check(&self, frame: &ValueFrame<'_>, errors: &mut ErrorCollector) {
        if !frame.value.is_valid {
            return;
        }
        let variety = frame.property.value_type.variety();

        for facet in frame.property.value_type.facets() {
            if let Facet::Enumeration(allowed) = facet {
                let lexical = frame.value.lexical.as_str();
                let ok = match variety {
                    Variety::Atomic => allowed.iter().any(|a| a == lexical),
                    Variety::List => lexical
                        .split(' ')
                        .filter(|s| !s.is_empty())
                        .all(|item| allowed.iter().any(|a| a == item)),
                };
                if !ok {
                    errors.add(
                        "Sch_EnumerationConstraintFailed",
                        format!(
                            "The {} has invalid value '{}'. The Enumeration constraint failed.",
                            subject(frame),
                            frame.value.raw
                        ),
                        ValidationErrorType::Schema,
                        frame.node.clone(),
                    );
                }
            }
        }
    }
}
