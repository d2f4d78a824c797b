//! Simple types for attribute and text values
//!
//! A [`SimpleType`] pairs a primitive lexical space with a variety (atomic or
//! whitespace-separated list) and a set of constraining facets. Parsing never
//! fails hard: the result is a [`ParsedValue`] carrying a validity flag, which
//! the value validators turn into diagnostics.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{ParseError, Result};

lazy_static! {
    static ref HEX_BINARY_REGEX: Regex = Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap();
}

/// Primitive lexical spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Any string, whitespace preserved
    String,
    /// Whitespace-collapsed string
    Token,
    /// xsd:boolean (`true`, `false`, `1`, `0`)
    Boolean,
    /// ST_OnOff (`true`, `false`, `on`, `off`, `1`, `0`)
    OnOff,
    /// 64-bit signed integer
    Integer,
    /// 32-bit unsigned integer
    UnsignedInt,
    /// Decimal number
    Decimal,
    /// Hex-encoded bytes
    HexBinary,
    /// Base64-encoded bytes
    Base64Binary,
    /// Date and time, optional offset
    DateTime,
}

impl PrimitiveType {
    /// Parse from a type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "boolean" => Some(Self::Boolean),
            "onOff" => Some(Self::OnOff),
            "integer" | "int" | "long" => Some(Self::Integer),
            "unsignedInt" => Some(Self::UnsignedInt),
            "decimal" => Some(Self::Decimal),
            "hexBinary" => Some(Self::HexBinary),
            "base64Binary" => Some(Self::Base64Binary),
            "dateTime" => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Get the type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Token => "token",
            Self::Boolean => "boolean",
            Self::OnOff => "onOff",
            Self::Integer => "integer",
            Self::UnsignedInt => "unsignedInt",
            Self::Decimal => "decimal",
            Self::HexBinary => "hexBinary",
            Self::Base64Binary => "base64Binary",
            Self::DateTime => "dateTime",
        }
    }

    /// Whether values are whitespace-collapsed before parsing
    pub fn collapses_whitespace(&self) -> bool {
        !matches!(self, Self::String)
    }

    /// Parse one lexical value
    pub fn parse(&self, value: &str) -> Option<TypedValue> {
        match self {
            Self::String | Self::Token => Some(TypedValue::String(value.to_string())),
            Self::Boolean => match value {
                "true" | "1" => Some(TypedValue::Boolean(true)),
                "false" | "0" => Some(TypedValue::Boolean(false)),
                _ => None,
            },
            Self::OnOff => match value {
                "true" | "on" | "1" => Some(TypedValue::Boolean(true)),
                "false" | "off" | "0" => Some(TypedValue::Boolean(false)),
                _ => None,
            },
            Self::Integer => value.parse::<i64>().ok().map(TypedValue::Integer),
            Self::UnsignedInt => value
                .parse::<u32>()
                .ok()
                .map(|v| TypedValue::Integer(i64::from(v))),
            Self::Decimal => {
                if value.contains(['e', 'E']) {
                    None
                } else {
                    Decimal::from_str(value).ok().map(TypedValue::Decimal)
                }
            }
            Self::HexBinary => {
                if !HEX_BINARY_REGEX.is_match(value) {
                    return None;
                }
                (0..value.len())
                    .step_by(2)
                    .map(|i| u8::from_str_radix(&value[i..i + 2], 16).ok())
                    .collect::<Option<Vec<u8>>>()
                    .map(TypedValue::Binary)
            }
            Self::Base64Binary => {
                let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(cleaned)
                    .ok()
                    .map(TypedValue::Binary)
            }
            Self::DateTime => parse_datetime(value).map(TypedValue::DateTime),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// A parsed value in its value space
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// String or token
    String(String),
    /// Boolean or on/off
    Boolean(bool),
    /// Integer
    Integer(i64),
    /// Decimal
    Decimal(Decimal),
    /// Decoded bytes
    Binary(Vec<u8>),
    /// Date and time normalized to UTC when an offset was given
    DateTime(NaiveDateTime),
}

impl TypedValue {
    /// Numeric view used by range facets
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            TypedValue::Integer(i) => Some(Decimal::from(*i)),
            TypedValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

/// Atomic or list variety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variety {
    /// A single value
    #[default]
    Atomic,
    /// Whitespace-separated values
    List,
}

/// Regular expression facet, anchored to the whole value
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            ParseError::new(format!("Invalid pattern '{}': {}", source, e))
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Get the pattern text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether a value matches
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Constraining facet
#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    /// Exact length
    Length(usize),
    /// Minimum length
    MinLength(usize),
    /// Maximum length
    MaxLength(usize),
    /// Lexical pattern
    Pattern(Pattern),
    /// Inclusive lower bound
    MinInclusive(Decimal),
    /// Inclusive upper bound
    MaxInclusive(Decimal),
    /// Allowed lexical values
    Enumeration(Vec<String>),
}

/// A simple type: primitive, variety and facets
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleType {
    name: Arc<str>,
    primitive: PrimitiveType,
    variety: Variety,
    facets: Vec<Facet>,
}

impl SimpleType {
    /// Atomic type named after its primitive
    pub fn new(primitive: PrimitiveType) -> Self {
        Self {
            name: Arc::from(primitive.as_str()),
            primitive,
            variety: Variety::Atomic,
            facets: Vec::new(),
        }
    }

    /// List of a primitive
    pub fn list(primitive: PrimitiveType) -> Self {
        Self {
            name: Arc::from(format!("list of {}", primitive).as_str()),
            primitive,
            variety: Variety::List,
            facets: Vec::new(),
        }
    }

    /// xsd:string
    pub fn string() -> Self {
        Self::new(PrimitiveType::String)
    }

    /// xsd:token
    pub fn token() -> Self {
        Self::new(PrimitiveType::Token)
    }

    /// ST_OnOff
    pub fn on_off() -> Self {
        Self::new(PrimitiveType::OnOff)
    }

    /// Rename the type (e.g. `ST_Jc`)
    pub fn named(mut self, name: impl AsRef<str>) -> Self {
        self.name = Arc::from(name.as_ref());
        self
    }

    /// Add a facet
    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    /// Restrict to an enumeration
    pub fn with_enumeration<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_facet(Facet::Enumeration(values.into_iter().map(Into::into).collect()))
    }

    /// Get the type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the primitive
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    /// Get the variety
    pub fn variety(&self) -> Variety {
        self.variety
    }

    /// Get the facets
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Parse a raw value
    pub fn parse(&self, raw: &str) -> ParsedValue {
        let lexical = if self.primitive.collapses_whitespace() || self.variety == Variety::List {
            collapse(raw)
        } else {
            raw.to_string()
        };

        match self.variety {
            Variety::Atomic => {
                let value = self.primitive.parse(&lexical);
                let is_valid = value.is_some();
                ParsedValue {
                    raw: raw.to_string(),
                    lexical,
                    items: value.into_iter().collect(),
                    is_valid,
                }
            }
            Variety::List => {
                let parsed: Option<Vec<TypedValue>> = lexical
                    .split(' ')
                    .filter(|s| !s.is_empty())
                    .map(|item| self.primitive.parse(item))
                    .collect();
                let is_valid = parsed.is_some();
                ParsedValue {
                    raw: raw.to_string(),
                    lexical,
                    items: parsed.unwrap_or_default(),
                    is_valid,
                }
            }
        }
    }
}

impl fmt::Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn collapse(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of parsing a raw value against a simple type
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    /// Text as found in the document
    pub raw: String,
    /// Text after whitespace normalization
    pub lexical: String,
    /// Parsed items: one for atomic values, any number for lists
    pub items: Vec<TypedValue>,
    /// Whether the value belongs to the type's lexical space
    pub is_valid: bool,
}

impl ParsedValue {
    /// Whether the document supplied no text at all
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Length as measured by length facets
    pub fn length(&self, variety: Variety) -> usize {
        match variety {
            Variety::List => self.items.len(),
            Variety::Atomic => match self.items.first() {
                Some(TypedValue::Binary(bytes)) => bytes.len(),
                _ => self.lexical.chars().count(),
            },
        }
    }
}
