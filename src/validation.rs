//! Normalized validation errors
//!
//! A [`ValidationError`] is the single shape every configuration parse failure
//! is reduced to before it is reported: where it happened, what class of
//! problem it is, and whatever context the grammar that detected it could
//! attach (offending element, attribute, candidate names).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::qname::QualifiedName;

/// Position in a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line number
    pub line: u64,
    /// 1-based column, counted in bytes
    pub column: u64,
    /// 0-based byte offset from the start of the document
    pub offset: u64,
}

impl Location {
    pub fn new(line: u64, column: u64, offset: u64) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Classification of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    DuplicateElement,
    EmptyTag,
    InvalidAttributeValue,
    MissingAttributes,
    RequiredElementMissing,
    RequiredElementsMissing,
    UnexpectedAttribute,
    UnexpectedElement,
    UnsupportedElement,
    UnknownError,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateElement => "DUPLICATE_ELEMENT",
            ErrorKind::EmptyTag => "EMPTY_TAG",
            ErrorKind::InvalidAttributeValue => "INVALID_ATTRIBUTE_VALUE",
            ErrorKind::MissingAttributes => "MISSING_ATTRIBUTES",
            ErrorKind::RequiredElementMissing => "REQUIRED_ELEMENT_MISSING",
            ErrorKind::RequiredElementsMissing => "REQUIRED_ELEMENTS_MISSING",
            ErrorKind::UnexpectedAttribute => "UNEXPECTED_ATTRIBUTE",
            ErrorKind::UnexpectedElement => "UNEXPECTED_ELEMENT",
            ErrorKind::UnsupportedElement => "UNSUPPORTED_ELEMENT",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A located, classified description of why a configuration document failed to parse
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    kind: ErrorKind,
    location: Location,
    message: Option<String>,
    fallback_message: Option<String>,
    element: Option<QualifiedName>,
    attribute: Option<QualifiedName>,
    attribute_value: Option<String>,
    alternatives: BTreeSet<String>,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, location: Location) -> Self {
        Self {
            kind,
            location,
            message: None,
            fallback_message: None,
            element: None,
            attribute: None,
            attribute_value: None,
            alternatives: BTreeSet::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_element(mut self, element: QualifiedName) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_attribute(mut self, attribute: QualifiedName) -> Self {
        self.attribute = Some(attribute);
        self
    }

    pub fn with_attribute_value(mut self, value: impl Into<String>) -> Self {
        self.attribute_value = Some(value.into());
        self
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives
            .extend(alternatives.into_iter().map(Into::into));
        self
    }

    /// Message used when nothing more specific can be said about the error
    pub fn set_fallback_message(&mut self, message: impl Into<String>) {
        self.fallback_message = Some(message.into());
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn fallback_message(&self) -> Option<&str> {
        self.fallback_message.as_deref()
    }

    pub fn element(&self) -> Option<&QualifiedName> {
        self.element.as_ref()
    }

    pub fn attribute(&self) -> Option<&QualifiedName> {
        self.attribute.as_ref()
    }

    pub fn attribute_value(&self) -> Option<&str> {
        self.attribute_value.as_deref()
    }

    pub fn alternatives(&self) -> &BTreeSet<String> {
        &self.alternatives
    }

    /// One-line, operator-facing description of the problem
    pub fn summary(&self) -> String {
        let element = self
            .element
            .as_ref()
            .map(|e| e.local_name().to_string())
            .unwrap_or_else(|| "element".to_string());
        let attribute = self
            .attribute
            .as_ref()
            .map(|a| a.local_name().to_string())
            .unwrap_or_else(|| "attribute".to_string());

        match self.kind {
            ErrorKind::DuplicateElement => {
                format!("'{}' can't appear more than once here", element)
            }
            ErrorKind::EmptyTag => format!("'{}' can't be empty", element),
            ErrorKind::InvalidAttributeValue => format!(
                "'{}' isn't an allowed value for the '{}' attribute",
                self.attribute_value.as_deref().unwrap_or_default(),
                attribute
            ),
            ErrorKind::MissingAttributes => {
                format!("'{}' is missing one or more required attributes", element)
            }
            ErrorKind::RequiredElementMissing => {
                format!("'{}' is missing a required child element", element)
            }
            ErrorKind::RequiredElementsMissing => {
                format!("'{}' is missing required child elements", element)
            }
            ErrorKind::UnexpectedAttribute => format!(
                "'{}' isn't an allowed attribute for the '{}' element",
                attribute, element
            ),
            ErrorKind::UnexpectedElement => {
                format!("'{}' isn't an allowed element here", element)
            }
            ErrorKind::UnsupportedElement => {
                format!("'{}' is recognized but not supported here", element)
            }
            ErrorKind::UnknownError => self
                .message
                .clone()
                .or_else(|| self.fallback_message.clone())
                .unwrap_or_else(|| "An unknown error occurred".to_string()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.location, self.summary())
    }
}

impl std::error::Error for ValidationError {}
