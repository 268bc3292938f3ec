use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::qname::QualifiedName;
use crate::validation::{Location, ValidationError};

/// Failure raised while streaming a configuration document through a grammar
#[derive(Error, Debug)]
pub enum XmlStreamError {
    /// A grammar detected a semantic problem and attached a located, classified error
    #[error("{0}")]
    Validation(Box<ValidationError>),

    #[error("ParseError at [row,col]:[{},{}]\nMessage: Unexpected root element '{name}'; no parser is registered for it", .location.line, .location.column)]
    UnregisteredRoot {
        name: QualifiedName,
        location: Location,
        registered: Vec<QualifiedName>,
    },

    #[error("ParseError at [row,col]:[{},{}]\nMessage: {message}", .location.line, .location.column)]
    Malformed { location: Location, message: String },

    #[error("I/O error while reading XML stream: {0}")]
    Io(#[from] std::io::Error),
}

impl XmlStreamError {
    /// Where in the document the failure was detected, when known
    pub fn location(&self) -> Option<Location> {
        match self {
            XmlStreamError::Validation(error) => Some(error.location()),
            XmlStreamError::UnregisteredRoot { location, .. } => Some(*location),
            XmlStreamError::Malformed { location, .. } => Some(*location),
            XmlStreamError::Io(_) => None,
        }
    }

    pub fn failure_kind(&self) -> LoadFailureKind {
        match self {
            XmlStreamError::Validation(_) => LoadFailureKind::StructuredValidation,
            XmlStreamError::UnregisteredRoot { .. } => LoadFailureKind::UnregisteredRoot,
            XmlStreamError::Malformed { .. } | XmlStreamError::Io(_) => {
                LoadFailureKind::UnstructuredStream
            }
        }
    }
}

impl From<ValidationError> for XmlStreamError {
    fn from(error: ValidationError) -> Self {
        XmlStreamError::Validation(Box::new(error))
    }
}

/// Which branch of the failure taxonomy a failed load went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailureKind {
    UnregisteredRoot,
    StructuredValidation,
    UnstructuredStream,
}

/// Error surfaced by a configuration persister
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The document could not be parsed. `cause` is `None` when a schema-aware
    /// report has already been printed.
    #[error("Failed to parse configuration")]
    ParseFailed {
        kind: LoadFailureKind,
        validation: Box<ValidationError>,
        #[source]
        cause: Option<XmlStreamError>,
    },

    #[error("Failed to parse configuration: unable to read {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist configuration to {path}")]
    StoreFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PersistenceError {
    /// The normalized validation error, for parse failures
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            PersistenceError::ParseFailed { validation, .. } => Some(validation.as_ref()),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<LoadFailureKind> {
        match self {
            PersistenceError::ParseFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Stream result type alias
pub type StreamResult<T> = std::result::Result<T, XmlStreamError>;
