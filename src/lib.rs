//! # xml-config-persister Library
//!
//! Loads and stores configuration held in an XML document. The root element
//! of the document selects a registered parser; when the document does not
//! parse, the failure is normalized into a [`ValidationError`] and, given a
//! schema directory, explained with a source excerpt and schema-derived hints.

pub mod cli;
pub mod config;
pub mod error;
pub mod error_reporter;
pub mod logging;
pub mod output;
pub mod parsers;
pub mod persister;
pub mod qname;
pub mod reader;
pub mod registry;
pub mod report;
pub mod schema_loader;
pub mod translator;
pub mod validation;

pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigManager};
pub use error::{LoadFailureKind, PersistenceError, XmlStreamError};
pub use error_reporter::{Enriched, ErrorReporter, Unavailable};
pub use output::{FailureReport, LoadReport, Output};
pub use parsers::{ElementTreeDeparser, ElementTreeParser};
pub use persister::{
    ConfigurationPersister, FilePersistenceResource, ModelDeparser, PersistenceResource,
    XmlConfigurationPersister,
};
pub use qname::QualifiedName;
pub use reader::{StartElement, XmlEvent, XmlStreamReader};
pub use registry::{ModelNode, RootBindings, RootElementParser, RootParserRegistry};
pub use report::{DiagnosticSink, ErrorPrinter, NamespacedElementStringifier, Stringifier, TracingSink};
pub use schema_loader::{SchemaDocument, SchemaSet};
pub use translator::translate;
pub use validation::{ErrorKind, Location, ValidationError};
