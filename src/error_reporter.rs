//! Schema-aware enrichment of validation errors
//!
//! Best effort by contract: every path either prints a complete report through
//! the diagnostic sink or returns [`Unavailable`] without printing anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};

use crate::config::{DEFAULT_BOUNDARY_ELEMENT, DEFAULT_CONTEXT_LINES, DEFAULT_SCHEMA_EXTENSION, SchemaConfig};
use crate::report::{
    DiagnosticSink, ErrorPrinter, NamespacedElementStringifier, ReportError, Stringifier,
    TracingSink,
};
use crate::schema_loader::{SchemaError, SchemaSet};
use crate::validation::ValidationError;

/// A report was printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enriched {
    /// Lines handed to the sink
    pub lines: usize,
    /// Schema documents consulted
    pub schemas: usize,
}

/// Why no report was printed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    #[error("No schema directory is configured")]
    NotConfigured,

    #[error("Schema directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("Schema directory {0} is empty")]
    EmptyDirectory(PathBuf),

    #[error("Failed to pretty print validation error: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
enum EnrichError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Prints schema-aware reports for validation errors
pub struct ErrorReporter {
    schema_directory: Option<PathBuf>,
    extension: String,
    context_lines: usize,
    stringifiers: Vec<Arc<dyn Stringifier>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ErrorReporter {
    /// Reporter with default settings writing to the log
    pub fn new(schema_directory: Option<PathBuf>) -> Self {
        Self {
            schema_directory,
            extension: DEFAULT_SCHEMA_EXTENSION.to_string(),
            context_lines: DEFAULT_CONTEXT_LINES,
            stringifiers: vec![Arc::new(NamespacedElementStringifier::new([
                DEFAULT_BOUNDARY_ELEMENT,
            ]))],
            sink: Arc::new(TracingSink),
        }
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        Self {
            schema_directory: config.directory.clone(),
            extension: config.extension.clone(),
            context_lines: config.context_lines,
            stringifiers: vec![Arc::new(NamespacedElementStringifier::new(
                config.boundary_elements.iter().cloned(),
            ))],
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_stringifier(mut self, stringifier: Arc<dyn Stringifier>) -> Self {
        self.stringifiers.push(stringifier);
        self
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn schema_directory(&self) -> Option<&Path> {
        self.schema_directory.as_deref()
    }

    /// Print a schema-aware report for `error` found in `document`.
    ///
    /// Schemas are discovered anew on every call. Nothing reaches the sink
    /// unless the whole report rendered.
    pub fn try_enrich(
        &self,
        error: &ValidationError,
        document: &Path,
    ) -> Result<Enriched, Unavailable> {
        let directory = self
            .schema_directory
            .as_deref()
            .ok_or(Unavailable::NotConfigured)?;

        if !directory.is_dir() {
            debug!(directory = %directory.display(), "Schema directory not found");
            return Err(Unavailable::MissingDirectory(directory.to_path_buf()));
        }

        let has_entries = fs::read_dir(directory)
            .map(|mut entries| entries.next().is_some())
            .map_err(|e| self.failed(EnrichError::Schema(SchemaError::Io {
                path: directory.to_path_buf(),
                source: e,
            })))?;
        if !has_entries {
            debug!(directory = %directory.display(), "Schema directory is empty");
            return Err(Unavailable::EmptyDirectory(directory.to_path_buf()));
        }

        self.report(error, document, directory)
            .map_err(|e| self.failed(e))
    }

    fn report(
        &self,
        error: &ValidationError,
        document: &Path,
        directory: &Path,
    ) -> Result<Enriched, EnrichError> {
        let paths = SchemaSet::discover(directory, &self.extension)?;
        let schemas = SchemaSet::load(&paths)?;
        let printer = ErrorPrinter::new(&schemas, &self.stringifiers, self.context_lines);
        let lines = printer.print(error, document, self.sink.as_ref())?;
        Ok(Enriched {
            lines,
            schemas: schemas.len(),
        })
    }

    fn failed(&self, cause: EnrichError) -> Unavailable {
        error!(error = %cause, "Failed to pretty print validation error");
        Unavailable::Failed(cause.to_string())
    }
}
