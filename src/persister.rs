//! XML-backed configuration persister
//!
//! Loads the backing document through the root parser registry and, when the
//! document does not parse, turns the stream failure into a normalized
//! [`ValidationError`](crate::validation::ValidationError) and tries to print a
//! schema-aware report before surfacing a single
//! [`PersistenceError::ParseFailed`].

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PersistenceError, Result, XmlStreamError};
use crate::error_reporter::ErrorReporter;
use crate::qname::QualifiedName;
use crate::reader::XmlStreamReader;
use crate::registry::{ModelNode, RootElementParser, RootParserRegistry};
use crate::translator::{Translation, translate};

/// Loads and stores a configuration model
pub trait ConfigurationPersister {
    /// Every fragment of the persisted configuration, in document order
    fn load(&self) -> Result<Vec<ModelNode>>;

    /// Prepare `model` for writing. Nothing reaches the backing store until
    /// the returned resource is committed.
    fn store(
        &self,
        model: &ModelNode,
        affected_addresses: &[String],
    ) -> Result<Box<dyn PersistenceResource>>;

    /// Name of a snapshot of the current configuration; empty when snapshots
    /// are not supported
    fn snapshot(&self) -> Result<String>;

    /// Called once the process has booted from the loaded configuration
    fn successful_boot(&self) -> Result<()>;
}

/// Writes a model as XML
pub trait ModelDeparser: Send + Sync {
    fn write(&self, model: &ModelNode, out: &mut dyn Write) -> io::Result<()>;
}

/// A pending write of a marshalled model
pub trait PersistenceResource {
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>);
}

/// Replaces the backing file through a sibling temporary file and a rename
#[derive(Debug)]
pub struct FilePersistenceResource {
    path: PathBuf,
    marshalled: Vec<u8>,
}

impl FilePersistenceResource {
    /// Marshal `model` now; the file is only touched on commit
    pub fn new(model: &ModelNode, path: &Path, deparser: &dyn ModelDeparser) -> Result<Self> {
        let mut marshalled = Vec::new();
        deparser
            .write(model, &mut marshalled)
            .map_err(|source| PersistenceError::StoreFailed {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            marshalled,
        })
    }

    pub fn marshalled(&self) -> &[u8] {
        &self.marshalled
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "configuration".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl PersistenceResource for FilePersistenceResource {
    fn commit(self: Box<Self>) -> Result<()> {
        let temp = self.temp_path();
        let written = fs::write(&temp, &self.marshalled).and_then(|_| fs::rename(&temp, &self.path));

        if let Err(source) = written {
            let _ = fs::remove_file(&temp);
            return Err(PersistenceError::StoreFailed {
                path: self.path,
                source,
            });
        }

        info!(
            file = %self.path.display(),
            bytes = self.marshalled.len(),
            "Persisted configuration"
        );
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(file = %self.path.display(), "Discarded pending configuration write");
    }
}

/// Persister for a configuration held in one XML file
pub struct XmlConfigurationPersister {
    file: PathBuf,
    registry: RootParserRegistry,
    deparser: Arc<dyn ModelDeparser>,
    suppress_load: bool,
    reporter: ErrorReporter,
}

impl XmlConfigurationPersister {
    pub fn new(
        file: impl Into<PathBuf>,
        root: QualifiedName,
        parser: Arc<dyn RootElementParser>,
        deparser: Arc<dyn ModelDeparser>,
    ) -> Self {
        Self {
            file: file.into(),
            registry: RootParserRegistry::new(root, parser),
            deparser,
            suppress_load: false,
            reporter: ErrorReporter::new(None),
        }
    }

    /// Build from application configuration; the backing file must be set
    pub fn from_config(
        config: &Config,
        root: QualifiedName,
        parser: Arc<dyn RootElementParser>,
        deparser: Arc<dyn ModelDeparser>,
    ) -> Result<Self> {
        let file = config.persistence.file.clone().ok_or_else(|| {
            PersistenceError::Config("No configuration file is configured".to_string())
        })?;

        Ok(Self::new(file, root, parser, deparser)
            .with_suppress_load(config.persistence.suppress_load)
            .with_reporter(ErrorReporter::from_config(&config.schema)))
    }

    pub fn with_suppress_load(mut self, suppress_load: bool) -> Self {
        self.suppress_load = suppress_load;
        self
    }

    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn registry(&self) -> &RootParserRegistry {
        &self.registry
    }

    /// Accept documents rooted at `root`, parsed by `parser`. Replaces any
    /// parser already registered for that root.
    pub fn register_additional_root_element(
        &self,
        root: QualifiedName,
        parser: Arc<dyn RootElementParser>,
    ) {
        self.registry.register_root(root, parser);
    }

    fn parse(&self) -> Result<std::result::Result<Vec<ModelNode>, XmlStreamError>> {
        let bindings = self.registry.snapshot();

        let file = File::open(&self.file).map_err(|source| PersistenceError::ReadFailed {
            path: self.file.clone(),
            source,
        })?;
        let mut reader = XmlStreamReader::new(BufReader::new(file));

        let mut updates = Vec::new();
        Ok(bindings
            .parse_document(&mut reader, &mut updates)
            .map(|()| updates))
    }

    fn parse_failed(&self, failure: XmlStreamError) -> PersistenceError {
        let kind = failure.failure_kind();
        let Translation { error, enrichable } = translate(&failure);

        let reported = enrichable
            && match self.reporter.try_enrich(&error, &self.file) {
                Ok(enriched) => {
                    debug!(
                        lines = enriched.lines,
                        schemas = enriched.schemas,
                        "Printed schema-aware validation report"
                    );
                    true
                }
                Err(unavailable) => {
                    debug!(reason = %unavailable, "Schema-aware validation report unavailable");
                    false
                }
            };

        warn!(
            file = %self.file.display(),
            kind = ?kind,
            error = %error,
            "Failed to parse configuration"
        );

        PersistenceError::ParseFailed {
            kind,
            validation: Box::new(error),
            cause: (!reported).then_some(failure),
        }
    }
}

impl ConfigurationPersister for XmlConfigurationPersister {
    fn load(&self) -> Result<Vec<ModelNode>> {
        if self.suppress_load {
            debug!(file = %self.file.display(), "Configuration load suppressed");
            return Ok(Vec::new());
        }

        // Reader and file handle are released before any reporting
        match self.parse()? {
            Ok(updates) => {
                info!(
                    file = %self.file.display(),
                    fragments = updates.len(),
                    "Loaded configuration"
                );
                Ok(updates)
            }
            Err(failure) => Err(self.parse_failed(failure)),
        }
    }

    fn store(
        &self,
        model: &ModelNode,
        _affected_addresses: &[String],
    ) -> Result<Box<dyn PersistenceResource>> {
        let resource = FilePersistenceResource::new(model, &self.file, self.deparser.as_ref())?;
        Ok(Box::new(resource))
    }

    fn snapshot(&self) -> Result<String> {
        Ok(String::new())
    }

    fn successful_boot(&self) -> Result<()> {
        Ok(())
    }
}
