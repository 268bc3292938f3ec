use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::qname::QualifiedName;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    /// Show one line per document
    #[default]
    Normal,
    /// Also list loaded fragments and error chains
    Verbose,
}

/// Output format for the load outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Load an XML configuration document and explain why it does not parse
#[derive(Parser, Debug, Clone)]
#[command(name = "xml-config-check")]
#[command(
    about = "Load an XML configuration document and report parse failures with schema context"
)]
#[command(version)]
pub struct Cli {
    /// Configuration document to load (overrides the configured file)
    pub file: Option<PathBuf>,

    /// Configuration file for this tool (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Root element to accept, in Clark notation (e.g. '{urn:example:domain:1.0}server').
    /// The first one is the primary root.
    #[arg(
        short = 'r',
        long = "root",
        action = clap::ArgAction::Append,
        default_value = "server"
    )]
    pub roots: Vec<String>,

    /// Directory holding the schema documents used in error reports
    #[arg(long = "schema-dir")]
    pub schema_dir: Option<PathBuf>,

    /// File extension of schema documents
    #[arg(long = "schema-extension")]
    pub schema_extension: Option<String>,

    /// Element that bounds the source window of an error report
    #[arg(long = "boundary", action = clap::ArgAction::Append)]
    pub boundary_elements: Vec<String>,

    /// Source lines shown above the offending line
    #[arg(long = "context-lines")]
    pub context_lines: Option<usize>,

    /// Skip reading the document and load an empty model
    #[arg(long = "suppress-load")]
    pub suppress_load: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (failures only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long = "log-json")]
    pub log_json: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Root element names, primary first
    pub fn root_names(&self) -> Result<Vec<QualifiedName>, String> {
        let roots = self
            .roots
            .iter()
            .map(|root| {
                root.parse::<QualifiedName>()
                    .map_err(|e| format!("Invalid --root '{}': {}", root, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if roots.is_empty() {
            return Err("At least one root element is required".to_string());
        }
        Ok(roots)
    }
}
