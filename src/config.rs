use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema documents are files with this extension unless configured otherwise
pub const DEFAULT_SCHEMA_EXTENSION: &str = "xsd";

/// Source lines shown above the offending line in an error report
pub const DEFAULT_CONTEXT_LINES: usize = 3;

pub const MAX_CONTEXT_LINES: usize = 50;

/// Element whose subtree bounds the source window of an error report
pub const DEFAULT_BOUNDARY_ELEMENT: &str = "subsystem";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

const CONFIG_NAMES: [&str; 2] = ["xml-config-persister.toml", "xml-config-persister.json"];

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub persistence: PersistenceConfig,
    pub schema: SchemaConfig,
    pub logging: LoggingConfig,
}

/// Backing file settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Configuration document to load and store
    pub file: Option<PathBuf>,
    /// Skip reading the backing file and load an empty model
    pub suppress_load: bool,
}

/// Schema-aware error report settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directory holding schema documents; reports carry no schema context without it
    pub directory: Option<PathBuf>,
    /// File extension of schema documents
    pub extension: String,
    /// Elements that bound the source window
    pub boundary_elements: Vec<String>,
    /// Source lines shown above the offending line
    pub context_lines: usize,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            directory: None,
            extension: DEFAULT_SCHEMA_EXTENSION.to_string(),
            boundary_elements: vec![DEFAULT_BOUNDARY_ELEMENT.to_string()],
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Environment(format!(
            "Invalid {} value: {}",
            key, value
        ))),
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider)
    }

    pub fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in the working directory, then the user config directory
    pub fn find_config_file() -> Result<Option<Config>> {
        for name in &CONFIG_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xml-config-persister");
            for name in &CONFIG_NAMES {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(file) = env.get("XML_PERSISTER_FILE") {
            config.persistence.file = Some(PathBuf::from(file));
        }

        if let Some(suppress) = env.get("XML_PERSISTER_SUPPRESS_LOAD") {
            config.persistence.suppress_load = parse_bool("XML_PERSISTER_SUPPRESS_LOAD", &suppress)?;
        }

        // Installation home implies its schema directory; an explicit directory wins
        if let Some(home) = env.get("XML_PERSISTER_HOME") {
            if home.trim().is_empty() {
                return Err(ConfigError::Environment(
                    "XML_PERSISTER_HOME is set but empty".to_string(),
                ));
            }
            config.schema.directory = Some(PathBuf::from(home).join("docs").join("schema"));
        }

        if let Some(schema_dir) = env.get("XML_PERSISTER_SCHEMA_DIR") {
            config.schema.directory = Some(PathBuf::from(schema_dir));
        }

        if let Some(level) = env.get("XML_PERSISTER_LOG_LEVEL") {
            config.logging.level = level.trim().to_lowercase();
        }

        if let Some(json) = env.get("XML_PERSISTER_LOG_JSON") {
            config.logging.json = parse_bool("XML_PERSISTER_LOG_JSON", &json)?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence when given)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(file) = &cli.file {
            config.persistence.file = Some(file.clone());
        }
        if cli.suppress_load {
            config.persistence.suppress_load = true;
        }

        if let Some(schema_dir) = &cli.schema_dir {
            config.schema.directory = Some(schema_dir.clone());
        }
        if let Some(extension) = &cli.schema_extension {
            config.schema.extension = extension.clone();
        }
        if !cli.boundary_elements.is_empty() {
            config.schema.boundary_elements = cli.boundary_elements.clone();
        }
        if let Some(context_lines) = cli.context_lines {
            config.schema.context_lines = context_lines;
        }

        if let Some(level) = &cli.log_level {
            config.logging.level = level.to_lowercase();
        }
        if cli.log_json {
            config.logging.json = true;
        }

        config
    }

    /// Merge two configurations (second takes precedence for non-None values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        if override_config.persistence.file.is_some() {
            base.persistence.file = override_config.persistence.file;
        }
        base.persistence.suppress_load = override_config.persistence.suppress_load;

        if override_config.schema.directory.is_some() {
            base.schema.directory = override_config.schema.directory;
        }
        base.schema.extension = override_config.schema.extension;
        if !override_config.schema.boundary_elements.is_empty() {
            base.schema.boundary_elements = override_config.schema.boundary_elements;
        }
        base.schema.context_lines = override_config.schema.context_lines;

        base.logging.level = override_config.logging.level;
        base.logging.json = override_config.logging.json;

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        let extension = &config.schema.extension;
        if extension.is_empty() {
            return Err(ConfigError::Validation(
                "Schema extension must not be empty".to_string(),
            ));
        }
        if extension.contains('/') || extension.contains('\\') || extension.contains('.') {
            return Err(ConfigError::Validation(format!(
                "Invalid schema extension: {}",
                extension
            )));
        }

        if config.schema.context_lines > MAX_CONTEXT_LINES {
            return Err(ConfigError::Validation(format!(
                "Context lines cannot exceed {}",
                MAX_CONTEXT_LINES
            )));
        }

        if config
            .schema
            .boundary_elements
            .iter()
            .any(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "Boundary element names must not be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}', expected one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
