use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tempfile::TempDir;

use xml_config_persister::config::{ConfigError, EnvProvider};
use xml_config_persister::{Cli, Config, ConfigManager};

struct MapEnv(HashMap<&'static str, &'static str>);

impl EnvProvider for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| v.to_string())
    }
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("xml-config-persister.toml");
    fs::write(
        &path,
        r#"
[persistence]
file = "standalone.xml"

[schema]
context_lines = 6
"#,
    )
    .unwrap();

    let config = ConfigManager::load_from_file(&path).unwrap();
    assert_eq!(config.persistence.file, Some(PathBuf::from("standalone.xml")));
    assert_eq!(config.schema.context_lines, 6);
    assert_eq!(config.schema.extension, "xsd");
    assert_eq!(config.schema.boundary_elements, vec!["subsystem".to_string()]);
    assert_eq!(config.logging, Config::default().logging);
}

#[test]
fn test_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"schema": {"directory": "/opt/app/docs/schema"}, "logging": {"json": true}}"#,
    )
    .unwrap();

    let config = ConfigManager::load_from_file(&path).unwrap();
    assert_eq!(
        config.schema.directory,
        Some(PathBuf::from("/opt/app/docs/schema"))
    );
    assert!(config.logging.json);
}

#[test]
fn test_unsupported_format() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "schema: {}").unwrap();

    assert!(matches!(
        ConfigManager::load_from_file(&path),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_file_then_environment_then_cli() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    fs::write(
        &path,
        r#"
[persistence]
file = "from-file.xml"

[schema]
directory = "/from/file"
extension = "xsd"

[logging]
level = "warn"
"#,
    )
    .unwrap();

    let env = MapEnv(HashMap::from([
        ("XML_PERSISTER_HOME", "/opt/app"),
        ("XML_PERSISTER_LOG_LEVEL", "DEBUG"),
    ]));
    let cli = Cli::try_parse_from([
        "xml-config-check",
        "--config",
        path.to_str().unwrap(),
        "--context-lines",
        "9",
        "from-cli.xml",
    ])
    .unwrap();

    let config = ConfigManager::load_config_with(&cli, &env).unwrap();
    assert_eq!(config.persistence.file, Some(PathBuf::from("from-cli.xml")));
    assert_eq!(
        config.schema.directory,
        Some(PathBuf::from("/opt/app").join("docs").join("schema"))
    );
    assert_eq!(config.schema.context_lines, 9);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_final_config_is_rejected() {
    let env = MapEnv(HashMap::new());
    let cli = Cli::try_parse_from([
        "xml-config-check",
        "--schema-extension",
        ".xsd",
        "a.xml",
    ])
    .unwrap();

    assert!(matches!(
        ConfigManager::load_config_with(&cli, &env),
        Err(ConfigError::Validation(_))
    ));
}
