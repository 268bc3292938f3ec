use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use xml_config_persister::cli::{Cli, OutputFormat};
use xml_config_persister::config::ConfigManager;
use xml_config_persister::logging::init_logging;
use xml_config_persister::output::{LoadReport, Output};
use xml_config_persister::parsers::{ElementTreeDeparser, ElementTreeParser};
use xml_config_persister::persister::{ConfigurationPersister, XmlConfigurationPersister};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Load the document once; `Ok(false)` when it failed to load
fn run() -> Result<bool> {
    let cli = Cli::parse_args();
    let config = ConfigManager::load_config(&cli).context("Failed to load configuration")?;
    init_logging(&config.logging, cli.verbosity());

    let roots = cli.root_names().map_err(anyhow::Error::msg)?;
    let (primary, additional) = roots
        .split_first()
        .context("At least one root element is required")?;

    let parser = Arc::new(ElementTreeParser);
    let persister = XmlConfigurationPersister::from_config(
        &config,
        primary.clone(),
        parser.clone(),
        Arc::new(ElementTreeDeparser::new(primary.clone())),
    )?;
    for root in additional {
        persister.register_additional_root_element(root.clone(), parser.clone());
    }

    let start = Instant::now();
    let file = persister.file().to_path_buf();
    let report = match persister.load() {
        Ok(_) if config.persistence.suppress_load => LoadReport::suppressed(file, start.elapsed()),
        Ok(fragments) => LoadReport::loaded(file, start.elapsed(), fragments),
        Err(error) => LoadReport::failed(file, start.elapsed(), &error),
    };

    let output = Output::new(cli.verbosity());
    match cli.output_format {
        OutputFormat::Human => print!("{}", output.format_report(&report)),
        OutputFormat::Json => println!(
            "{}",
            output
                .format_json(&report)
                .context("Failed to serialize report")?
        ),
    }

    Ok(!report.is_failure())
}
