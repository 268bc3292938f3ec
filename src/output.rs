//! Output and Reporting
//!
//! Formats the outcome of loading one configuration document, for people or
//! as JSON.

use atty;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::VerbosityLevel;
use crate::error::{LoadFailureKind, PersistenceError};
use crate::registry::ModelNode;

/// Result of one load
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub file: PathBuf,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(flatten)]
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { fragments: Vec<ModelNode> },
    Suppressed,
    Failed { failure: FailureReport },
}

/// Serializable view of a failed load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub kind: Option<LoadFailureKind>,
    pub code: Option<&'static str>,
    pub line: Option<u64>,
    pub column: Option<u64>,
    pub summary: String,
    pub alternatives: Vec<String>,
    /// Messages of the error chain below the top-level error
    pub causes: Vec<String>,
    /// A schema-aware report was printed to the log
    pub report_printed: bool,
}

impl FailureReport {
    pub fn from_error(error: &PersistenceError) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        match error.validation_error() {
            Some(validation) => {
                let location = validation.location();
                let known = location.line > 0;
                Self {
                    kind: error.failure_kind(),
                    code: Some(validation.kind().code()),
                    line: known.then_some(location.line),
                    column: known.then_some(location.column),
                    summary: validation.summary(),
                    alternatives: validation.alternatives().iter().cloned().collect(),
                    report_printed: causes.is_empty(),
                    causes,
                }
            }
            None => Self {
                kind: None,
                code: None,
                line: None,
                column: None,
                summary: error.to_string(),
                alternatives: Vec::new(),
                causes,
                report_printed: false,
            },
        }
    }
}

impl LoadReport {
    pub fn loaded(file: PathBuf, duration: Duration, fragments: Vec<ModelNode>) -> Self {
        Self {
            file,
            duration,
            outcome: LoadOutcome::Loaded { fragments },
        }
    }

    pub fn suppressed(file: PathBuf, duration: Duration) -> Self {
        Self {
            file,
            duration,
            outcome: LoadOutcome::Suppressed,
        }
    }

    pub fn failed(file: PathBuf, duration: Duration, error: &PersistenceError) -> Self {
        Self {
            file,
            duration,
            outcome: LoadOutcome::Failed {
                failure: FailureReport::from_error(error),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Failed { .. })
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Output formatter for human-readable results
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter that never emits color codes
    pub fn plain(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Human-readable report; empty in quiet mode unless the load failed
    pub fn format_report(&self, report: &LoadReport) -> String {
        let path_display = report.file.display();
        let duration_str = format_duration(report.duration);

        match &report.outcome {
            LoadOutcome::Loaded { fragments } => {
                if self.verbosity == VerbosityLevel::Quiet {
                    return String::new();
                }
                let mut output = format!(
                    "{}  {} ({}) - {} fragment{}",
                    self.colorize("✓ LOADED", "32"),
                    path_display,
                    duration_str,
                    fragments.len(),
                    if fragments.len() == 1 { "" } else { "s" }
                );
                if self.verbosity >= VerbosityLevel::Verbose {
                    for fragment in fragments {
                        output.push_str(&format!("\n    {}", describe_fragment(fragment)));
                    }
                }
                output.push('\n');
                output
            }
            LoadOutcome::Suppressed => {
                if self.verbosity == VerbosityLevel::Quiet {
                    return String::new();
                }
                format!(
                    "{}  {} - load suppressed\n",
                    self.colorize("- SUPPRESSED", "36"),
                    path_display
                )
            }
            LoadOutcome::Failed { failure } => self.format_failure(report, failure),
        }
    }

    fn format_failure(&self, report: &LoadReport, failure: &FailureReport) -> String {
        let position = match (failure.line, failure.column) {
            (Some(line), Some(column)) => format!(":{}:{}", line, column),
            _ => String::new(),
        };
        let mut output = format!(
            "{}  {}{} ({}) - {}",
            self.colorize("✗ FAILED", "31"),
            report.file.display(),
            position,
            format_duration(report.duration),
            failure.summary
        );

        if self.verbosity >= VerbosityLevel::Verbose {
            if let Some(code) = failure.code {
                output.push_str(&format!("\n    code: {}", code));
            }
            if !failure.alternatives.is_empty() {
                output.push_str(&format!(
                    "\n    expected one of: {}",
                    failure.alternatives.join(", ")
                ));
            }
            for cause in &failure.causes {
                output.push_str(&format!("\n    caused by: {}", cause.replace('\n', " ")));
            }
        }
        output.push('\n');
        output
    }

    pub fn format_json(&self, report: &LoadReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }
}

fn describe_fragment(fragment: &ModelNode) -> String {
    match fragment.get("name").and_then(|n| n.as_str()) {
        Some(name) => {
            let children = fragment
                .get("children")
                .and_then(|c| c.as_array())
                .map_or(0, Vec::len);
            format!("<{}> ({} children)", name, children)
        }
        None => fragment.to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
