//! Rendering of schema-aware validation reports
//!
//! An [`ErrorPrinter`] turns a [`ValidationError`] plus the document it came
//! from into operator-facing lines: the enclosing elements, a numbered window of
//! source with a caret under the problem, what the schema allows at that point
//! and a "did you mean" suggestion when a name is close to an allowed one.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

use crate::reader::LineIndex;
use crate::schema_loader::SchemaSet;
use crate::validation::{ErrorKind, ValidationError};

const RULE_WIDTH: usize = 79;

/// Maximum edit distance for a name to be offered as a suggestion
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Destination for rendered report lines
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink: Send + Sync {
    fn println(&self, line: &str);
}

/// Sends every line to the log at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn println(&self, line: &str) {
        tracing::error!("{}", line);
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read {path} for error report: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An element that encloses the error position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementContext {
    /// Name as written in the document, prefix included
    pub qualified_name: String,
    /// Namespace the element declares for its own prefix, if any
    pub namespace_declaration: Option<String>,
    pub line: u64,
}

impl ElementContext {
    pub fn local_name(&self) -> &str {
        self.qualified_name
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.qualified_name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.qualified_name.split_once(':').map(|(prefix, _)| prefix)
    }

    fn from_start(start: &BytesStart<'_>, line: u64) -> Self {
        let qualified_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let wanted = match qualified_name.split_once(':') {
            Some((prefix, _)) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };

        let namespace_declaration = start
            .attributes()
            .with_checks(false)
            .flatten()
            .find(|attribute| attribute.key.as_ref() == wanted.as_bytes())
            .map(|attribute| match attribute.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attribute.value).into_owned(),
            });

        Self {
            qualified_name,
            namespace_declaration,
            line,
        }
    }
}

/// Renders enclosing elements that sit above the source window
pub trait Stringifier: Send + Sync {
    fn accepts(&self, element: &ElementContext) -> bool;
    fn stringify(&self, element: &ElementContext) -> String;
}

/// Renders selected elements together with their namespace declaration,
/// e.g. `<subsystem xmlns="urn:example:ee:1.0">`
#[derive(Debug, Clone)]
pub struct NamespacedElementStringifier {
    local_names: BTreeSet<String>,
}

impl NamespacedElementStringifier {
    pub fn new<I, S>(local_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            local_names: local_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Stringifier for NamespacedElementStringifier {
    fn accepts(&self, element: &ElementContext) -> bool {
        self.local_names.contains(element.local_name())
    }

    fn stringify(&self, element: &ElementContext) -> String {
        match (&element.namespace_declaration, element.prefix()) {
            (Some(namespace), Some(prefix)) => format!(
                "<{} xmlns:{}=\"{}\">",
                element.qualified_name, prefix, namespace
            ),
            (Some(namespace), None) => {
                format!("<{} xmlns=\"{}\">", element.qualified_name, namespace)
            }
            (None, _) => format!("<{}>", element.qualified_name),
        }
    }
}

/// Open elements of `prefix`, outermost first. Stops quietly at the first
/// markup it cannot read, since the text may end inside a broken tag.
pub fn scan_ancestors(prefix: &str) -> Vec<ElementContext> {
    let lines = LineIndex::from_text(prefix);
    let mut reader = Reader::from_str(prefix);
    reader.config_mut().check_end_names = false;

    let mut stack = Vec::new();
    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let line = lines.location(position).line;
                stack.push(ElementContext::from_start(&start, line));
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }
    stack
}

/// Pick the allowed name closest to `target`
pub fn suggest<'a, I>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|candidate| *candidate != target)
        .map(|candidate| (candidate, strsim::damerau_levenshtein(target, candidate)))
        .filter(|(_, distance)| *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(candidate, _)| candidate.to_string())
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub struct ErrorPrinter<'a> {
    schemas: &'a SchemaSet,
    stringifiers: &'a [Arc<dyn Stringifier>],
    context_lines: usize,
}

impl<'a> ErrorPrinter<'a> {
    pub fn new(
        schemas: &'a SchemaSet,
        stringifiers: &'a [Arc<dyn Stringifier>],
        context_lines: usize,
    ) -> Self {
        Self {
            schemas,
            stringifiers,
            context_lines,
        }
    }

    /// Render the whole report, then emit it one sink call per line.
    /// Returns the number of lines emitted; nothing is emitted on failure.
    pub fn print(
        &self,
        error: &ValidationError,
        document: &Path,
        sink: &dyn DiagnosticSink,
    ) -> Result<usize, ReportError> {
        let lines = self.render(error, document)?;
        for line in &lines {
            sink.println(line);
        }
        Ok(lines.len())
    }

    pub fn render(&self, error: &ValidationError, document: &Path) -> Result<Vec<String>, ReportError> {
        let bytes = fs::read(document).map_err(|source| ReportError::SourceUnreadable {
            path: document.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.render_text(error, document, &text))
    }

    pub fn render_text(&self, error: &ValidationError, document: &Path, text: &str) -> Vec<String> {
        let name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.display().to_string());

        let mut out = Vec::new();
        let title = format!("Validation error in {} ", name);
        let fill = RULE_WIDTH.saturating_sub(title.len()).max(3);
        out.push(format!("{}{}", title, "-".repeat(fill)));
        out.push("|".to_string());

        let source_lines: Vec<&str> = text.lines().collect();
        let location = error.location();
        let error_line = location.line as usize;

        if error_line == 0 || error_line > source_lines.len() {
            // Position unknown: summary and hints only
            out.push(format!("|  {}", error.summary()));
            for hint in self.hints(error, &[]) {
                out.push(format!("|  {}", hint));
            }
        } else {
            let mut offset = (location.offset as usize).min(text.len());
            while !text.is_char_boundary(offset) {
                offset -= 1;
            }
            let ancestors = scan_ancestors(&text[..offset]);
            self.render_excerpt(&mut out, error, &ancestors, &source_lines, error_line);
        }

        out.push("|".to_string());
        if let Some(message) = error.message().or(error.fallback_message()) {
            out.push("|  The underlying error message was:".to_string());
            for line in message.lines() {
                out.push(format!("|  > {}", line));
            }
            out.push("|".to_string());
        }
        out.push(format!("|{}", "-".repeat(RULE_WIDTH - 1)));
        out
    }

    fn is_boundary(&self, element: &ElementContext) -> bool {
        self.stringifiers.iter().any(|s| s.accepts(element))
    }

    fn stringify(&self, element: &ElementContext) -> String {
        self.stringifiers
            .iter()
            .find(|s| s.accepts(element))
            .map(|s| s.stringify(element))
            .unwrap_or_else(|| format!("<{}>", element.qualified_name))
    }

    fn render_excerpt(
        &self,
        out: &mut Vec<String>,
        error: &ValidationError,
        ancestors: &[ElementContext],
        source_lines: &[&str],
        error_line: usize,
    ) {
        let mut start = error_line.saturating_sub(self.context_lines).max(1);
        if let Some(boundary) = ancestors.iter().rev().find(|a| self.is_boundary(a)) {
            start = start.max(boundary.line as usize).min(error_line);
        }

        let width = error_line.to_string().len();
        let gutter = " ".repeat(width + 2);

        let above: Vec<&ElementContext> = ancestors
            .iter()
            .filter(|a| (a.line as usize) < start)
            .collect();
        for (depth, ancestor) in above.iter().enumerate() {
            out.push(format!(
                "|  {}{}{}",
                gutter,
                "  ".repeat(depth),
                self.stringify(ancestor)
            ));
        }
        if !above.is_empty() {
            out.push(format!("|  {}{}...", gutter, "  ".repeat(above.len())));
        }

        for number in start..=error_line {
            out.push(format!(
                "|  {:>width$}: {}",
                number,
                source_lines[number - 1],
                width = width
            ));
        }

        let line = source_lines[error_line - 1];
        let (column, length) = caret_span(error, line);
        let pad: String = line
            .get(..column)
            .unwrap_or(line)
            .chars()
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        out.push(format!(
            "|  {}{}{} {}",
            gutter,
            pad,
            "^".repeat(length),
            error.summary()
        ));

        let hint_pad = format!("{}{}", pad, " ".repeat(length + 1));
        for hint in self.hints(error, ancestors) {
            out.push(format!("|  {}{}{}", gutter, hint_pad, hint));
        }
    }

    /// Schema-derived guidance for the error, one entry per line
    fn hints(&self, error: &ValidationError, ancestors: &[ElementContext]) -> Vec<String> {
        let mut hints = Vec::new();
        let alternatives = error.alternatives();
        let element_info = error
            .element()
            .and_then(|element| self.schemas.element(element.local_name()));
        let parent_info = ancestors
            .last()
            .and_then(|parent| self.schemas.element(parent.local_name()));

        match error.kind() {
            ErrorKind::UnexpectedAttribute => {
                let mut allowed: BTreeSet<String> = element_info
                    .map(|info| {
                        info.allowed_attributes()
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                allowed.extend(alternatives.iter().cloned());
                if !allowed.is_empty() {
                    hints.push(format!("Attributes allowed here are: {}", join(&allowed)));
                }
                if let Some(attribute) = error.attribute() {
                    let target = attribute.local_name();
                    if let Some(name) = suggest(target, allowed.iter().map(String::as_str)) {
                        hints.push(format!("Did you mean '{}'?", name));
                    }
                }
            }
            ErrorKind::MissingAttributes => {
                let mut required: BTreeSet<String> = element_info
                    .map(|info| {
                        info.required_attributes()
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                required.extend(alternatives.iter().cloned());
                if !required.is_empty() {
                    hints.push(format!("Attributes required here are: {}", join(&required)));
                }
            }
            ErrorKind::InvalidAttributeValue => {
                if !alternatives.is_empty() {
                    hints.push(format!("Allowed values are: {}", join(alternatives)));
                }
                if let Some(value) = error.attribute_value()
                    && let Some(name) = suggest(value, alternatives.iter().map(String::as_str))
                {
                    hints.push(format!("Did you mean '{}'?", name));
                }
            }
            ErrorKind::UnexpectedElement => {
                let mut allowed: BTreeSet<String> = parent_info
                    .map(|info| info.children)
                    .unwrap_or_default();
                allowed.extend(alternatives.iter().cloned());
                if !allowed.is_empty() {
                    hints.push(format!("Elements allowed here are: {}", join(&allowed)));
                }
                if let Some(element) = error.element() {
                    let local = element.local_name().to_string();
                    let clark = element.to_string();
                    let best = allowed
                        .iter()
                        .filter_map(|candidate| {
                            let target = if candidate.starts_with('{') { &clark } else { &local };
                            suggest(target, [candidate.as_str()])
                        })
                        .min_by_key(|candidate| {
                            let target = if candidate.starts_with('{') { &clark } else { &local };
                            strsim::damerau_levenshtein(target, candidate)
                        });
                    if let Some(name) = best {
                        hints.push(format!("Did you mean '{}'?", name));
                    }
                }
            }
            ErrorKind::RequiredElementMissing | ErrorKind::RequiredElementsMissing => {
                if !alternatives.is_empty() {
                    hints.push(format!("Elements required here are: {}", join(alternatives)));
                } else if let Some(info) = element_info
                    && !info.children.is_empty()
                {
                    hints.push(format!("Elements allowed here are: {}", join(&info.children)));
                }
            }
            ErrorKind::DuplicateElement
            | ErrorKind::EmptyTag
            | ErrorKind::UnsupportedElement => {
                if !alternatives.is_empty() {
                    hints.push(format!("Expected one of: {}", join(alternatives)));
                }
            }
            ErrorKind::UnknownError => {}
        }

        hints
    }
}

/// Byte column and width of the caret for `error` within `line`
fn caret_span(error: &ValidationError, line: &str) -> (usize, usize) {
    let column = (error.location().column as usize).saturating_sub(1).min(line.len());

    if let Some(attribute) = error.attribute() {
        let name = attribute.local_name();
        let found = line
            .match_indices(name)
            .filter(|(index, _)| *index >= column)
            .find(|(index, _)| {
                let before = line[..*index].chars().next_back();
                let after = line[index + name.len()..].trim_start().chars().next();
                matches!(before, Some(c) if c.is_whitespace() || c == ':') && after == Some('=')
            });
        if let Some((index, _)) = found {
            return (index, name.len());
        }
    }

    if let Some(element) = error.element()
        && line.get(column..).is_some_and(|rest| rest.starts_with('<'))
    {
        return (column + 1, element.local_name().len().max(1));
    }

    (column, 1)
}
