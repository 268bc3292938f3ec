//! Streaming XML reader for configuration grammars
//!
//! Wraps a namespace-aware quick-xml pull parser over any [`BufRead`] and
//! keeps an index of newline offsets as bytes are consumed, so every event and
//! every failure can be attributed to a line and column without buffering the
//! whole document.
//!
//! Grammars see a reduced event model: element starts (with resolved names and
//! attributes), element ends, non-whitespace text and end of document.
//! Comments, processing instructions, declarations and whitespace-only text
//! never reach them.

use std::io::{self, BufRead, Read};
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::{StreamResult, XmlStreamError};
use crate::qname::QualifiedName;
use crate::validation::{ErrorKind, Location, ValidationError};

/// Newline offsets of a document, for turning byte offsets into locations
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    newlines: Vec<u64>,
}

impl LineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        let mut index = Self::new();
        index.record(0, text.as_bytes());
        index
    }

    /// Record the newlines of `bytes`, which start at document offset `base`
    pub fn record(&mut self, base: u64, bytes: &[u8]) {
        self.newlines.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, byte)| **byte == b'\n')
                .map(|(i, _)| base + i as u64),
        );
    }

    pub fn location(&self, offset: u64) -> Location {
        let preceding = self.newlines.partition_point(|&newline| newline < offset);
        let line_start = match preceding {
            0 => 0,
            n => self.newlines[n - 1] + 1,
        };
        Location::new(preceding as u64 + 1, offset - line_start + 1, offset)
    }
}

/// `BufRead` adapter that indexes newlines of everything consumed through it
struct LineTracker<R> {
    inner: R,
    consumed: u64,
    lines: LineIndex,
}

impl<R: BufRead> LineTracker<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            consumed: 0,
            lines: LineIndex::new(),
        }
    }
}

impl<R: BufRead> Read for LineTracker<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.inner.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for LineTracker<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        // The inner buffer still holds the bytes being consumed, so this does no I/O.
        if let Ok(available) = self.inner.fill_buf() {
            let seen = &available[..amt.min(available.len())];
            self.lines.record(self.consumed, seen);
        }
        self.consumed += amt as u64;
        self.inner.consume(amt);
    }
}

/// A resolved attribute of a start tag (namespace declarations excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: QualifiedName,
    pub value: String,
}

/// A start tag with its resolved name, attributes and location
#[derive(Debug, Clone, PartialEq)]
pub struct StartElement {
    name: QualifiedName,
    attributes: Vec<XmlAttribute>,
    location: Location,
}

impl StartElement {
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Value of an attribute in no namespace
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| !a.name.has_namespace() && a.name.local_name() == local_name)
            .map(|a| a.value.as_str())
    }

    /// Value of a required attribute, or a `MissingAttributes` error
    pub fn require_attribute(&self, local_name: &str) -> StreamResult<&str> {
        self.attribute(local_name)
            .ok_or_else(|| self.missing_attributes(&[local_name]))
    }

    pub fn unexpected_element(&self) -> XmlStreamError {
        ValidationError::new(ErrorKind::UnexpectedElement, self.location)
            .with_element(self.name.clone())
            .with_message(format!("Unexpected element '{}' encountered", self.name))
            .into()
    }

    pub fn unexpected_attribute(&self, attribute: &XmlAttribute) -> XmlStreamError {
        ValidationError::new(ErrorKind::UnexpectedAttribute, self.location)
            .with_element(self.name.clone())
            .with_attribute(attribute.name.clone())
            .with_attribute_value(attribute.value.clone())
            .with_message(format!(
                "Unexpected attribute '{}' encountered",
                attribute.name
            ))
            .into()
    }

    pub fn missing_attributes(&self, names: &[&str]) -> XmlStreamError {
        ValidationError::new(ErrorKind::MissingAttributes, self.location)
            .with_element(self.name.clone())
            .with_alternatives(names.iter().copied())
            .with_message(format!("Missing required attribute(s): {}", names.join(", ")))
            .into()
    }

    pub fn invalid_attribute_value(
        &self,
        attribute: &XmlAttribute,
        allowed: &[&str],
    ) -> XmlStreamError {
        ValidationError::new(ErrorKind::InvalidAttributeValue, self.location)
            .with_element(self.name.clone())
            .with_attribute(attribute.name.clone())
            .with_attribute_value(attribute.value.clone())
            .with_alternatives(allowed.iter().copied())
            .with_message(format!(
                "Illegal value '{}' for attribute '{}'",
                attribute.value, attribute.name
            ))
            .into()
    }
}

/// Event handed to grammars
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    Start(StartElement),
    End(QualifiedName),
    Text(String),
    Eof,
}

/// Owned form of a namespace resolution result
enum Binding {
    Bound(String),
    Unbound,
    Unknown(String),
}

impl From<ResolveResult<'_>> for Binding {
    fn from(resolved: ResolveResult<'_>) -> Self {
        match resolved {
            ResolveResult::Bound(namespace) => Binding::Bound(decode(namespace.as_ref())),
            ResolveResult::Unbound => Binding::Unbound,
            ResolveResult::Unknown(prefix) => Binding::Unknown(decode(&prefix)),
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Pull reader over one configuration document
pub struct XmlStreamReader<'a> {
    inner: NsReader<LineTracker<Box<dyn BufRead + 'a>>>,
    buf: Vec<u8>,
    depth: usize,
}

impl<'a> XmlStreamReader<'a> {
    pub fn new<R: BufRead + 'a>(source: R) -> Self {
        let source: Box<dyn BufRead + 'a> = Box::new(source);
        let mut inner = NsReader::from_reader(LineTracker::new(source));
        let config = inner.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = true;
        config.trim_text(false);

        Self {
            inner,
            buf: Vec::new(),
            depth: 0,
        }
    }

    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }

    /// Number of elements currently open
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Location just past the last event read
    pub fn location(&self) -> Location {
        self.location_at(self.inner.buffer_position())
    }

    fn location_at(&self, offset: u64) -> Location {
        self.inner.get_ref().lines.location(offset)
    }

    /// Build an unstructured failure at the current position
    pub fn malformed(&self, message: impl Into<String>) -> XmlStreamError {
        self.malformed_at(self.inner.buffer_position(), message)
    }

    fn malformed_at(&self, offset: u64, message: impl Into<String>) -> XmlStreamError {
        XmlStreamError::Malformed {
            location: self.location_at(offset),
            message: message.into(),
        }
    }

    /// Next event, skipping comments, processing instructions, declarations
    /// and whitespace-only text
    pub fn next_event(&mut self) -> StreamResult<XmlEvent> {
        loop {
            let position = self.inner.buffer_position();
            self.buf.clear();
            let read = self
                .inner
                .read_resolved_event_into(&mut self.buf)
                .map(|(resolved, event)| (Binding::from(resolved), event.into_owned()));
            let (binding, event) = match read {
                Ok(pair) => pair,
                Err(quick_xml::Error::Io(source)) => {
                    let source = Arc::try_unwrap(source)
                        .unwrap_or_else(|shared| io::Error::new(shared.kind(), shared.to_string()));
                    return Err(XmlStreamError::Io(source));
                }
                Err(error) => {
                    return Err(self.malformed_at(self.inner.error_position(), error.to_string()));
                }
            };

            match event {
                Event::Start(start) => return self.start_element(binding, start, position),
                Event::End(end) => {
                    let name = self.qualify(binding, end.local_name().as_ref(), position)?;
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(XmlEvent::End(name));
                }
                Event::Text(text) => {
                    let content = text
                        .unescape()
                        .map_err(|e| self.malformed_at(position, e.to_string()))?;
                    if content.trim().is_empty() {
                        continue;
                    }
                    return Ok(XmlEvent::Text(content.into_owned()));
                }
                Event::CData(data) => {
                    return Ok(XmlEvent::Text(decode(&data.into_inner())));
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(self.malformed_at(
                            position,
                            "Unexpected end of document; one or more elements are not closed",
                        ));
                    }
                    return Ok(XmlEvent::Eof);
                }
                _ => continue,
            }
        }
    }

    /// Next start or end tag; non-whitespace text here is a failure
    pub fn next_tag(&mut self) -> StreamResult<XmlEvent> {
        match self.next_event()? {
            XmlEvent::Text(text) => Err(self.malformed(format!(
                "Found text content where an element was expected: '{}'",
                text.trim()
            ))),
            other => Ok(other),
        }
    }

    /// Read the text content of the element whose start tag was just read,
    /// consuming its end tag
    pub fn read_text(&mut self) -> StreamResult<String> {
        let mut content = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Text(text) => content.push_str(&text),
                XmlEvent::End(_) => return Ok(content),
                XmlEvent::Start(start) => return Err(start.unexpected_element()),
                XmlEvent::Eof => {
                    return Err(self.malformed("Unexpected end of document inside element text"));
                }
            }
        }
    }

    /// Skip the rest of the element whose start tag was just read
    pub fn skip_element(&mut self) -> StreamResult<()> {
        let target = self.depth.saturating_sub(1);
        loop {
            match self.next_event()? {
                XmlEvent::End(_) if self.depth == target => return Ok(()),
                XmlEvent::Eof => {
                    return Err(self.malformed("Unexpected end of document while skipping element"));
                }
                _ => {}
            }
        }
    }

    fn qualify(&self, binding: Binding, local: &[u8], offset: u64) -> StreamResult<QualifiedName> {
        let local = decode(local);
        match binding {
            Binding::Bound(namespace) => Ok(QualifiedName::new(namespace, local)),
            Binding::Unbound => Ok(QualifiedName::local(local)),
            Binding::Unknown(prefix) => Err(self.malformed_at(
                offset,
                format!("Undeclared namespace prefix \"{}\"", prefix),
            )),
        }
    }

    fn start_element(
        &mut self,
        binding: Binding,
        start: BytesStart<'static>,
        offset: u64,
    ) -> StreamResult<XmlEvent> {
        let location = self.location_at(offset);
        let name = self.qualify(binding, start.local_name().as_ref(), offset)?;

        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.malformed_at(offset, e.to_string()))?;
            if attribute.key.as_namespace_binding().is_some() {
                continue;
            }
            let value = attribute
                .unescape_value()
                .map_err(|e| self.malformed_at(offset, e.to_string()))?
                .into_owned();
            let (resolved, local) = self.inner.resolve_attribute(attribute.key);
            let binding = Binding::from(resolved);
            let name = self.qualify(binding, local.as_ref(), offset)?;
            attributes.push(XmlAttribute { name, value });
        }

        self.depth += 1;

        Ok(XmlEvent::Start(StartElement {
            name,
            attributes,
            location,
        }))
    }
}
