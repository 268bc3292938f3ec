//! Generic element-tree grammar
//!
//! [`ElementTreeParser`] turns every direct child of the root into a JSON
//! fragment:
//!
//! ```json
//! { "name": "interface", "namespace": "urn:example:domain:1.0",
//!   "attributes": { "name": "public" }, "children": [], "text": null }
//! ```
//!
//! [`ElementTreeDeparser`] writes a list of such fragments back under a root
//! element, so a model loaded with the parser survives a store and reload.

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Value, json};

use crate::error::StreamResult;
use crate::persister::ModelDeparser;
use crate::qname::QualifiedName;
use crate::reader::{StartElement, XmlEvent, XmlStreamReader};
use crate::registry::{ModelNode, RootElementParser};

/// Deepest element nesting below the root that the element-tree grammar
/// reads or writes
pub const MAX_FRAGMENT_DEPTH: usize = 256;

/// Accepts any content below the root
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementTreeParser;

impl RootElementParser for ElementTreeParser {
    fn parse(
        &self,
        reader: &mut XmlStreamReader<'_>,
        _root: &StartElement,
        updates: &mut Vec<ModelNode>,
    ) -> StreamResult<()> {
        loop {
            match reader.next_tag()? {
                XmlEvent::Start(child) => updates.push(read_fragment(reader, child)?),
                XmlEvent::End(_) => return Ok(()),
                XmlEvent::Text(_) | XmlEvent::Eof => {
                    return Err(reader.malformed("Unexpected end of document inside root element"));
                }
            }
        }
    }
}

/// An element whose end tag has not been read yet
struct OpenFragment {
    start: StartElement,
    children: Vec<ModelNode>,
    text: String,
}

impl OpenFragment {
    fn new(start: StartElement) -> Self {
        Self {
            start,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn finish(self) -> ModelNode {
        let attributes: Map<String, Value> = self
            .start
            .attributes()
            .iter()
            .map(|a| (a.name.to_string(), Value::String(a.value.clone())))
            .collect();
        let namespace = match self.start.name().namespace() {
            "" => Value::Null,
            ns => Value::String(ns.to_string()),
        };
        let text = match self.text.trim() {
            "" => Value::Null,
            trimmed => Value::String(trimmed.to_string()),
        };

        json!({
            "name": self.start.name().local_name(),
            "namespace": namespace,
            "attributes": attributes,
            "children": self.children,
            "text": text,
        })
    }
}

/// Read the subtree of `start` into one fragment. Open elements live on an
/// explicit stack, capped at [`MAX_FRAGMENT_DEPTH`].
fn read_fragment(reader: &mut XmlStreamReader<'_>, start: StartElement) -> StreamResult<ModelNode> {
    let mut open = vec![OpenFragment::new(start)];

    loop {
        match reader.next_event()? {
            XmlEvent::Start(child) => {
                if open.len() >= MAX_FRAGMENT_DEPTH {
                    return Err(reader.malformed(format!(
                        "Element '{}' is nested deeper than {} levels",
                        child.name(),
                        MAX_FRAGMENT_DEPTH
                    )));
                }
                open.push(OpenFragment::new(child));
            }
            XmlEvent::Text(content) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&content);
                }
            }
            XmlEvent::End(name) => {
                let finished = open.pop().map(OpenFragment::finish);
                match (finished, open.last_mut()) {
                    (Some(fragment), Some(parent)) => parent.children.push(fragment),
                    (Some(fragment), None) => return Ok(fragment),
                    (None, _) => {
                        return Err(reader.malformed(format!("Unexpected end tag '{}'", name)));
                    }
                }
            }
            XmlEvent::Eof => {
                return Err(reader.malformed("Unexpected end of document inside element"));
            }
        }
    }
}

/// Writes element-tree fragments under `root`
#[derive(Debug, Clone)]
pub struct ElementTreeDeparser {
    root: QualifiedName,
}

impl ElementTreeDeparser {
    pub fn new(root: QualifiedName) -> Self {
        Self { root }
    }
}

impl ModelDeparser for ElementTreeDeparser {
    fn write(&self, model: &ModelNode, out: &mut dyn Write) -> io::Result<()> {
        let fragments = model
            .as_array()
            .ok_or_else(|| invalid("model must be an array of element fragments"))?;

        let mut writer = Writer::new_with_indent(out, b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(io::Error::other)?;

        let mut root = BytesStart::new(self.root.local_name());
        if self.root.has_namespace() {
            root.push_attribute(("xmlns", self.root.namespace()));
        }
        writer
            .write_event(Event::Start(root))
            .map_err(io::Error::other)?;

        for fragment in fragments {
            write_fragment(&mut writer, fragment, self.root.namespace(), 1)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(self.root.local_name())))
            .map_err(io::Error::other)?;
        writer.get_mut().write_all(b"\n")
    }
}

fn write_fragment<W: Write>(
    writer: &mut Writer<W>,
    fragment: &Value,
    parent_namespace: &str,
    depth: usize,
) -> io::Result<()> {
    if depth > MAX_FRAGMENT_DEPTH {
        return Err(invalid(&format!(
            "fragment nested deeper than {} levels",
            MAX_FRAGMENT_DEPTH
        )));
    }
    let name = fragment
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("fragment has no element name"))?;
    let namespace = fragment
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or("");

    let mut start = BytesStart::new(name);
    if namespace != parent_namespace {
        start.push_attribute(("xmlns", namespace));
    }

    let mut prefixes = 0;
    if let Some(attributes) = fragment.get("attributes").and_then(Value::as_object) {
        for (key, value) in attributes {
            let value = value
                .as_str()
                .ok_or_else(|| invalid(&format!("attribute '{}' is not a string", key)))?;
            let attribute: QualifiedName = key.parse().map_err(|e: String| invalid(&e))?;

            if attribute.has_namespace() {
                let prefix = format!("a{}", prefixes);
                prefixes += 1;
                start.push_attribute((format!("xmlns:{}", prefix).as_str(), attribute.namespace()));
                start.push_attribute((
                    format!("{}:{}", prefix, attribute.local_name()).as_str(),
                    value,
                ));
            } else {
                start.push_attribute((attribute.local_name(), value));
            }
        }
    }

    let children = fragment
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let text = fragment.get("text").and_then(Value::as_str);

    if children.is_empty() && text.is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(io::Error::other);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(io::Error::other)?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(io::Error::other)?;
    }
    for child in children {
        write_fragment(writer, child, namespace, depth + 1)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(io::Error::other)
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
