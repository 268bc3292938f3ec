use std::sync::{Arc, Mutex};

use serde_json::json;
use xml_config_persister::error::StreamResult;
use xml_config_persister::{
    DiagnosticSink, ModelNode, RootElementParser, StartElement, XmlEvent, XmlStreamReader,
};

/// Diagnostic sink that keeps every line it is handed
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lines.lock().unwrap().len()
    }
}

impl DiagnosticSink for RecordingSink {
    fn println(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Grammar producing one upper-cased string fragment per child element.
///
/// Children may carry a `name` attribute only; anything else is rejected with
/// a structured error, as is a child named `bad`.
pub struct ChildNameParser {
    pub tag: &'static str,
}

impl ChildNameParser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { tag: "" })
    }

    /// Prefix every fragment with `tag`, to tell parsers apart
    pub fn tagged(tag: &'static str) -> Arc<Self> {
        Arc::new(Self { tag })
    }
}

impl RootElementParser for ChildNameParser {
    fn parse(
        &self,
        reader: &mut XmlStreamReader<'_>,
        _root: &StartElement,
        updates: &mut Vec<ModelNode>,
    ) -> StreamResult<()> {
        loop {
            match reader.next_tag()? {
                XmlEvent::Start(child) => {
                    if child.name().local_name() == "bad" {
                        return Err(child.unexpected_element());
                    }
                    if let Some(attribute) = child
                        .attributes()
                        .iter()
                        .find(|a| a.name.local_name() != "name")
                    {
                        return Err(child.unexpected_attribute(attribute));
                    }
                    updates.push(json!(format!(
                        "{}{}",
                        self.tag,
                        child.name().local_name().to_uppercase()
                    )));
                    reader.skip_element()?;
                }
                XmlEvent::End(_) => return Ok(()),
                _ => return Err(reader.malformed("Unexpected content below the root")),
            }
        }
    }
}
