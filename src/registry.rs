//! Root parser registry
//!
//! Maps the qualified name of a document's outermost element to the grammar
//! that consumes it. One primary root is fixed at construction; any number of
//! additional roots can be registered at any time. Loads never read the live
//! map: they take a [`RootBindings`] snapshot under the same lock that guards
//! registration and parse against that frozen view.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{StreamResult, XmlStreamError};
use crate::qname::QualifiedName;
use crate::reader::{StartElement, XmlEvent, XmlStreamReader};

/// One parsed unit of configuration state. Opaque to the loader.
pub type ModelNode = serde_json::Value;

/// Grammar for the subtree under one root element
pub trait RootElementParser: Send + Sync {
    /// Consume the document from just after `root`'s start tag through its
    /// matching end tag, appending fragments to `updates` in document order.
    fn parse(
        &self,
        reader: &mut XmlStreamReader<'_>,
        root: &StartElement,
        updates: &mut Vec<ModelNode>,
    ) -> StreamResult<()>;
}

/// Registry of root-element grammars
pub struct RootParserRegistry {
    primary: QualifiedName,
    bindings: Mutex<HashMap<QualifiedName, Arc<dyn RootElementParser>>>,
}

impl RootParserRegistry {
    pub fn new(primary: QualifiedName, parser: Arc<dyn RootElementParser>) -> Self {
        let mut bindings: HashMap<QualifiedName, Arc<dyn RootElementParser>> = HashMap::new();
        bindings.insert(primary.clone(), parser);
        Self {
            primary,
            bindings: Mutex::new(bindings),
        }
    }

    /// Add or replace the grammar for `key`. The last registration wins.
    pub fn register_root(&self, key: QualifiedName, parser: Arc<dyn RootElementParser>) {
        let mut bindings = self
            .bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if bindings.insert(key.clone(), parser).is_some() {
            debug!(root = %key, "Replaced existing root element parser");
        } else {
            debug!(root = %key, "Registered root element parser");
        }
    }

    /// Frozen view of every binding, for the duration of one load
    pub fn snapshot(&self) -> RootBindings {
        let bindings = self
            .bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        RootBindings {
            bindings: bindings.clone(),
        }
    }

    pub fn primary(&self) -> &QualifiedName {
        &self.primary
    }

    pub fn contains(&self, key: &QualifiedName) -> bool {
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Always false: the primary root is never removed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot of the registry taken at the start of a load
#[derive(Clone)]
pub struct RootBindings {
    bindings: HashMap<QualifiedName, Arc<dyn RootElementParser>>,
}

impl RootBindings {
    pub fn get(&self, key: &QualifiedName) -> Option<&Arc<dyn RootElementParser>> {
        self.bindings.get(key)
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> Vec<QualifiedName> {
        let mut keys: Vec<QualifiedName> = self.bindings.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Single parse pass: dispatch the root element to its grammar, then
    /// require the end of the document. A document without any root element
    /// produces no fragments.
    pub fn parse_document(
        &self,
        reader: &mut XmlStreamReader<'_>,
        updates: &mut Vec<ModelNode>,
    ) -> StreamResult<()> {
        let root = match reader.next_tag()? {
            XmlEvent::Start(root) => root,
            XmlEvent::Eof => return Ok(()),
            XmlEvent::End(name) => {
                return Err(reader.malformed(format!("Unexpected end tag '{}'", name)));
            }
            XmlEvent::Text(_) => return Err(reader.malformed("Unexpected text before root element")),
        };

        let parser = self.get(root.name()).ok_or_else(|| {
            XmlStreamError::UnregisteredRoot {
                name: root.name().clone(),
                location: root.location(),
                registered: self.keys(),
            }
        })?;

        debug!(root = %root.name(), "Dispatching root element");
        parser.parse(reader, &root, updates)?;

        if reader.depth() != 0 {
            return Err(reader.malformed(format!(
                "Parser for '{}' returned before the end of the element",
                root.name()
            )));
        }

        match reader.next_event()? {
            XmlEvent::Eof => Ok(()),
            _ => Err(reader.malformed("Unexpected content after the root element")),
        }
    }
}
