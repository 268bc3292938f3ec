use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::qname::QualifiedName;
use crate::reader::{StartElement, XmlEvent, XmlStreamReader};

/// Namespace of W3C XML Schema documents
pub const XML_SCHEMA_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Errors raised while discovering or indexing schema documents
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse schema {path}: {details}")]
    Parse { path: PathBuf, details: String },

    #[error("{path} is not an XML Schema document")]
    NotASchema { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// What a schema says about one element: its attributes (name to required
/// flag) and the child elements it may contain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    pub attributes: BTreeMap<String, bool>,
    pub children: BTreeSet<String>,
}

impl ElementInfo {
    pub fn allowed_attributes(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    pub fn required_attributes(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, required)| **required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn merge(&mut self, other: &Declaration) {
        for (name, required) in &other.attributes {
            let entry = self.attributes.entry(name.clone()).or_insert(false);
            *entry |= *required;
        }
        self.children.extend(other.children.iter().cloned());
    }
}

/// An element declaration or a named complex type, before type resolution
#[derive(Debug, Clone, Default)]
struct Declaration {
    attributes: BTreeMap<String, bool>,
    children: BTreeSet<String>,
    type_ref: Option<String>,
    bases: Vec<String>,
}

enum Owner {
    Element(String),
    Type(String),
}

/// Open schema construct while walking a document
enum Frame {
    Owner(usize),
    Other,
}

/// Element declarations and named types of one schema document
#[derive(Debug)]
pub struct SchemaDocument {
    elements: HashMap<String, Vec<Declaration>>,
    types: HashMap<String, Declaration>,
}

impl SchemaDocument {
    /// Read and index an XSD file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = XmlStreamReader::new(BufReader::new(file));
        Self::parse(path, &mut reader)
    }

    /// Index a schema held in memory; `path` is only used in errors
    pub fn from_text(path: &Path, text: &str) -> Result<Self> {
        let mut reader = XmlStreamReader::from_text(text);
        Self::parse(path, &mut reader)
    }

    fn parse(path: &Path, reader: &mut XmlStreamReader<'_>) -> Result<Self> {
        let parse_error = |e: crate::error::XmlStreamError| SchemaError::Parse {
            path: path.to_path_buf(),
            details: e.to_string(),
        };

        match reader.next_tag().map_err(parse_error)? {
            XmlEvent::Start(root) if root.name() == &QualifiedName::new(XML_SCHEMA_NS, "schema") => {}
            _ => {
                return Err(SchemaError::NotASchema {
                    path: path.to_path_buf(),
                });
            }
        }

        let mut owners: Vec<(Owner, Declaration)> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();

        loop {
            match reader.next_event().map_err(parse_error)? {
                XmlEvent::Start(start) => {
                    let frame = Self::visit(&start, &frames, &mut owners);
                    frames.push(frame);
                }
                XmlEvent::End(_) => {
                    if frames.pop().is_none() {
                        break;
                    }
                }
                XmlEvent::Text(_) => {}
                XmlEvent::Eof => break,
            }
        }

        let mut elements: HashMap<String, Vec<Declaration>> = HashMap::new();
        let mut types = HashMap::new();
        for (owner, declaration) in owners {
            match owner {
                Owner::Element(name) => elements.entry(name).or_default().push(declaration),
                Owner::Type(name) => {
                    types.insert(name, declaration);
                }
            }
        }

        debug!(
            schema = %path.display(),
            elements = elements.len(),
            types = types.len(),
            "Indexed schema document"
        );

        Ok(Self {
            elements,
            types,
        })
    }

    fn visit(start: &StartElement, frames: &[Frame], owners: &mut Vec<(Owner, Declaration)>) -> Frame {
        if start.name().namespace() != XML_SCHEMA_NS {
            return Frame::Other;
        }

        let enclosing = frames.iter().rev().find_map(|frame| match frame {
            Frame::Owner(index) => Some(*index),
            Frame::Other => None,
        });

        match start.name().local_name() {
            "element" => {
                if let Some(reference) = start.attribute("ref") {
                    if let Some(index) = enclosing {
                        owners[index].1.children.insert(strip_prefix(reference));
                    }
                    return Frame::Other;
                }
                let Some(name) = start.attribute("name") else {
                    return Frame::Other;
                };
                if let Some(index) = enclosing {
                    owners[index].1.children.insert(name.to_string());
                }
                let declaration = Declaration {
                    type_ref: start.attribute("type").map(strip_prefix),
                    ..Declaration::default()
                };
                owners.push((Owner::Element(name.to_string()), declaration));
                Frame::Owner(owners.len() - 1)
            }
            "complexType" => match start.attribute("name") {
                Some(name) => {
                    owners.push((Owner::Type(name.to_string()), Declaration::default()));
                    Frame::Owner(owners.len() - 1)
                }
                // Anonymous types describe the enclosing element
                None => Frame::Other,
            },
            "attribute" => {
                let name = start
                    .attribute("name")
                    .map(str::to_string)
                    .or_else(|| start.attribute("ref").map(strip_prefix));
                if let (Some(name), Some(index)) = (name, enclosing) {
                    let required = start.attribute("use") == Some("required");
                    owners[index].1.attributes.insert(name, required);
                }
                Frame::Other
            }
            "extension" | "restriction" => {
                if let (Some(base), Some(index)) = (start.attribute("base"), enclosing) {
                    owners[index].1.bases.push(strip_prefix(base));
                }
                Frame::Other
            }
            _ => Frame::Other,
        }
    }
}

/// Drop the namespace prefix of a QName-valued schema attribute
fn strip_prefix(value: &str) -> String {
    match value.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => value.to_string(),
    }
}

/// Schema documents found in a directory at one moment
#[derive(Debug, Default)]
pub struct SchemaSet {
    documents: Vec<SchemaDocument>,
}

impl SchemaSet {
    /// List schema files directly inside `directory`, sorted by path
    pub fn discover(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
        let io_error = |source| SchemaError::Io {
            path: directory.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        debug!(
            directory = %directory.display(),
            schemas = paths.len(),
            "Discovered schema documents"
        );
        Ok(paths)
    }

    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let documents = paths
            .iter()
            .map(|path| SchemaDocument::load(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { documents })
    }

    pub fn from_documents(documents: Vec<SchemaDocument>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Everything any loaded schema declares for elements named `local_name`,
    /// with types and extension bases followed
    pub fn element(&self, local_name: &str) -> Option<ElementInfo> {
        let mut info = ElementInfo::default();
        let mut found = false;
        let mut visited = HashSet::new();

        for document in &self.documents {
            for declaration in document.elements.get(local_name).into_iter().flatten() {
                found = true;
                self.collect(declaration, &mut info, &mut visited);
            }
        }

        found.then_some(info)
    }

    fn collect(&self, declaration: &Declaration, info: &mut ElementInfo, visited: &mut HashSet<String>) {
        info.merge(declaration);

        let linked = declaration.type_ref.iter().chain(declaration.bases.iter());
        for type_name in linked {
            if !visited.insert(type_name.clone()) {
                continue;
            }
            for document in &self.documents {
                if let Some(named) = document.types.get(type_name) {
                    self.collect(named, info, visited);
                }
            }
        }
    }
}
