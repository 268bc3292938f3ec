use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A namespace-qualified XML name.
///
/// Displayed and parsed in Clark notation: `{urn:example}root`, or just `root`
/// when the name has no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    namespace: String,
    local_name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// A name in no namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new(String::new(), local_name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

impl FromStr for QualifiedName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (namespace, local_name) = match s.strip_prefix('{') {
            Some(rest) => rest
                .split_once('}')
                .ok_or_else(|| format!("Unterminated namespace in qualified name: {}", s))?,
            None => ("", s),
        };

        if local_name.is_empty() || local_name.contains(['{', '}', ' ', ':']) {
            return Err(format!("Invalid local name in qualified name: {}", s));
        }

        Ok(Self::new(namespace, local_name))
    }
}
