use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CFG_NS: &str = "urn:example:cfg:1.0";
pub const DOMAIN_NS: &str = "urn:example:domain:1.0";

/// Schema for the `server` documents used across the tests
pub const SERVER_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:example:domain:1.0">
    <xs:element name="server">
        <xs:complexType>
            <xs:sequence>
                <xs:element ref="extensions"/>
                <xs:element ref="profile"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
    <xs:element name="extensions">
        <xs:complexType>
            <xs:sequence>
                <xs:element ref="extension"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
    <xs:element name="extension">
        <xs:complexType>
            <xs:attribute name="module" use="required"/>
        </xs:complexType>
    </xs:element>
    <xs:element name="profile">
        <xs:complexType>
            <xs:sequence>
                <xs:element ref="subsystem"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
    <xs:element name="subsystem" type="subsystemType"/>
    <xs:complexType name="subsystemType">
        <xs:sequence>
            <xs:element name="handler"/>
            <xs:element name="logger"/>
        </xs:sequence>
    </xs:complexType>
</xs:schema>"#;

/// Temporary directory holding a configuration document and a schema directory
pub struct TestWorkspace {
    pub temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_document(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Schema directory path; not created
    pub fn schema_dir(&self) -> PathBuf {
        self.path().join("docs").join("schema")
    }

    pub fn write_schema(&self, name: &str, content: &str) -> PathBuf {
        let dir = self.schema_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
