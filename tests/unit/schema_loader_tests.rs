use std::fs;

use xml_config_persister::SchemaSet;

use crate::common::test_helpers::{SERVER_SCHEMA, TestWorkspace};

const LOGGING_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="logger">
        <xs:complexType>
            <xs:attribute name="category" use="required"/>
            <xs:attribute name="use-parent-handlers"/>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

#[test]
fn test_discovered_schemas_are_merged() {
    let workspace = TestWorkspace::new();
    workspace.write_schema("domain.xsd", SERVER_SCHEMA);
    workspace.write_schema("logging.XSD", LOGGING_SCHEMA);
    workspace.write_schema("notes.txt", "not a schema");
    fs::create_dir_all(workspace.schema_dir().join("nested.xsd")).unwrap();

    let paths = SchemaSet::discover(&workspace.schema_dir(), "xsd").unwrap();
    assert_eq!(paths.len(), 2);

    let schemas = SchemaSet::load(&paths).unwrap();
    assert_eq!(schemas.len(), 2);

    let server = schemas.element("server").unwrap();
    assert!(server.children.contains("extensions"));
    assert!(server.children.contains("profile"));

    let subsystem = schemas.element("subsystem").unwrap();
    assert_eq!(
        subsystem.children.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["handler", "logger"]
    );

    let logger = schemas.element("logger").unwrap();
    assert_eq!(logger.required_attributes(), vec!["category"]);
    assert_eq!(
        logger.allowed_attributes(),
        vec!["category", "use-parent-handlers"]
    );
}

#[test]
fn test_unknown_element() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_schema("domain.xsd", SERVER_SCHEMA);

    let schemas = SchemaSet::load(&[path]).unwrap();
    assert!(schemas.element("datasource").is_none());
}
