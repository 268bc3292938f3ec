use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::{Value, json};

use xml_config_persister::{
    ConfigurationPersister, ElementTreeDeparser, ElementTreeParser, ErrorKind, ErrorReporter,
    LoadFailureKind, PersistenceError, QualifiedName, XmlConfigurationPersister,
};

use crate::common::mocks::{ChildNameParser, RecordingSink};
use crate::common::test_helpers::{CFG_NS, DOMAIN_NS, SERVER_SCHEMA, TestWorkspace};

fn cfg_persister(path: &Path) -> XmlConfigurationPersister {
    XmlConfigurationPersister::new(
        path,
        QualifiedName::new(CFG_NS, "root"),
        ChildNameParser::new(),
        Arc::new(ElementTreeDeparser::new(QualifiedName::new(CFG_NS, "root"))),
    )
}

fn server_persister(path: &Path) -> XmlConfigurationPersister {
    XmlConfigurationPersister::new(
        path,
        QualifiedName::new(DOMAIN_NS, "server"),
        ChildNameParser::new(),
        Arc::new(ElementTreeDeparser::new(QualifiedName::new(DOMAIN_NS, "server"))),
    )
}

#[test]
fn test_registered_root_loads_fragments_in_order() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document(
        "cfg.xml",
        r#"<cfg:root xmlns:cfg="urn:example:cfg:1.0"><cfg:a/><cfg:b/></cfg:root>"#,
    );

    let updates = cfg_persister(&path).load().unwrap();
    assert_eq!(updates, vec![json!("A"), json!("B")]);
}

#[test]
fn test_empty_document_loads_nothing() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document("cfg.xml", "");

    assert!(cfg_persister(&path).load().unwrap().is_empty());
}

#[test]
fn test_unregistered_root_fails() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document("cfg.xml", r#"<other:root xmlns:other="urn:other"/>"#);

    let error = cfg_persister(&path).load().unwrap_err();
    assert_eq!(error.failure_kind(), Some(LoadFailureKind::UnregisteredRoot));

    let validation = error.validation_error().unwrap();
    assert_eq!(validation.kind(), ErrorKind::UnexpectedElement);
    assert_eq!(
        validation.element(),
        Some(&QualifiedName::new("urn:other", "root"))
    );
    assert_eq!(validation.location().line, 1);
}

#[test]
fn test_mismatched_tag_points_at_mismatch() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document(
        "cfg.xml",
        "<cfg:root xmlns:cfg=\"urn:example:cfg:1.0\">\n    <a>\n</cfg:root>\n",
    );

    let error = cfg_persister(&path).load().unwrap_err();
    assert_eq!(
        error.failure_kind(),
        Some(LoadFailureKind::UnstructuredStream)
    );
    let validation = error.validation_error().unwrap();
    assert_eq!(validation.kind(), ErrorKind::UnknownError);
    assert_eq!(validation.location().line, 3);
    assert!(validation.fallback_message().is_some());
    assert!(error.source().is_some());
}

#[test]
fn test_suppress_load_never_touches_filesystem() {
    let persister = cfg_persister(Path::new("/definitely/not/here/cfg.xml")).with_suppress_load(true);
    assert!(persister.load().unwrap().is_empty());
}

#[test]
fn test_re_registration_overwrites_binding() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document(
        "cfg.xml",
        r#"<root xmlns="urn:example:cfg:1.0"><a/></root>"#,
    );
    let key = QualifiedName::new(CFG_NS, "root");

    let persister = cfg_persister(&path);
    persister.register_additional_root_element(key.clone(), ChildNameParser::tagged("first-"));
    for _ in 0..3 {
        assert_eq!(persister.load().unwrap(), vec![json!("first-A")]);
    }

    persister.register_additional_root_element(key, ChildNameParser::tagged("second-"));
    assert_eq!(persister.load().unwrap(), vec![json!("second-A")]);
    assert_eq!(persister.registry().len(), 1);
}

#[test]
fn test_loads_during_concurrent_registration() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document(
        "cfg.xml",
        r#"<root xmlns="urn:example:cfg:1.0"><a/><b/></root>"#,
    );
    let persister = cfg_persister(&path);

    (0..32).into_par_iter().for_each(|i| {
        if i % 2 == 0 {
            persister.register_additional_root_element(
                QualifiedName::new("urn:example:extra", format!("root{}", i)),
                ChildNameParser::new(),
            );
        } else {
            assert_eq!(persister.load().unwrap(), vec![json!("A"), json!("B")]);
        }
    });

    assert_eq!(persister.registry().len(), 17);
}

#[test]
fn test_structured_failure_prints_schema_report() {
    let workspace = TestWorkspace::new();
    workspace.write_schema("domain.xsd", SERVER_SCHEMA);
    let path = workspace.write_document(
        "standalone.xml",
        "<server xmlns=\"urn:example:domain:1.0\">\n    <profile/>\n    <extension modul=\"org.example.logging\"/>\n</server>\n",
    );

    let sink = RecordingSink::new();
    let reporter = ErrorReporter::new(Some(workspace.schema_dir())).with_sink(sink.clone());
    let error = server_persister(&path)
        .with_reporter(reporter)
        .load()
        .unwrap_err();

    assert_eq!(
        error.failure_kind(),
        Some(LoadFailureKind::StructuredValidation)
    );
    assert!(error.source().is_none());

    let lines = sink.lines();
    assert!(lines[0].starts_with("Validation error in standalone.xml"));
    assert!(lines.iter().any(|l| l.contains("3:     <extension modul=")));
    assert!(
        lines
            .iter()
            .any(|l| l.contains("'modul' isn't an allowed attribute for the 'extension' element"))
    );
    assert!(
        lines
            .iter()
            .any(|l| l.trim_end().ends_with("Attributes allowed here are: module"))
    );
    assert!(
        lines
            .iter()
            .any(|l| l.trim_end().ends_with("Did you mean 'module'?"))
    );
}

#[test]
fn test_unexpected_element_lists_siblings_from_schema() {
    let workspace = TestWorkspace::new();
    workspace.write_schema("domain.xsd", SERVER_SCHEMA);
    let path = workspace.write_document(
        "standalone.xml",
        "<server xmlns=\"urn:example:domain:1.0\">\n    <extensions/>\n    <bad/>\n</server>\n",
    );

    let sink = RecordingSink::new();
    let reporter = ErrorReporter::new(Some(workspace.schema_dir())).with_sink(sink.clone());
    let error = server_persister(&path)
        .with_reporter(reporter)
        .load()
        .unwrap_err();

    assert_eq!(
        error.validation_error().unwrap().kind(),
        ErrorKind::UnexpectedElement
    );
    assert!(
        sink.lines()
            .iter()
            .any(|l| l.trim_end().ends_with("Elements allowed here are: extensions, profile"))
    );
}

#[test]
fn test_missing_schema_directory_keeps_cause() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document(
        "standalone.xml",
        "<server xmlns=\"urn:example:domain:1.0\"><bad/></server>",
    );

    let sink = RecordingSink::new();
    let reporter = ErrorReporter::new(Some(workspace.schema_dir())).with_sink(sink.clone());
    let error = server_persister(&path)
        .with_reporter(reporter)
        .load()
        .unwrap_err();

    assert_eq!(sink.call_count(), 0);
    assert!(error.source().is_some());
}

#[test]
fn test_empty_schema_directory_keeps_cause() {
    let workspace = TestWorkspace::new();
    fs::create_dir_all(workspace.schema_dir()).unwrap();
    let path = workspace.write_document(
        "standalone.xml",
        "<server xmlns=\"urn:example:domain:1.0\"><bad/></server>",
    );

    let sink = RecordingSink::new();
    let reporter = ErrorReporter::new(Some(workspace.schema_dir())).with_sink(sink.clone());
    let error = server_persister(&path)
        .with_reporter(reporter)
        .load()
        .unwrap_err();

    assert_eq!(sink.call_count(), 0);
    assert!(matches!(error, PersistenceError::ParseFailed { cause: Some(_), .. }));
}

#[test]
fn test_store_commit_reload_round_trip() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_document(
        "standalone.xml",
        r#"<server xmlns="urn:example:domain:1.0">
    <extensions>
        <extension module="org.example.logging"/>
    </extensions>
    <profile>
        <subsystem xmlns="urn:example:logging:1.0">
            <logger category="org.example">DEBUG</logger>
        </subsystem>
    </profile>
</server>
"#,
    );
    let root = QualifiedName::new(DOMAIN_NS, "server");
    let persister = XmlConfigurationPersister::new(
        &path,
        root.clone(),
        Arc::new(ElementTreeParser),
        Arc::new(ElementTreeDeparser::new(root)),
    );

    let original = persister.load().unwrap();
    assert_eq!(original.len(), 2);

    let mut model = original.clone();
    model.push(json!({
        "name": "interfaces",
        "namespace": DOMAIN_NS,
        "attributes": {},
        "children": [],
        "text": null,
    }));

    persister
        .store(&Value::Array(model.clone()), &[])
        .unwrap()
        .commit()
        .unwrap();

    let reloaded = persister.load().unwrap();
    assert_eq!(reloaded, model);
    assert_eq!(
        reloaded[1]["children"][0]["children"][0]["text"],
        "DEBUG"
    );
}
