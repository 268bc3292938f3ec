use std::io;

use xml_config_persister::translator::recover_message;
use xml_config_persister::{ErrorKind, Location, QualifiedName, ValidationError, XmlStreamError, translate};

#[test]
fn test_structured_failure_is_reused() {
    let location = Location::new(12, 9, 431);
    let failure: XmlStreamError = ValidationError::new(ErrorKind::MissingAttributes, location)
        .with_element(QualifiedName::local("extension"))
        .with_alternatives(["module"])
        .into();

    let translation = translate(&failure);
    assert!(translation.enrichable);
    assert_eq!(translation.error.kind(), ErrorKind::MissingAttributes);
    assert_eq!(translation.error.location(), location);
    assert!(translation.error.alternatives().contains("module"));
}

#[test]
fn test_unstructured_failure_recovers_message() {
    let failure = XmlStreamError::Malformed {
        location: Location::new(3, 1, 57),
        message: "expected `</a>`, but `</cfg:root>` was found".to_string(),
    };

    let translation = translate(&failure);
    assert!(translation.enrichable);
    assert_eq!(translation.error.kind(), ErrorKind::UnknownError);
    assert_eq!(translation.error.location().line, 3);
    assert_eq!(
        translation.error.fallback_message(),
        Some("expected `</a>`, but `</cfg:root>` was found")
    );
}

#[test]
fn test_io_failure_is_minimal() {
    let failure = XmlStreamError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed"));

    let translation = translate(&failure);
    assert_eq!(translation.error.kind(), ErrorKind::UnknownError);
    assert_eq!(translation.error.location(), Location::default());
    assert_eq!(translation.error.fallback_message(), None);
}

#[test]
fn test_recover_message_takes_trailing_clause() {
    assert_eq!(
        recover_message("ParseError at [row,col]:[4,2]\nMessage: Unbound prefix"),
        Some("Unbound prefix".to_string())
    );
    assert_eq!(recover_message("no clause here"), None);
}
