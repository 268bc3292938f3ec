//! Translation of stream failures into normalized validation errors

use regex::Regex;
use std::sync::OnceLock;

use crate::error::XmlStreamError;
use crate::validation::{ErrorKind, ValidationError};

/// Cached regex for the trailing message clause of a raw parse failure
static MESSAGE_CLAUSE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_message_clause_regex() -> &'static Regex {
    MESSAGE_CLAUSE_REGEX
        .get_or_init(|| Regex::new(r"Message: (.*)").expect("Failed to compile message regex"))
}

/// A normalized failure and whether it should go through schema-aware enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub error: ValidationError,
    pub enrichable: bool,
}

/// Normalize a stream failure. Never fails: the worst case is an
/// `UnknownError` with no location and no message.
pub fn translate(failure: &XmlStreamError) -> Translation {
    let error = match failure {
        XmlStreamError::Validation(error) => error.as_ref().clone(),
        XmlStreamError::UnregisteredRoot {
            name,
            location,
            registered,
        } => ValidationError::new(ErrorKind::UnexpectedElement, *location)
            .with_element(name.clone())
            .with_alternatives(registered.iter().map(|key| key.to_string()))
            .with_message(format!(
                "Unexpected root element '{}'; no parser is registered for it",
                name
            )),
        other => {
            let location = other.location().unwrap_or_default();
            let mut error = ValidationError::new(ErrorKind::UnknownError, location);
            if let Some(message) = recover_message(&other.to_string()) {
                error.set_fallback_message(message);
            }
            error
        }
    };

    Translation {
        error,
        enrichable: true,
    }
}

/// Pull the `Message: <text>` clause out of raw failure text, if any
pub fn recover_message(raw: &str) -> Option<String> {
    get_message_clause_regex()
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .filter(|message| !message.is_empty())
}
