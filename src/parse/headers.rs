// src/parse/headers.rs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entity::EntitySchema;
use crate::error::{ImportError, ImportResult};

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern should compile"));
static NON_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("key charset pattern should compile"));

/// Map one human-entered column name to its canonical key.
///
/// `"Date of Enrollment"` → `date_of_enrollment` → `date_enrolled`.
pub fn normalize_header(raw: &str, schema: &EntitySchema) -> String {
    let lowered = raw.trim().to_lowercase();
    let underscored = WHITESPACE.replace_all(&lowered, "_");
    let key = NON_KEY_CHARS.replace_all(&underscored, "");
    schema.canonical(&key).to_string()
}

pub fn normalize_headers(headers: &[String], schema: &EntitySchema) -> Vec<String> {
    headers
        .iter()
        .map(|h| normalize_header(h, schema))
        .collect()
}

/// Fail on the first required key (in schema order) that no header maps to.
pub fn validate_headers(normalized: &[String], schema: &EntitySchema) -> ImportResult<()> {
    match schema
        .required
        .iter()
        .find(|key| !normalized.iter().any(|h| h == *key))
    {
        Some(missing) => Err(ImportError::MissingColumn {
            field: (*missing).to_string(),
        }),
        None => Ok(()),
    }
}
