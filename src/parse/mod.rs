// src/parse/mod.rs
pub mod headers;
pub mod tokenizer;

use std::collections::HashMap;
use tracing::debug;

use crate::entity::EntitySchema;
use crate::error::{ImportError, ImportResult};

pub use headers::{normalize_header, normalize_headers, validate_headers};
pub use tokenizer::{tokenize, ParsedTable};

/// One data row keyed by canonical column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRow {
    cells: HashMap<String, String>,
}

impl NormalizedRow {
    /// Zip normalized headers with one row; a later duplicate header wins.
    pub fn zip(headers: &[String], values: &[String]) -> Self {
        let cells = headers
            .iter()
            .zip(values.iter())
            .map(|(h, v)| (h.clone(), v.clone()))
            .collect();
        Self { cells }
    }

    /// Cell value, or `""` when the column is absent.
    pub fn get(&self, key: &str) -> &str {
        self.cells.get(key).map(String::as_str).unwrap_or("")
    }

    /// Trimmed cell value, `None` when absent or blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        let v = self.get(key).trim();
        (!v.is_empty()).then_some(v)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.cells.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NormalizedRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Tokenize, normalize and validate a whole file for one entity kind.
///
/// Table-level problems (no header row, a missing required column) abort
/// before any row is produced.
pub fn parse_rows(text: &str, schema: &EntitySchema) -> ImportResult<Vec<NormalizedRow>> {
    let table = tokenize(text);
    if table.is_empty() {
        return Err(ImportError::EmptyInput);
    }

    let headers = normalize_headers(&table.headers, schema);
    validate_headers(&headers, schema)?;
    debug!(entity = schema.label, headers = ?headers, rows = table.rows.len(), "parsed csv");

    Ok(table
        .rows
        .iter()
        .map(|row| NormalizedRow::zip(&headers, row))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{beneficiary::BENEFICIARY_SCHEMA, visit::VISIT_SCHEMA};

    #[test]
    fn test_parse_rows_zips_normalized_headers() -> anyhow::Result<()> {
        let text = "Name,Email,Phone Number,Organisation,District,Program\n\
                    Jane,jane@x.org,555,Org,North,Skills\n";
        let rows = parse_rows(text, &BENEFICIARY_SCHEMA)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("phone"), "555");
        assert_eq!(rows[0].get("organization"), "Org");
        assert_eq!(rows[0].get("programme"), "Skills");
        assert_eq!(rows[0].get("date_enrolled"), "");
        Ok(())
    }

    #[test]
    fn test_empty_and_blank_header_inputs_rejected() {
        assert!(matches!(
            parse_rows("", &VISIT_SCHEMA),
            Err(ImportError::EmptyInput)
        ));
        assert!(matches!(
            parse_rows("\n\n", &VISIT_SCHEMA),
            Err(ImportError::EmptyInput)
        ));
        assert!(matches!(
            parse_rows(" , ,\n1,2,3\n", &VISIT_SCHEMA),
            Err(ImportError::EmptyInput)
        ));
    }

    #[test]
    fn test_missing_column_yields_no_rows() {
        let res = parse_rows("name,email\nJane,j@x.org\n", &BENEFICIARY_SCHEMA);
        match res {
            Err(ImportError::MissingColumn { field }) => assert_eq!(field, "phone"),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_header_last_wins() {
        let headers = vec!["notes".to_string(), "notes".to_string()];
        let values = vec!["first".to_string(), "second".to_string()];
        let row = NormalizedRow::zip(&headers, &values);
        assert_eq!(row.get("notes"), "second");
        assert_eq!(row.len(), 1);
    }
}
