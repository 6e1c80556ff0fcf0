// src/entity/mod.rs
pub mod beneficiary;
pub mod coerce;
pub mod visit;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::parse::NormalizedRow;
use crate::store::StoreData;

pub use beneficiary::{Beneficiary, BENEFICIARY_SCHEMA};
pub use visit::{Visit, VISIT_SCHEMA};

/// Per-entity import configuration: which canonical columns must exist and
/// how free-form header spellings map onto them.
#[derive(Debug)]
pub struct EntitySchema {
    /// Plural display name, used in notifications and logs.
    pub label: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    /// `(variant, canonical)` pairs applied after character normalization.
    pub synonyms: &'static [(&'static str, &'static str)],
}

impl EntitySchema {
    /// Canonical key for an already character-normalized header.
    pub fn canonical<'a>(&self, key: &'a str) -> &'a str {
        self.synonyms
            .iter()
            .find(|(variant, _)| *variant == key)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(key)
    }
}

/// A record kind that can be bulk-imported from CSV.
pub trait ImportEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn schema() -> &'static EntitySchema;

    /// Build one record from a row. Never fails: bad or missing optional
    /// cells fall back to defaults. `now` stamps ids, timestamps and
    /// defaulted instants for the whole batch.
    fn materialize(row: &NormalizedRow, now: DateTime<Utc>) -> Self;

    fn collection(data: &StoreData) -> &Vec<Self>;

    fn collection_mut(data: &mut StoreData) -> &mut Vec<Self>;
}
