// src/entity/beneficiary.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coerce::{parse_active_flag, parse_instant};
use super::{EntitySchema, ImportEntity};
use crate::parse::NormalizedRow;
use crate::store::StoreData;

pub static BENEFICIARY_SCHEMA: EntitySchema = EntitySchema {
    label: "beneficiaries",
    required: &[
        "name",
        "email",
        "phone",
        "organization",
        "district",
        "programme",
    ],
    optional: &["date_enrolled", "is_active"],
    synonyms: &[
        ("full_name", "name"),
        ("beneficiary_name", "name"),
        ("email_address", "email"),
        ("emailaddress", "email"),
        ("phone_number", "phone"),
        ("phonenumber", "phone"),
        ("mobile", "phone"),
        ("mobile_number", "phone"),
        ("organisation", "organization"),
        ("program", "programme"),
        ("program_name", "programme"),
        ("programme_name", "programme"),
        ("dateenrolled", "date_enrolled"),
        ("date_of_enrollment", "date_enrolled"),
        ("date_of_enrolment", "date_enrolled"),
        ("enrollment_date", "date_enrolled"),
        ("enrolment_date", "date_enrolled"),
        ("isactive", "is_active"),
        ("active", "is_active"),
    ],
};

/// A programme participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub organization: String,
    pub district: String,
    pub programme: String,
    pub date_enrolled: DateTime<Utc>,
    pub is_active: bool,
    /// Set by device assignment, never by import.
    pub device_id: Option<String>,
    pub device_assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportEntity for Beneficiary {
    fn schema() -> &'static EntitySchema {
        &BENEFICIARY_SCHEMA
    }

    fn materialize(row: &NormalizedRow, now: DateTime<Utc>) -> Self {
        let text = |key: &str| row.get(key).trim().to_string();

        Self {
            id: Uuid::new_v4(),
            name: text("name"),
            email: text("email"),
            phone: text("phone"),
            organization: text("organization"),
            district: text("district"),
            programme: text("programme"),
            date_enrolled: parse_instant(row.get("date_enrolled")).unwrap_or(now),
            is_active: parse_active_flag(row.get("is_active")),
            device_id: None,
            device_assigned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn collection(data: &StoreData) -> &Vec<Self> {
        &data.beneficiaries
    }

    fn collection_mut(data: &mut StoreData) -> &mut Vec<Self> {
        &mut data.beneficiaries
    }
}
