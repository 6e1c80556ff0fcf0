// src/entity/visit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coerce::{minutes_between, parse_instant, parse_int};
use super::{EntitySchema, ImportEntity};
use crate::parse::NormalizedRow;
use crate::store::StoreData;

pub static VISIT_SCHEMA: EntitySchema = EntitySchema {
    label: "visits",
    required: &["cic_name", "beneficiary_name", "activity_name", "check_in_at"],
    optional: &["assisted_by", "notes", "check_out_at", "duration_minutes"],
    synonyms: &[
        ("cic", "cic_name"),
        ("cicname", "cic_name"),
        ("ciccentre", "cic_name"),
        ("cic_centre", "cic_name"),
        ("ciccenter", "cic_name"),
        ("cic_center", "cic_name"),
        ("centre", "cic_name"),
        ("center", "cic_name"),
        ("beneficiary", "beneficiary_name"),
        ("beneficiaryname", "beneficiary_name"),
        ("participant", "beneficiary_name"),
        ("participant_name", "beneficiary_name"),
        ("activity", "activity_name"),
        ("activityname", "activity_name"),
        ("service", "activity_name"),
        ("checkin", "check_in_at"),
        ("check_in", "check_in_at"),
        ("checkintime", "check_in_at"),
        ("checkin_time", "check_in_at"),
        ("check_in_time", "check_in_at"),
        ("checkinat", "check_in_at"),
        ("checkin_at", "check_in_at"),
        ("time_in", "check_in_at"),
        ("checkout", "check_out_at"),
        ("check_out", "check_out_at"),
        ("checkouttime", "check_out_at"),
        ("checkout_time", "check_out_at"),
        ("check_out_time", "check_out_at"),
        ("checkoutat", "check_out_at"),
        ("checkout_at", "check_out_at"),
        ("time_out", "check_out_at"),
        ("assistedby", "assisted_by"),
        ("assisted", "assisted_by"),
        ("staff", "assisted_by"),
        ("facilitator", "assisted_by"),
        ("duration", "duration_minutes"),
        ("durationminutes", "duration_minutes"),
        ("duration_mins", "duration_minutes"),
        ("duration_min", "duration_minutes"),
        ("minutes", "duration_minutes"),
        ("note", "notes"),
        ("comment", "notes"),
        ("comments", "notes"),
    ],
};

/// One beneficiary visit to a Community Information Centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub cic_name: String,
    pub beneficiary_name: String,
    pub activity_name: String,
    pub check_in_at: DateTime<Utc>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub assisted_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportEntity for Visit {
    fn schema() -> &'static EntitySchema {
        &VISIT_SCHEMA
    }

    fn materialize(row: &NormalizedRow, now: DateTime<Utc>) -> Self {
        let parsed_in = parse_instant(row.get("check_in_at"));
        let check_out_at = parse_instant(row.get("check_out_at"));

        // explicit integer wins; a non-integer cell counts as absent and the
        // duration is derived, but only from two instants the row supplied
        let duration_minutes = match parse_int(row.get("duration_minutes")) {
            Some(explicit) => Some(explicit.max(0)),
            None => parsed_in
                .zip(check_out_at)
                .map(|(check_in, out)| minutes_between(check_in, out)),
        };
        let check_in_at = parsed_in.unwrap_or(now);

        Self {
            id: Uuid::new_v4(),
            cic_name: row.get("cic_name").trim().to_string(),
            beneficiary_name: row.get("beneficiary_name").trim().to_string(),
            activity_name: row.get("activity_name").trim().to_string(),
            check_in_at,
            check_out_at,
            duration_minutes,
            assisted_by: row.non_empty("assisted_by").map(str::to_string),
            notes: row.non_empty("notes").map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn collection(data: &StoreData) -> &Vec<Self> {
        &data.visits
    }

    fn collection_mut(data: &mut StoreData) -> &mut Vec<Self> {
        &mut data.visits
    }
}
