//! Baseline sample rows written by the bootstrap, also used as demo data.
//!
//! Ids are fixed so a second seeding attempt collides instead of
//! duplicating.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use super::client::Row;
use super::{DatabaseError, Table};
use crate::models::{Gender, Patient};

const PATIENT_IDS: [u128; 3] = [
    0x6d65_646c_696e_6b78_0000_0000_0000_0001,
    0x6d65_646c_696e_6b78_0000_0000_0000_0002,
    0x6d65_646c_696e_6b78_0000_0000_0000_0003,
];

fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn sample_patients() -> Vec<Patient> {
    let entries = [
        ("Amara", "Okafor", (1985, 3, 14), Gender::Female, "+1 555 010 1001", "amara.okafor@example.com"),
        ("James", "Whitfield", (1972, 11, 2), Gender::Male, "+1 555 010 1002", "j.whitfield@example.com"),
        ("Lucia", "Fernandez", (2016, 6, 21), Gender::Female, "+1 555 010 1003", "fernandez.family@example.com"),
    ];
    entries
        .into_iter()
        .zip(PATIENT_IDS)
        .map(|((first, last, (y, m, d), gender, phone, email), id)| Patient {
            id: Uuid::from_u128(id),
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(y, m, d),
            gender,
            phone: Some(phone.to_string()),
            email: Some(email.to_string()),
            address: None,
            created_at: seeded_at(),
        })
        .collect()
}

pub fn sample_patient_rows() -> Result<Vec<Row>, DatabaseError> {
    sample_patients().iter().map(to_row).collect()
}

/// Visits and vitals for the sample patients, keyed by `patientId`.
pub fn sample_dependent_rows() -> Vec<(Table, Row)> {
    let first = Uuid::from_u128(PATIENT_IDS[0]).to_string();
    let second = Uuid::from_u128(PATIENT_IDS[1]).to_string();
    let rows = [
        (
            Table::Visits,
            json!({
                "id": "seed-visit-1",
                "patientId": first,
                "visitDate": "2024-01-10",
                "reason": "Annual physical",
                "status": "completed",
            }),
        ),
        (
            Table::Visits,
            json!({
                "id": "seed-visit-2",
                "patientId": second,
                "visitDate": "2024-01-12",
                "reason": "Blood pressure follow-up",
                "status": "completed",
            }),
        ),
        (
            Table::Vitals,
            json!({
                "id": "seed-vitals-1",
                "patientId": second,
                "visitId": "seed-visit-2",
                "systolic": 138,
                "diastolic": 88,
                "heartRate": 72,
            }),
        ),
    ];
    rows.into_iter()
        .filter_map(|(table, value)| match value {
            serde_json::Value::Object(row) => Some((table, row)),
            _ => None,
        })
        .collect()
}

pub fn to_row<T: serde::Serialize>(value: &T) -> Result<Row, DatabaseError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(DatabaseError::InvalidRow(format!(
            "expected JSON object, found {other}"
        ))),
    }
}
