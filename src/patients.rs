//! Patient records service.
//!
//! Shapes and validates patient fields, then delegates persistence to the
//! data client. Public operations return `OpOutcome` and raise an error
//! notification on failure; nothing is retried and callers only update
//! their local lists after a successful outcome.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::DataMode;
use crate::db::seed::{sample_patients, to_row};
use crate::db::{audit, DataClient, DatabaseError, Query, Row, Table};
use crate::models::{Gender, NewPatient, Patient, PatientUpdate};
use crate::notify::{Notification, Notifier};
use crate::outcome::OpOutcome;
use crate::validation::{is_valid_email, is_valid_phone, non_blank};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("Date of birth is in the future")]
    FutureBirthDate,
    #[error("Nothing to update")]
    EmptyUpdate,
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Stored patient record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Where a listing's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Remote,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub source: DataSource,
    pub records: Vec<T>,
}

pub struct PatientService {
    client: Arc<dyn DataClient>,
    notifier: Arc<dyn Notifier>,
    mode: DataMode,
}

impl PatientService {
    pub fn new(client: Arc<dyn DataClient>, notifier: Arc<dyn Notifier>, mode: DataMode) -> Self {
        Self {
            client,
            notifier,
            mode,
        }
    }

    /// Most recently registered patients first.
    ///
    /// In `DemoFallback` mode a missing patients table yields the demo
    /// records, tagged `DataSource::Demo`.
    pub fn list(&self, limit: Option<u32>) -> OpOutcome<Listing<Patient>> {
        let query = Query::new()
            .order_by("createdAt", false)
            .limit(limit.unwrap_or(DEFAULT_PAGE_SIZE));
        match self.client.select(Table::Patients, &query) {
            Ok(rows) => self.finish(
                "load patients",
                rows.into_iter()
                    .map(from_row)
                    .collect::<Result<Vec<_>, _>>()
                    .map(|records| Listing {
                        source: DataSource::Remote,
                        records,
                    }),
            ),
            Err(e) if self.mode == DataMode::DemoFallback && e.is_missing_table() => {
                tracing::warn!("Patients table unavailable, serving demo records: {e}");
                self.notifier.notify(Notification::info(
                    "Patient records are unavailable; showing demo patients",
                ));
                OpOutcome::ok(Listing {
                    source: DataSource::Demo,
                    records: sample_patients(),
                })
            }
            Err(e) => self.finish("load patients", Err(e.into())),
        }
    }

    pub fn get(&self, id: Uuid) -> OpOutcome<Patient> {
        let result = self
            .client
            .select(Table::Patients, &Query::new().eq("id", id.to_string()).limit(1))
            .map_err(PatientError::from)
            .and_then(|rows| {
                rows.into_iter().next().ok_or_else(|| {
                    DatabaseError::NotFound {
                        entity_type: "patient".into(),
                        id: id.to_string(),
                    }
                    .into()
                })
            })
            .and_then(from_row);
        self.finish("load patient", result)
    }

    pub fn create(&self, input: NewPatient) -> OpOutcome<Patient> {
        let result = self.try_create(input);
        if let Ok(patient) = &result {
            audit::record(self.client.as_ref(), "create", &entity(patient.id), None);
        }
        self.finish("create patient", result)
    }

    pub fn update(&self, id: Uuid, changes: PatientUpdate) -> OpOutcome<Patient> {
        let result = self.try_update(id, changes);
        if result.is_ok() {
            audit::record(self.client.as_ref(), "update", &entity(id), None);
        }
        self.finish("update patient", result)
    }

    pub fn delete(&self, id: Uuid) -> OpOutcome<Uuid> {
        let result = self
            .client
            .delete(Table::Patients, &id.to_string())
            .map(|()| id)
            .map_err(PatientError::from);
        if result.is_ok() {
            audit::record(self.client.as_ref(), "delete", &entity(id), None);
        }
        self.finish("delete patient", result)
    }

    fn try_create(&self, input: NewPatient) -> Result<Patient, PatientError> {
        let first_name =
            non_blank(Some(input.first_name)).ok_or(PatientError::MissingField("First name"))?;
        let last_name =
            non_blank(Some(input.last_name)).ok_or(PatientError::MissingField("Last name"))?;
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            date_of_birth: input.date_of_birth,
            gender: input.gender.unwrap_or(Gender::Unknown),
            phone: non_blank(input.phone),
            email: non_blank(input.email),
            address: non_blank(input.address),
            created_at: Utc::now(),
        };
        validate_contact(
            patient.email.as_deref(),
            patient.phone.as_deref(),
            patient.date_of_birth,
        )?;

        let stored = self.client.insert(Table::Patients, to_row(&patient)?)?;
        from_row(stored)
    }

    fn try_update(&self, id: Uuid, changes: PatientUpdate) -> Result<Patient, PatientError> {
        let changes = PatientUpdate {
            first_name: changes.first_name.map(|v| v.trim().to_string()),
            last_name: changes.last_name.map(|v| v.trim().to_string()),
            phone: changes.phone.map(|v| v.trim().to_string()),
            email: changes.email.map(|v| v.trim().to_string()),
            address: changes.address.map(|v| v.trim().to_string()),
            ..changes
        };
        if changes.is_empty() {
            return Err(PatientError::EmptyUpdate);
        }
        if changes.first_name.as_deref() == Some("") {
            return Err(PatientError::MissingField("First name"));
        }
        if changes.last_name.as_deref() == Some("") {
            return Err(PatientError::MissingField("Last name"));
        }

        validate_contact(
            changes.email.as_deref().filter(|v| !v.is_empty()),
            changes.phone.as_deref().filter(|v| !v.is_empty()),
            changes.date_of_birth,
        )?;

        let mut row: Row = to_row(&changes)?;
        // Blank optional contact fields clear the stored value.
        for field in ["phone", "email", "address"] {
            if row.get(field).and_then(|v| v.as_str()) == Some("") {
                row.insert(field.to_string(), serde_json::Value::Null);
            }
        }
        from_row(self.client.update(Table::Patients, &id.to_string(), row)?)
    }

    fn finish<T>(&self, action: &str, result: Result<T, PatientError>) -> OpOutcome<T> {
        if let Err(e) = &result {
            tracing::warn!(action, "Patient operation failed: {e}");
            self.notifier
                .notify(Notification::error(format!("Failed to {action}: {e}")));
        }
        result.into()
    }
}

fn validate_contact(
    email: Option<&str>,
    phone: Option<&str>,
    date_of_birth: Option<NaiveDate>,
) -> Result<(), PatientError> {
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(PatientError::InvalidEmail(email.to_string()));
        }
    }
    if let Some(phone) = phone {
        if !is_valid_phone(phone) {
            return Err(PatientError::InvalidPhone(phone.to_string()));
        }
    }
    if date_of_birth.is_some_and(|dob| dob > Utc::now().date_naive()) {
        return Err(PatientError::FutureBirthDate);
    }
    Ok(())
}

fn from_row(row: Row) -> Result<Patient, PatientError> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

fn entity(id: Uuid) -> String {
    format!("patient:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::db::{SqliteDataClient, TenantId};
    use crate::notify::{NotificationLevel, RecordingNotifier};

    const TENANT: TenantId = TenantId::new_static("test");

    fn service(mode: DataMode, with_tables: bool) -> (Arc<SqliteDataClient>, Arc<RecordingNotifier>, PatientService) {
        let client = Arc::new(SqliteDataClient::open_in_memory(TENANT).unwrap());
        if with_tables {
            for table in Table::BOOTSTRAP_ORDER {
                client.create_table_if_not_exists(table).unwrap();
            }
        }
        let notifier = Arc::new(RecordingNotifier::new());
        let service = PatientService::new(client.clone(), notifier.clone(), mode);
        (client, notifier, service)
    }

    fn new_patient(first: &str, last: &str) -> NewPatient {
        NewPatient {
            first_name: first.into(),
            last_name: last.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17),
            email: Some(" grace@example.com ".into()),
            ..NewPatient::default()
        }
    }

    #[test]
    fn create_shapes_fields_and_persists() {
        let (client, notifier, service) = service(DataMode::Live, true);
        let patient = service
            .create(new_patient("  Grace ", "Hopper"))
            .into_result()
            .unwrap();

        assert_eq!(patient.first_name, "Grace");
        assert_eq!(patient.email.as_deref(), Some("grace@example.com"));
        assert_eq!(patient.gender, Gender::Unknown);
        assert_eq!(client.count(Table::Patients).unwrap(), 1);
        assert_eq!(client.count(Table::AuditLog).unwrap(), 1);
        assert!(notifier.notifications().is_empty());

        let fetched = service.get(patient.id).into_result().unwrap();
        assert_eq!(fetched, patient);
    }

    #[test]
    fn create_rejects_invalid_input_without_writing() {
        let (client, notifier, service) = service(DataMode::Live, true);

        assert!(!service.create(new_patient("", "Hopper")).is_success());
        let mut bad_email = new_patient("Grace", "Hopper");
        bad_email.email = Some("grace-at-example".into());
        assert!(!service.create(bad_email).is_success());
        let mut future = new_patient("Grace", "Hopper");
        future.date_of_birth = NaiveDate::from_ymd_opt(2999, 1, 1);
        assert!(!service.create(future).is_success());

        assert_eq!(client.count(Table::Patients).unwrap(), 0);
        assert_eq!(notifier.count(NotificationLevel::Error), 3);
    }

    #[test]
    fn list_returns_newest_first_from_remote() {
        let (_, _, service) = service(DataMode::Live, true);
        let first = service.create(new_patient("Ada", "Lovelace")).into_result().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = service.create(new_patient("Alan", "Turing")).into_result().unwrap();

        let listing = service.list(None).into_result().unwrap();
        assert_eq!(listing.source, DataSource::Remote);
        let ids: Vec<_> = listing.records.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let limited = service.list(Some(1)).into_result().unwrap();
        assert_eq!(limited.records.len(), 1);
    }

    #[test]
    fn list_orders_within_the_same_second() {
        let (client, _, service) = service(DataMode::Live, true);
        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut older = sample_patients().remove(0);
        older.created_at = whole;
        let mut newer = sample_patients().remove(1);
        newer.created_at = whole + chrono::Duration::milliseconds(500);
        let mut newest = sample_patients().remove(2);
        newest.created_at = whole + chrono::Duration::microseconds(500_001);
        for patient in [&older, &newest, &newer] {
            client.insert(Table::Patients, to_row(patient).unwrap()).unwrap();
        }

        let listing = service.list(None).into_result().unwrap();
        let ids: Vec<_> = listing.records.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newest.id, newer.id, older.id]);
    }

    #[test]
    fn live_mode_surfaces_missing_table() {
        let (_, notifier, service) = service(DataMode::Live, false);
        let outcome = service.list(None);
        assert!(!outcome.is_success());
        assert!(outcome.error().unwrap().contains("does not exist"));
        assert_eq!(notifier.count(NotificationLevel::Error), 1);
    }

    #[test]
    fn demo_mode_serves_tagged_demo_records() {
        let (_, notifier, service) = service(DataMode::DemoFallback, false);
        let listing = service.list(None).into_result().unwrap();
        assert_eq!(listing.source, DataSource::Demo);
        assert_eq!(listing.records, sample_patients());
        assert_eq!(notifier.count(NotificationLevel::Info), 1);
        assert_eq!(notifier.count(NotificationLevel::Error), 0);
    }

    #[test]
    fn update_merges_and_clears_blank_contacts() {
        let (_, _, service) = service(DataMode::Live, true);
        let created = service.create(new_patient("Grace", "Hopper")).into_result().unwrap();

        let updated = service
            .update(
                created.id,
                PatientUpdate {
                    phone: Some("+1 555 010 9999".into()),
                    email: Some("  ".into()),
                    ..PatientUpdate::default()
                },
            )
            .into_result()
            .unwrap();
        assert_eq!(updated.first_name, "Grace");
        assert_eq!(updated.phone.as_deref(), Some("+1 555 010 9999"));
        assert_eq!(updated.email, None);
    }

    #[test]
    fn empty_update_and_missing_patient_fail() {
        let (_, notifier, service) = service(DataMode::Live, true);
        assert!(!service
            .update(Uuid::new_v4(), PatientUpdate::default())
            .is_success());
        let outcome = service.update(
            Uuid::new_v4(),
            PatientUpdate {
                last_name: Some("Nobody".into()),
                ..PatientUpdate::default()
            },
        );
        assert!(outcome.error().unwrap().contains("not found"));
        assert_eq!(notifier.count(NotificationLevel::Error), 2);
    }

    #[test]
    fn delete_removes_patient() {
        let (client, _, service) = service(DataMode::Live, true);
        let created = service.create(new_patient("Grace", "Hopper")).into_result().unwrap();
        assert_eq!(service.delete(created.id).into_result(), Ok(created.id));
        assert_eq!(client.count(Table::Patients).unwrap(), 0);
        assert!(!service.delete(created.id).is_success());
    }
}
