//! Database bootstrap sequencer.
//!
//! Runs on the first authenticated load and makes sure the tenant's
//! tables and baseline rows exist before protected screens render:
//!
//! ```text
//! checking ──rows present──────────────────────────▶ complete
//!    │                                                  ▲
//!    └─empty / missing──▶ initializing ──all created────┘
//!    │                        │
//!    └──────unexpected───────▶ error ──retry──▶ checking
//! ```
//!
//! Every step is idempotent: tables are created with "if not exists"
//! semantics, an already-exists report counts as success, and seeding
//! only happens while the primary table is empty. Nothing is rolled back
//! on failure; a retry picks up whatever already exists.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::DEFAULT_COMPLETION_DELAY;
use crate::db::{audit, seed, DataClient, DatabaseError, DbErrorKind, Row, Table};

const PROGRESS_CHECKING: u8 = 10;
const PROGRESS_INITIALIZING: u8 = 20;
const PROGRESS_TABLES_DONE: u8 = 80;
const PROGRESS_SEEDED: u8 = 95;
const PROGRESS_COMPLETE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPhase {
    Checking,
    Initializing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapStatus {
    pub phase: BootstrapPhase,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BootstrapStatus {
    fn initial() -> Self {
        Self {
            phase: BootstrapPhase::Checking,
            progress: 0,
            error: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Database check failed: {0}")]
    Check(DatabaseError),
    #[error("Creating table {table} failed: {source}")]
    CreateTable {
        table: Table,
        #[source]
        source: DatabaseError,
    },
    #[error("Seeding sample data failed: {0}")]
    Seed(DatabaseError),
    #[error("Retry is only available after a failed bootstrap")]
    NotRetryable,
}

pub type CompletionCallback = Box<dyn FnMut() + Send>;

pub struct BootstrapSequencer {
    client: Arc<dyn DataClient>,
    completion_delay: Duration,
    on_complete: Option<CompletionCallback>,
    status: watch::Sender<BootstrapStatus>,
    history: Vec<BootstrapPhase>,
    seeded_rows: usize,
}

impl BootstrapSequencer {
    pub fn new(client: Arc<dyn DataClient>) -> Self {
        let (status, _) = watch::channel(BootstrapStatus::initial());
        Self {
            client,
            completion_delay: DEFAULT_COMPLETION_DELAY,
            on_complete: None,
            status,
            history: Vec::new(),
            seeded_rows: 0,
        }
    }

    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    /// Register the callback fired once the sequence completes.
    pub fn on_complete(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn status(&self) -> BootstrapStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes (phase, progress, error).
    pub fn subscribe(&self) -> watch::Receiver<BootstrapStatus> {
        self.status.subscribe()
    }

    /// Every phase entered so far, in order.
    pub fn history(&self) -> &[BootstrapPhase] {
        &self.history
    }

    /// Sample rows inserted by this sequencer.
    pub fn seeded_rows(&self) -> usize {
        self.seeded_rows
    }

    pub fn is_complete(&self) -> bool {
        self.status.borrow().phase == BootstrapPhase::Complete
    }

    /// Run the sequence from `checking`.
    ///
    /// `complete` is terminal: once reached, further calls return
    /// immediately without firing the callback again.
    pub async fn run(&mut self) -> Result<(), BootstrapError> {
        if self.is_complete() {
            return Ok(());
        }

        if let Err(e) = self.execute() {
            tracing::warn!("Database bootstrap failed: {e}");
            let progress = self.status.borrow().progress;
            self.transition(BootstrapPhase::Error, progress, Some(e.to_string()));
            return Err(e);
        }

        self.transition(BootstrapPhase::Complete, PROGRESS_COMPLETE, None);
        audit::record(self.client.as_ref(), "bootstrap_complete", "database", None);

        tokio::time::sleep(self.completion_delay).await;
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
        Ok(())
    }

    /// User-triggered retry after a failure; re-runs everything from `checking`.
    pub async fn retry(&mut self) -> Result<(), BootstrapError> {
        if self.status.borrow().phase != BootstrapPhase::Error {
            return Err(BootstrapError::NotRetryable);
        }
        tracing::info!("Retrying database bootstrap");
        self.run().await
    }

    fn execute(&mut self) -> Result<(), BootstrapError> {
        self.transition(BootstrapPhase::Checking, PROGRESS_CHECKING, None);

        let populated = match self.client.count(Table::PRIMARY) {
            Ok(rows) => rows > 0,
            Err(e) if e.is_missing_table() => false,
            Err(e) => return Err(BootstrapError::Check(e)),
        };
        if populated {
            tracing::info!("Database already initialized");
            return Ok(());
        }

        self.transition(BootstrapPhase::Initializing, PROGRESS_INITIALIZING, None);
        self.create_tables()?;
        self.seed_if_empty()
    }

    /// Strictly sequential: dependents reference tables created before them.
    fn create_tables(&mut self) -> Result<(), BootstrapError> {
        let total = Table::BOOTSTRAP_ORDER.len();
        for (index, table) in Table::BOOTSTRAP_ORDER.into_iter().enumerate() {
            match self.client.create_table_if_not_exists(table) {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => {
                    tracing::debug!(%table, "Table already exists");
                }
                Err(source) => return Err(BootstrapError::CreateTable { table, source }),
            }
            self.set_progress(table_progress(index + 1, total));
        }
        Ok(())
    }

    /// Seed only while the primary table is empty. Rows carry fixed ids,
    /// so a collision means an earlier run already wrote that row.
    fn seed_if_empty(&mut self) -> Result<(), BootstrapError> {
        let existing = self
            .client
            .count(Table::PRIMARY)
            .map_err(BootstrapError::Seed)?;
        if existing > 0 {
            tracing::info!(existing, "Primary table already holds data, skipping seed");
            self.set_progress(PROGRESS_SEEDED);
            return Ok(());
        }

        let patients = seed::sample_patient_rows().map_err(BootstrapError::Seed)?;
        let rows = patients
            .into_iter()
            .map(|row| (Table::PRIMARY, row))
            .chain(seed::sample_dependent_rows());

        let mut inserted = 0;
        for (table, row) in rows {
            if self.insert_seed_row(table, row)? {
                inserted += 1;
            }
        }
        self.seeded_rows += inserted;
        tracing::info!(inserted, "Seeded sample data");
        self.set_progress(PROGRESS_SEEDED);
        Ok(())
    }

    fn insert_seed_row(&self, table: Table, row: Row) -> Result<bool, BootstrapError> {
        match self.client.insert(table, row) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), DbErrorKind::Duplicate | DbErrorKind::AlreadyExists) => {
                tracing::debug!(%table, "Seed row already present");
                Ok(false)
            }
            Err(e) => Err(BootstrapError::Seed(e)),
        }
    }

    fn transition(&mut self, phase: BootstrapPhase, progress: u8, error: Option<String>) {
        tracing::info!(?phase, progress, "Bootstrap status");
        self.history.push(phase);
        self.status.send_replace(BootstrapStatus {
            phase,
            progress,
            error,
        });
    }

    fn set_progress(&self, progress: u8) {
        self.status.send_modify(|status| status.progress = progress);
    }
}

fn table_progress(done: usize, total: usize) -> u8 {
    let span = usize::from(PROGRESS_TABLES_DONE - PROGRESS_INITIALIZING);
    let step = span * done / total.max(1);
    PROGRESS_INITIALIZING + u8::try_from(step).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::db::{Query, SqliteDataClient, TenantId};

    const TENANT: TenantId = TenantId::new_static("test");

    /// Wraps a real client and injects failures.
    struct FlakyClient {
        inner: SqliteDataClient,
        fail_create: Mutex<Option<(Table, usize)>>,
        already_exists: Option<Table>,
        fail_count: Mutex<usize>,
        /// Accept primary-table inserts without storing them.
        drop_primary_inserts: bool,
    }

    impl FlakyClient {
        fn new() -> Self {
            Self {
                inner: SqliteDataClient::open_in_memory(TENANT).unwrap(),
                fail_create: Mutex::new(None),
                already_exists: None,
                fail_count: Mutex::new(0),
                drop_primary_inserts: false,
            }
        }

        /// Fail creation of `table` for the next `times` attempts.
        fn failing_create(self, table: Table, times: usize) -> Self {
            *self.fail_create.lock().unwrap() = Some((table, times));
            self
        }

        fn failing_count(self, times: usize) -> Self {
            *self.fail_count.lock().unwrap() = times;
            self
        }
    }

    impl DataClient for FlakyClient {
        fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, DatabaseError> {
            self.inner.select(table, query)
        }

        fn count(&self, table: Table) -> Result<u64, DatabaseError> {
            let mut remaining = self.fail_count.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DatabaseError::LockPoisoned);
            }
            self.inner.count(table)
        }

        fn insert(&self, table: Table, row: Row) -> Result<Row, DatabaseError> {
            if self.drop_primary_inserts && table == Table::PRIMARY {
                return Ok(row);
            }
            self.inner.insert(table, row)
        }

        fn update(&self, table: Table, id: &str, changes: Row) -> Result<Row, DatabaseError> {
            self.inner.update(table, id, changes)
        }

        fn delete(&self, table: Table, id: &str) -> Result<(), DatabaseError> {
            self.inner.delete(table, id)
        }

        fn exec_sql(&self, sql: &str) -> Result<(), DatabaseError> {
            self.inner.exec_sql(sql)
        }

        fn table_exists(&self, table: Table) -> Result<bool, DatabaseError> {
            self.inner.table_exists(table)
        }

        fn create_table_if_not_exists(&self, table: Table) -> Result<(), DatabaseError> {
            let mut failing = self.fail_create.lock().unwrap();
            if let Some((target, remaining)) = failing.as_mut() {
                if *target == table && *remaining > 0 {
                    *remaining -= 1;
                    return Err(DatabaseError::ConstraintViolation("disk quota".into()));
                }
            }
            drop(failing);
            if self.already_exists == Some(table) && self.inner.table_exists(table)? {
                return Err(DatabaseError::AlreadyExists {
                    table: table.as_str().into(),
                });
            }
            self.inner.create_table_if_not_exists(table)
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn sequencer(client: Arc<dyn DataClient>) -> BootstrapSequencer {
        BootstrapSequencer::new(client).with_completion_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn fresh_database_is_initialized_and_seeded() {
        let client = Arc::new(FlakyClient::new());
        let (fired, callback) = counter();
        let mut seq = sequencer(client.clone()).on_complete(callback);

        seq.run().await.unwrap();

        assert_eq!(
            seq.history(),
            &[
                BootstrapPhase::Checking,
                BootstrapPhase::Initializing,
                BootstrapPhase::Complete
            ]
        );
        assert_eq!(seq.status().progress, 100);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        for table in Table::BOOTSTRAP_ORDER {
            assert!(client.table_exists(table).unwrap(), "{table} missing");
        }
        assert_eq!(client.count(Table::Patients).unwrap(), 3);
        assert_eq!(client.count(Table::Visits).unwrap(), 2);
        assert_eq!(seq.seeded_rows(), 6);
    }

    #[tokio::test]
    async fn populated_database_completes_without_initializing() {
        let client = Arc::new(FlakyClient::new());
        sequencer(client.clone()).run().await.unwrap();

        let mut second = sequencer(client.clone());
        second.run().await.unwrap();
        assert_eq!(
            second.history(),
            &[BootstrapPhase::Checking, BootstrapPhase::Complete]
        );
        assert_eq!(second.seeded_rows(), 0);
    }

    #[tokio::test]
    async fn repeated_runs_never_duplicate_seed_rows() {
        let client = Arc::new(FlakyClient::new());
        sequencer(client.clone()).run().await.unwrap();
        let after_one = (
            client.count(Table::Patients).unwrap(),
            client.count(Table::Visits).unwrap(),
            client.count(Table::Vitals).unwrap(),
        );

        sequencer(client.clone()).run().await.unwrap();
        let after_two = (
            client.count(Table::Patients).unwrap(),
            client.count(Table::Visits).unwrap(),
            client.count(Table::Vitals).unwrap(),
        );
        assert_eq!(after_one, after_two);
    }

    #[tokio::test]
    async fn existing_empty_tables_are_reused() {
        let client = Arc::new(FlakyClient::new());
        for table in Table::BOOTSTRAP_ORDER {
            client.inner.create_table_if_not_exists(table).unwrap();
        }
        let mut seq = sequencer(client.clone());
        seq.run().await.unwrap();
        assert_eq!(seq.history()[1], BootstrapPhase::Initializing);
        assert_eq!(client.count(Table::Patients).unwrap(), 3);
    }

    #[tokio::test]
    async fn already_exists_is_treated_as_success() {
        let mut flaky = FlakyClient::new();
        flaky.already_exists = Some(Table::Visits);
        let client = Arc::new(flaky);
        client.inner.create_table_if_not_exists(Table::Patients).unwrap();
        client.inner.create_table_if_not_exists(Table::Visits).unwrap();
        assert!(client
            .create_table_if_not_exists(Table::Visits)
            .unwrap_err()
            .is_already_exists());

        let mut seq = sequencer(client.clone());
        seq.run().await.unwrap();
        assert!(seq.is_complete());
        assert_eq!(client.count(Table::Visits).unwrap(), 2);
    }

    #[tokio::test]
    async fn create_failure_then_retry_completes_once() {
        let client = Arc::new(FlakyClient::new().failing_create(Table::Prescriptions, 1));
        let (fired, callback) = counter();
        let mut seq = sequencer(client.clone()).on_complete(callback);

        let err = seq.run().await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::CreateTable {
                table: Table::Prescriptions,
                ..
            }
        ));
        let status = seq.status();
        assert_eq!(status.phase, BootstrapPhase::Error);
        assert!(status.error.unwrap().contains("disk quota"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // No rollback: tables created before the failure remain.
        assert!(client.table_exists(Table::Vitals).unwrap());

        seq.retry().await.unwrap();
        assert_eq!(
            seq.history(),
            &[
                BootstrapPhase::Checking,
                BootstrapPhase::Initializing,
                BootstrapPhase::Error,
                BootstrapPhase::Checking,
                BootstrapPhase::Initializing,
                BootstrapPhase::Complete,
            ]
        );
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(client.count(Table::Patients).unwrap(), 3);

        seq.run().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn check_failure_enters_error() {
        let client = Arc::new(FlakyClient::new().failing_count(1));
        let mut seq = sequencer(client.clone());

        let err = seq.run().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Check(_)));
        assert_eq!(
            seq.history(),
            &[BootstrapPhase::Checking, BootstrapPhase::Error]
        );

        seq.retry().await.unwrap();
        assert!(seq.is_complete());
    }

    #[tokio::test]
    async fn retry_requires_error_state() {
        let client = Arc::new(FlakyClient::new());
        let mut seq = sequencer(client);
        assert!(matches!(
            seq.retry().await,
            Err(BootstrapError::NotRetryable)
        ));
        seq.run().await.unwrap();
        assert!(matches!(
            seq.retry().await,
            Err(BootstrapError::NotRetryable)
        ));
    }

    #[tokio::test]
    async fn partial_seed_is_not_duplicated() {
        let client = Arc::new(FlakyClient::new());
        for table in Table::BOOTSTRAP_ORDER {
            client.inner.create_table_if_not_exists(table).unwrap();
        }
        let first = seed::sample_patient_rows().unwrap().remove(0);
        client.insert(Table::Patients, first).unwrap();

        sequencer(client.clone()).run().await.unwrap();
        assert_eq!(client.count(Table::Patients).unwrap(), 1);
    }

    #[tokio::test]
    async fn orphaned_seed_row_is_an_error() {
        let mut flaky = FlakyClient::new();
        flaky.drop_primary_inserts = true;
        let client = Arc::new(flaky);
        let (fired, callback) = counter();
        let mut seq = sequencer(client.clone()).on_complete(callback);

        let err = seq.run().await.unwrap_err();
        match err {
            BootstrapError::Seed(source) => assert_eq!(source.kind(), DbErrorKind::Constraint),
            other => panic!("Expected Seed error, got: {other}"),
        }
        assert_eq!(seq.status().phase, BootstrapPhase::Error);
        assert_eq!(seq.seeded_rows(), 0);
        assert_eq!(client.count(Table::Visits).unwrap(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscribers_observe_final_status() {
        let client = Arc::new(FlakyClient::new());
        let mut seq = sequencer(client);
        let rx = seq.subscribe();
        seq.run().await.unwrap();
        let status = rx.borrow().clone();
        assert_eq!(status.phase, BootstrapPhase::Complete);
        assert_eq!(status.progress, 100);
    }

    #[tokio::test]
    async fn completion_waits_for_delay() {
        let client = Arc::new(FlakyClient::new());
        let (fired, callback) = counter();
        let mut seq = BootstrapSequencer::new(client)
            .with_completion_delay(Duration::from_millis(20))
            .on_complete(callback);

        let started = std::time::Instant::now();
        seq.run().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn table_progress_spans_initializing_range() {
        assert_eq!(table_progress(0, 7), PROGRESS_INITIALIZING);
        assert_eq!(table_progress(7, 7), PROGRESS_TABLES_DONE);
        assert!(table_progress(3, 7) > PROGRESS_INITIALIZING);
    }
}
