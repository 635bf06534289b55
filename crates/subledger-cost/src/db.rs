//! SQLite storage for subscriptions.

use crate::error::{CostError, Result, is_database_locked_error};
use crate::filter::SubscriptionFilter;
use crate::models::Subscription;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use subledger_core::{CalendarMonth, LedgerError, QueryPeriod};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

/// Maximum retries for database lock errors.
const DB_LOCK_MAX_RETRIES: u32 = 5;

/// Initial delay for database lock retry (in milliseconds).
const DB_LOCK_INITIAL_DELAY_MS: u64 = 50;

/// Maximum delay for database lock retry.
const DB_LOCK_MAX_DELAY: Duration = Duration::from_secs(5);

/// Column list shared by every subscription SELECT.
const SUBSCRIPTION_COLUMNS: &str =
    "id, service_name, price, user_id, start_period, end_period, created_at, updated_at";

/// SQLite database holding the subscription set.
///
/// Months are stored as sortable `YYYY-MM` text, identifiers as hyphenated
/// UUID text and timestamps as RFC 3339.
pub struct SubscriptionDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SubscriptionDatabase {
    /// Open or create a subscription database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::internal(format!("connection mutex poisoned: {e}")).into())
    }

    /// Execute a database operation with automatic retry on lock errors.
    ///
    /// Retries with exponential backoff; once retries are exhausted the lock
    /// failure is reported as [`CostError::DatabaseLocked`].
    fn with_retry<T, F>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        let mut delay = Duration::from_millis(DB_LOCK_INITIAL_DELAY_MS);

        loop {
            attempt += 1;

            match f() {
                Ok(result) => {
                    if attempt > 1 {
                        info!(attempt, operation, "Database operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(ref e) if is_database_locked_error(e) && attempt <= DB_LOCK_MAX_RETRIES => {
                    warn!(
                        attempt,
                        max_retries = DB_LOCK_MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        operation,
                        "Database locked, retrying with backoff"
                    );

                    std::thread::sleep(delay);
                    delay = std::cmp::min(delay * 2, DB_LOCK_MAX_DELAY);
                }
                Err(e) if is_database_locked_error(&e) => {
                    warn!(attempt, operation, error = %e, "Database still locked after retries");
                    return Err(CostError::DatabaseLocked {
                        retry_count: attempt - 1,
                        max_retries: DB_LOCK_MAX_RETRIES,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

        if current_version > SCHEMA_VERSION {
            return Err(CostError::Migration(format!(
                "database schema v{current_version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }

        if current_version < SCHEMA_VERSION {
            info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );
            Self::run_migrations(&conn, current_version)?;
        }

        Ok(())
    }

    /// Run migrations from current version to target.
    fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
        if from_version < 1 {
            Self::migration_v1(conn)?;
        }
        Ok(())
    }

    /// Migration to version 1: subscriptions table.
    fn migration_v1(conn: &Connection) -> Result<()> {
        debug!("Running migration v1: subscriptions");

        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                service_name TEXT NOT NULL,
                price INTEGER NOT NULL CHECK (price >= 0),
                user_id TEXT NOT NULL,
                start_period TEXT NOT NULL,
                end_period TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (end_period IS NULL OR end_period >= start_period)
             );
             CREATE INDEX IF NOT EXISTS idx_subscriptions_user
                ON subscriptions(user_id);
             CREATE INDEX IF NOT EXISTS idx_subscriptions_service
                ON subscriptions(service_name);
             CREATE INDEX IF NOT EXISTS idx_subscriptions_start
                ON subscriptions(start_period);
             INSERT INTO schema_version (version) VALUES (1);
             COMMIT;",
        )?;

        info!("Migration v1 completed: subscriptions");
        Ok(())
    }

    /// Insert a new subscription.
    pub fn insert(&self, sub: &Subscription) -> Result<()> {
        self.with_retry("insert subscription", || {
            let conn = self.lock()?;
            conn.execute(
                &format!(
                    "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    sub.id.hyphenated().to_string(),
                    sub.service_name,
                    sub.price,
                    sub.owner_id.hyphenated().to_string(),
                    sub.start_period.to_storage(),
                    sub.end_period.map(|m| m.to_storage()),
                    timestamp(&sub.created_at),
                    timestamp(&sub.updated_at),
                ],
            )?;
            Ok(())
        })?;

        debug!(id = %sub.id, service = %sub.service_name, "Inserted subscription");
        Ok(())
    }

    /// Get a subscription by id.
    pub fn get(&self, id: Uuid) -> Result<Option<Subscription>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
            params![id.hyphenated().to_string()],
            Self::row_to_subscription,
        );

        match result {
            Ok(sub) => Ok(Some(sub)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CostError::Database(e)),
        }
    }

    /// Overwrite every mutable column of an existing subscription.
    ///
    /// Fails with [`CostError::NotFound`] when no row has the subscription's id.
    pub fn update(&self, sub: &Subscription) -> Result<()> {
        let changed = self.with_retry("update subscription", || {
            let conn = self.lock()?;
            let changed = conn.execute(
                "UPDATE subscriptions
                 SET service_name = ?2, price = ?3, start_period = ?4, end_period = ?5,
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    sub.id.hyphenated().to_string(),
                    sub.service_name,
                    sub.price,
                    sub.start_period.to_storage(),
                    sub.end_period.map(|m| m.to_storage()),
                    timestamp(&sub.updated_at),
                ],
            )?;
            Ok(changed)
        })?;

        if changed == 0 {
            return Err(CostError::NotFound { id: sub.id });
        }

        debug!(id = %sub.id, "Updated subscription");
        Ok(())
    }

    /// Delete a subscription.
    ///
    /// Fails with [`CostError::NotFound`] when no row has the id.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let changed = self.with_retry("delete subscription", || {
            let conn = self.lock()?;
            let changed = conn.execute(
                "DELETE FROM subscriptions WHERE id = ?1",
                params![id.hyphenated().to_string()],
            )?;
            Ok(changed)
        })?;

        if changed == 0 {
            return Err(CostError::NotFound { id });
        }

        debug!(%id, "Deleted subscription");
        Ok(())
    }

    /// List subscriptions matching `filter`, newest first.
    pub fn list(
        &self,
        filter: &SubscriptionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Subscription>> {
        let mut predicate = filter.to_sql();
        predicate.bind(":limit", Value::Integer(i64::from(limit)));
        predicate.bind(":offset", Value::Integer(i64::from(offset)));

        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions{}
             ORDER BY created_at DESC, id
             LIMIT :limit OFFSET :offset",
            predicate.where_clause()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let subscriptions = stmt
            .query_map(predicate.params().as_slice(), Self::row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(
            count = subscriptions.len(),
            clauses = filter.clauses().len(),
            limit,
            offset,
            "Listed subscriptions"
        );
        Ok(subscriptions)
    }

    /// Subscriptions matching `filter` whose active months can intersect
    /// `period`.
    ///
    /// This is a storage-side pre-selection only; cost arithmetic stays in
    /// [`crate::PeriodAggregator`]. A reversed period selects nothing.
    pub fn find_overlapping(
        &self,
        filter: &SubscriptionFilter,
        period: &QueryPeriod,
    ) -> Result<Vec<Subscription>> {
        if period.is_empty() {
            return Ok(Vec::new());
        }

        let mut predicate = filter.to_sql();
        predicate.push(
            "start_period <= :query_end",
            [(":query_end", Value::Text(period.end.to_storage()))],
        );
        predicate.push(
            "(end_period IS NULL OR end_period >= :query_start)",
            [(":query_start", Value::Text(period.start.to_storage()))],
        );

        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions{}
             ORDER BY created_at DESC, id",
            predicate.where_clause()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let subscriptions = stmt
            .query_map(predicate.params().as_slice(), Self::row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(
            count = subscriptions.len(),
            start = %period.start,
            end = %period.end,
            "Selected overlapping subscriptions"
        );
        Ok(subscriptions)
    }

    /// Number of stored subscriptions.
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Helper to convert a database row to a Subscription.
    ///
    /// Undecodable text is a conversion error, never a default value.
    fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(3)?;
        let start: String = row.get(4)?;
        let end: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;

        Ok(Subscription {
            id: parse_uuid(0, &id)?,
            service_name: row.get(1)?,
            price: row.get(2)?,
            owner_id: parse_uuid(3, &user_id)?,
            start_period: parse_month(4, &start)?,
            end_period: end.as_deref().map(|raw| parse_month(5, raw)).transpose()?,
            created_at: parse_timestamp(6, &created_at)?,
            updated_at: parse_timestamp(7, &updated_at)?,
        })
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_uuid(column: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| conversion_error(column, e))
}

fn parse_month(column: usize, raw: &str) -> rusqlite::Result<CalendarMonth> {
    CalendarMonth::from_storage(raw).map_err(|e| conversion_error(column, e))
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}
