//! Storage layer for feeding reminders.
//!
//! Provides persistence for babies, reminder settings and feeding records
//! using `rusqlite`, plus [`SqliteStore`], the [`ReminderStore`] the reminder
//! engine reads through.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! [`SqliteStore`] serializes access behind a `Mutex` so the scheduler can
//! call it from blocking worker threads.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision and a `Z` suffix (e.g. `2025-01-15T10:30:00.000Z`), so
//! lexicographic ordering matches chronological ordering.
//!
//! `reminder_settings` carries `UNIQUE (baby_id, scope)`: a baby has at most
//! one configuration per scope, and a batch that would add a second one is
//! rejected as a whole.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use thiserror::Error;

use fw_core::store::{ReminderStore, StoreError};
use fw_core::{
    BabyId, BabyProfile, ConfigurationId, ConfigurationUpdate, FeedingEvent, Interval,
    ReminderConfiguration, Scope, ValidationError,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A baby with this ID is already stored.
    #[error("baby already exists: {0}")]
    BabyExists(BabyId),
    /// A configuration for this baby and scope is already stored.
    #[error("configuration already exists for baby {baby_id} scope {scope}")]
    Conflict { baby_id: BabyId, scope: Scope },
    /// No configuration with this ID is stored.
    #[error("configuration not found: {0}")]
    NotFound(ConfigurationId),
    /// A stored or submitted value failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {row_id}: {timestamp}")]
    TimestampParse {
        row_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { baby_id, scope } => Self::Conflict { baby_id, scope },
            DbError::NotFound(id) => Self::NotFound(id),
            DbError::Invalid(err) => Self::Invalid(err),
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

/// A reminder_settings row before its values are validated.
struct ConfigurationRow {
    id: String,
    baby_id: String,
    scope: String,
    enabled: bool,
    interval_hours: i64,
    interval_minutes: i64,
    channel_policy: String,
    tone: String,
    created_at: String,
    updated_at: String,
}

impl ConfigurationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            baby_id: row.get(1)?,
            scope: row.get(2)?,
            enabled: row.get(3)?,
            interval_hours: row.get(4)?,
            interval_minutes: row.get(5)?,
            channel_policy: row.get(6)?,
            tone: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_configuration(self) -> Result<ReminderConfiguration, DbError> {
        Ok(ReminderConfiguration {
            baby_id: BabyId::new(self.baby_id)?,
            scope: self.scope.parse()?,
            enabled: self.enabled,
            interval: Interval::new(self.interval_hours, self.interval_minutes)?,
            channel_policy: self.channel_policy.parse()?,
            tone: self.tone.parse()?,
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            updated_at: parse_timestamp(&self.updated_at, &self.id)?,
            id: ConfigurationId::new(self.id)?,
        })
    }
}

const CONFIGURATION_COLUMNS: &str = "id, baby_id, scope, enabled, interval_hours, interval_minutes, \
     channel_policy, tone, created_at, updated_at";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS babies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_twins INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- scope: 'unified', 'twin_a' or 'twin_b'
            -- channel_policy: 'haptic', 'audible' or 'both'
            CREATE TABLE IF NOT EXISTS reminder_settings (
                id TEXT PRIMARY KEY,
                baby_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                interval_hours INTEGER NOT NULL,
                interval_minutes INTEGER NOT NULL,
                channel_policy TEXT NOT NULL,
                tone TEXT NOT NULL DEFAULT 'default',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (baby_id, scope),
                FOREIGN KEY (baby_id) REFERENCES babies(id) ON DELETE CASCADE
            );

            -- twin: NULL when the feeding was not attributed to one twin
            CREATE TABLE IF NOT EXISTS feeding_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                baby_id TEXT NOT NULL,
                occurred_at TEXT NOT NULL,
                twin TEXT,
                FOREIGN KEY (baby_id) REFERENCES babies(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_feeding_records_baby_time
                ON feeding_records(baby_id, occurred_at);
            ",
        )?;
        Ok(())
    }

    pub fn insert_baby(&mut self, baby: &BabyProfile, now: DateTime<Utc>) -> Result<(), DbError> {
        self.conn
            .execute(
                "INSERT INTO babies (id, name, is_twins, created_at) VALUES (?, ?, ?, ?)",
                params![baby.id.as_str(), baby.name, baby.is_twins, format_timestamp(now)],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    DbError::BabyExists(baby.id.clone())
                } else {
                    DbError::Sqlite(err)
                }
            })?;
        Ok(())
    }

    pub fn get_baby(&self, id: &BabyId) -> Result<Option<BabyProfile>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, is_twins FROM babies WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, is_twins)| {
            Ok(BabyProfile {
                id: BabyId::new(id)?,
                name,
                is_twins,
            })
        })
        .transpose()
    }

    /// Lists babies in the order they were added.
    pub fn list_babies(&self) -> Result<Vec<BabyProfile>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_twins FROM babies ORDER BY created_at ASC, id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;
        let mut babies = Vec::new();
        for row in rows {
            let (id, name, is_twins) = row?;
            babies.push(BabyProfile {
                id: BabyId::new(id)?,
                name,
                is_twins,
            });
        }
        Ok(babies)
    }

    /// Lists a baby's configurations in scope order.
    pub fn list_configurations(
        &self,
        baby_id: &BabyId,
    ) -> Result<Vec<ReminderConfiguration>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONFIGURATION_COLUMNS} FROM reminder_settings WHERE baby_id = ?"
        ))?;
        let rows = stmt.query_map([baby_id.as_str()], ConfigurationRow::from_row)?;
        let mut configurations = Vec::new();
        for row in rows {
            configurations.push(row?.into_configuration()?);
        }
        configurations.sort_by_key(|cfg| cfg.scope);
        Ok(configurations)
    }

    pub fn get_configuration(
        &self,
        id: &ConfigurationId,
    ) -> Result<Option<ReminderConfiguration>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {CONFIGURATION_COLUMNS} FROM reminder_settings WHERE id = ?"),
                [id.as_str()],
                ConfigurationRow::from_row,
            )
            .optional()?
            .map(ConfigurationRow::into_configuration)
            .transpose()
    }

    /// Inserts a batch of configurations in one transaction.
    ///
    /// If any row clashes with an existing `(baby_id, scope)` the whole batch
    /// is rolled back and [`DbError::Conflict`] names the clashing row.
    pub fn insert_configurations(
        &mut self,
        configurations: &[ReminderConfiguration],
    ) -> Result<(), DbError> {
        if configurations.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO reminder_settings ({CONFIGURATION_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))?;
            for cfg in configurations {
                stmt.execute(params![
                    cfg.id.as_str(),
                    cfg.baby_id.as_str(),
                    cfg.scope.as_str(),
                    cfg.enabled,
                    cfg.interval.hours,
                    cfg.interval.minutes,
                    cfg.channel_policy.as_str(),
                    cfg.tone.as_str(),
                    format_timestamp(cfg.created_at),
                    format_timestamp(cfg.updated_at),
                ])
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        DbError::Conflict {
                            baby_id: cfg.baby_id.clone(),
                            scope: cfg.scope,
                        }
                    } else {
                        DbError::Sqlite(err)
                    }
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Applies a partial update and returns the stored result.
    ///
    /// Validation happens before anything is written; an invalid update
    /// leaves the row untouched.
    pub fn update_configuration(
        &mut self,
        id: &ConfigurationId,
        update: &ConfigurationUpdate,
        now: DateTime<Utc>,
    ) -> Result<ReminderConfiguration, DbError> {
        update.validate()?;
        let tx = self.conn.transaction()?;
        let current = tx
            .query_row(
                &format!("SELECT {CONFIGURATION_COLUMNS} FROM reminder_settings WHERE id = ?"),
                [id.as_str()],
                ConfigurationRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(id.clone()))?
            .into_configuration()?;
        let updated = update.apply(&current, now)?;
        tx.execute(
            "
            UPDATE reminder_settings
            SET enabled = ?, interval_hours = ?, interval_minutes = ?,
                channel_policy = ?, tone = ?, updated_at = ?
            WHERE id = ?
            ",
            params![
                updated.enabled,
                updated.interval.hours,
                updated.interval.minutes,
                updated.channel_policy.as_str(),
                updated.tone.as_str(),
                format_timestamp(updated.updated_at),
                id.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn insert_feeding(&mut self, event: &FeedingEvent) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO feeding_records (baby_id, occurred_at, twin) VALUES (?, ?, ?)",
            params![
                event.baby_id.as_str(),
                format_timestamp(event.occurred_at),
                event.twin.map(|scope| scope.as_str()),
            ],
        )?;
        Ok(())
    }

    /// The latest feeding that counts toward `scope`.
    ///
    /// Every feeding counts toward [`Scope::Unified`]; a twin scope counts
    /// its own feedings and the ones not attributed to either twin.
    pub fn most_recent_feeding(
        &self,
        baby_id: &BabyId,
        scope: Scope,
    ) -> Result<Option<FeedingEvent>, DbError> {
        let twin = scope.is_twin().then(|| scope.as_str());
        let row = self
            .conn
            .query_row(
                "
                SELECT id, occurred_at, twin
                FROM feeding_records
                WHERE baby_id = ?1 AND (?2 IS NULL OR twin IS NULL OR twin = ?2)
                ORDER BY occurred_at DESC, id DESC
                LIMIT 1
                ",
                params![baby_id.as_str(), twin],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, occurred_at, twin)) = row else {
            return Ok(None);
        };
        Ok(Some(FeedingEvent {
            baby_id: baby_id.clone(),
            occurred_at: parse_timestamp(&occurred_at, &format!("feeding {id}"))?,
            twin: twin.map(|twin| twin.parse()).transpose()?,
        }))
    }
}

/// A [`ReminderStore`] backed by a SQLite [`Database`].
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: &Path) -> Result<Self, DbError> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Direct access for operations outside the reminder contract
    /// (adding babies, recording feedings).
    pub fn database(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReminderStore for SqliteStore {
    fn configurations(&self, baby_id: &BabyId) -> Result<Vec<ReminderConfiguration>, StoreError> {
        Ok(self.database().list_configurations(baby_id)?)
    }

    fn most_recent_feeding(
        &self,
        baby_id: &BabyId,
        scope: Scope,
    ) -> Result<Option<FeedingEvent>, StoreError> {
        Ok(self.database().most_recent_feeding(baby_id, scope)?)
    }

    fn save_configurations(&self, batch: &[ReminderConfiguration]) -> Result<(), StoreError> {
        Ok(self.database().insert_configurations(batch)?)
    }

    fn update_configuration(
        &self,
        id: &ConfigurationId,
        update: &ConfigurationUpdate,
    ) -> Result<ReminderConfiguration, StoreError> {
        Ok(self.database().update_configuration(id, update, Utc::now())?)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn parse_timestamp(timestamp: &str, row_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            row_id: row_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
