//! SQLite persistence.
//!
//! One connection guarded by a mutex. Every store call is a single short
//! statement, so callers on the async runtime dispatch through
//! `spawn_blocking`.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{Activity, TestStore, UserStore};
use crate::error::ServiceError;
use crate::models::{DashboardTopData, TestRecord, TestSample, TopPerformer, User, UserAggregate};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT    NOT NULL,
        email           TEXT    NOT NULL UNIQUE,
        password        TEXT    NOT NULL,
        created_at      TEXT    NOT NULL,
        avg_speed       INTEGER NOT NULL DEFAULT 0,
        avg_accuracy    INTEGER NOT NULL DEFAULT 0,
        total_test      INTEGER NOT NULL DEFAULT 0,
        best_speed      INTEGER NOT NULL DEFAULT 0,
        avg_performance REAL    NOT NULL DEFAULT 0,
        last_test_time  TEXT,
        streak          INTEGER NOT NULL DEFAULT 0,
        version         INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS typing_tests (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        email              TEXT    NOT NULL REFERENCES users(email) ON DELETE CASCADE,
        total_errors       INTEGER NOT NULL,
        total_words        INTEGER NOT NULL,
        typed_words        INTEGER NOT NULL,
        total_time         INTEGER NOT NULL,
        time_taken_by_user INTEGER NOT NULL,
        wpm                INTEGER NOT NULL,
        created_at         TEXT    NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_typing_tests_email_created
        ON typing_tests(email, created_at);
"#;

const USER_COLUMNS: &str = "id, name, email, password, created_at, avg_speed, avg_accuracy, \
     total_test, best_speed, avg_performance, last_test_time, streak, version";

/// SQLite-backed implementation of both store traits.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, ServiceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ServiceError::Persistence(format!(
                        "could not create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// A private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ServiceError> {
        conn.execute_batch(SCHEMA)?;
        debug!("Schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Internal("database mutex poisoned".to_string()))
    }
}

impl UserStore for Database {
    fn user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, ServiceError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (name, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, email, password_hash, encode_time(created_at)],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                return Err(ServiceError::AlreadyRegistered)
            }
            Err(e) => return Err(e.into()),
        }

        Ok(User {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
            stats: UserAggregate::default(),
            last_test_time: None,
            streak: 0,
        })
    }

    fn write_aggregate(
        &self,
        email: &str,
        expected_version: i64,
        stats: &UserAggregate,
        activity: Activity,
    ) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users
                SET total_test = ?3,
                    avg_speed = ?4,
                    avg_accuracy = ?5,
                    avg_performance = ?6,
                    best_speed = ?7,
                    last_test_time = ?8,
                    streak = ?9,
                    version = version + 1
              WHERE email = ?1 AND version = ?2",
            params![
                email,
                expected_version,
                stats.total_test_count,
                stats.avg_speed,
                stats.avg_accuracy,
                stats.avg_performance,
                stats.best_speed,
                encode_time(activity.last_test_time),
                activity.streak,
            ],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |r| r.get(0),
        )?;
        if exists {
            Err(ServiceError::ConcurrencyConflict)
        } else {
            Err(ServiceError::NotFound(format!("user {}", email)))
        }
    }

    fn top_performers(&self, limit: usize) -> Result<Vec<TopPerformer>, ServiceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, avg_performance FROM users
              ORDER BY avg_performance DESC, id ASC
              LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |r| {
            let performance: f64 = r.get(1)?;
            Ok(TopPerformer {
                name: r.get(0)?,
                performance: performance as i64,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn all_users(&self) -> Result<Vec<User>, ServiceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn dashboard_top_data(&self) -> Result<DashboardTopData, ServiceError> {
        let conn = self.conn()?;
        let (total, speed, accuracy): (i64, f64, f64) = conn.query_row(
            "SELECT COALESCE(SUM(total_test), 0),
                    COALESCE(AVG(avg_speed) FILTER (WHERE total_test > 0), 0.0),
                    COALESCE(AVG(avg_accuracy) FILTER (WHERE total_test > 0), 0.0)
               FROM users",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        Ok(DashboardTopData {
            total_test: total,
            average_speed: speed as i64,
            average_accuracy: accuracy as i64,
        })
    }
}

impl TestStore for Database {
    fn append_test_record(&self, record: &TestRecord) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        let s = &record.sample;
        let inserted = conn.execute(
            "INSERT INTO typing_tests
               (email, total_errors, total_words, typed_words,
                total_time, time_taken_by_user, wpm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.email,
                s.total_errors,
                s.total_words,
                s.typed_words,
                s.total_time,
                s.time_taken_by_user,
                s.wpm,
                encode_time(record.created_at),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(ServiceError::NotFound(format!("user {}", record.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn recent_tests(
        &self,
        email: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TestRecord>, ServiceError> {
        let conn = self.conn()?;
        // The fixed-width timestamp encoding makes text comparison chronological.
        let since = since.map(encode_time).unwrap_or_default();
        let mut stmt = conn.prepare(
            "SELECT email, total_errors, total_words, typed_words,
                    total_time, time_taken_by_user, wpm, created_at
               FROM typing_tests
              WHERE email = ?1 AND created_at >= ?2
              ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![email, since], |r| {
            Ok(TestRecord {
                email: r.get(0)?,
                sample: TestSample {
                    total_errors: r.get(1)?,
                    total_words: r.get(2)?,
                    typed_words: r.get(3)?,
                    total_time: r.get(4)?,
                    time_taken_by_user: r.get(5)?,
                    wpm: r.get(6)?,
                },
                created_at: decode_time(r, 7)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    let last_test_time = match r.get::<_, Option<String>>(10)? {
        Some(_) => Some(decode_time(r, 10)?),
        None => None,
    };

    Ok(User {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        password_hash: r.get(3)?,
        created_at: decode_time(r, 4)?,
        stats: UserAggregate {
            avg_speed: r.get(5)?,
            avg_accuracy: r.get(6)?,
            total_test_count: r.get(7)?,
            best_speed: r.get(8)?,
            avg_performance: r.get(9)?,
            version: r.get(12)?,
        },
        last_test_time,
        streak: r.get(11)?,
    })
}

fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(r: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = r.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint(err: &rusqlite::Error, extended: i32) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation && e.extended_code == extended
    )
}
