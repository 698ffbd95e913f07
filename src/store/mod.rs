//! Storage ports and the SQLite adapter.
//!
//! The services only see the [`UserStore`] and [`TestStore`] traits, so
//! tests can swap in fakes and the aggregate update never depends on a
//! particular database.

pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::error::ServiceError;
use crate::models::{DashboardTopData, TestRecord, TopPerformer, User, UserAggregate};

pub use sqlite::Database;

/// Activity fields written together with a folded aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub last_test_time: DateTime<Utc>,
    pub streak: i64,
}

/// User records and their running aggregates.
pub trait UserStore: Send + Sync {
    /// Look a user up by email. `Ok(None)` when no such user exists.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    /// Insert a user with a zeroed aggregate.
    ///
    /// Fails with [`ServiceError::AlreadyRegistered`] when the email is taken.
    fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, ServiceError>;

    /// Write a folded aggregate if the stored version still equals
    /// `expected_version`, bumping the version by one.
    ///
    /// Fails with [`ServiceError::ConcurrencyConflict`] when another write
    /// got there first and [`ServiceError::NotFound`] when the user is gone.
    fn write_aggregate(
        &self,
        email: &str,
        expected_version: i64,
        stats: &UserAggregate,
        activity: Activity,
    ) -> Result<(), ServiceError>;

    /// Users ordered by average performance, best first.
    fn top_performers(&self, limit: usize) -> Result<Vec<TopPerformer>, ServiceError>;

    fn all_users(&self) -> Result<Vec<User>, ServiceError>;

    /// Site-wide totals and averages over users who have taken a test.
    fn dashboard_top_data(&self) -> Result<DashboardTopData, ServiceError>;
}

/// Append-only history of submitted tests.
pub trait TestStore: Send + Sync {
    /// Fails with [`ServiceError::NotFound`] when the record's email does
    /// not belong to a registered user.
    fn append_test_record(&self, record: &TestRecord) -> Result<(), ServiceError>;

    /// Tests for `email`, newest first, optionally only those created at or
    /// after `since`.
    fn recent_tests(
        &self,
        email: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TestRecord>, ServiceError>;
}
