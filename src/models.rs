//! Data models for the typing backend.
//!
//! This module contains the core data structures shared by the
//! statistics core, the stores, the services and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ServiceError;

/// One finished typing test as submitted by a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSample {
    /// Total words in the test text.
    #[serde(default)]
    pub total_words: i64,
    /// Words the user typed or attempted.
    #[serde(default)]
    pub typed_words: i64,
    /// Count of incorrect words.
    #[serde(default)]
    pub total_errors: i64,
    /// Words per minute achieved on this test.
    #[serde(default)]
    pub wpm: i64,
    /// Seconds allotted for the test.
    #[serde(default)]
    pub total_time: i64,
    /// Seconds the user actually spent typing.
    #[serde(default)]
    pub time_taken_by_user: i64,
}

/// Upper bound on word and error counts in one test.
pub const MAX_WORD_COUNT: i64 = 1_000_000;

/// Upper bound on a test's words per minute.
pub const MAX_WPM: i64 = 10_000;

/// Upper bound on a test's duration in seconds (one day).
pub const MAX_TEST_SECONDS: i64 = 24 * 60 * 60;

impl TestSample {
    /// Reject samples with negative or implausibly large counters.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let fields = [
            ("totalWords", self.total_words, MAX_WORD_COUNT),
            ("typedWords", self.typed_words, MAX_WORD_COUNT),
            ("totalErrors", self.total_errors, MAX_WORD_COUNT),
            ("wpm", self.wpm, MAX_WPM),
            ("totalTime", self.total_time, MAX_TEST_SECONDS),
            ("timeTakenByUser", self.time_taken_by_user, MAX_TEST_SECONDS),
        ];

        for (name, value, max) in fields {
            if value < 0 {
                return Err(ServiceError::Validation(format!(
                    "{} must not be negative (got {})",
                    name, value
                )));
            }
            if value > max {
                return Err(ServiceError::Validation(format!(
                    "{} must be at most {} (got {})",
                    name, max, value
                )));
            }
        }
        Ok(())
    }
}

/// Running per-user statistics, folded one sample at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAggregate {
    /// Number of samples folded in so far.
    pub total_test_count: i64,
    /// Running mean of wpm.
    pub avg_speed: i64,
    /// Running mean of per-sample accuracy (0-100 scale).
    pub avg_accuracy: i64,
    /// Running mean of wpm * accuracy.
    pub avg_performance: f64,
    /// Highest wpm ever observed.
    pub best_speed: i64,
    /// Optimistic-concurrency token, bumped by the store on every write.
    #[serde(skip)]
    pub version: i64,
}

/// A registered user together with their aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: UserAggregate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_test_time: Option<DateTime<Utc>>,
    pub streak: i64,
}

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Tokens handed out on login or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// A stored typing test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub email: String,
    #[serde(flatten)]
    pub sample: TestSample,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub name: String,
    pub performance: i64,
}

/// Site-wide averages shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardTopData {
    #[serde(rename = "totalTest")]
    pub total_test: i64,
    #[serde(rename = "avgSpeed")]
    pub average_speed: i64,
    #[serde(rename = "avgAccuracy")]
    pub average_accuracy: i64,
}

/// Dashboard payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub user: Vec<User>,
    pub dashboard_top_data: DashboardTopData,
}

/// Which secret a token was signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}
