//! Test submission and history.
//!
//! Submitting a test appends the raw record and then folds the sample into
//! the user's aggregate. The fold runs as an optimistic read-fold-write
//! cycle: a version conflict or a storage failure restarts it from a fresh
//! read, never from the stale aggregate.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::StatsConfig;
use crate::error::ServiceError;
use crate::models::{TestRecord, TestSample, UserAggregate};
use crate::stats::{advance_streak, fold};
use crate::store::{Activity, TestStore, UserStore};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz1234567890ABCDEFGHIJKLMNOPQRSTUVWXYZ@#$&";

const DAYS_PER_MONTH: i64 = 30;

pub struct TypingService {
    users: Arc<dyn UserStore>,
    tests: Arc<dyn TestStore>,
    max_retries: usize,
    sentence_length: usize,
}

impl TypingService {
    pub fn new(users: Arc<dyn UserStore>, tests: Arc<dyn TestStore>, config: &StatsConfig) -> Self {
        Self {
            users,
            tests,
            max_retries: config.max_retries.max(1),
            sentence_length: config.sentence_length,
        }
    }

    /// Record a finished test for `email` and update their aggregate.
    pub fn submit(&self, email: &str, sample: &TestSample) -> Result<UserAggregate, ServiceError> {
        sample.validate()?;
        let now = Utc::now();

        self.tests.append_test_record(&TestRecord {
            email: email.to_string(),
            sample: *sample,
            created_at: now,
        })?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fold_once(email, sample, now) {
                Ok(stats) => {
                    info!(
                        "Folded test for {}: count={} avg_speed={} best={}",
                        email, stats.total_test_count, stats.avg_speed, stats.best_speed
                    );
                    return Ok(stats);
                }
                Err(err @ (ServiceError::ConcurrencyConflict | ServiceError::Persistence(_)))
                    if attempt < self.max_retries =>
                {
                    warn!(
                        "Aggregate update for {} failed (attempt {}/{}): {}; retrying",
                        email, attempt, self.max_retries, err
                    );
                    std::thread::yield_now();
                }
                Err(err) => {
                    warn!("Aggregate update for {} abandoned: {}", email, err);
                    return Err(err);
                }
            }
        }
    }

    fn fold_once(
        &self,
        email: &str,
        sample: &TestSample,
        now: DateTime<Utc>,
    ) -> Result<UserAggregate, ServiceError> {
        let user = self
            .users
            .user_by_email(email)?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", email)))?;

        let next = fold(&user.stats, sample);
        let activity = Activity {
            last_test_time: now,
            streak: advance_streak(user.last_test_time, user.streak, now),
        };

        self.users
            .write_aggregate(email, user.stats.version, &next, activity)?;

        Ok(UserAggregate {
            version: user.stats.version + 1,
            ..next
        })
    }

    /// Tests taken by `email`, newest first.
    ///
    /// `month` limits the result to the last `30 * month` days; an empty
    /// value means the whole history.
    pub fn recent_tests(&self, email: &str, month: Option<&str>) -> Result<Vec<TestRecord>, ServiceError> {
        let since = match month.map(str::trim).filter(|m| !m.is_empty()) {
            None => None,
            Some(raw) => {
                let months: i64 = raw.parse().map_err(|_| {
                    ServiceError::Validation(format!("month must be a whole number, got '{}'", raw))
                })?;
                if months < 1 {
                    return Err(ServiceError::Validation(
                        "month must be at least 1".to_string(),
                    ));
                }
                Some(Utc::now() - Duration::days(DAYS_PER_MONTH * months))
            }
        };

        debug!("Recent tests for {} since {:?}", email, since);
        self.tests.recent_tests(email, since)
    }

    /// A random practice string.
    pub fn typing_sentence(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.sentence_length)
            .filter_map(|_| ALPHABET.choose(&mut rng))
            .map(|&b| b as char)
            .collect()
    }
}
