//! Daily practice streak.

use chrono::{DateTime, Utc};

/// Streak after a test taken at `now`, given the previous test time.
///
/// Days are UTC calendar days. A second test on the same day keeps the
/// streak, a test on the following day extends it, anything else restarts
/// it at 1.
pub fn advance_streak(last_test: Option<DateTime<Utc>>, streak: i64, now: DateTime<Utc>) -> i64 {
    let Some(last) = last_test else {
        return 1;
    };

    let gap = (now.date_naive() - last.date_naive()).num_days();
    match gap {
        0 => streak.max(1),
        1 => streak + 1,
        _ => 1,
    }
}
