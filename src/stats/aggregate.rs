//! Incremental aggregate update.
//!
//! Each submission is folded into the stored aggregate with the
//! recurrence `mean' = (mean * n + x) / (n + 1)`, where `n` is the number
//! of samples already folded. Integer means truncate toward zero, so the
//! exact ordering of that expression is part of the observable behaviour.
//!
//! Products are formed in `i128` and narrowed back with saturation, so
//! the fold is total over every `i64` input.

use crate::models::{TestSample, UserAggregate};

/// Accuracy of a single sample on the 0-100 scale.
///
/// A test with no words scores 0. The result is not clamped: more errors
/// than typed words yields a negative accuracy.
pub fn sample_accuracy(sample: &TestSample) -> i64 {
    if sample.total_words == 0 {
        return 0;
    }
    let correct = sample.typed_words as i128 - sample.total_errors as i128;
    saturate(correct * 100 / sample.total_words as i128)
}

/// Fold one sample into `current`, returning the next aggregate.
///
/// `version` is carried over untouched; the store bumps it when the
/// result is written back.
pub fn fold(current: &UserAggregate, sample: &TestSample) -> UserAggregate {
    let n = current.total_test_count as i128;
    let accuracy = sample_accuracy(sample);
    let performance = sample.wpm as i128 * accuracy as i128;

    UserAggregate {
        total_test_count: current.total_test_count.saturating_add(1),
        avg_speed: saturate((sample.wpm as i128 + current.avg_speed as i128 * n) / (n + 1)),
        avg_accuracy: saturate((current.avg_accuracy as i128 * n + accuracy as i128) / (n + 1)),
        avg_performance: (current.avg_performance * n as f64 + performance as f64)
            / (n + 1) as f64,
        best_speed: current.best_speed.max(sample.wpm),
        version: current.version,
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
