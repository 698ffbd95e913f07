//! Running typing statistics.
//!
//! Pure functions that fold one submission into a user's long-lived
//! aggregate. Nothing in here touches storage.

pub mod aggregate;
pub mod streak;

pub use aggregate::{fold, sample_accuracy};
pub use streak::advance_streak;
