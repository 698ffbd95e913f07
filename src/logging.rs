//! Request log written as JSON lines to a file that rolls over daily.
//!
//! Only events with the [`REQUEST_LOG_TARGET`] target reach the file; the
//! console subscriber still sees everything its own filter allows.

use std::path::Path;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Targets, fmt, registry::LookupSpan, Layer};

/// Target of the per-request span and its completion event.
pub const REQUEST_LOG_TARGET: &str = "request_log";

/// File name prefix; the appender adds a `.YYYY-MM-DD` suffix.
pub const REQUEST_LOG_FILE: &str = "requests.log";

/// Layer writing request events under `dir`.
///
/// Writes go through a background thread. Keep the returned guard alive for
/// as long as the layer is installed; dropping it flushes pending lines.
pub fn request_log_layer<S>(dir: &Path) -> (impl Layer<S>, WorkerGuard)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = tracing_appender::rolling::daily(dir, REQUEST_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(writer)
        .with_filter(Targets::new().with_target(REQUEST_LOG_TARGET, Level::INFO));

    (layer, guard)
}
