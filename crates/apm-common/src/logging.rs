//! Structured Logging Configuration
//!
//! Provides configurable logging with:
//! - JSON output for pipelines and log aggregation (LOG_FORMAT=json)
//! - Human-readable output for interactive runs (default)
//! - Context fields via spans (application name, object ids)
//!
//! Logs go to stderr; stdout is reserved for command output.
//!
//! # Usage
//!
//! ```rust,ignore
//! use apm_common::logging::init_logging;
//!
//! fn main() {
//!     init_logging("apm");
//!
//!     tracing::info!(application_id = %id, "Found existing application");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: Set to "json" for JSON output, anything else for text (default: text)
//! - `RUST_LOG`: Standard log level filter (default: info)
//!   Examples: `RUST_LOG=debug`, `RUST_LOG=apm_reconciler=debug,apm_graph=trace`
//!
//! Every declared application is reconciled inside an `application` span, so all
//! nested log lines carry the application name:
//!
//! ```rust,ignore
//! use tracing::{info_span, Instrument};
//!
//! let span = info_span!("application", name = %app.name);
//! reconciler.reconcile_app(&app).instrument(span).await?;
//! ```

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging for the given service name.
///
/// Reads LOG_FORMAT env var to determine output format:
/// - "json" -> JSON output
/// - anything else -> human-readable text
///
/// Reads RUST_LOG env var for log level filtering (defaults to INFO).
pub fn init_logging(service_name: &str) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();

    let env_filter = default_filter();

    if is_json_format(&log_format) {
        init_json_logging(env_filter);
    } else {
        init_text_logging(env_filter);
    }

    tracing::debug!(service = service_name, format = %log_format, "Logging initialized");
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn is_json_format(value: &str) -> bool {
    value.eq_ignore_ascii_case("json")
}

/// Initialize JSON logging.
fn init_json_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(false)
                .with_target(true)
                .flatten_event(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Initialize human-readable text logging.
fn init_text_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
