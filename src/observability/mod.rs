//! Observability for objquery
//!
//! - Structured logging (one JSON object per line)
//! - Atomic execution counters
//! - Typed events
//!
//! Observability is read-only: nothing here changes execution outcomes and
//! logging failures are swallowed.
//!
//! ```ignore
//! use objquery::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::CacheHit, &[("fingerprint", "3f2a9c")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_cache_hits();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event at its own severity with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("path", "/tmp/objquery.json")]);
    }
}
