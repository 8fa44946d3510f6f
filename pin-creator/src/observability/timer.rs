//! Duration measurement for logged operations.

use std::time::Duration;
use tokio::time::Instant;

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: &'static str,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stops the timer, logs the duration in whole seconds and returns it.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::info!(
            span_name = self.name,
            elapsed_secs = elapsed.as_secs(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "{} took {}s",
            self.name,
            elapsed.as_secs()
        );
        elapsed
    }
}
