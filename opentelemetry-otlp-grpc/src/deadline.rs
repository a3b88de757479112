//! Per-call deadlines.
//!
//! Every export attempt gets a fresh [`Deadline`] when it is dispatched. An
//! expired earlier call never shortens a later one.

use std::time::Duration;

use tokio::time::Instant;

use crate::exporter::OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT;

// Roughly 30 years, the bound tokio itself uses for unrepresentable timeouts.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Computes the deadline of each export attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlinePolicy {
    timeout: Duration,
}

impl DeadlinePolicy {
    /// Use `configured`, or the 10 second default when unset.
    pub fn new(configured: Option<Duration>) -> Self {
        DeadlinePolicy {
            timeout: configured.unwrap_or(OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT),
        }
    }

    /// The exporter-wide timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for one attempt starting now. `call_timeout` overrides the
    /// exporter-wide timeout for this attempt only.
    ///
    /// Timeouts too large to add to the current instant, such as
    /// `Duration::MAX`, expire in the far future instead.
    pub fn deadline(&self, call_timeout: Option<Duration>) -> Deadline {
        let timeout = call_timeout.unwrap_or(self.timeout);
        let now = Instant::now();
        Deadline {
            timeout,
            expires_at: now
                .checked_add(timeout)
                .unwrap_or_else(|| now + FAR_FUTURE),
        }
    }
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        DeadlinePolicy::new(None)
    }
}

/// The time bound of a single attempt.
///
/// An already elapsed deadline does not stop the attempt from being made; the
/// transport enforces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    timeout: Duration,
    expires_at: Instant,
}

impl Deadline {
    /// The relative budget the deadline was computed from.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// When the attempt expires.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry, zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
