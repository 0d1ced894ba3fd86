//! Task-local deadline propagation (spec §4.3 "Deadline propagation", §5
//! "the deadline context is task-local"), grounded on `spark_core::context`'s
//! `Context`/`Deadline` split. Unlike a `ThreadLocal`, a `tokio::task_local!`
//! is carried automatically across `.await` points within the same task and
//! must be explicitly re-scoped when work is handed off to a new task.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

tokio::task_local! {
    static DEADLINE: Option<Instant>;
}

/// Header name read by inbound handlers and re-emitted by outbound calls
/// (spec §6).
pub const DEADLINE_HEADER: &str = "X-Request-Deadline";

/// An absolute point in time beyond which the ambient call should stop
/// making progress.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self { at: Instant::now() + duration }
    }

    /// Parses an RFC 3339 UTC instant from the `X-Request-Deadline` header
    /// value (spec §4.3).
    pub fn from_header_value(value: &str) -> Option<Self> {
        let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339(value).ok()?.with_timezone(&Utc);
        let now_wall = Utc::now();
        let delta = parsed.signed_duration_since(now_wall);
        let std_delta = delta.to_std().unwrap_or(Duration::ZERO);
        Some(Self { at: Instant::now() + std_delta })
    }

    /// Remaining time before the deadline elapses, or `None` if it already
    /// has.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
    }

    pub fn has_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Runs `fut` with `deadline` installed as the ambient deadline for the
/// duration of the task. Tasks spawned from within `fut` do not
/// automatically inherit it (spec §5: "tasks that span multiple threads must
/// explicitly propagate it") — callers that `tokio::spawn` must re-scope.
pub async fn with_deadline<F, T>(deadline: Option<Deadline>, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    DEADLINE.scope(deadline.map(|d| d.at), fut).await
}

/// Reads the ambient deadline, if one is set for the current task. Returns
/// `None` outside of a `with_deadline` scope rather than panicking, since
/// most internal calls (e.g. background sweeps) have no deadline at all.
pub fn current() -> Option<Deadline> {
    DEADLINE.try_with(|d| d.map(|at| Deadline { at })).unwrap_or(None)
}

/// Formats a `Deadline` back into an RFC 3339 UTC instant suitable for the
/// `X-Request-Deadline` header. Re-derives the wall-clock instant from the
/// monotonic one relative to "now", since `Instant` carries no calendar
/// information.
pub fn format_header_value(deadline: Deadline) -> Option<String> {
    let remaining = deadline.remaining()?;
    let at = Utc::now() + chrono::Duration::from_std(remaining).ok()?;
    Some(at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_deadline_is_visible_inside_the_task() {
        let deadline = Deadline::after(Duration::from_secs(5));
        with_deadline(Some(deadline), async {
            let seen = current().expect("deadline should be set");
            assert!(seen.remaining().is_some());
        })
        .await;
    }

    #[tokio::test]
    async fn no_deadline_outside_scope() {
        assert!(current().is_none());
    }

    #[test]
    fn elapsed_deadline_reports_none_remaining() {
        let deadline = Deadline::after(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(deadline.has_elapsed());
        assert!(deadline.remaining().is_none());
    }
}
