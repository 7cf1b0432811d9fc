//! Per-session sliding-window request tracking (Tier 1).
//!
//! Each session holds an ordered window of `(timestamp, cost)` pairs covering
//! the trailing hour, capped at 100 entries to bound memory. Entries older
//! than the window are lazily trimmed on every check. The map is a `DashMap`
//! so trim-then-check and append are each atomic per session without a global
//! lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

/// Trailing window length in seconds.
pub(crate) const WINDOW_SECS: u64 = 3600;

/// Hard cap on stored entries per session.
const MAX_TRACKED_REQUESTS: usize = 100;

#[derive(Debug, Default)]
struct SessionWindow {
    /// Timestamps are monotonically non-decreasing by insertion order.
    requests: VecDeque<(u64, f64)>,
    total_cost: f64,
}

impl SessionWindow {
    fn trim(&mut self, now: u64) {
        while let Some(&(ts, _)) = self.requests.front() {
            if now.saturating_sub(ts) > WINDOW_SECS {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn push(&mut self, now: u64, cost: f64) {
        if self.requests.len() >= MAX_TRACKED_REQUESTS {
            self.requests.pop_front();
        }
        self.requests.push_back((now, cost));
        self.total_cost += cost;
    }
}

/// Session-tier rejection details.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SessionRejection {
    /// Requests currently inside the window.
    pub count: usize,
    /// Seconds until the oldest windowed request ages out.
    pub wait_secs: u64,
}

/// Point-in-time statistics for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub request_count: usize,
    pub limit: usize,
    pub remaining: usize,
    pub total_cost: f64,
}

/// Tracks all live session windows.
pub struct SessionTracker {
    sessions: DashMap<String, SessionWindow>,
    limit: usize,
    cleanup_interval_secs: u64,
    last_cleanup: AtomicU64,
}

impl SessionTracker {
    pub fn new(limit: u64, cleanup_interval_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            limit: limit as usize,
            cleanup_interval_secs,
            last_cleanup: AtomicU64::new(now_secs()),
        }
    }

    /// Trim the session's window and check it against the limit.
    pub(crate) fn check(&self, session_id: &str) -> Option<SessionRejection> {
        self.check_at(session_id, now_secs())
    }

    pub(crate) fn check_at(&self, session_id: &str, now: u64) -> Option<SessionRejection> {
        let mut window = self.sessions.entry(session_id.to_string()).or_default();
        window.trim(now);

        if window.requests.len() >= self.limit {
            let oldest = window.requests.front().map(|&(ts, _)| ts).unwrap_or(now);
            let wait_secs = WINDOW_SECS.saturating_sub(now.saturating_sub(oldest));
            return Some(SessionRejection {
                count: window.requests.len(),
                wait_secs,
            });
        }
        None
    }

    /// Append a completed request to the session's window.
    pub(crate) fn record(&self, session_id: &str, cost: f64) {
        self.record_at(session_id, cost, now_secs());
    }

    pub(crate) fn record_at(&self, session_id: &str, cost: f64, now: u64) {
        let mut window = self.sessions.entry(session_id.to_string()).or_default();
        window.push(now, cost);
        debug!(session_id, cost, "Recorded session request");
    }

    /// Statistics for one session (trimmed to the current window).
    pub fn stats(&self, session_id: &str) -> SessionStats {
        self.stats_at(session_id, now_secs())
    }

    pub(crate) fn stats_at(&self, session_id: &str, now: u64) -> SessionStats {
        let (request_count, total_cost) = match self.sessions.get_mut(session_id) {
            Some(mut window) => {
                window.trim(now);
                (window.requests.len(), window.total_cost)
            }
            None => (0, 0.0),
        };
        SessionStats {
            session_id: session_id.to_string(),
            request_count,
            limit: self.limit,
            remaining: self.limit.saturating_sub(request_count),
            total_cost,
        }
    }

    /// Discard sessions idle past the trailing window. Gated to run at most
    /// once per cleanup interval; returns the number discarded (0 when gated).
    pub(crate) fn cleanup(&self) -> usize {
        self.cleanup_at(now_secs())
    }

    pub(crate) fn cleanup_at(&self, now: u64) -> usize {
        let last = self.last_cleanup.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.cleanup_interval_secs {
            return 0;
        }
        if self
            .last_cleanup
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            // Another task claimed this pass.
            return 0;
        }

        let cutoff = now.saturating_sub(WINDOW_SECS);
        let before = self.sessions.len();
        self.sessions
            .retain(|_, window| window.requests.back().is_some_and(|&(ts, _)| ts >= cutoff));
        let removed = before - self.sessions.len();
        if removed > 0 {
            info!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    #[cfg(test)]
    pub(crate) fn tracked_sessions(&self) -> usize {
        self.sessions.len()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
