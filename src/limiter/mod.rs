//! Three-tier cost-bounded admission control.
//!
//! Every incoming request passes the tiers in strict precedence order, the
//! cheapest first: the in-memory session window (Tier 1), then the persisted
//! daily counter (Tier 2), then the persisted monthly aggregate (Tier 3).
//! The first violated tier short-circuits the rest. Persisted tiers fail
//! open: a ledger fault is logged and the request is allowed, so a storage
//! hiccup degrades to unmetered traffic rather than an outage.

pub mod ledger;
pub mod session;

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::LimitsConfig;
use crate::error::{FolioError, Result};

pub use ledger::{MemoryLedger, UsageLedger, UsageRecord};
pub use session::{SessionStats, SessionTracker};

/// Which admission tier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitTier {
    /// No tier was violated.
    None,
    Session,
    Daily,
    Monthly,
}

/// Outcome of a limit check. Rejections are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub tier: LimitTier,
    /// Human-readable rejection message, present when blocked.
    pub error: Option<String>,
    /// The violated tier's configured limit.
    pub limit: Option<u64>,
    /// Observed count at the violated tier, where available.
    pub current: Option<u64>,
}

impl AdmissionDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            tier: LimitTier::None,
            error: None,
            limit: None,
            current: None,
        }
    }

    fn block(tier: LimitTier, error: String, limit: u64, current: Option<u64>) -> Self {
        Self {
            allowed: false,
            tier,
            error: Some(error),
            limit: Some(limit),
            current,
        }
    }
}

/// Orchestrates the three admission checks and post-call usage recording.
pub struct CostLimiter {
    sessions: SessionTracker,
    ledger: Option<Arc<dyn UsageLedger>>,
    limits: LimitsConfig,
}

impl CostLimiter {
    /// Build a limiter. The ledger is optional; without one only the session
    /// tier is enforced. Fails on zero limits.
    pub fn new(limits: &LimitsConfig, ledger: Option<Arc<dyn UsageLedger>>) -> Result<Self> {
        if limits.session_requests_per_hour == 0
            || limits.daily_requests_per_portfolio == 0
            || limits.monthly_requests_per_portfolio == 0
        {
            return Err(FolioError::Config(
                "limits must all be greater than 0".into(),
            ));
        }

        info!(
            session = limits.session_requests_per_hour,
            daily = limits.daily_requests_per_portfolio,
            monthly = limits.monthly_requests_per_portfolio,
            "Cost limiter initialized"
        );

        Ok(Self {
            sessions: SessionTracker::new(
                limits.session_requests_per_hour,
                limits.session_cleanup_interval_secs,
            ),
            ledger,
            limits: limits.clone(),
        })
    }

    /// Check all tiers for one request. Never fails; persisted-tier faults
    /// fail open.
    pub async fn check(&self, session_id: &str, portfolio_id: &str) -> AdmissionDecision {
        self.sessions.cleanup();

        // Tier 1: session window (in-memory, always evaluated).
        if let Some(rejection) = self.sessions.check(session_id) {
            warn!(session_id, count = rejection.count, "Session limit hit");
            let wait_mins = rejection.wait_secs / 60;
            return AdmissionDecision::block(
                LimitTier::Session,
                format!(
                    "Rate limit exceeded. You've made {} requests in the last hour. \
                     Please try again in {} minutes.",
                    rejection.count, wait_mins
                ),
                self.limits.session_requests_per_hour,
                Some(rejection.count as u64),
            );
        }

        let Some(ledger) = &self.ledger else {
            return AdmissionDecision::allow();
        };
        let today = Utc::now().date_naive();

        // Tier 2: daily counter (persisted, fail-open).
        match ledger.find_day(portfolio_id, today).await {
            Ok(record) => {
                let current = record.map_or(0, |r| r.request_count);
                if current >= self.limits.daily_requests_per_portfolio {
                    warn!(portfolio_id, current, "Daily limit hit");
                    return AdmissionDecision::block(
                        LimitTier::Daily,
                        format!(
                            "Daily limit reached ({}/{} requests). Please try again tomorrow.",
                            current, self.limits.daily_requests_per_portfolio
                        ),
                        self.limits.daily_requests_per_portfolio,
                        Some(current),
                    );
                }
            }
            Err(e) => {
                error!(portfolio_id, error = %e, "Failed to check daily limit, allowing request");
            }
        }

        // Tier 3: monthly aggregate (persisted, fail-open). Recomputed per
        // check rather than kept as a running counter.
        let month_start = today.with_day(1).unwrap_or(today);
        match ledger.month_request_total(portfolio_id, month_start).await {
            Ok(current) => {
                if current >= self.limits.monthly_requests_per_portfolio {
                    warn!(portfolio_id, current, "Monthly limit hit");
                    return AdmissionDecision::block(
                        LimitTier::Monthly,
                        format!(
                            "Monthly limit reached ({}/{} requests). \
                             Limit resets on the 1st of next month.",
                            current, self.limits.monthly_requests_per_portfolio
                        ),
                        self.limits.monthly_requests_per_portfolio,
                        Some(current),
                    );
                }
            }
            Err(e) => {
                error!(portfolio_id, error = %e, "Failed to check monthly limit, allowing request");
            }
        }

        AdmissionDecision::allow()
    }

    /// Record a completed request against the session window.
    pub fn record_session(&self, session_id: &str, cost: f64) {
        self.sessions.record(session_id, cost);
    }

    /// Record a completed request against today's ledger record.
    ///
    /// Write failures are logged and swallowed: the user-facing request
    /// already succeeded and must not be failed retroactively.
    pub async fn record_usage(&self, portfolio_id: &str, cost: f64, tokens: u64) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let today = Utc::now().date_naive();
        match ledger.record_usage(portfolio_id, today, cost, tokens).await {
            Ok(()) => debug!(portfolio_id, cost, tokens, "Tracked usage"),
            Err(e) => error!(portfolio_id, error = %e, "Failed to track usage"),
        }
    }

    /// Statistics for one session.
    pub fn session_stats(&self, session_id: &str) -> SessionStats {
        self.sessions.stats(session_id)
    }
}
