//! Durable per-portfolio daily usage counters (Tiers 2 and 3).
//!
//! The document store itself is a collaborator; this module defines the
//! contract the cost limiter needs from it, plus an in-memory implementation
//! used in development and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One usage document per `(portfolio_id, calendar_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub portfolio_id: String,
    pub date: NaiveDate,
    pub request_count: u64,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contract required from the usage store.
///
/// Implementations must guarantee at most one record per
/// `(portfolio_id, date)` — `record_usage` has upsert semantics. Writes are
/// at-least-once: a retried request may increment twice; exactly-once is the
/// storage implementation's problem if it can offer it.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Fetch the record for one portfolio-day, if any.
    async fn find_day(&self, portfolio_id: &str, date: NaiveDate) -> Result<Option<UsageRecord>>;

    /// Atomically increment the portfolio-day record, creating it if absent.
    ///
    /// Increments `request_count` by 1, `total_cost` by `cost`, and
    /// `total_tokens` by `tokens`; refreshes `updated_at`; sets `created_at`
    /// only on first insert.
    async fn record_usage(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
        cost: f64,
        tokens: u64,
    ) -> Result<()>;

    /// Sum of `request_count` across all records with `date >= month_start`
    /// for the portfolio.
    async fn month_request_total(&self, portfolio_id: &str, month_start: NaiveDate) -> Result<u64>;
}

/// Mutex-guarded in-memory ledger. Suitable for development, tests, and
/// single-process deployments that accept losing counters on restart.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<(String, NaiveDate), UsageRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn find_day(&self, portfolio_id: &str, date: NaiveDate) -> Result<Option<UsageRecord>> {
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        Ok(records.get(&(portfolio_id.to_string(), date)).cloned())
    }

    async fn record_usage(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
        cost: f64,
        tokens: u64,
    ) -> Result<()> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = records
            .entry((portfolio_id.to_string(), date))
            .or_insert_with(|| UsageRecord {
                portfolio_id: portfolio_id.to_string(),
                date,
                request_count: 0,
                total_cost: 0.0,
                total_tokens: 0,
                created_at: now,
                updated_at: now,
            });
        record.request_count += 1;
        record.total_cost += cost;
        record.total_tokens += tokens;
        record.updated_at = now;
        Ok(())
    }

    async fn month_request_total(
        &self,
        portfolio_id: &str,
        month_start: NaiveDate,
    ) -> Result<u64> {
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        Ok(records
            .values()
            .filter(|r| r.portfolio_id == portfolio_id && r.date >= month_start)
            .map(|r| r.request_count)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_find_day_absent() {
        let ledger = MemoryLedger::new();
        let found = ledger.find_day("p1", day(2026, 8, 30)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_record_usage_upsert_shape() {
        let ledger = MemoryLedger::new();
        let today = day(2026, 8, 30);

        ledger.record_usage("p1", today, 0.01, 300).await.unwrap();
        let first = ledger.find_day("p1", today).await.unwrap().unwrap();
        assert_eq!(first.request_count, 1);
        assert_eq!(first.total_tokens, 300);

        // Second call the same day increments, not overwrites.
        ledger.record_usage("p1", today, 0.02, 200).await.unwrap();
        let second = ledger.find_day("p1", today).await.unwrap().unwrap();
        assert_eq!(second.request_count, 2);
        assert_eq!(second.total_tokens, 500);
        assert!((second.total_cost - 0.03).abs() < 1e-9);
        assert_eq!(second.created_at, first.created_at, "created_at set on insert only");
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_month_request_total() {
        let ledger = MemoryLedger::new();
        let month_start = day(2026, 8, 1);

        ledger.record_usage("p1", day(2026, 8, 1), 0.0, 0).await.unwrap();
        ledger.record_usage("p1", day(2026, 8, 1), 0.0, 0).await.unwrap();
        ledger.record_usage("p1", day(2026, 8, 15), 0.0, 0).await.unwrap();
        // Previous month must not count.
        ledger.record_usage("p1", day(2026, 7, 31), 0.0, 0).await.unwrap();
        // Other portfolios must not count.
        ledger.record_usage("p2", day(2026, 8, 2), 0.0, 0).await.unwrap();

        let total = ledger.month_request_total("p1", month_start).await.unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_portfolio_days_are_distinct_records() {
        let ledger = MemoryLedger::new();
        ledger.record_usage("p1", day(2026, 8, 29), 0.0, 0).await.unwrap();
        ledger.record_usage("p1", day(2026, 8, 30), 0.0, 0).await.unwrap();

        let d29 = ledger.find_day("p1", day(2026, 8, 29)).await.unwrap().unwrap();
        let d30 = ledger.find_day("p1", day(2026, 8, 30)).await.unwrap().unwrap();
        assert_eq!(d29.request_count, 1);
        assert_eq!(d30.request_count, 1);
    }
}
