//! Durable quota counters.
//!
//! One [`QuotaRecord`] exists per tracking scope (the common case is a
//! single `"global"` scope). Counters accumulate over three independent
//! window families — minute, day, month — and are reset lazily on access:
//! there are no timers, a stale counter is zeroed the next time the record
//! is touched.
//!
//! [`QuotaStore`] owns the persistence backend and a per-scope lock table.
//! The governor's load → reset → mutate → commit cycle races against
//! concurrent requests for the same scope unless it runs under
//! [`QuotaStore::lock_scope`], which serializes the whole cycle.

pub mod json_file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Result;

/// Scope key for the shared product-wide counters.
pub const GLOBAL_SCOPE: &str = "global";

/// Length of the minute window in seconds.
pub const MINUTE_WINDOW_SECS: i64 = 60;
/// Length of the day window in seconds.
pub const DAY_WINDOW_SECS: i64 = 24 * 60 * 60;

/// The three counter families, each with its own reset cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFamily {
    /// Recipe-API hits, fixed 60-second window.
    Minute,
    /// Assistant calls and tokens, fixed 24-hour window.
    Day,
    /// Recipe-API hits, calendar-month window (resets at month rollover).
    Month,
}

/// Persisted usage counters for a single scope.
///
/// Invariant: every counter is non-negative and consistent with its reset
/// timestamp. A counter whose window has elapsed is stale and must be
/// zeroed (via [`QuotaRecord::apply_window_resets`]) before being read or
/// incremented. Counters are never decremented except by a window reset or
/// an administrative reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Identity of the tracked entity (`"global"` or a caller fingerprint).
    pub scope_id: String,
    /// Recipe-API calls in the current minute window.
    pub minute_hits: u32,
    /// Recipe-API calls in the current month window.
    pub month_hits: u32,
    /// Assistant calls in the current day window.
    pub day_assistant_calls: u32,
    /// Tokens consumed by assistant calls in the current day window.
    pub day_assistant_tokens: u64,
    /// Start of the active minute window.
    pub last_minute_reset: DateTime<Utc>,
    /// Start of the active day window.
    pub last_day_reset: DateTime<Utc>,
    /// Start of the active month window.
    pub last_month_reset: DateTime<Utc>,
}

impl QuotaRecord {
    /// A fresh all-zero record whose windows start at `now`.
    pub fn fresh(scope_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            minute_hits: 0,
            month_hits: 0,
            day_assistant_calls: 0,
            day_assistant_tokens: 0,
            last_minute_reset: now,
            last_day_reset: now,
            last_month_reset: now,
        }
    }

    /// Zero any counter whose window has elapsed and advance its reset
    /// timestamp to `now`.
    ///
    /// Minute and day windows are fixed-length from their last reset; the
    /// month window resets at the calendar-month boundary. Idempotent: a
    /// second call with the same `now` performs no further mutation.
    pub fn apply_window_resets(&mut self, now: DateTime<Utc>) {
        if now - self.last_minute_reset >= Duration::seconds(MINUTE_WINDOW_SECS) {
            self.minute_hits = 0;
            self.last_minute_reset = now;
        }
        if now - self.last_day_reset >= Duration::seconds(DAY_WINDOW_SECS) {
            self.day_assistant_calls = 0;
            self.day_assistant_tokens = 0;
            self.last_day_reset = now;
        }
        let rolled = (now.year(), now.month())
            != (self.last_month_reset.year(), self.last_month_reset.month());
        if rolled {
            self.month_hits = 0;
            self.last_month_reset = now;
        }
    }

    /// Seconds until the given window family next resets, from `now`.
    ///
    /// Used for `Retry-After` hints. Always at least 1.
    pub fn seconds_until_reset(&self, family: WindowFamily, now: DateTime<Utc>) -> u64 {
        let remaining = match family {
            WindowFamily::Minute => {
                MINUTE_WINDOW_SECS - (now - self.last_minute_reset).num_seconds()
            }
            WindowFamily::Day => DAY_WINDOW_SECS - (now - self.last_day_reset).num_seconds(),
            WindowFamily::Month => (next_month_start(now) - now).num_seconds(),
        };
        remaining.max(1) as u64
    }
}

/// Midnight UTC on the first day of the month after `now`.
fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    month_start
        .checked_add_months(Months::new(1))
        .unwrap_or(now + Duration::days(30))
}

/// Persistence backend for quota records.
///
/// `load` returns `None` for an unknown scope; `commit` must durably
/// persist the record, atomically with respect to concurrent commits for
/// other scopes. Unreachable storage surfaces
/// [`crate::error::GateError::Persistence`].
#[async_trait]
pub trait QuotaBackend: Send + Sync {
    async fn load(&self, scope_id: &str) -> Result<Option<QuotaRecord>>;
    async fn commit(&self, record: &QuotaRecord) -> Result<()>;
}

/// Backend plus the per-scope lock table.
///
/// Injected into the governor rather than reached through a singleton, so
/// tests and per-tenant deployments get isolated instances.
pub struct QuotaStore {
    backend: Arc<dyn QuotaBackend>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl QuotaStore {
    pub fn new(backend: Arc<dyn QuotaBackend>) -> Self {
        Self {
            backend,
            locks: DashMap::new(),
        }
    }

    /// Acquire the critical-section lock for `scope_id`.
    ///
    /// Hold the returned guard across the whole load → reset → mutate →
    /// commit cycle; without it concurrent admissions can overshoot the
    /// ceiling.
    pub async fn lock_scope(&self, scope_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let entry = self.locks.entry(scope_id.to_string()).or_default();
            Arc::clone(entry.value())
        };
        lock.lock_owned().await
    }

    /// Load the record for `scope_id`, or a fresh zeroed one if the scope
    /// has never been seen. The fresh record is not persisted until the
    /// first `commit`.
    pub async fn load(&self, scope_id: &str, now: DateTime<Utc>) -> Result<QuotaRecord> {
        Ok(self
            .backend
            .load(scope_id)
            .await?
            .unwrap_or_else(|| QuotaRecord::fresh(scope_id, now)))
    }

    /// Durably persist `record`.
    pub async fn commit(&self, record: &QuotaRecord) -> Result<()> {
        self.backend.commit(record).await
    }
}

impl std::fmt::Debug for QuotaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaStore")
            .field("scopes_locked", &self.locks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC 3339 timestamp")
    }

    #[test]
    fn test_fresh_record_is_zeroed() {
        let now = at("2026-08-10T12:00:00Z");
        let rec = QuotaRecord::fresh("global", now);
        assert_eq!(rec.minute_hits, 0);
        assert_eq!(rec.month_hits, 0);
        assert_eq!(rec.day_assistant_calls, 0);
        assert_eq!(rec.day_assistant_tokens, 0);
        assert_eq!(rec.last_minute_reset, now);
    }

    #[test]
    fn test_minute_window_resets_after_60s() {
        let start = at("2026-08-10T12:00:00Z");
        let mut rec = QuotaRecord::fresh("global", start);
        rec.minute_hits = 5;

        rec.apply_window_resets(start + Duration::seconds(59));
        assert_eq!(rec.minute_hits, 5, "still inside the window");

        let later = start + Duration::seconds(60);
        rec.apply_window_resets(later);
        assert_eq!(rec.minute_hits, 0);
        assert_eq!(rec.last_minute_reset, later);
    }

    #[test]
    fn test_day_window_resets_both_assistant_counters() {
        let start = at("2026-08-10T12:00:00Z");
        let mut rec = QuotaRecord::fresh("global", start);
        rec.day_assistant_calls = 12;
        rec.day_assistant_tokens = 9_000;

        rec.apply_window_resets(start + Duration::hours(24));
        assert_eq!(rec.day_assistant_calls, 0);
        assert_eq!(rec.day_assistant_tokens, 0);
    }

    #[test]
    fn test_month_window_uses_calendar_boundary() {
        let start = at("2026-08-30T23:00:00Z");
        let mut rec = QuotaRecord::fresh("global", start);
        rec.month_hits = 400;

        // Two days later but still well under 30 days — month rolled over.
        rec.apply_window_resets(at("2026-09-01T01:00:00Z"));
        assert_eq!(rec.month_hits, 0);
    }

    #[test]
    fn test_month_window_survives_within_month() {
        let start = at("2026-08-01T00:00:00Z");
        let mut rec = QuotaRecord::fresh("global", start);
        rec.month_hits = 400;
        rec.apply_window_resets(at("2026-08-31T23:59:59Z"));
        assert_eq!(rec.month_hits, 400);
    }

    // P1: applying resets twice with the same `now` changes nothing.
    #[test]
    fn test_resets_are_idempotent() {
        let start = at("2026-08-10T12:00:00Z");
        let mut rec = QuotaRecord::fresh("global", start);
        rec.minute_hits = 3;
        rec.month_hits = 50;
        rec.day_assistant_calls = 7;
        rec.day_assistant_tokens = 1_000;

        let now = at("2026-09-12T09:00:00Z");
        rec.apply_window_resets(now);
        let after_first = rec.clone();
        rec.apply_window_resets(now);
        assert_eq!(rec, after_first);
    }

    #[test]
    fn test_seconds_until_minute_reset() {
        let start = at("2026-08-10T12:00:00Z");
        let rec = QuotaRecord::fresh("global", start);
        let secs = rec.seconds_until_reset(WindowFamily::Minute, start + Duration::seconds(15));
        assert_eq!(secs, 45);
    }

    #[test]
    fn test_seconds_until_reset_never_zero() {
        let start = at("2026-08-10T12:00:00Z");
        let rec = QuotaRecord::fresh("global", start);
        let secs = rec.seconds_until_reset(WindowFamily::Minute, start + Duration::seconds(60));
        assert!(secs >= 1);
    }

    #[test]
    fn test_seconds_until_month_reset_is_to_month_start() {
        let rec = QuotaRecord::fresh("global", at("2026-08-01T00:00:00Z"));
        // 2026-08-31T23:59:00Z -> 60 seconds to September.
        let secs = rec.seconds_until_reset(WindowFamily::Month, at("2026-08-31T23:59:00Z"));
        assert_eq!(secs, 60);
    }

    #[tokio::test]
    async fn test_store_load_unknown_scope_is_fresh() {
        let store = QuotaStore::new(Arc::new(MemoryBackend::new()));
        let now = at("2026-08-10T12:00:00Z");
        let rec = store.load("nobody", now).await.unwrap();
        assert_eq!(rec.scope_id, "nobody");
        assert_eq!(rec.minute_hits, 0);
    }

    #[tokio::test]
    async fn test_store_commit_then_load_roundtrips() {
        let store = QuotaStore::new(Arc::new(MemoryBackend::new()));
        let now = at("2026-08-10T12:00:00Z");
        let mut rec = QuotaRecord::fresh(GLOBAL_SCOPE, now);
        rec.minute_hits = 3;
        store.commit(&rec).await.unwrap();

        let loaded = store.load(GLOBAL_SCOPE, now).await.unwrap();
        assert_eq!(loaded, rec);
    }

    #[tokio::test]
    async fn test_lock_scope_serializes_same_scope() {
        let store = Arc::new(QuotaStore::new(Arc::new(MemoryBackend::new())));
        let guard = store.lock_scope("global").await;
        // Second acquisition must not be immediately available.
        let store2 = Arc::clone(&store);
        let pending = tokio::spawn(async move {
            let _g = store2.lock_scope("global").await;
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished(), "lock should still be held");
        drop(guard);
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_scope_independent_scopes() {
        let store = QuotaStore::new(Arc::new(MemoryBackend::new()));
        let _a = store.lock_scope("a").await;
        // Different scope must not block.
        let _b = store.lock_scope("b").await;
    }
}
