//! Client-side quota advisor.
//!
//! A best-effort, non-authoritative mirror of remaining quota, computed
//! from the last [`UsageSnapshot`] fetched from the usage endpoint. Its
//! only job is to pre-empt obviously-doomed assistant calls before they
//! reach the server; a `true` from [`ClientQuotaAdvisor::can_attempt`]
//! guarantees nothing, because the snapshot may be stale — callers must
//! still handle a server-side rejection gracefully.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::estimator::estimate;
use crate::governor::UsageSnapshot;

/// How long a cached snapshot is trusted before it is discarded.
const DEFAULT_MAX_AGE_SECS: i64 = 120;

/// Remaining assistant budget according to the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingQuota {
    pub remaining_calls: u32,
    pub remaining_tokens: u64,
}

struct CachedSnapshot {
    snapshot: UsageSnapshot,
    fetched_at: DateTime<Utc>,
}

/// Advisory mirror of the server-side counters.
pub struct ClientQuotaAdvisor {
    cached: RwLock<Option<CachedSnapshot>>,
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

/// Assumed response-to-prompt token ratio, as a step function of the
/// prompt size. Short prompts elicit disproportionately long responses.
pub fn response_ratio(prompt_tokens: u32) -> u32 {
    match prompt_tokens {
        0..=10 => 6,
        11..=50 => 4,
        51..=200 => 3,
        _ => 2,
    }
}

impl ClientQuotaAdvisor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            cached: RwLock::new(None),
            max_age: Duration::seconds(DEFAULT_MAX_AGE_SECS),
            clock,
        }
    }

    /// Replace the cached snapshot with a freshly fetched one.
    pub fn refresh(&self, snapshot: UsageSnapshot) {
        let mut guard = self.cached.write().expect("advisor lock poisoned");
        *guard = Some(CachedSnapshot {
            snapshot,
            fetched_at: self.clock.now(),
        });
    }

    /// Drop the cached snapshot if it has aged out. Expired entries are
    /// pruned on access rather than by a background sweep.
    fn fresh_snapshot(&self) -> Option<UsageSnapshot> {
        let now = self.clock.now();
        {
            let guard = self.cached.read().expect("advisor lock poisoned");
            match guard.as_ref() {
                Some(c) if now - c.fetched_at < self.max_age => {
                    return Some(c.snapshot.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Stale — discard it so the caller refetches.
        let mut guard = self.cached.write().expect("advisor lock poisoned");
        if let Some(c) = guard.as_ref() {
            if now - c.fetched_at >= self.max_age {
                *guard = None;
            }
        }
        None
    }

    /// Remaining assistant budget, or `None` when no fresh snapshot is
    /// cached.
    pub fn remaining(&self) -> Option<RemainingQuota> {
        let snap = self.fresh_snapshot()?;
        Some(RemainingQuota {
            remaining_calls: snap.remaining_assistant_calls(),
            remaining_tokens: snap.remaining_assistant_tokens(),
        })
    }

    /// Whether an assistant call for `prompt_text` looks affordable.
    ///
    /// Estimates the call's total cost as prompt plus an assumed response
    /// of `prompt * ratio` tokens. Without a fresh snapshot this returns
    /// `true` — the advisor pre-empts doomed calls, it never blocks ones
    /// the server might still admit.
    pub fn can_attempt(&self, prompt_text: &str) -> bool {
        let Some(remaining) = self.remaining() else {
            return true;
        };
        if remaining.remaining_calls == 0 {
            return false;
        }
        let prompt_tokens = estimate(prompt_text);
        let estimated_total =
            u64::from(prompt_tokens) + u64::from(prompt_tokens) * u64::from(response_ratio(prompt_tokens));
        remaining.remaining_tokens >= estimated_total
    }
}

impl std::fmt::Debug for ClientQuotaAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .cached
            .read()
            .map(|g| g.is_some())
            .unwrap_or(false);
        f.debug_struct("ClientQuotaAdvisor")
            .field("has_snapshot", &cached)
            .finish()
    }
}
