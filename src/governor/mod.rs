//! Admission control over the metered upstreams.
//!
//! [`UsageGovernor`] is the only component that mutates quota counters.
//! Each admission runs the full load → reset → check → increment → commit
//! cycle under the per-scope lock, so a call is either fully admitted or
//! fully rejected — never partially charged — and concurrent admissions
//! cannot overshoot a ceiling.
//!
//! Rejections are data, not errors: [`Decision::Blocked`] names the limit
//! that was breached and how many seconds remain until its window resets.
//! Only infrastructure failures (an unreachable store) surface as `Err`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::CallLimits;
use crate::error::{GateError, Result};
use crate::store::{QuotaRecord, QuotaStore, WindowFamily};

/// Which metered upstream a request is headed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallType {
    /// Third-party recipe API: minute + month windows.
    RecipeApi,
    /// AI cooking-assistant API: day window, calls + tokens.
    Assistant,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::RecipeApi => "recipe-api",
            CallType::Assistant => "assistant",
        }
    }
}

impl FromStr for CallType {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "recipe-api" => Ok(CallType::RecipeApi),
            "assistant" => Ok(CallType::Assistant),
            other => Err(GateError::InvalidCallType(other.to_string())),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ceiling an admission ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    HitsPerMinute,
    HitsPerMonth,
    AssistantCallsPerDay,
    AssistantTokensPerDay,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call was admitted and its usage recorded.
    Allowed,
    /// The call was rejected; nothing was recorded.
    Blocked {
        /// The limit that was breached.
        limit: LimitKind,
        /// Seconds until the breached window resets.
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Per-counter utilisation fractions (0.0 to 1.0+) for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentUsed {
    pub minute: f64,
    pub month: f64,
    pub assistant_calls: f64,
    pub assistant_tokens: f64,
}

/// Read-only projection of a [`QuotaRecord`] plus its limits.
///
/// Derived, transient, never a source of truth — the client advisor caches
/// one of these and the usage endpoint serves them to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub scope_id: String,
    pub minute_hits: u32,
    pub month_hits: u32,
    pub day_assistant_calls: u32,
    pub day_assistant_tokens: u64,
    pub limits: CallLimits,
    pub percent_used: PercentUsed,
    pub last_updated: DateTime<Utc>,
}

impl UsageSnapshot {
    fn project(record: &QuotaRecord, limits: CallLimits, now: DateTime<Utc>) -> Self {
        let pct = |used: f64, max: f64| if max > 0.0 { used / max } else { 0.0 };
        Self {
            scope_id: record.scope_id.clone(),
            minute_hits: record.minute_hits,
            month_hits: record.month_hits,
            day_assistant_calls: record.day_assistant_calls,
            day_assistant_tokens: record.day_assistant_tokens,
            limits,
            percent_used: PercentUsed {
                minute: pct(record.minute_hits as f64, limits.hits_per_minute as f64),
                month: pct(record.month_hits as f64, limits.hits_per_month as f64),
                assistant_calls: pct(
                    record.day_assistant_calls as f64,
                    limits.assistant_calls_per_day as f64,
                ),
                assistant_tokens: pct(
                    record.day_assistant_tokens as f64,
                    limits.assistant_tokens_per_day as f64,
                ),
            },
            last_updated: now,
        }
    }

    pub fn remaining_assistant_calls(&self) -> u32 {
        self.limits
            .assistant_calls_per_day
            .saturating_sub(self.day_assistant_calls)
    }

    pub fn remaining_assistant_tokens(&self) -> u64 {
        self.limits
            .assistant_tokens_per_day
            .saturating_sub(self.day_assistant_tokens)
    }
}

/// Counter family selector for administrative resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetKind {
    Recipe,
    Assistant,
    All,
}

/// Window selector for administrative resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetTimeframe {
    Minute,
    Day,
    Month,
    All,
}

/// Orchestrates admission control for both upstreams.
pub struct UsageGovernor {
    store: Arc<QuotaStore>,
    limits: CallLimits,
    clock: Arc<dyn Clock>,
}

impl UsageGovernor {
    pub fn new(store: Arc<QuotaStore>, limits: CallLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            limits,
            clock,
        }
    }

    pub fn limits(&self) -> CallLimits {
        self.limits
    }

    /// Decide whether a call may proceed, and if so record its usage.
    ///
    /// For assistant calls `estimated_tokens` is the pre-admission estimate
    /// from [`crate::estimator::estimate`]; recipe-API calls pass 0. The
    /// check is snapshot-then-increment: limits are evaluated against the
    /// reset-adjusted counters and the increments are committed in one
    /// write, so no call is ever partially charged.
    pub async fn check_and_record(
        &self,
        scope_id: &str,
        call_type: CallType,
        estimated_tokens: u32,
    ) -> Result<Decision> {
        let _guard = self.store.lock_scope(scope_id).await;
        let now = self.clock.now();
        let mut record = self.store.load(scope_id, now).await?;
        record.apply_window_resets(now);

        let decision = match call_type {
            CallType::RecipeApi => self.admit_recipe(&mut record, now),
            CallType::Assistant => self.admit_assistant(&mut record, estimated_tokens, now),
        };

        match decision {
            Decision::Allowed => {
                self.store.commit(&record).await?;
                tracing::debug!(scope = %scope_id, call_type = %call_type, "call admitted");
            }
            Decision::Blocked {
                limit,
                retry_after_secs,
            } => {
                // Expected outcome, not an error — nothing is committed.
                tracing::info!(
                    scope = %scope_id,
                    call_type = %call_type,
                    ?limit,
                    retry_after_secs,
                    "call rejected"
                );
            }
        }
        Ok(decision)
    }

    fn admit_recipe(&self, record: &mut QuotaRecord, now: DateTime<Utc>) -> Decision {
        if record.minute_hits >= self.limits.hits_per_minute {
            return Decision::Blocked {
                limit: LimitKind::HitsPerMinute,
                retry_after_secs: record.seconds_until_reset(WindowFamily::Minute, now),
            };
        }
        if record.month_hits >= self.limits.hits_per_month {
            return Decision::Blocked {
                limit: LimitKind::HitsPerMonth,
                retry_after_secs: record.seconds_until_reset(WindowFamily::Month, now),
            };
        }
        record.minute_hits += 1;
        record.month_hits += 1;
        Decision::Allowed
    }

    fn admit_assistant(
        &self,
        record: &mut QuotaRecord,
        estimated_tokens: u32,
        now: DateTime<Utc>,
    ) -> Decision {
        if record.day_assistant_calls >= self.limits.assistant_calls_per_day {
            return Decision::Blocked {
                limit: LimitKind::AssistantCallsPerDay,
                retry_after_secs: record.seconds_until_reset(WindowFamily::Day, now),
            };
        }
        if record.day_assistant_tokens + u64::from(estimated_tokens)
            > self.limits.assistant_tokens_per_day
        {
            return Decision::Blocked {
                limit: LimitKind::AssistantTokensPerDay,
                retry_after_secs: record.seconds_until_reset(WindowFamily::Day, now),
            };
        }
        record.day_assistant_calls += 1;
        record.day_assistant_tokens += u64::from(estimated_tokens);
        Decision::Allowed
    }

    /// Adjust the day token counter once an admitted assistant call's real
    /// cost is known.
    ///
    /// `delta_tokens` is actual minus estimated, so it is negative when the
    /// estimate overshot. Pure bookkeeping: the call already happened, no
    /// limit is re-checked, and the counter never goes below zero.
    pub async fn reconcile(&self, scope_id: &str, delta_tokens: i64) -> Result<()> {
        let _guard = self.store.lock_scope(scope_id).await;
        let now = self.clock.now();
        let mut record = self.store.load(scope_id, now).await?;
        record.apply_window_resets(now);

        record.day_assistant_tokens = if delta_tokens >= 0 {
            record
                .day_assistant_tokens
                .saturating_add(delta_tokens as u64)
        } else {
            record
                .day_assistant_tokens
                .saturating_sub(delta_tokens.unsigned_abs())
        };

        self.store.commit(&record).await?;
        tracing::debug!(scope = %scope_id, delta_tokens, "assistant usage reconciled");
        Ok(())
    }

    /// Reconcile an admitted assistant call directly from the upstream
    /// response body, using the extraction strategies in
    /// [`crate::estimator::extract`].
    pub async fn reconcile_from_response(
        &self,
        scope_id: &str,
        estimated_tokens: u32,
        response_body: &serde_json::Value,
        response_text: &str,
    ) -> Result<()> {
        let actual = crate::estimator::extract::extract_token_usage(response_body, response_text);
        let delta = i64::from(actual.tokens) - i64::from(estimated_tokens);
        tracing::debug!(
            scope = %scope_id,
            estimated_tokens,
            actual_tokens = actual.tokens,
            strategy = ?actual.strategy,
            "reconciling assistant usage from response"
        );
        self.reconcile(scope_id, delta).await
    }

    /// Point-in-time usage projection for dashboards and the client
    /// advisor. Stale windows are zeroed in the projection but not
    /// committed back — resets stay lazy.
    pub async fn snapshot(&self, scope_id: &str) -> Result<UsageSnapshot> {
        let now = self.clock.now();
        let mut record = self.store.load(scope_id, now).await?;
        record.apply_window_resets(now);
        Ok(UsageSnapshot::project(&record, self.limits, now))
    }

    /// Administrative reset: zero the counters matching `kind` and
    /// `timeframe` and restart their windows at now.
    pub async fn reset(
        &self,
        scope_id: &str,
        kind: ResetKind,
        timeframe: ResetTimeframe,
    ) -> Result<()> {
        let _guard = self.store.lock_scope(scope_id).await;
        let now = self.clock.now();
        let mut record = self.store.load(scope_id, now).await?;

        let recipe = matches!(kind, ResetKind::Recipe | ResetKind::All);
        let assistant = matches!(kind, ResetKind::Assistant | ResetKind::All);

        if recipe && matches!(timeframe, ResetTimeframe::Minute | ResetTimeframe::All) {
            record.minute_hits = 0;
            record.last_minute_reset = now;
        }
        if recipe && matches!(timeframe, ResetTimeframe::Month | ResetTimeframe::All) {
            record.month_hits = 0;
            record.last_month_reset = now;
        }
        if assistant && matches!(timeframe, ResetTimeframe::Day | ResetTimeframe::All) {
            record.day_assistant_calls = 0;
            record.day_assistant_tokens = 0;
            record.last_day_reset = now;
        }

        self.store.commit(&record).await?;
        tracing::info!(scope = %scope_id, ?kind, ?timeframe, "counters reset by administrator");
        Ok(())
    }
}

impl fmt::Debug for UsageGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageGovernor")
            .field("limits", &self.limits)
            .finish()
    }
}
