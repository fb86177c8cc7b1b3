//! Quota status, reset and estimate command handlers.

use anyhow::{bail, Result};

use recipegate::estimator::estimate;
use recipegate::governor::{ResetKind, ResetTimeframe};
use recipegate::GateConfig;

use super::{build_governor, QuotaSubcommand};

/// Handle `recipegate quota` subcommands.
pub(crate) async fn cmd_quota(config: &GateConfig, action: QuotaSubcommand) -> Result<()> {
    let governor = build_governor(config);

    match action {
        QuotaSubcommand::Status { scope } => {
            let snap = governor.snapshot(&scope).await?;
            let limits = snap.limits;

            println!(
                "{:<24} {:>10} {:>10} {:>8}",
                "Counter", "Used", "Limit", "Pct"
            );
            println!("{}", "-".repeat(56));
            let rows = [
                (
                    "recipe hits (minute)",
                    u64::from(snap.minute_hits),
                    u64::from(limits.hits_per_minute),
                    snap.percent_used.minute,
                ),
                (
                    "recipe hits (month)",
                    u64::from(snap.month_hits),
                    u64::from(limits.hits_per_month),
                    snap.percent_used.month,
                ),
                (
                    "assistant calls (day)",
                    u64::from(snap.day_assistant_calls),
                    u64::from(limits.assistant_calls_per_day),
                    snap.percent_used.assistant_calls,
                ),
                (
                    "assistant tokens (day)",
                    snap.day_assistant_tokens,
                    limits.assistant_tokens_per_day,
                    snap.percent_used.assistant_tokens,
                ),
            ];
            for (name, used, limit, pct) in rows {
                println!(
                    "{:<24} {:>10} {:>10} {:>7.0}%",
                    name,
                    used,
                    limit,
                    pct * 100.0
                );
            }
            println!("\nscope: {}  as of: {}", snap.scope_id, snap.last_updated);
        }
        QuotaSubcommand::Reset {
            kind,
            timeframe,
            scope,
        } => {
            let kind = parse_kind(&kind)?;
            let timeframe = parse_timeframe(&timeframe)?;
            governor.reset(&scope, kind, timeframe).await?;
            println!("Reset {kind:?}/{timeframe:?} counters for scope: {scope}");
        }
    }

    Ok(())
}

/// Handle `recipegate estimate <text>`.
pub(crate) fn cmd_estimate(text: &str) -> Result<()> {
    println!("{}", estimate(text));
    Ok(())
}

fn parse_kind(s: &str) -> Result<ResetKind> {
    match s {
        "recipe" => Ok(ResetKind::Recipe),
        "assistant" => Ok(ResetKind::Assistant),
        "all" => Ok(ResetKind::All),
        other => bail!("unknown reset kind '{other}' (expected recipe, assistant or all)"),
    }
}

fn parse_timeframe(s: &str) -> Result<ResetTimeframe> {
    match s {
        "minute" => Ok(ResetTimeframe::Minute),
        "day" => Ok(ResetTimeframe::Day),
        "month" => Ok(ResetTimeframe::Month),
        "all" => Ok(ResetTimeframe::All),
        other => bail!("unknown timeframe '{other}' (expected minute, day, month or all)"),
    }
}
