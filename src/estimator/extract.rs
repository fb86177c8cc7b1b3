//! Token-usage extraction from assistant API responses.
//!
//! Assistant providers disagree on where token counts live in the response
//! body. Instead of probing properties ad hoc, extraction is an explicit
//! ordered list of named strategies, tried in fixed priority order. The
//! first strategy that yields a count wins; the estimate fallback always
//! succeeds, so extraction is total.

use serde_json::Value;

use super::estimate;

/// The strategy that produced a token count, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// A structured `usage.total_tokens` field was present.
    StructuredUsage,
    /// Prompt/completion token fields were present and summed.
    FieldPair,
    /// No usage fields found; fell back to estimating the response text.
    EstimateFallback,
}

/// Extracted token usage plus which strategy produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedUsage {
    pub tokens: u32,
    pub strategy: ExtractionStrategy,
}

/// Read a non-negative integer field, tolerating JSON numbers that arrive
/// as floats.
fn as_tokens(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|f| *f >= 0.0 && f.is_finite())
        .map(|f| f as u32)
}

/// Strategy 1: `usage.total_tokens`.
fn structured_usage(body: &Value) -> Option<u32> {
    as_tokens(body.get("usage")?.get("total_tokens")?)
}

/// Strategy 2: a prompt/completion field pair, either nested under `usage`
/// or at the top level.
fn field_pair(body: &Value) -> Option<u32> {
    for container in [body.get("usage").unwrap_or(&Value::Null), body] {
        let prompt = container.get("prompt_tokens").and_then(as_tokens);
        let completion = container.get("completion_tokens").and_then(as_tokens);
        if let (Some(p), Some(c)) = (prompt, completion) {
            return Some(p.saturating_add(c));
        }
    }
    None
}

/// Extract the total token usage from an assistant response body.
///
/// `response_text` is the assistant's reply text, used only by the estimate
/// fallback when the body carries no usage fields at all.
pub fn extract_token_usage(body: &Value, response_text: &str) -> ExtractedUsage {
    if let Some(tokens) = structured_usage(body) {
        return ExtractedUsage {
            tokens,
            strategy: ExtractionStrategy::StructuredUsage,
        };
    }
    if let Some(tokens) = field_pair(body) {
        return ExtractedUsage {
            tokens,
            strategy: ExtractionStrategy::FieldPair,
        };
    }
    tracing::debug!("no usage fields in assistant response; estimating from text");
    ExtractedUsage {
        tokens: estimate(response_text),
        strategy: ExtractionStrategy::EstimateFallback,
    }
}
