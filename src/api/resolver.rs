//! Caller identity resolution.
//!
//! The scope key a request is metered under comes from a pluggable
//! resolver, so the default forwarded-address scheme (trivially spoofable,
//! a known limitation inherited from the product) can be swapped for an
//! authenticated session id or verified network address without touching
//! the governor.

use axum::http::HeaderMap;

/// Sentinel scope for requests with no resolvable identity.
pub const ANONYMOUS_SCOPE: &str = "anonymous";

/// Maps inbound request headers to a quota scope key.
pub trait CallerResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> String;
}

/// Every request shares one named scope.
///
/// This is the production default: the ceilings protect product-wide
/// upstream API keys, so all callers draw from the same counters.
#[derive(Debug, Clone)]
pub struct FixedScopeResolver {
    scope: String,
}

impl FixedScopeResolver {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl CallerResolver for FixedScopeResolver {
    fn resolve(&self, _headers: &HeaderMap) -> String {
        self.scope.clone()
    }
}

/// Per-caller scoping keyed on the first `x-forwarded-for` entry, falling
/// back to [`ANONYMOUS_SCOPE`] when the header is missing or malformed.
#[derive(Debug, Clone, Default)]
pub struct ForwardedAddrResolver;

impl CallerResolver for ForwardedAddrResolver {
    fn resolve(&self, headers: &HeaderMap) -> String {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| ANONYMOUS_SCOPE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_fixed_scope_ignores_headers() {
        let resolver = FixedScopeResolver::new("global");
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        assert_eq!(resolver.resolve(&headers), "global");
    }

    #[test]
    fn test_forwarded_addr_takes_first_entry() {
        let resolver = ForwardedAddrResolver;
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(resolver.resolve(&headers), "203.0.113.9");
    }

    #[test]
    fn test_forwarded_addr_missing_header_is_anonymous() {
        let resolver = ForwardedAddrResolver;
        assert_eq!(resolver.resolve(&HeaderMap::new()), ANONYMOUS_SCOPE);
    }

    #[test]
    fn test_forwarded_addr_empty_header_is_anonymous() {
        let resolver = ForwardedAddrResolver;
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(resolver.resolve(&headers), ANONYMOUS_SCOPE);
    }
}
