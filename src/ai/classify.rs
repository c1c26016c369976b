//! Error classification for AI pipeline failures.
//!
//! Classes drive retry eligibility and the `meta.errorClass` field. The
//! match order is significant: the first matching class wins.

use super::types::ErrorClass;

/// Classify a rendered error message.
///
/// `parse_error` and `request_error` are assigned at their specific call
/// sites and never produced here.
pub fn classify(message: &str) -> ErrorClass {
    let text = message.to_lowercase();

    if text.contains("deadline") || text.contains("timed out") || text.contains("timeout") {
        ErrorClass::Timeout
    } else if text.contains("connection refused")
        || text.contains("connection reset")
        || text.contains("dial")
        || text.contains("no such host")
        || text.contains("network")
    {
        ErrorClass::Network
    } else if text.contains("429") || text.contains("rate limit") {
        ErrorClass::RateLimit
    } else if text.contains("401")
        || text.contains("403")
        || text.contains("unauthorized")
        || text.contains("forbidden")
    {
        ErrorClass::Auth
    } else if text.contains("500")
        || text.contains("502")
        || text.contains("503")
        || text.contains("504")
    {
        ErrorClass::Upstream5xx
    } else if text.contains("400") || text.contains("422") {
        ErrorClass::Upstream4xx
    } else {
        ErrorClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_wins_over_everything() {
        assert_eq!(classify("request timed out after 20s"), ErrorClass::Timeout);
        assert_eq!(classify("context deadline exceeded"), ErrorClass::Timeout);
        // A 503 body mentioning a timeout still classifies as timeout.
        assert_eq!(classify("status 503: gateway timeout"), ErrorClass::Timeout);
    }

    #[test]
    fn network_phrases() {
        assert_eq!(classify("connection refused"), ErrorClass::Network);
        assert_eq!(classify("tcp connection reset by peer"), ErrorClass::Network);
        assert_eq!(classify("no such host"), ErrorClass::Network);
        assert_eq!(classify("network unreachable"), ErrorClass::Network);
    }

    #[test]
    fn status_code_classes() {
        assert_eq!(classify("upstream status 429: slow down"), ErrorClass::RateLimit);
        assert_eq!(classify("rate limit exceeded"), ErrorClass::RateLimit);
        assert_eq!(classify("upstream status 401: bad key"), ErrorClass::Auth);
        assert_eq!(classify("forbidden"), ErrorClass::Auth);
        assert_eq!(classify("upstream status 502: bad gateway"), ErrorClass::Upstream5xx);
        assert_eq!(classify("upstream status 400: bad request"), ErrorClass::Upstream4xx);
        assert_eq!(classify("upstream status 422: unprocessable"), ErrorClass::Upstream4xx);
    }

    #[test]
    fn unknown_fallback() {
        assert_eq!(classify("model returned no choices"), ErrorClass::Unknown);
        assert_eq!(classify(""), ErrorClass::Unknown);
    }

    #[test]
    fn retryability() {
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(ErrorClass::Network.is_retryable());
        assert!(ErrorClass::RateLimit.is_retryable());
        assert!(ErrorClass::Upstream5xx.is_retryable());
        assert!(!ErrorClass::Auth.is_retryable());
        assert!(!ErrorClass::Upstream4xx.is_retryable());
        assert!(!ErrorClass::ParseError.is_retryable());
        assert!(!ErrorClass::Unknown.is_retryable());
    }
}
