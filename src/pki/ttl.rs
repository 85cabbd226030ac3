//! Certificate TTL resolution.

use chrono::{DateTime, Duration, Utc};

use crate::errors::{Error, Result};

/// Resolve a certificate end date from a requested TTL, a ceiling and a
/// default, all in whole hours.
///
/// A requested TTL above the ceiling fails with a validation error; an absent
/// request falls back to `default_ttl`. The result is `now + ttl` in UTC.
pub fn resolve_end_date(
    requested_ttl: Option<i64>,
    max_ttl: Option<i64>,
    default_ttl: i64,
) -> Result<DateTime<Utc>> {
    let ttl = match requested_ttl {
        Some(requested) => {
            if let Some(max) = max_ttl {
                if requested > max {
                    return Err(Error::validation(format!(
                        "Requested {} TTL is larger than max allowed TTL {}",
                        requested, max
                    )));
                }
            }
            requested
        }
        None => default_ttl,
    };

    if ttl <= 0 {
        return Err(Error::validation(format!("TTL must be positive, got {}", ttl)));
    }

    Ok(Utc::now() + Duration::hours(ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_within_ceiling() {
        let before = Utc::now();
        let end = resolve_end_date(Some(24), Some(100), 720).unwrap();
        let after = Utc::now();

        assert!(end >= before + Duration::hours(24));
        assert!(end <= after + Duration::hours(24));
    }

    #[test]
    fn test_requested_above_ceiling_rejected() {
        let err = resolve_end_date(Some(101), Some(100), 720).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("larger than max allowed TTL 100"));
    }

    #[test]
    fn test_default_used_when_no_request() {
        let before = Utc::now();
        let end = resolve_end_date(None, Some(10_000), 720).unwrap();
        let after = Utc::now();

        assert!(end >= before + Duration::hours(720));
        assert!(end <= after + Duration::hours(720));
    }

    #[test]
    fn test_default_not_checked_against_ceiling() {
        // Only a *requested* TTL is bounded; the configured default is
        // validated once at startup instead.
        assert!(resolve_end_date(None, Some(10), 720).is_ok());
    }

    #[test]
    fn test_no_ceiling_accepts_any_request() {
        assert!(resolve_end_date(Some(1_000_000), None, 720).is_ok());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        assert!(resolve_end_date(Some(0), None, 720).is_err());
        assert!(resolve_end_date(Some(-5), None, 720).is_err());
    }
}
