//! Thread reference normalization.
//!
//! Callers hand us a parent-message reference in one of three dialects: the
//! canonical `1234567890.123456` timestamp, a 16-digit concatenation, or a
//! message permalink embedding `p<16 digits>`. Everything downstream works
//! with the canonical form only.

use crate::error::ValidationError;

pub fn normalize_thread_ts(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();

    if is_canonical(trimmed) {
        return Ok(trimmed.to_string());
    }

    if trimmed.len() == 16 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!("{}.{}", &trimmed[..10], &trimmed[10..]));
    }

    if let Some(digits) = permalink_digits(trimmed) {
        return Ok(format!("{}.{}", &digits[..10], &digits[10..]));
    }

    Err(ValidationError::BadThreadReference {
        value: raw.to_string(),
    })
}

fn is_canonical(value: &str) -> bool {
    let Some((seconds, fraction)) = value.split_once('.') else {
        return false;
    };
    seconds.len() == 10
        && fraction.len() == 6
        && seconds.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Pull `p<16 digits>` out of a permalink, ignoring any query string.
fn permalink_digits(value: &str) -> Option<&str> {
    let without_query = value.split(['?', '#']).next().unwrap_or(value);
    let segment = without_query.rsplit('/').next()?;
    let digits = segment.strip_prefix('p')?;
    (digits.len() == 16 && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::normalize_thread_ts;
    use crate::error::ValidationError;

    #[test]
    fn unit_normalize_accepts_all_three_input_forms() {
        let canonical = "1234567890.123456";
        assert_eq!(normalize_thread_ts(canonical).unwrap(), canonical);
        assert_eq!(normalize_thread_ts("1234567890123456").unwrap(), canonical);
        assert_eq!(
            normalize_thread_ts("https://acme.slack.com/archives/C0123/p1234567890123456")
                .unwrap(),
            canonical
        );
    }

    #[test]
    fn unit_normalize_ignores_permalink_query_string() {
        assert_eq!(
            normalize_thread_ts(
                "https://acme.slack.com/archives/C0123/p1234567890123456?thread_ts=1.2&cid=C0123"
            )
            .unwrap(),
            "1234567890.123456"
        );
    }

    #[test]
    fn unit_normalize_rejects_malformed_references() {
        for bad in [
            "",
            "123",
            "123456789.123456",
            "1234567890.12345",
            "123456789012345",
            "12345678901234567",
            "1234567890.12345a",
            "https://acme.slack.com/archives/C0123/x1234567890123456",
        ] {
            assert!(
                matches!(
                    normalize_thread_ts(bad),
                    Err(ValidationError::BadThreadReference { .. })
                ),
                "expected rejection for {bad:?}"
            );
        }
    }
}
