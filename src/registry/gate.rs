use chrono::{DateTime, Utc};

/// Whether a subscription expiring at `expiry` is still active at `now`.
///
/// The expiry instant itself is already outside the subscription.
#[must_use]
pub fn is_entitled(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < expiry
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_entitlement_boundaries() {
        let expiry = Utc::now();
        assert!(is_entitled(expiry, expiry - Duration::seconds(1)));
        assert!(!is_entitled(expiry, expiry));
        assert!(!is_entitled(expiry, expiry + Duration::seconds(1)));
    }
}
