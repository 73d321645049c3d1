//! Due calculation: has enough time passed since the last feeding?

use chrono::{DateTime, Utc};

use crate::reminder::ReminderConfiguration;

/// Returns whether `configuration` is due at `now`.
///
/// - A disabled configuration is never due.
/// - With no recorded feeding for the scope, the configuration is due.
/// - Otherwise it is due once `now - last_feeding_at` reaches the interval.
///   The boundary is inclusive, so a zero interval is due on every
///   evaluation after a feeding.
pub fn is_due(
    now: DateTime<Utc>,
    configuration: &ReminderConfiguration,
    last_feeding_at: Option<DateTime<Utc>>,
) -> bool {
    if !configuration.enabled {
        return false;
    }
    let Some(last_feeding_at) = last_feeding_at else {
        return true;
    };
    now.signed_duration_since(last_feeding_at) >= configuration.interval.as_duration()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Interval;
    use crate::types::{BabyId, Scope};
    use chrono::Duration;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn config(hours: u32, minutes: u32) -> ReminderConfiguration {
        let mut cfg = ReminderConfiguration::with_defaults(
            BabyId::new("baby-1").unwrap(),
            Scope::Unified,
            ts("2025-03-01T00:00:00Z"),
        );
        cfg.interval = Interval { hours, minutes };
        cfg
    }

    #[test]
    fn disabled_is_never_due() {
        let mut cfg = config(0, 0);
        cfg.enabled = false;
        let now = ts("2025-03-01T12:00:00Z");
        assert!(!is_due(now, &cfg, None));
        assert!(!is_due(now, &cfg, Some(now - Duration::days(30))));
    }

    #[test]
    fn no_feeding_is_due() {
        assert!(is_due(ts("2025-03-01T12:00:00Z"), &config(3, 0), None));
    }

    #[test]
    fn becomes_due_exactly_at_interval() {
        let cfg = config(3, 0);
        let fed = ts("2025-03-01T09:00:00Z");

        assert!(!is_due(fed + Duration::minutes(179), &cfg, Some(fed)));
        assert!(!is_due(
            fed + Duration::minutes(180) - Duration::seconds(1),
            &cfg,
            Some(fed)
        ));
        assert!(is_due(fed + Duration::minutes(180), &cfg, Some(fed)));
        assert!(is_due(fed + Duration::minutes(181), &cfg, Some(fed)));
    }

    #[test]
    fn mixed_hours_and_minutes_interval() {
        let cfg = config(1, 30);
        let fed = ts("2025-03-01T09:00:00Z");
        assert!(!is_due(ts("2025-03-01T10:29:00Z"), &cfg, Some(fed)));
        assert!(is_due(ts("2025-03-01T10:30:00Z"), &cfg, Some(fed)));
    }

    #[test]
    fn zero_interval_is_due_right_after_feeding() {
        let cfg = config(0, 0);
        let fed = ts("2025-03-01T09:00:00Z");
        assert!(is_due(fed, &cfg, Some(fed)));
    }

    #[test]
    fn feeding_in_the_future_is_not_due() {
        let cfg = config(0, 30);
        let now = ts("2025-03-01T09:00:00Z");
        assert!(!is_due(now, &cfg, Some(now + Duration::minutes(5))));
    }
}
