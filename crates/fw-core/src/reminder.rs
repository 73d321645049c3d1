//! Reminder configurations and the partial updates applied to them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BabyId, ChannelPolicy, ConfigurationId, Scope, ToneProfile, ValidationError};

const MAX_INTERVAL_HOURS: i64 = 23;
const MAX_INTERVAL_MINUTES: i64 = 59;

/// Time between feedings after which a reminder becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub hours: u32,
    pub minutes: u32,
}

impl Interval {
    /// Builds an interval from untrusted components.
    ///
    /// Hours are bounded to 0..=23 and minutes to 0..=59.
    pub fn new(hours: i64, minutes: i64) -> Result<Self, ValidationError> {
        Ok(Self {
            hours: check_component("interval hours", hours, MAX_INTERVAL_HOURS)?,
            minutes: check_component("interval minutes", minutes, MAX_INTERVAL_MINUTES)?,
        })
    }

    /// `hours * 60 + minutes`. Zero means due on every evaluation.
    pub fn total_minutes(&self) -> i64 {
        i64::from(self.hours) * 60 + i64::from(self.minutes)
    }

    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.total_minutes())
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            hours: 3,
            minutes: 0,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hours, self.minutes) {
            (0, 0) => write!(f, "immediately"),
            (0, m) => write!(f, "{m}m"),
            (h, 0) => write!(f, "{h}h"),
            (h, m) => write!(f, "{h}h {m}m"),
        }
    }
}

fn check_component(field: &'static str, value: i64, max: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeInterval { field, value });
    }
    if value > max {
        return Err(ValidationError::IntervalOutOfRange { field, value, max });
    }
    u32::try_from(value).map_err(|_| ValidationError::IntervalOutOfRange { field, value, max })
}

/// Per-baby, per-scope reminder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfiguration {
    pub id: ConfigurationId,
    pub baby_id: BabyId,
    pub scope: Scope,
    pub enabled: bool,
    pub interval: Interval,
    pub channel_policy: ChannelPolicy,
    pub tone: ToneProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderConfiguration {
    /// Creates an enabled configuration with the canonical defaults:
    /// every 3 hours, both channels, default tone.
    pub fn with_defaults(baby_id: BabyId, scope: Scope, now: DateTime<Utc>) -> Self {
        Self {
            id: ConfigurationId::generate(),
            baby_id,
            scope,
            enabled: true,
            interval: Interval::default(),
            channel_policy: ChannelPolicy::Both,
            tone: ToneProfile::Default,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn interval_total_minutes(&self) -> i64 {
        self.interval.total_minutes()
    }
}

/// A partial update to a [`ReminderConfiguration`].
///
/// Interval components arrive unvalidated (they usually come straight from
/// user input) and are checked by [`ConfigurationUpdate::validate`]. Scope is
/// deliberately absent: a baby's scope set is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_policy: Option<ChannelPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<ToneProfile>,
}

impl ConfigurationUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Rejects out-of-range interval components.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(hours) = self.interval_hours {
            check_component("interval hours", hours, MAX_INTERVAL_HOURS)?;
        }
        if let Some(minutes) = self.interval_minutes {
            check_component("interval minutes", minutes, MAX_INTERVAL_MINUTES)?;
        }
        Ok(())
    }

    /// Returns `current` with this update applied and `updated_at` bumped.
    pub fn apply(
        &self,
        current: &ReminderConfiguration,
        now: DateTime<Utc>,
    ) -> Result<ReminderConfiguration, ValidationError> {
        let interval = Interval::new(
            self.interval_hours
                .unwrap_or_else(|| i64::from(current.interval.hours)),
            self.interval_minutes
                .unwrap_or_else(|| i64::from(current.interval.minutes)),
        )?;
        Ok(ReminderConfiguration {
            enabled: self.enabled.unwrap_or(current.enabled),
            interval,
            channel_policy: self.channel_policy.unwrap_or(current.channel_policy),
            tone: self.tone.unwrap_or(current.tone),
            updated_at: now,
            ..current.clone()
        })
    }
}
