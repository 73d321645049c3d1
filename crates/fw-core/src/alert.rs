//! Alerts shown on the visual channel and the actions they offer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{BabyId, Scope, ValidationError};

/// Tag shared by every feeding reminder so hosts can coalesce them.
pub const REMINDER_TAG: &str = "feeding-reminder";
/// Tag of the notice confirming a snooze.
pub const SNOOZE_TAG: &str = "snooze-notification";

const DEFAULT_PUSH_TITLE: &str = "Feeding reminder";
const DEFAULT_PUSH_BODY: &str = "Time to feed the baby!";
const DEFAULT_PUSH_VIBRATION: [u32; 5] = [200, 100, 200, 100, 200];

/// A user action offered on a reminder alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
    /// Open the add-record flow.
    RecordNow,
    /// Re-alert after a fixed delay.
    Snooze,
}

impl AlertAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RecordNow => "record",
            Self::Snooze => "snooze",
        }
    }

    pub const fn title(&self) -> &'static str {
        match self {
            Self::RecordNow => "Record now",
            Self::Snooze => "Remind me later",
        }
    }
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "record" | "record_now" | "feed" => Ok(Self::RecordNow),
            "snooze" => Ok(Self::Snooze),
            _ => Err(ValidationError::UnknownValue {
                kind: "alert action",
                value: s.to_string(),
            }),
        }
    }
}

/// Which baby and scope an alert is about, for routing "record now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTarget {
    pub baby_id: BabyId,
    pub scope: Scope,
}

/// A system-level alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub tag: String,
    /// Stays visible until the user acknowledges it.
    pub sticky: bool,
    pub actions: Vec<AlertAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<AlertTarget>,
}

impl Alert {
    /// The feeding reminder for one baby scope.
    pub fn reminder(baby_name: &str, baby_id: &BabyId, scope: Scope) -> Self {
        let body = if scope.is_twin() {
            format!("Time to feed {baby_name} ({})!", scope.label())
        } else {
            format!("Time to feed {baby_name}!")
        };
        Self {
            title: format!("{baby_name} - Feeding reminder"),
            body,
            tag: format!("{REMINDER_TAG}-{scope}"),
            sticky: true,
            actions: vec![AlertAction::RecordNow, AlertAction::Snooze],
            target: Some(AlertTarget {
                baby_id: baby_id.clone(),
                scope,
            }),
        }
    }

    /// An alert built from server-supplied push text.
    pub fn from_push(payload: &PushPayload) -> Self {
        Self {
            title: payload
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string()),
            body: payload
                .body
                .clone()
                .unwrap_or_else(|| DEFAULT_PUSH_BODY.to_string()),
            tag: payload
                .tag
                .clone()
                .unwrap_or_else(|| REMINDER_TAG.to_string()),
            sticky: true,
            actions: vec![AlertAction::RecordNow, AlertAction::Snooze],
            target: None,
        }
    }

    /// Confirms a snooze. Not sticky and offers no actions.
    pub fn snoozed(delay_minutes: u64) -> Self {
        Self {
            title: "Reminder snoozed".to_string(),
            body: format!("Will remind again in {delay_minutes} minutes"),
            tag: SNOOZE_TAG.to_string(),
            sticky: false,
            actions: Vec::new(),
            target: None,
        }
    }
}

/// A push message delivered by a server while the app may be suspended.
///
/// Every field is optional; missing fields fall back to generic reminder text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub vibrate: Option<Vec<u32>>,
}

impl PushPayload {
    /// Vibration pattern to use, in alternating on/off milliseconds.
    pub fn vibration_pattern(&self) -> &[u32] {
        self.vibrate.as_deref().unwrap_or(&DEFAULT_PUSH_VIBRATION)
    }
}
