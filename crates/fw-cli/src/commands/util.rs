//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use fw_core::{BabyId, BabyProfile, ReminderConfiguration};
use fw_db::Database;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day)s?\s+ago$").unwrap());

/// Feedings are never back-dated more than this (one year in minutes).
const MAX_RELATIVE_MINUTES: i64 = 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "now", "30 minutes ago", "2 hours ago", "1 day ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if s == "now" {
        return Ok(now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Looks up a baby by ID, failing with a readable message if it is unknown.
pub fn find_baby(db: &Database, id: &str) -> anyhow::Result<BabyProfile> {
    let id = BabyId::new(id)?;
    db.get_baby(&id)?
        .with_context(|| format!("no baby with ID {id} (see `fw baby list`)"))
}

/// One line per configuration, aligned for reading in a terminal.
pub fn format_configuration(cfg: &ReminderConfiguration) -> String {
    format!(
        "{}  {:<8} {:<4} every {:<12} {:<8} tone {}",
        cfg.id,
        cfg.scope.as_str(),
        if cfg.enabled { "on" } else { "off" },
        cfg.interval.to_string(),
        cfg.channel_policy.as_str(),
        cfg.tone,
    )
}
