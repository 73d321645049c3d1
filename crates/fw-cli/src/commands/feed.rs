//! Feeding record command.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use fw_core::{BabyProfile, FeedingEvent, Scope};
use fw_db::Database;

use super::util::parse_datetime;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    baby: &BabyProfile,
    twin: Option<Scope>,
    at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(twin) = twin {
        anyhow::ensure!(baby.is_twins, "{} is not a twins profile", baby.name);
        anyhow::ensure!(twin.is_twin(), "--twin must be a or b");
    }
    let occurred_at = match at {
        Some(at) => parse_datetime(at, now)?,
        None => now,
    };
    anyhow::ensure!(occurred_at <= now, "feeding time is in the future");

    db.insert_feeding(&FeedingEvent {
        baby_id: baby.id.clone(),
        occurred_at,
        twin,
    })
    .context("failed to record feeding")?;

    let who = match twin {
        Some(twin) => format!("{} ({})", baby.name, twin.label()),
        None => baby.name.clone(),
    };
    writeln!(
        writer,
        "Recorded feeding for {who} at {}",
        occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    Ok(())
}
