//! One-off reminder check.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use fw_core::{BabyProfile, TriggerMemory};

use crate::session::Session;

/// Evaluates the baby's reminders once and dispatches whatever is due.
///
/// Nothing is remembered between invocations: a reminder that stays due
/// is shown again by the next `fw check`.
pub async fn run<W: Write>(
    writer: &mut W,
    session: &Session,
    baby: &BabyProfile,
    now: DateTime<Utc>,
) -> Result<usize> {
    let memory = Mutex::new(TriggerMemory::new());
    let dispatched = session
        .evaluator
        .evaluate_and_dispatch(baby, &memory, now)
        .await
        .context("reminder check failed")?;

    match dispatched.len() {
        0 => writeln!(writer, "No reminders due for {}.", baby.name)?,
        1 => writeln!(writer, "1 reminder due for {}.", baby.name)?,
        n => writeln!(writer, "{n} reminders due for {}.", baby.name)?,
    }
    Ok(dispatched.len())
}
