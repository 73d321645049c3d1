//! Baby profile commands.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use fw_core::{BabyId, BabyProfile, ReminderSettings};
use fw_db::SqliteStore;

use super::util::format_configuration;

/// Adds a baby and creates its default reminder settings.
pub fn add<W: Write>(
    writer: &mut W,
    store: &Arc<SqliteStore>,
    name: &str,
    twins: bool,
    id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<BabyProfile> {
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "baby name must not be empty");
    let id = match id {
        Some(id) => BabyId::new(id)?,
        None => BabyId::generate(),
    };
    let baby = BabyProfile {
        id,
        name: name.to_string(),
        is_twins: twins,
    };
    store
        .database()
        .insert_baby(&baby, now)
        .context("failed to add baby")?;

    let settings = ReminderSettings::new(store.clone());
    let configurations = settings
        .ensure_defaults(&baby)
        .context("failed to create default reminder settings")?;

    writeln!(
        writer,
        "Added {}{} ({})",
        baby.name,
        if baby.is_twins { " (twins)" } else { "" },
        baby.id
    )?;
    for cfg in &configurations {
        writeln!(writer, "  {}", format_configuration(cfg))?;
    }
    Ok(baby)
}

#[derive(Serialize)]
struct BabyRow<'a> {
    id: &'a str,
    name: &'a str,
    twins: bool,
}

pub fn list<W: Write>(writer: &mut W, store: &SqliteStore, json: bool) -> Result<()> {
    let babies = store.database().list_babies()?;

    if json {
        let rows: Vec<BabyRow<'_>> = babies
            .iter()
            .map(|baby| BabyRow {
                id: baby.id.as_str(),
                name: &baby.name,
                twins: baby.is_twins,
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }

    if babies.is_empty() {
        writeln!(writer, "No babies yet. Add one with `fw baby add <name>`.")?;
        return Ok(());
    }
    for baby in &babies {
        let twins = if baby.is_twins { "  twins" } else { "" };
        writeln!(writer, "{}  {}{twins}", baby.id, baby.name)?;
    }
    Ok(())
}
