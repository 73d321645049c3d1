//! Reminder settings commands.

use std::io::Write;

use anyhow::{Context, Result};

use fw_core::{BabyProfile, ConfigurationId, ConfigurationUpdate, ReminderSettings};

use super::util::format_configuration;

/// Shows a baby's settings, creating the defaults on first access.
pub fn show<W: Write>(
    writer: &mut W,
    settings: &ReminderSettings,
    baby: &BabyProfile,
    json: bool,
) -> Result<()> {
    let configurations = settings
        .ensure_defaults(baby)
        .context("failed to load reminder settings")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&configurations)?)?;
        return Ok(());
    }

    writeln!(writer, "Reminder settings for {} ({})", baby.name, baby.id)?;
    for cfg in &configurations {
        writeln!(writer, "  {}", format_configuration(cfg))?;
    }
    Ok(())
}

/// Applies a partial update to one configuration.
pub fn update<W: Write>(
    writer: &mut W,
    settings: &ReminderSettings,
    id: &str,
    update: &ConfigurationUpdate,
) -> Result<()> {
    anyhow::ensure!(
        !update.is_empty(),
        "nothing to update: pass at least one of --enabled, --hours, --minutes, --policy, --tone"
    );
    let id = ConfigurationId::new(id)?;
    let updated = settings
        .update_setting(&id, update)
        .with_context(|| format!("failed to update reminder setting {id}"))?;
    writeln!(writer, "Updated {}", format_configuration(&updated))?;
    Ok(())
}
