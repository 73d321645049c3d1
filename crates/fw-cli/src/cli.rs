//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fw_core::{ChannelPolicy, ConfigurationUpdate, Scope, ToneProfile};

/// Feeding reminders.
///
/// Keeps track of when each baby (or each twin) was last fed and reminds
/// you, by notification, sound or vibration, when the next feeding is due.
#[derive(Debug, Parser)]
#[command(name = "fw", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage baby profiles.
    #[command(subcommand)]
    Baby(BabyAction),

    /// Show or change reminder settings.
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Record a feeding.
    Feed {
        /// The baby's ID.
        baby: String,

        /// Which twin was fed (a or b). Omit when both were fed.
        #[arg(long)]
        twin: Option<Scope>,

        /// When the feeding happened (ISO 8601 or e.g. "20 minutes ago").
        #[arg(long)]
        at: Option<String>,
    },

    /// Run one reminder check and show anything that is due.
    Check {
        /// The baby's ID.
        baby: String,
    },

    /// Keep checking for due reminders until interrupted.
    ///
    /// Reads actions from stdin: `record`, `snooze`, or a JSON push payload.
    Watch {
        /// The baby's ID.
        baby: String,

        /// Minutes between checks (overrides `poll_period_minutes`).
        #[arg(long)]
        every: Option<u64>,
    },

    /// Show a pushed reminder read as JSON from stdin.
    Push,
}

/// Baby profile actions.
#[derive(Debug, Subcommand)]
pub enum BabyAction {
    /// Add a baby and create its default reminder settings.
    Add {
        /// Display name.
        name: String,

        /// The profile is for twins.
        #[arg(long)]
        twins: bool,

        /// Use this ID instead of a generated one.
        #[arg(long)]
        id: Option<String>,
    },

    /// List babies.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Reminder settings actions.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Show a baby's reminder settings, creating the defaults if needed.
    Show {
        /// The baby's ID.
        baby: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Change one reminder configuration.
    Update {
        /// The configuration ID (see `fw settings show`).
        id: String,

        #[command(flatten)]
        changes: SettingsChanges,
    },
}

/// Fields accepted by `fw settings update`.
#[derive(Debug, Args)]
pub struct SettingsChanges {
    /// Turn the reminder on or off.
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Interval hours (0-23).
    #[arg(long, allow_negative_numbers = true)]
    pub hours: Option<i64>,

    /// Interval minutes (0-59).
    #[arg(long, allow_negative_numbers = true)]
    pub minutes: Option<i64>,

    /// Channels to use: haptic, audible or both.
    #[arg(long)]
    pub policy: Option<ChannelPolicy>,

    /// Alarm tone: default, gentle, lively or warm.
    #[arg(long)]
    pub tone: Option<ToneProfile>,
}

impl From<&SettingsChanges> for ConfigurationUpdate {
    fn from(changes: &SettingsChanges) -> Self {
        Self {
            enabled: changes.enabled,
            interval_hours: changes.hours,
            interval_minutes: changes.minutes,
            channel_policy: changes.policy,
            tone: changes.tone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_interval_reaches_validation() {
        let cli = Cli::try_parse_from(["fw", "settings", "update", "cfg-1", "--minutes", "-5"])
            .unwrap();
        let Some(Commands::Settings(SettingsAction::Update { changes, .. })) = cli.command else {
            panic!("expected settings update");
        };
        assert_eq!(ConfigurationUpdate::from(&changes).interval_minutes, Some(-5));
    }

    #[test]
    fn twin_accepts_short_names() {
        let cli = Cli::try_parse_from(["fw", "feed", "baby-1", "--twin", "b"]).unwrap();
        let Some(Commands::Feed { twin, .. }) = cli.command else {
            panic!("expected feed");
        };
        assert_eq!(twin, Some(Scope::TwinB));
    }
}
