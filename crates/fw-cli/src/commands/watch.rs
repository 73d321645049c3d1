//! Long-running reminder session.
//!
//! Runs the foreground scheduler and, unless disabled, periodic background
//! checks through the bridge. Stdin lines act on the last alert shown
//! (`record`, `snooze`) or deliver a push payload (a JSON object).

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use fw_core::{AlertAction, BackgroundBridge, ChannelOutcome, PushPayload, Scheduler};

use crate::host::TaskBackground;
use crate::session::Session;

/// What the user can type while watching.
const PROMPT: &str = "Type `record` or `snooze` to act on the last alert, paste a JSON push payload, or `quit`.";

pub async fn run<R, W>(
    writer: &mut W,
    input: R,
    session: &Session,
    period: Duration,
    background_period: Option<Duration>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let Some(baby) = session.active.get() else {
        anyhow::bail!("no baby selected");
    };

    let background = TaskBackground::new(background_period);
    let bridge = Arc::new(BackgroundBridge::new(
        Arc::clone(&session.evaluator),
        session.active.clone(),
    ));
    let registrations = bridge.enable(&background);
    tracing::debug!(?registrations, "background continuity for watch session");

    writeln!(
        writer,
        "Watching {} (checking every {}).",
        baby.name,
        describe_period(period)
    )?;
    writeln!(writer, "{PROMPT}")?;
    writer.flush()?;
    let scheduler = Scheduler::new(Arc::clone(&session.evaluator), session.active.clone());
    scheduler.start(period).await;

    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if matches!(line, "quit" | "exit") {
            break;
        }
        if let Some(reply) = handle_line(line, session, &background) {
            writeln!(writer, "{reply}")?;
        }
    }

    scheduler.shutdown().await;
    background.shutdown();
    writeln!(writer, "Stopped watching {}.", baby.name)?;
    Ok(())
}

/// Handles one line of user input. Returns a message for the user, if any.
///
/// Bad input is reported, never fatal: the session keeps running.
pub fn handle_line(line: &str, session: &Session, background: &TaskBackground) -> Option<String> {
    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        let payload: PushPayload = match serde_json::from_str(line) {
            Ok(payload) => payload,
            Err(err) => return Some(format!("Invalid push payload: {err}")),
        };
        let report = background
            .push(&payload)
            .unwrap_or_else(|| session.dispatcher.dispatch_push(&payload));
        return (report.visual != ChannelOutcome::Delivered)
            .then(|| format!("Push reminder not shown: {}", report.visual));
    }

    let action: AlertAction = match line.parse() {
        Ok(action) => action,
        Err(_) => return Some(format!("Unknown input: {line}. {PROMPT}")),
    };
    let Some(alert) = session.notifications.last_alert() else {
        return Some("No alert to act on yet.".to_string());
    };
    session.dispatcher.handle_action(action, &alert);
    None
}

fn describe_period(period: Duration) -> String {
    let secs = period.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else {
        format!("{period:?}")
    }
}
