//! Push payload command.

use std::io::{Read, Write};

use anyhow::{Context, Result};

use fw_core::{ChannelOutcome, Dispatcher, PushPayload};

/// Reads one push payload and shows it without checking whether anything
/// is due. Empty input shows the generic reminder.
pub fn run<R: Read, W: Write>(writer: &mut W, mut input: R, dispatcher: &Dispatcher) -> Result<()> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .context("failed to read push payload")?;
    let payload: PushPayload = if raw.trim().is_empty() {
        PushPayload::default()
    } else {
        serde_json::from_str(&raw).context("invalid push payload")?
    };

    let report = dispatcher.dispatch_push(&payload);
    if report.visual != ChannelOutcome::Delivered {
        writeln!(writer, "Push reminder not shown: {}", report.visual)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use insta::assert_snapshot;

    use crate::Config;
    use crate::host::{SharedWriter, terminal_host};

    fn dispatcher(notifications: bool) -> (Dispatcher, Arc<Mutex<Vec<u8>>>) {
        let alerts = Arc::new(Mutex::new(Vec::<u8>::new()));
        let out: SharedWriter = alerts.clone();
        let config = Config {
            notifications,
            sound: false,
            ..Config::default()
        };
        let (host, _) = terminal_host(&config, out);
        (Dispatcher::new(host), alerts)
    }

    #[test]
    fn empty_input_shows_generic_reminder() {
        let (dispatcher, alerts) = dispatcher(true);
        let mut output = Vec::new();

        run(&mut output, &b""[..], &dispatcher).unwrap();

        assert!(output.is_empty());
        assert_snapshot!(String::from_utf8(alerts.lock().unwrap().clone()).unwrap(), @r"
        [feeding-reminder] Feeding reminder
          Time to feed the baby!
          actions: record (Record now), snooze (Remind me later)
        ");
    }

    #[test]
    fn denied_notifications_are_reported() {
        let (dispatcher, alerts) = dispatcher(false);
        let mut output = Vec::new();

        run(&mut output, &br#"{"body":"Feed now"}"#[..], &dispatcher).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "Push reminder not shown: denied\n");
        assert!(alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let (dispatcher, _alerts) = dispatcher(true);
        assert!(run(&mut Vec::new(), &b"[1, 2"[..], &dispatcher).is_err());
    }
}
