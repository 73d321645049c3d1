//! Terminal implementations of the host surfaces.
//!
//! Alerts are printed to a shared writer (stdout in the binary), audible
//! reminders ring the terminal bell on stderr, and background checks run
//! as tokio tasks next to the foreground scheduler.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinSet;

use fw_core::alert::AlertTarget;
use fw_core::host::{AudioBackend, NotificationSurface, RecordEntry, Tone, ToneSink, Unsupported};
use fw_core::{
    Alert, BackgroundBridge, BackgroundHost, Capability, DispatchReport, Host, HostError,
    PushPayload,
};

use crate::Config;

/// Output shared by every surface that prints.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

pub fn stdout_writer() -> SharedWriter {
    Arc::new(Mutex::new(std::io::stdout()))
}

pub fn stderr_writer() -> SharedWriter {
    Arc::new(Mutex::new(std::io::stderr()))
}

/// Prints alerts and remembers the last one that offered actions.
pub struct TerminalNotifications {
    permitted: bool,
    out: SharedWriter,
    last: Mutex<Option<Alert>>,
}

impl TerminalNotifications {
    pub fn new(permitted: bool, out: SharedWriter) -> Self {
        Self {
            permitted,
            out,
            last: Mutex::new(None),
        }
    }

    /// The most recent alert a user could act on.
    pub fn last_alert(&self) -> Option<Alert> {
        lock(&self.last).clone()
    }
}

impl NotificationSurface for TerminalNotifications {
    fn request_permission(&self) -> Capability {
        if self.permitted {
            Capability::Available
        } else {
            Capability::Denied
        }
    }

    fn present(&self, alert: &Alert) -> Result<(), HostError> {
        write_alert(&mut *lock(&self.out), alert).map_err(|err| HostError::Failed {
            surface: "terminal notifications",
            message: err.to_string(),
        })?;
        if !alert.actions.is_empty() {
            *lock(&self.last) = Some(alert.clone());
        }
        Ok(())
    }
}

fn write_alert(out: &mut (dyn Write + Send), alert: &Alert) -> std::io::Result<()> {
    writeln!(out, "[{}] {}", alert.tag, alert.title)?;
    writeln!(out, "  {}", alert.body)?;
    if !alert.actions.is_empty() {
        let actions: Vec<String> = alert
            .actions
            .iter()
            .map(|action| format!("{} ({})", action.as_str(), action.title()))
            .collect();
        writeln!(out, "  actions: {}", actions.join(", "))?;
    }
    out.flush()
}

/// Audio backend that rings the terminal bell (stderr in the binary).
pub struct TerminalBell {
    enabled: bool,
    out: SharedWriter,
}

impl TerminalBell {
    pub fn new(enabled: bool, out: SharedWriter) -> Self {
        Self { enabled, out }
    }
}

impl AudioBackend for TerminalBell {
    fn open(&self) -> Result<Box<dyn ToneSink>, HostError> {
        if self.enabled {
            Ok(Box::new(BellSink(Arc::clone(&self.out))))
        } else {
            Err(HostError::Unavailable("sound"))
        }
    }
}

struct BellSink(SharedWriter);

impl ToneSink for BellSink {
    fn play(&mut self, tone: &Tone) -> Result<(), HostError> {
        tracing::debug!(frequency_hz = tone.frequency_hz, "ringing terminal bell");
        let mut out = lock(&self.0);
        out.write_all(b"\x07")
            .and_then(|()| out.flush())
            .map_err(|err| HostError::Failed {
                surface: "terminal bell",
                message: err.to_string(),
            })
    }
}

/// Points the user at the command that records a feeding.
pub struct RecordHint {
    out: SharedWriter,
}

impl RecordHint {
    pub fn new(out: SharedWriter) -> Self {
        Self { out }
    }
}

impl RecordEntry for RecordHint {
    fn open_add_record(&self, target: Option<&AlertTarget>) {
        let hint = match target {
            Some(target) if target.scope.is_twin() => {
                format!("fw feed {} --twin {}", target.baby_id, target.scope)
            }
            Some(target) => format!("fw feed {}", target.baby_id),
            None => "fw feed <baby>".to_string(),
        };
        let mut out = lock(&self.out);
        if let Err(err) = writeln!(out, "Record the feeding with: {hint}").and_then(|()| out.flush()) {
            tracing::warn!(error = %err, "failed to print record hint");
        }
    }
}

/// Builds the terminal host from configuration, ringing the bell on stderr.
///
/// Returns the notification surface separately so callers can act on the
/// last alert shown.
pub fn terminal_host(config: &Config, out: SharedWriter) -> (Host, Arc<TerminalNotifications>) {
    terminal_host_with_bell(config, out, stderr_writer())
}

/// Like [`terminal_host`], with the bell written to `bell`.
pub fn terminal_host_with_bell(
    config: &Config,
    out: SharedWriter,
    bell: SharedWriter,
) -> (Host, Arc<TerminalNotifications>) {
    let notifications = Arc::new(TerminalNotifications::new(
        config.notifications,
        Arc::clone(&out),
    ));
    let host = Host {
        notifications: Arc::clone(&notifications) as Arc<dyn NotificationSurface>,
        audio: Arc::new(TerminalBell::new(config.sound, bell)),
        vibrator: Arc::new(Unsupported),
        records: Arc::new(RecordHint::new(out)),
    };
    (host, notifications)
}

/// Background facility for a long-running terminal session.
///
/// Periodic checks run as tokio tasks. Push messages arrive on stdin and are
/// handed to [`TaskBackground::push`]. There is no connectivity trigger, so
/// one-shot background sync is not offered.
pub struct TaskBackground {
    period: Option<Duration>,
    tasks: Mutex<JoinSet<()>>,
    push: Mutex<Option<Arc<BackgroundBridge>>>,
}

impl TaskBackground {
    /// `period` of `None` turns periodic checks off.
    pub fn new(period: Option<Duration>) -> Self {
        Self {
            period,
            tasks: Mutex::new(JoinSet::new()),
            push: Mutex::new(None),
        }
    }

    /// Delivers a push message to the registered bridge.
    ///
    /// Returns `None` when no bridge registered for push.
    pub fn push(&self, payload: &PushPayload) -> Option<DispatchReport> {
        let bridge = lock(&self.push).clone()?;
        Some(bridge.on_push(payload))
    }

    /// Cancels periodic checks.
    pub fn shutdown(&self) {
        lock(&self.tasks).abort_all();
    }
}

impl BackgroundHost for TaskBackground {
    fn register_sync(&self, _tag: &str, _bridge: Arc<BackgroundBridge>) -> Result<(), HostError> {
        Err(HostError::Unavailable("background sync"))
    }

    fn register_periodic(
        &self,
        tag: &str,
        period: Duration,
        bridge: Arc<BackgroundBridge>,
    ) -> Result<(), HostError> {
        let Some(configured) = self.period else {
            return Err(HostError::Unavailable("periodic background sync"));
        };
        let handle = Handle::try_current().map_err(|err| HostError::Failed {
            surface: "periodic background sync",
            message: err.to_string(),
        })?;
        // The configured period wins over the requested one.
        tracing::debug!(requested = ?period, ?configured, "periodic background checks");
        let tag = tag.to_string();
        lock(&self.tasks).spawn_on(
            async move {
                let start = tokio::time::Instant::now() + configured;
                let mut interval = tokio::time::interval_at(start, configured);
                loop {
                    interval.tick().await;
                    bridge.on_wake(&tag).await;
                }
            },
            &handle,
        );
        Ok(())
    }

    fn register_push(&self, bridge: Arc<BackgroundBridge>) -> Result<(), HostError> {
        *lock(&self.push) = Some(bridge);
        Ok(())
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
