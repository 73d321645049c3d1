//! Multi-channel actuation of due reminders.
//!
//! The dispatcher is a best-effort actuator: each channel (visual, audible,
//! haptic) is attempted independently, failures degrade the channel, and
//! nothing is ever returned to the caller as an error. The returned
//! [`DispatchReport`] says what happened on each channel.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinSet;

use crate::alert::{Alert, AlertAction, PushPayload};
use crate::host::{Capability, Host, NotificationSurface, Tone, ToneSink};
use crate::reminder::ReminderConfiguration;
use crate::types::Scope;

/// Delay before a snoozed reminder is shown again.
pub const SNOOZE_DELAY: Duration = Duration::from_secs(15 * 60);

/// Offsets at which the tone is repeated to approximate an alarm.
pub const TONE_OFFSETS: [Duration; 3] = [
    Duration::ZERO,
    Duration::from_millis(500),
    Duration::from_millis(1000),
];

/// Haptic pulse pattern: on/off durations in milliseconds.
pub const VIBRATION_PATTERN: [u32; 5] = [200, 100, 200, 100, 200];

/// What happened on one channel during a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOutcome {
    Delivered,
    /// The channel policy does not include this channel.
    NotRequested,
    Unavailable,
    Denied,
    Failed,
}

impl ChannelOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::NotRequested => "not requested",
            Self::Unavailable => "unavailable",
            Self::Denied => "denied",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel outcome of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub visual: ChannelOutcome,
    pub audible: ChannelOutcome,
    pub haptic: ChannelOutcome,
}

enum AudioState {
    Uninitialized,
    Ready(Box<dyn ToneSink>),
    /// Initialization failed; the audible channel stays off for the session.
    Disabled,
}

/// Actuates due reminders across the host's output channels.
///
/// Owns the notification-permission decision and the lazily opened audio
/// context. Deferred work (tone repeats, snoozes) is tracked and cancelled
/// by [`Dispatcher::shutdown`]; [`Dispatcher::finish_tones`] lets pending
/// tone repeats play out first.
pub struct Dispatcher {
    host: Host,
    permission: Mutex<Option<Capability>>,
    audio: Arc<Mutex<AudioState>>,
    tones: Mutex<JoinSet<()>>,
    snoozes: Mutex<JoinSet<()>>,
    snooze_delay: Duration,
}

impl Dispatcher {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            permission: Mutex::new(None),
            audio: Arc::new(Mutex::new(AudioState::Uninitialized)),
            tones: Mutex::new(JoinSet::new()),
            snoozes: Mutex::new(JoinSet::new()),
            snooze_delay: SNOOZE_DELAY,
        }
    }

    /// Overrides the snooze delay.
    pub fn with_snooze_delay(mut self, delay: Duration) -> Self {
        self.snooze_delay = delay;
        self
    }

    /// Settles the notification permission up front instead of on first use.
    pub fn init(&self) -> Capability {
        self.notification_permission()
    }

    /// Waits until every tone repeat scheduled so far has played.
    ///
    /// Snoozes are left pending.
    pub async fn finish_tones(&self) {
        let mut tones = std::mem::take(&mut *lock(&self.tones));
        while let Some(joined) = tones.join_next().await {
            if let Err(err) = joined {
                tracing::debug!(error = %err, "tone repeat did not finish");
            }
        }
    }

    /// Cancels deferred tones and snoozes and releases the audio context.
    pub fn shutdown(&self) {
        lock(&self.tones).abort_all();
        lock(&self.snoozes).abort_all();
        let mut audio = lock(&self.audio);
        if matches!(*audio, AudioState::Ready(_)) {
            *audio = AudioState::Uninitialized;
        }
    }

    /// Actuates one due reminder on every channel the configuration asks for.
    pub fn dispatch(
        &self,
        baby_name: &str,
        scope: Scope,
        configuration: &ReminderConfiguration,
    ) -> DispatchReport {
        let alert = Alert::reminder(baby_name, &configuration.baby_id, scope);
        let policy = configuration.channel_policy;

        let report = DispatchReport {
            visual: self.present(&alert),
            audible: if policy.includes_audible() {
                self.play_alarm(Tone::for_profile(configuration.tone))
            } else {
                ChannelOutcome::NotRequested
            },
            haptic: if policy.includes_haptic() {
                self.vibrate(&VIBRATION_PATTERN)
            } else {
                ChannelOutcome::NotRequested
            },
        };
        tracing::info!(
            config_id = %configuration.id,
            scope = %scope,
            visual = ?report.visual,
            audible = ?report.audible,
            haptic = ?report.haptic,
            "reminder dispatched"
        );
        report
    }

    /// Shows a server-pushed alert without evaluating due-ness.
    pub fn dispatch_push(&self, payload: &PushPayload) -> DispatchReport {
        let alert = Alert::from_push(payload);
        let report = DispatchReport {
            visual: self.present(&alert),
            audible: ChannelOutcome::NotRequested,
            haptic: self.vibrate(payload.vibration_pattern()),
        };
        tracing::info!(
            tag = %alert.tag,
            visual = ?report.visual,
            haptic = ?report.haptic,
            "push reminder dispatched"
        );
        report
    }

    /// Handles a user action taken on `alert`.
    pub fn handle_action(&self, action: AlertAction, alert: &Alert) {
        tracing::debug!(action = %action, tag = %alert.tag, "alert action");
        match action {
            AlertAction::RecordNow => self.host.records.open_add_record(alert.target.as_ref()),
            AlertAction::Snooze => self.snooze(alert),
        }
    }

    fn snooze(&self, alert: &Alert) {
        if self.notification_permission() != Capability::Available {
            return;
        }
        let minutes = self.snooze_delay.as_secs() / 60;
        if let Err(err) = self.host.notifications.present(&Alert::snoozed(minutes)) {
            tracing::warn!(error = %err, "failed to show snooze notice");
        }

        let notifications = Arc::clone(&self.host.notifications);
        let alert = alert.clone();
        let delay = self.snooze_delay;
        defer(&self.snoozes, async move {
            tokio::time::sleep(delay).await;
            present_on(notifications.as_ref(), &alert);
        });
    }

    fn notification_permission(&self) -> Capability {
        *lock(&self.permission).get_or_insert_with(|| {
            let decision = self.host.notifications.request_permission();
            if decision != Capability::Available {
                tracing::warn!(?decision, "notifications not permitted, visual alerts disabled");
            }
            decision
        })
    }

    fn present(&self, alert: &Alert) -> ChannelOutcome {
        match self.notification_permission() {
            Capability::Available => present_on(self.host.notifications.as_ref(), alert),
            Capability::Denied => ChannelOutcome::Denied,
            Capability::Unavailable => ChannelOutcome::Unavailable,
        }
    }

    fn play_alarm(&self, tone: Tone) -> ChannelOutcome {
        let outcome = {
            let mut audio = lock(&self.audio);
            if matches!(*audio, AudioState::Uninitialized) {
                *audio = match self.host.audio.open() {
                    Ok(sink) => AudioState::Ready(sink),
                    Err(err) => {
                        tracing::warn!(error = %err, "audio unavailable, audible channel disabled");
                        AudioState::Disabled
                    }
                };
            }
            match &mut *audio {
                AudioState::Ready(sink) => play_on(sink.as_mut(), &tone),
                AudioState::Disabled | AudioState::Uninitialized => ChannelOutcome::Unavailable,
            }
        };
        if outcome != ChannelOutcome::Delivered {
            return outcome;
        }

        for offset in &TONE_OFFSETS[1..] {
            let audio = Arc::clone(&self.audio);
            let offset = *offset;
            defer(&self.tones, async move {
                tokio::time::sleep(offset).await;
                if let AudioState::Ready(sink) = &mut *lock(&audio) {
                    play_on(sink.as_mut(), &tone);
                }
            });
        }
        outcome
    }

    fn vibrate(&self, pattern: &[u32]) -> ChannelOutcome {
        match self.host.vibrator.capability() {
            Capability::Available => match self.host.vibrator.vibrate(pattern) {
                Ok(()) => ChannelOutcome::Delivered,
                Err(err) => {
                    tracing::warn!(error = %err, "vibration failed");
                    ChannelOutcome::Failed
                }
            },
            Capability::Denied => ChannelOutcome::Denied,
            Capability::Unavailable => ChannelOutcome::Unavailable,
        }
    }

}

/// Spawns deferred work into `set` on the current runtime, if there is one.
fn defer<F>(set: &Mutex<JoinSet<()>>, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        tracing::debug!("no async runtime, deferred alert work skipped");
        return;
    };
    let mut pending = lock(set);
    while pending.try_join_next().is_some() {}
    pending.spawn_on(task, &handle);
}

fn present_on(notifications: &dyn NotificationSurface, alert: &Alert) -> ChannelOutcome {
    match notifications.present(alert) {
        Ok(()) => ChannelOutcome::Delivered,
        Err(err) => {
            tracing::warn!(error = %err, tag = %alert.tag, "failed to present alert");
            ChannelOutcome::Failed
        }
    }
}

fn play_on(sink: &mut dyn ToneSink, tone: &Tone) -> ChannelOutcome {
    match sink.play(tone) {
        Ok(()) => ChannelOutcome::Delivered,
        Err(err) => {
            tracing::warn!(error = %err, "failed to play tone");
            ChannelOutcome::Failed
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
