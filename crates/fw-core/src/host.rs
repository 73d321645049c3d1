//! Capability providers the dispatcher actuates through.
//!
//! Each output surface of the host (notifications, audio, vibration, the
//! add-record entry point) sits behind a trait so the dispatcher's branching
//! can be exercised without a real host environment.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::alert::{Alert, AlertTarget};
use crate::types::ToneProfile;

/// Whether a host capability can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Available,
    /// The host has no such capability.
    Unavailable,
    /// The capability exists but the user refused it.
    Denied,
}

/// Errors raised by host surfaces.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0} is not available on this host")]
    Unavailable(&'static str),
    #[error("{0} permission denied")]
    Denied(&'static str),
    #[error("{surface} failed: {message}")]
    Failed {
        surface: &'static str,
        message: String,
    },
}

/// The system notification surface.
pub trait NotificationSurface: Send + Sync {
    /// Asks the user for permission, or reports a decision already made.
    ///
    /// The dispatcher calls this once and caches the answer.
    fn request_permission(&self) -> Capability;

    fn present(&self, alert: &Alert) -> Result<(), HostError>;
}

/// A short synthesized tone: a sine oscillator whose gain decays
/// exponentially from `gain` to `floor_gain` over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration: Duration,
    pub gain: f32,
    pub floor_gain: f32,
}

impl Tone {
    pub const fn for_profile(profile: ToneProfile) -> Self {
        Self {
            frequency_hz: profile.frequency_hz(),
            duration: Duration::from_millis(300),
            gain: 0.3,
            floor_gain: 0.01,
        }
    }

    /// Gain at `elapsed` into the tone, zero once the tone has ended.
    pub fn gain_at(&self, elapsed: Duration) -> f32 {
        if elapsed >= self.duration {
            return 0.0;
        }
        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.gain * (self.floor_gain / self.gain).powf(progress)
    }
}

/// Creates audio-synthesis contexts.
pub trait AudioBackend: Send + Sync {
    /// Opens a synthesis context. Called lazily on the first audible dispatch.
    fn open(&self) -> Result<Box<dyn ToneSink>, HostError>;
}

/// An open audio-synthesis context.
pub trait ToneSink: Send {
    fn play(&mut self, tone: &Tone) -> Result<(), HostError>;
}

/// The device vibration motor.
pub trait Vibrator: Send + Sync {
    fn capability(&self) -> Capability;

    /// Vibrates with alternating on/off durations in milliseconds.
    fn vibrate(&self, pattern: &[u32]) -> Result<(), HostError>;
}

/// Entry point into the (external) add-record flow.
pub trait RecordEntry: Send + Sync {
    fn open_add_record(&self, target: Option<&AlertTarget>);
}

/// Stand-in for a surface the host does not have.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl NotificationSurface for Unsupported {
    fn request_permission(&self) -> Capability {
        Capability::Unavailable
    }

    fn present(&self, _alert: &Alert) -> Result<(), HostError> {
        Err(HostError::Unavailable("notifications"))
    }
}

impl AudioBackend for Unsupported {
    fn open(&self) -> Result<Box<dyn ToneSink>, HostError> {
        Err(HostError::Unavailable("audio"))
    }
}

impl Vibrator for Unsupported {
    fn capability(&self) -> Capability {
        Capability::Unavailable
    }

    fn vibrate(&self, _pattern: &[u32]) -> Result<(), HostError> {
        Err(HostError::Unavailable("vibration"))
    }
}

impl RecordEntry for Unsupported {
    fn open_add_record(&self, _target: Option<&AlertTarget>) {}
}

/// The set of surfaces handed to the dispatcher.
#[derive(Clone)]
pub struct Host {
    pub notifications: Arc<dyn NotificationSurface>,
    pub audio: Arc<dyn AudioBackend>,
    pub vibrator: Arc<dyn Vibrator>,
    pub records: Arc<dyn RecordEntry>,
}

impl Host {
    /// A host with no surfaces at all.
    pub fn unsupported() -> Self {
        Self {
            notifications: Arc::new(Unsupported),
            audio: Arc::new(Unsupported),
            vibrator: Arc::new(Unsupported),
            records: Arc::new(Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_gain_decays_to_floor() {
        let tone = Tone::for_profile(ToneProfile::Default);
        assert!((tone.gain_at(Duration::ZERO) - 0.3).abs() < f32::EPSILON);

        let near_end = tone.gain_at(Duration::from_millis(299));
        assert!(near_end > 0.0 && near_end < 0.02);
        assert!(tone.gain_at(Duration::from_millis(300)).abs() < f32::EPSILON);
    }

    #[test]
    fn tone_follows_profile_frequency() {
        assert_eq!(Tone::for_profile(ToneProfile::Lively).frequency_hz, 1000);
    }

    #[test]
    fn unsupported_host_reports_unavailable() {
        let host = Host::unsupported();
        assert_eq!(host.notifications.request_permission(), Capability::Unavailable);
        assert_eq!(host.vibrator.capability(), Capability::Unavailable);
        assert!(host.audio.open().is_err());
    }
}
