//! Background continuity: keeps reminders flowing while the foreground
//! scheduler is suspended.
//!
//! The bridge registers itself with whatever background-execution facility
//! the host offers and then serves two kinds of invocation:
//! - wakes (background sync or periodic), which run the same evaluation as
//!   the foreground scheduler with the bridge's own trigger memory;
//! - push messages, which are relayed straight to the dispatcher.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::alert::PushPayload;
use crate::baby::ActiveBaby;
use crate::clock::{Clock, SystemClock};
use crate::dispatcher::DispatchReport;
use crate::host::{HostError, Unsupported};
use crate::scheduler::{Evaluator, TriggerMemory, run_tick};
use crate::types::ConfigurationId;

/// Tag of the one-shot background-sync registration.
pub const SYNC_TAG: &str = "feeding-reminders";
/// Tag of the periodic background registration.
pub const PERIODIC_TAG: &str = "hourly-feeding-check";
/// Requested period of the periodic registration.
pub const PERIODIC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// The host's background-execution facility.
///
/// Each registration hands the host the bridge it should call back into:
/// [`BackgroundBridge::on_wake`] for sync and periodic events,
/// [`BackgroundBridge::on_push`] for push messages.
pub trait BackgroundHost: Send + Sync {
    fn register_sync(&self, tag: &str, bridge: Arc<BackgroundBridge>) -> Result<(), HostError>;

    fn register_periodic(
        &self,
        tag: &str,
        period: Duration,
        bridge: Arc<BackgroundBridge>,
    ) -> Result<(), HostError>;

    fn register_push(&self, bridge: Arc<BackgroundBridge>) -> Result<(), HostError>;
}

impl BackgroundHost for Unsupported {
    fn register_sync(&self, _tag: &str, _bridge: Arc<BackgroundBridge>) -> Result<(), HostError> {
        Err(HostError::Unavailable("background sync"))
    }

    fn register_periodic(
        &self,
        _tag: &str,
        _period: Duration,
        _bridge: Arc<BackgroundBridge>,
    ) -> Result<(), HostError> {
        Err(HostError::Unavailable("periodic background sync"))
    }

    fn register_push(&self, _bridge: Arc<BackgroundBridge>) -> Result<(), HostError> {
        Err(HostError::Unavailable("push messaging"))
    }
}

/// Which background registrations the host accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registrations {
    pub sync: bool,
    pub periodic: bool,
    pub push: bool,
}

impl Registrations {
    pub const fn any(&self) -> bool {
        self.sync || self.periodic || self.push
    }
}

/// Second, independent invocation path into evaluation and dispatch.
pub struct BackgroundBridge {
    evaluator: Arc<Evaluator>,
    active: ActiveBaby,
    clock: Arc<dyn Clock>,
    memory: Mutex<TriggerMemory>,
}

impl BackgroundBridge {
    pub fn new(evaluator: Arc<Evaluator>, active: ActiveBaby) -> Self {
        Self {
            evaluator,
            active,
            clock: Arc::new(SystemClock),
            memory: Mutex::new(TriggerMemory::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers with every facility the host offers.
    ///
    /// Failures are logged and reported, never raised; the foreground
    /// scheduler stays the primary delivery path.
    pub fn enable(self: &Arc<Self>, host: &dyn BackgroundHost) -> Registrations {
        let registrations = Registrations {
            sync: registered("background sync", host.register_sync(SYNC_TAG, Arc::clone(self))),
            periodic: registered(
                "periodic background sync",
                host.register_periodic(PERIODIC_TAG, PERIODIC_INTERVAL, Arc::clone(self)),
            ),
            push: registered("push messaging", host.register_push(Arc::clone(self))),
        };
        tracing::info!(?registrations, "background continuity enabled");
        registrations
    }

    /// Handles a background wake. Unknown tags are ignored.
    pub async fn on_wake(&self, tag: &str) -> Vec<ConfigurationId> {
        if tag != SYNC_TAG && tag != PERIODIC_TAG {
            tracing::debug!(tag, "ignoring background wake with unknown tag");
            return Vec::new();
        }
        tracing::debug!(tag, "background reminder check");
        run_tick(&self.evaluator, &self.active, &self.memory, self.clock.now()).await
    }

    /// Relays a pushed reminder to the dispatcher as-is.
    pub fn on_push(&self, payload: &PushPayload) -> DispatchReport {
        self.evaluator.dispatcher().dispatch_push(payload)
    }
}

fn registered(facility: &'static str, result: Result<(), HostError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(facility, error = %err, "background registration failed");
            false
        }
    }
}
