//! Wiring of the reminder engine for one CLI invocation.

use std::sync::Arc;

use fw_core::{ActiveBaby, BabyProfile, Dispatcher, Evaluator, ReminderStore};

use crate::Config;
use crate::host::{SharedWriter, TerminalNotifications, stderr_writer, terminal_host_with_bell};

/// The dispatcher and evaluator for the active baby, on the terminal host.
pub struct Session {
    pub dispatcher: Arc<Dispatcher>,
    pub evaluator: Arc<Evaluator>,
    pub notifications: Arc<TerminalNotifications>,
    pub active: ActiveBaby,
}

impl Session {
    pub fn new(
        config: &Config,
        store: Arc<dyn ReminderStore>,
        baby: Option<BabyProfile>,
        out: SharedWriter,
    ) -> Self {
        Self::with_bell(config, store, baby, out, stderr_writer())
    }

    /// Like [`Session::new`], ringing the bell on `bell` instead of stderr.
    pub fn with_bell(
        config: &Config,
        store: Arc<dyn ReminderStore>,
        baby: Option<BabyProfile>,
        out: SharedWriter,
        bell: SharedWriter,
    ) -> Self {
        let (host, notifications) = terminal_host_with_bell(config, out, bell);
        let dispatcher = Arc::new(Dispatcher::new(host));
        dispatcher.init();
        let evaluator = Arc::new(
            Evaluator::new(store, Arc::clone(&dispatcher)).with_read_timeout(config.read_timeout()),
        );
        Self {
            dispatcher,
            evaluator,
            notifications,
            active: ActiveBaby::new(baby),
        }
    }

    /// Cancels deferred alert work (tone repeats, snoozes).
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }

    /// Lets pending tone repeats play out, then shuts down.
    pub async fn finish(&self) {
        self.dispatcher.finish_tones().await;
        self.shutdown();
    }
}
