//! Periodic reminder evaluation.
//!
//! [`Evaluator::evaluate_and_dispatch`] is the single entry point both
//! execution contexts use: the foreground [`Scheduler`] calls it on every
//! tick and the background bridge calls it on every wake. Each context keeps
//! its own [`TriggerMemory`]; the two are not synchronized, so a reminder can
//! be dispatched once per context.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::baby::{ActiveBaby, BabyProfile};
use crate::clock::{Clock, SystemClock};
use crate::dispatcher::Dispatcher;
use crate::due::is_due;
use crate::reminder::ReminderConfiguration;
use crate::store::{ReminderStore, StoreError};
use crate::types::{BabyId, ConfigurationId, Scope};

/// Default time between evaluation ticks.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Default bound on one tick's store reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a tick was abandoned.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("store reads did not finish within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("store worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// When each configuration last fired, so a reminder is not re-dispatched
/// more often than once per its interval.
///
/// Ephemeral by design: a restart forgets it, which can cost at most one
/// duplicate reminder per configuration.
#[derive(Debug, Clone, Default)]
pub struct TriggerMemory {
    last_triggered: HashMap<ConfigurationId, DateTime<Utc>>,
}

impl TriggerMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `configuration` may fire at `now`.
    pub fn allows(&self, configuration: &ReminderConfiguration, now: DateTime<Utc>) -> bool {
        self.last_triggered
            .get(&configuration.id)
            .is_none_or(|last| now.signed_duration_since(*last) >= configuration.interval.as_duration())
    }

    pub fn record(&mut self, id: ConfigurationId, now: DateTime<Utc>) {
        self.last_triggered.insert(id, now);
    }

    pub fn last_triggered(&self, id: &ConfigurationId) -> Option<DateTime<Utc>> {
        self.last_triggered.get(id).copied()
    }

    pub fn clear(&mut self) {
        self.last_triggered.clear();
    }

    pub fn len(&self) -> usize {
        self.last_triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_triggered.is_empty()
    }
}

/// Configurations and per-scope last feeding times read for one tick.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    configurations: Vec<ReminderConfiguration>,
    last_feedings: HashMap<Scope, Option<DateTime<Utc>>>,
}

/// Reads settings and feedings, decides what is due, and dispatches it.
pub struct Evaluator {
    store: Arc<dyn ReminderStore>,
    dispatcher: Arc<Dispatcher>,
    read_timeout: Duration,
}

impl Evaluator {
    pub fn new(store: Arc<dyn ReminderStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Dispatches every enabled configuration of `baby` that is due at `now`
    /// and not suppressed by `memory`. Returns the configurations dispatched.
    ///
    /// Store reads run on the blocking pool under the read timeout; if they
    /// fail or time out nothing is dispatched and `memory` is untouched.
    pub async fn evaluate_and_dispatch(
        &self,
        baby: &BabyProfile,
        memory: &Mutex<TriggerMemory>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConfigurationId>, TickError> {
        let snapshot = self.fetch(&baby.id).await?;

        let mut memory = lock(memory);
        let mut dispatched = Vec::new();
        for configuration in snapshot.configurations.iter().filter(|cfg| cfg.enabled) {
            let last_feeding = snapshot
                .last_feedings
                .get(&configuration.scope)
                .copied()
                .flatten();
            if !is_due(now, configuration, last_feeding) {
                continue;
            }
            if !memory.allows(configuration, now) {
                tracing::debug!(config_id = %configuration.id, "due but suppressed");
                continue;
            }
            self.dispatcher
                .dispatch(&baby.name, configuration.scope, configuration);
            memory.record(configuration.id.clone(), now);
            dispatched.push(configuration.id.clone());
        }
        Ok(dispatched)
    }

    async fn fetch(&self, baby_id: &BabyId) -> Result<Snapshot, TickError> {
        let store = Arc::clone(&self.store);
        let baby_id = baby_id.clone();
        let work = tokio::task::spawn_blocking(move || -> Result<Snapshot, StoreError> {
            let configurations = store.configurations(&baby_id)?;
            let mut last_feedings = HashMap::new();
            for configuration in configurations.iter().filter(|cfg| cfg.enabled) {
                if let Entry::Vacant(slot) = last_feedings.entry(configuration.scope) {
                    let latest = store.most_recent_feeding(&baby_id, configuration.scope)?;
                    slot.insert(latest.map(|event| event.occurred_at));
                }
            }
            Ok(Snapshot {
                configurations,
                last_feedings,
            })
        });

        match tokio::time::timeout(self.read_timeout, work).await {
            Err(_) => Err(TickError::Timeout(self.read_timeout)),
            Ok(joined) => Ok(joined??),
        }
    }
}

/// The foreground polling loop: `Stopped -> Running -> Stopped`.
///
/// One repeating timer per instance. `start` replaces a running timer
/// rather than adding a second one, and `stop` returns only after the timer
/// task has finished, so nothing fires after it. Dropping the scheduler
/// cancels the timer.
pub struct Scheduler {
    evaluator: Arc<Evaluator>,
    active: ActiveBaby,
    clock: Arc<dyn Clock>,
    memory: Arc<Mutex<TriggerMemory>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(evaluator: Arc<Evaluator>, active: ActiveBaby) -> Self {
        Self {
            evaluator,
            active,
            clock: Arc::new(SystemClock),
            memory: Arc::new(Mutex::new(TriggerMemory::new())),
            timer: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Starts ticking every `period`, first tick immediately.
    pub async fn start(&self, period: Duration) {
        self.stop().await;

        let period = period.max(Duration::from_millis(1));
        let evaluator = Arc::clone(&self.evaluator);
        let active = self.active.clone();
        let clock = Arc::clone(&self.clock);
        let memory = Arc::clone(&self.memory);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                run_tick(&evaluator, &active, &memory, clock.now()).await;
            }
        });
        let displaced = lock(&self.timer).replace(handle);
        if let Some(displaced) = displaced {
            // A concurrent start won the race; keep only the newest timer.
            displaced.abort();
            let _ = displaced.await;
        }
        tracing::info!(?period, "reminder scheduler started");
    }

    /// Cancels the timer and forgets trigger history. Idempotent.
    pub async fn stop(&self) {
        let handle = lock(&self.timer).take();
        if let Some(handle) = handle {
            handle.abort();
            // Cancellation surfaces as a JoinError; either way the task is gone.
            let _ = handle.await;
            tracing::info!("reminder scheduler stopped");
        }
        lock(&self.memory).clear();
    }

    /// Stops the timer and releases the dispatcher's deferred work.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.evaluator.dispatcher().shutdown();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs one evaluation now, outside the timer.
    pub async fn tick(&self) -> Vec<ConfigurationId> {
        run_tick(&self.evaluator, &self.active, &self.memory, self.clock.now()).await
    }

    pub fn last_triggered(&self, id: &ConfigurationId) -> Option<DateTime<Utc>> {
        lock(&self.memory).last_triggered(id)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}

/// One tick for the active baby. Failures are logged and the tick skipped.
pub(crate) async fn run_tick(
    evaluator: &Evaluator,
    active: &ActiveBaby,
    memory: &Mutex<TriggerMemory>,
    now: DateTime<Utc>,
) -> Vec<ConfigurationId> {
    let Some(baby) = active.get() else {
        tracing::debug!("no active baby, skipping reminder check");
        return Vec::new();
    };
    match evaluator.evaluate_and_dispatch(&baby, memory, now).await {
        Ok(dispatched) => {
            tracing::debug!(baby_id = %baby.id, dispatched = dispatched.len(), "reminder check finished");
            dispatched
        }
        Err(err) => {
            tracing::warn!(baby_id = %baby.id, error = %err, "reminder check skipped");
            Vec::new()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Interval;
    use crate::types::BabyId;
    use chrono::Duration as ChronoDuration;

    fn config(minutes: u32) -> ReminderConfiguration {
        let mut cfg = ReminderConfiguration::with_defaults(
            BabyId::new("baby-1").unwrap(),
            Scope::Unified,
            Utc::now(),
        );
        cfg.interval = Interval {
            hours: minutes / 60,
            minutes: minutes % 60,
        };
        cfg
    }

    #[test]
    fn empty_memory_allows() {
        assert!(TriggerMemory::new().allows(&config(180), Utc::now()));
    }

    #[test]
    fn memory_suppresses_within_interval() {
        let cfg = config(180);
        let fired = Utc::now();
        let mut memory = TriggerMemory::new();
        memory.record(cfg.id.clone(), fired);

        assert!(!memory.allows(&cfg, fired + ChronoDuration::minutes(1)));
        assert!(!memory.allows(&cfg, fired + ChronoDuration::minutes(179)));
        assert!(memory.allows(&cfg, fired + ChronoDuration::minutes(180)));
    }

    #[test]
    fn zero_interval_is_never_suppressed() {
        let cfg = config(0);
        let fired = Utc::now();
        let mut memory = TriggerMemory::new();
        memory.record(cfg.id.clone(), fired);
        assert!(memory.allows(&cfg, fired));
    }

    #[test]
    fn memory_is_keyed_by_configuration() {
        let first = config(180);
        let second = config(180);
        let now = Utc::now();
        let mut memory = TriggerMemory::new();
        memory.record(first.id.clone(), now);

        assert!(!memory.allows(&first, now));
        assert!(memory.allows(&second, now));
        assert_eq!(memory.len(), 1);
        memory.clear();
        assert!(memory.is_empty());
    }
}
