//! Core feeding-reminder engine.
//!
//! This crate contains:
//! - Due calculation: is a reminder configuration due right now?
//! - Default settings: the canonical configuration set for a new baby
//! - Dispatch: actuating a due reminder on visual, audible and haptic channels
//! - Scheduling: the foreground polling loop with trigger suppression
//! - Background continuity: wake and push entry points for suspended apps
//!
//! Persistence and host surfaces are reached only through the traits in
//! [`store`] and [`host`].

pub mod alert;
pub mod background;
mod baby;
pub mod clock;
pub mod defaults;
pub mod dispatcher;
mod due;
pub mod host;
mod reminder;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod types;

pub use alert::{Alert, AlertAction, AlertTarget, PushPayload};
pub use background::{BackgroundBridge, BackgroundHost, Registrations};
pub use baby::{ActiveBaby, BabyProfile, FeedingEvent};
pub use defaults::ensure_defaults;
pub use dispatcher::{ChannelOutcome, DispatchReport, Dispatcher};
pub use due::is_due;
pub use host::{Capability, Host, HostError};
pub use reminder::{ConfigurationUpdate, Interval, ReminderConfiguration};
pub use scheduler::{Evaluator, Scheduler, TickError, TriggerMemory};
pub use settings::{ReminderSettings, SettingsError};
pub use store::{MemoryStore, ReminderStore, StoreError};
pub use types::{BabyId, ChannelPolicy, ConfigurationId, Scope, ToneProfile, ValidationError};
