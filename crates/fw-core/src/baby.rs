//! Babies and the feeding history the reminder engine reads.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BabyId, Scope};

/// The slice of a baby profile the reminder engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BabyProfile {
    pub id: BabyId,
    pub name: String,
    pub is_twins: bool,
}

/// A recorded feeding. Owned by the recording subsystem; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingEvent {
    pub baby_id: BabyId,
    pub occurred_at: DateTime<Utc>,
    /// Which twin was fed, if the feeding was tagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin: Option<Scope>,
}

impl FeedingEvent {
    /// Whether this feeding counts toward a configuration's scope.
    ///
    /// `Unified` counts every feeding. A twin scope counts feedings tagged
    /// with that twin and untagged feedings.
    pub fn counts_for(&self, scope: Scope) -> bool {
        match (scope, self.twin) {
            (Scope::Unified, _) | (_, None) => true,
            (scope, Some(twin)) => scope == twin,
        }
    }
}

/// Shared handle to the baby reminders are currently evaluated for.
///
/// Cloning shares the selection, so the foreground scheduler and the
/// background bridge always agree on which baby is active.
#[derive(Debug, Clone, Default)]
pub struct ActiveBaby(Arc<RwLock<Option<BabyProfile>>>);

impl ActiveBaby {
    pub fn new(baby: Option<BabyProfile>) -> Self {
        Self(Arc::new(RwLock::new(baby)))
    }

    pub fn get(&self) -> Option<BabyProfile> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, baby: Option<BabyProfile>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = baby;
    }
}
