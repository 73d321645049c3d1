//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A string did not name a known variant.
    #[error("unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    /// An interval component was negative.
    #[error("{field} cannot be negative, got {value}")]
    NegativeInterval { field: &'static str, value: i64 },

    /// An interval component exceeded its upper bound.
    #[error("{field} must be at most {max}, got {value}")]
    IntervalOutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Generates a fresh random ID.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated baby identifier.
    BabyId, "baby ID"
);

define_string_id!(
    /// A validated reminder configuration identifier.
    ///
    /// Trigger suppression is keyed by this ID, so it must stay stable across
    /// edits to the configuration it names.
    ConfigurationId, "configuration ID"
);

/// Which baby, or which twin, a reminder configuration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The whole baby (single baby, or both twins together).
    Unified,
    /// The first twin.
    TwinA,
    /// The second twin.
    TwinB,
}

impl Scope {
    /// Every scope a twins baby owns, in canonical order.
    pub const ALL: [Self; 3] = [Self::Unified, Self::TwinA, Self::TwinB];

    /// String representation for database storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unified => "unified",
            Self::TwinA => "twin_a",
            Self::TwinB => "twin_b",
        }
    }

    /// Short label used in alert text.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unified => "unified",
            Self::TwinA => "twin A",
            Self::TwinB => "twin B",
        }
    }

    pub const fn is_twin(&self) -> bool {
        matches!(self, Self::TwinA | Self::TwinB)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unified" => Ok(Self::Unified),
            "twin_a" | "a" => Ok(Self::TwinA),
            "twin_b" | "b" => Ok(Self::TwinB),
            _ => Err(ValidationError::UnknownValue {
                kind: "scope",
                value: s.to_string(),
            }),
        }
    }
}

/// Which output channels a due reminder is actuated through.
///
/// The visual channel is not part of the policy: it is always attempted,
/// subject to notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPolicy {
    Haptic,
    Audible,
    Both,
}

impl ChannelPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Haptic => "haptic",
            Self::Audible => "audible",
            Self::Both => "both",
        }
    }

    pub const fn includes_audible(&self) -> bool {
        matches!(self, Self::Audible | Self::Both)
    }

    pub const fn includes_haptic(&self) -> bool {
        matches!(self, Self::Haptic | Self::Both)
    }
}

impl fmt::Display for ChannelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChannelPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "haptic" => Ok(Self::Haptic),
            "audible" => Ok(Self::Audible),
            "both" => Ok(Self::Both),
            _ => Err(ValidationError::UnknownValue {
                kind: "channel policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Selects the synthesized tone played on the audible channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneProfile {
    #[default]
    Default,
    Gentle,
    Lively,
    Warm,
}

impl ToneProfile {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Gentle => "gentle",
            Self::Lively => "lively",
            Self::Warm => "warm",
        }
    }

    /// Oscillator frequency in hertz.
    pub const fn frequency_hz(&self) -> u32 {
        match self {
            Self::Default => 800,
            Self::Gentle => 600,
            Self::Lively => 1000,
            Self::Warm => 700,
        }
    }
}

impl fmt::Display for ToneProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToneProfile {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "gentle" => Ok(Self::Gentle),
            "lively" => Ok(Self::Lively),
            "warm" => Ok(Self::Warm),
            _ => Err(ValidationError::UnknownValue {
                kind: "tone profile",
                value: s.to_string(),
            }),
        }
    }
}
