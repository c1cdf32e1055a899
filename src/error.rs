//! Error types
//!
//! Combat calls never fail: illegal calls are ignored. Errors only surface
//! when loading balance data and when a sanctuary purchase is refused.

use thiserror::Error;

/// Balance data could not be loaded or is out of range
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to parse tuning: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read tuning: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid tuning value `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("relic catalog is empty")]
    EmptyCatalog,
}

impl TuningError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A sanctuary purchase was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanctuaryError {
    #[error("need {needed} more shards")]
    NotEnoughShards { needed: u32 },

    #[error("already at full strength")]
    FullHealth,

    #[error("the sanctuary is out of relics")]
    NoRelicsLeft,
}
