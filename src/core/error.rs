use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A remote participant could not be reached during a blocking call.
    /// The battle suspends in place; a later `fight` call retries the
    /// same step.
    #[error("Connection lost to player {player:?}: {reason}")]
    ConnectionLost {
        player: crate::core::types::PlayerId,
        reason: String,
    },

    #[error("Unit not found: {0:?}")]
    UnitNotFound(crate::core::types::UnitId),

    #[error("Region not found: {0:?}")]
    RegionNotFound(crate::core::types::RegionId),

    #[error("Battle is in an invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid ruleset: {0}")]
    InvalidRuleset(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Ruleset parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl EngineError {
    /// True for the suspension signal, false for hard failures
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, EngineError::ConnectionLost { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
