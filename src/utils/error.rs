use thiserror::Error;

/// Failure raised inside an allocation engine. Passed through the
/// orchestrator untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("allocation precondition violated: {message}")]
    Precondition { message: String },

    #[error("allocation failed: {message}")]
    Failed { message: String },
}

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error("The current demo supports exactly two agents, labelled 0 and 1 (found: {found:?})")]
    InvalidAgentSet { found: Vec<i64> },

    #[error("{message}")]
    InvalidRoundCount { message: String },

    #[error("Both agents must value the same items (only agent 0: {only_agent0:?}, only agent 1: {only_agent1:?})")]
    ItemUniverseMismatch {
        only_agent0: Vec<i64>,
        only_agent1: Vec<i64>,
    },

    #[error("Round {round}: agent {agent} has no valuation for item {item}")]
    MissingValuation { round: usize, agent: usize, item: i64 },

    #[error("Allocation result is inconsistent: {message}")]
    InvalidAllocation { message: String },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for `{field}` ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The submitted payload or parameters were wrong; the user can fix them.
    ClientInput,
    /// Something between this crate and its collaborators broke.
    Internal,
}

impl DemoError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn round_count(message: impl Into<String>) -> Self {
        Self::InvalidRoundCount {
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedInput { .. }
            | Self::InvalidAgentSet { .. }
            | Self::InvalidRoundCount { .. }
            | Self::ItemUniverseMismatch { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValue { .. } => ErrorClass::ClientInput,
            Self::MissingValuation { .. }
            | Self::InvalidAllocation { .. }
            | Self::Allocation(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::CsvError(_) => ErrorClass::Internal,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == ErrorClass::ClientInput
    }

    pub fn http_status(&self) -> u16 {
        match self.class() {
            ErrorClass::ClientInput => 400,
            ErrorClass::Internal => 500,
        }
    }

    /// Message safe to show the person who submitted the request.
    pub fn user_friendly_message(&self) -> String {
        match self.class() {
            ErrorClass::ClientInput => self.to_string(),
            ErrorClass::Internal => {
                "The allocation could not be computed. Please try again with different input."
                    .to_string()
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => {
                "Provide utilities as JSON or a dict literal, e.g. {\"0\": {\"0\": 11, \"1\": 22}, \"1\": {\"0\": 11, \"1\": 22}}"
            }
            Self::InvalidAgentSet { .. } => "Use exactly the agent labels 0 and 1",
            Self::InvalidRoundCount { .. } => {
                "Use k = 2 with algorithm 1, or an even k >= 2 with algorithm 2"
            }
            Self::ItemUniverseMismatch { .. } => "Give both agents a value for every item",
            Self::ConfigError { .. } | Self::InvalidConfigValue { .. } => {
                "Check the configuration file and command line flags"
            }
            Self::MissingValuation { .. } | Self::InvalidAllocation { .. } | Self::Allocation(_) => {
                "Inspect the captured diagnostics; the allocation engine returned an unusable result"
            }
            Self::IoError(_) => "Check that the referenced files exist and are readable",
            Self::SerializationError(_) | Self::CsvError(_) => "Try another output format",
        }
    }
}

pub type Result<T> = std::result::Result<T, DemoError>;
