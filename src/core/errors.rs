use thiserror::Error;

/// Unified error type for the phaseflow library
#[derive(Debug, Error)]
pub enum PhaseflowError {
    /// A pause, resume or fail request made after the run already failed
    #[error("Cannot {operation}: a failure has already occurred")]
    AlreadyFailed { operation: String },

    /// A step body returned an error
    #[error("Step failed in {phase}: {message}")]
    Step {
        phase: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PhaseflowError {
    /// Create a misuse error for an operation attempted after failure
    pub fn already_failed<S: Into<String>>(operation: S) -> Self {
        Self::AlreadyFailed {
            operation: operation.into(),
        }
    }

    /// Create a step error
    pub fn step<P: Into<String>, M: Into<String>>(phase: P, message: M) -> Self {
        Self::Step {
            phase: phase.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap the error a step body returned, keeping it as the source
    pub fn step_failed<P: Into<String>>(phase: P, source: anyhow::Error) -> Self {
        Self::Step {
            phase: phase.into(),
            message: format!("{:#}", source),
            source: Some(source.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error with field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The run is over but the handle is still usable for queries
            Self::AlreadyFailed { .. } => true,
            Self::Step { .. } => false,
            Self::Configuration { .. } | Self::Serialization { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::AlreadyFailed { .. } => "already_failed",
            Self::Step { .. } => "step",
            Self::Configuration { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PhaseflowError>;

impl From<serde_json::Error> for PhaseflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for PhaseflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}
