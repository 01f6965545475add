//! Error types for the pretraining evaluation harness

use thiserror::Error;

/// Harness errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or empty inputs. Raised before any training
    /// work begins; always fatal for the whole run.
    #[error("configuration error: {0}")]
    Config(String),

    /// NaN or divergent loss during pretraining or fine-tuning. Recovered
    /// at trial granularity by the split orchestrator.
    #[error("numerical instability at optimizer step {step}: loss = {loss}")]
    NumericalInstability { step: usize, loss: f32 },

    /// Dataset shape or content violation.
    #[error("dataset error: {0}")]
    Data(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors the orchestrator absorbs as a single failed trial
    /// rather than aborting the whole run.
    pub fn is_trial_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NumericalInstability { .. } | Error::Io(_) | Error::Serde(_)
        )
    }
}
