use std::path::PathBuf;
use thiserror::Error;

use crate::types::SupervisorState;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to launch iio-capture for {device}: {source}")]
    SpawnFailure {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("iio-capture for {device} exited with an error ({status}), output:\n{output}")]
    AbnormalExit {
        device: String,
        code: Option<i32>,
        status: String,
        output: String,
    },

    #[error("Could not terminate iio-capture for {device}:\n{output}")]
    UngracefulShutdown { device: String, output: String },

    #[error("Output CSV not generated for {device}: {}", path.display())]
    OutputMissing { device: String, path: PathBuf },

    #[error("Malformed artifact {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("Artifact {} contains no data rows", .0.display())]
    EmptyArtifact(PathBuf),

    #[error("Column '{0}' is not configured on this reader")]
    UnknownColumn(String),

    #[error("Cannot {operation} while supervisor is {state}")]
    InvalidState {
        operation: &'static str,
        state: SupervisorState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CaptureError::MalformedArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Captured process output carried by shutdown failures, if any.
    pub fn process_output(&self) -> Option<&str> {
        match self {
            CaptureError::AbnormalExit { output, .. }
            | CaptureError::UngracefulShutdown { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
