use acme_rs::CaptureError;

pub const SUCCESS: i32 = 0;
/// Bad arguments, config or input files
pub const INPUT_ERROR: i32 = 1;
pub const BINARY_NOT_FOUND: i32 = 2;
/// Launch failures, IO errors, misuse of the capture cycle
pub const EXECUTION_ERROR: i32 = 3;
/// iio-capture did not shut down cleanly or left no output
pub const SHUTDOWN_ERROR: i32 = 4;
/// A raw artifact could not be parsed
pub const DATA_ERROR: i32 = 5;

pub fn for_error(err: &CaptureError) -> i32 {
    match err {
        CaptureError::Configuration(_) => INPUT_ERROR,
        CaptureError::AbnormalExit { .. }
        | CaptureError::UngracefulShutdown { .. }
        | CaptureError::OutputMissing { .. } => SHUTDOWN_ERROR,
        CaptureError::MalformedArtifact { .. }
        | CaptureError::EmptyArtifact(_)
        | CaptureError::UnknownColumn(_) => DATA_ERROR,
        CaptureError::SpawnFailure { .. }
        | CaptureError::InvalidState { .. }
        | CaptureError::Io(_) => EXECUTION_ERROR,
    }
}
