use acme_rs::CombinedOutput;
use serde::Serialize;
use std::io::Write;

/// Serialize `value` as JSON to stdout, or to `path` when given.
pub fn emit<T: Serialize>(value: &T, compact: bool, path: Option<&str>) -> Result<(), String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| format!("JSON serialization failed: {}", e))?;

    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .map_err(|e| format!("Failed to write summary '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json).map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// One-line human summary on stderr
pub fn report(combined: &CombinedOutput) {
    eprintln!(
        "Wrote {} rows × {} channels ({} Hz) to {}",
        combined.rows,
        combined.channels.len(),
        combined.sample_rate_hz,
        combined.path.display()
    );
}
