//! iio-capture discovery and command construction

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Capture binary name
pub const BINARY_NAME: &str = "iio-capture";

/// Environment variable for explicit binary path
pub const BINARY_ENV_VAR: &str = "IIO_CAPTURE_PATH";

/// Default search paths (in priority order), tried before $PATH
pub const DEFAULT_BINARY_PATHS: &[&str] = &["~/.local/bin", "~/bin", "/usr/local/bin", "/usr/bin"];

fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Find the iio-capture binary.
///
/// Resolution order:
/// 1. Explicit path (if provided)
/// 2. $IIO_CAPTURE_PATH environment variable
/// 3. Default search paths
/// 4. $PATH
pub fn find_binary(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        let p = expand_path(&path.to_string_lossy());
        return p.is_file().then_some(p);
    }

    if let Ok(env_path) = std::env::var(BINARY_ENV_VAR) {
        let p = expand_path(&env_path);
        if p.is_file() {
            return Some(p);
        }
        log::warn!("${} points at missing file {}", BINARY_ENV_VAR, p.display());
    }

    for search_path in DEFAULT_BINARY_PATHS {
        let p = expand_path(search_path).join(BINARY_NAME);
        if p.is_file() {
            return Some(p);
        }
    }

    which::which(BINARY_NAME).ok()
}

/// Same as `find_binary()` but returns an error if not found.
pub fn require_binary(explicit_path: Option<&Path>) -> Result<PathBuf, String> {
    find_binary(explicit_path).ok_or_else(|| match explicit_path {
        Some(path) => format!("Missing {} binary at {}", BINARY_NAME, path.display()),
        None => format!(
            "Missing {} binary. Set ${} or install to one of: {:?}",
            BINARY_NAME, BINARY_ENV_VAR, DEFAULT_BINARY_PATHS
        ),
    })
}

/// One fully resolved external process command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// `<binary> -n <host> -b <buffer_size> -c -f <outfile> <device>`
    pub fn capture(
        binary: &Path,
        host: &str,
        buffer_size: u32,
        outfile: &Path,
        device: &str,
    ) -> Self {
        Self {
            program: binary.to_path_buf(),
            args: vec![
                "-n".to_string(),
                host.to_string(),
                "-b".to_string(),
                buffer_size.to_string(),
                "-c".to_string(),
                "-f".to_string(),
                outfile.display().to_string(),
                device.to_string(),
            ],
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
