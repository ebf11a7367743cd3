use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CaptureError, Result};

/// Measured quantity of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Voltage,
    Power,
    Current,
    TimeMs,
}

impl ChannelKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "voltage" => Some(Self::Voltage),
            "power" => Some(Self::Power),
            "current" => Some(Self::Current),
            "time_ms" => Some(Self::TimeMs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::Power => "power",
            Self::Current => "current",
            Self::TimeMs => "time_ms",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labelled measurement taken from a single column of a device's raw output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub device: String,
    pub kind: ChannelKind,
    /// Column name in the raw iio-capture CSV
    pub column: String,
    /// Header used for this channel in the combined output
    pub label: String,
}

impl Channel {
    pub fn new(
        device: impl Into<String>,
        kind: ChannelKind,
        column: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            kind,
            column: column.into(),
            label: label.into(),
        }
    }
}

/// Which readers step forward when several devices share the minimum timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Only the first tied device in device order advances
    #[default]
    DeviceOrder,
    /// Every tied device advances in the same step
    AdvanceAll,
}

impl TieBreak {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "device-order" => Some(Self::DeviceOrder),
            "advance-all" => Some(Self::AdvanceAll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Idle,
    Armed,
    Running,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub const DEFAULT_HOST: &str = "baylibre-acme.local";
pub const DEFAULT_DEVICE: &str = "iio:device0";
pub const DEFAULT_BUFFER_SIZE: u32 = 256;
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 100.0;
pub const DEFAULT_GRACE_POLLS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// iio-capture exits with 15 when terminated by a signal
pub const GRACEFUL_EXIT_CODE: i32 = 15;
pub const TIMESTAMP_COLUMN: &str = "timestamp ms";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_devices() -> Vec<String> {
    vec![DEFAULT_DEVICE.to_string()]
}

fn default_buffer_size() -> u32 {
    DEFAULT_BUFFER_SIZE
}

fn default_sample_rate() -> f64 {
    DEFAULT_SAMPLE_RATE_HZ
}

fn default_grace_polls() -> u32 {
    DEFAULT_GRACE_POLLS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_graceful_exit_code() -> i32 {
    GRACEFUL_EXIT_CODE
}

fn default_timestamp_column() -> String {
    TIMESTAMP_COLUMN.to_string()
}

/// Capture configuration
///
/// Every field except `binary` has a default, so a JSON config only needs to
/// name what differs from a stock ACME cape setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Explicit iio-capture path; discovered when absent
    #[serde(default)]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_devices")]
    pub devices: Vec<String>,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,
    /// Number of exit polls after SIGTERM before the process is killed
    #[serde(default = "default_grace_polls")]
    pub grace_polls: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_graceful_exit_code")]
    pub graceful_exit_code: i32,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Directory for raw artifacts; the OS temp dir when absent
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            binary: None,
            host: default_host(),
            devices: default_devices(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            grace_polls: DEFAULT_GRACE_POLLS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            graceful_exit_code: GRACEFUL_EXIT_CODE,
            timestamp_column: default_timestamp_column(),
            artifact_dir: None,
            tie_break: TieBreak::default(),
        }
    }
}

impl CaptureConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            CaptureError::Configuration(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = devices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_grace_window(mut self, polls: u32, interval: Duration) -> Self {
        self.grace_polls = polls;
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total time a process gets to exit after SIGTERM
    pub fn grace_window(&self) -> Duration {
        self.poll_interval() * self.grace_polls
    }
}

/// Combined, time-ordered measurements produced by a data retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedOutput {
    pub path: PathBuf,
    /// Channels present in the output header, in column order
    pub channels: Vec<Channel>,
    pub sample_rate_hz: f64,
    pub rows: u64,
    pub created_at: String,
}

impl CombinedOutput {
    pub fn new(path: PathBuf, channels: Vec<Channel>, sample_rate_hz: f64, rows: u64) -> Self {
        Self {
            path,
            channels,
            sample_rate_hz,
            rows,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.label.as_str()).collect()
    }
}
