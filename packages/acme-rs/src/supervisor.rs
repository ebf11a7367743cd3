use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::binary::{require_binary, Invocation};
use crate::error::{CaptureError, Result};
use crate::merge::merge_artifacts;
use crate::process::DeviceProcess;
use crate::types::*;

/// Per-device bookkeeping for one reset→start→stop→retrieve cycle
#[derive(Debug, Clone)]
struct DeviceSlot {
    device: String,
    artifact: PathBuf,
    invocation: Invocation,
}

/// Capture Supervisor
///
/// Owns one iio-capture process per device and turns their raw CSV outputs
/// into a single time-ordered combined CSV.
///
/// Lifecycle: `reset` → `start` → `stop` → `data_retrieval` (any number of
/// times) → `reset` again. Calling an operation out of order fails with
/// `CaptureError::InvalidState`.
pub struct CaptureSupervisor {
    config: CaptureConfig,
    binary_path: PathBuf,
    state: SupervisorState,
    slots: Vec<DeviceSlot>,
    processes: Vec<DeviceProcess>,
}

impl CaptureSupervisor {
    /// Create a supervisor, resolving the iio-capture binary
    ///
    /// # Returns
    /// `CaptureError::Configuration` if the binary cannot be found
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let binary_path =
            require_binary(config.binary.as_deref()).map_err(CaptureError::Configuration)?;

        log::info!("Using iio-capture at {}", binary_path.display());

        Ok(Self {
            config,
            binary_path,
            state: SupervisorState::Idle,
            slots: Vec::new(),
            processes: Vec::new(),
        })
    }

    /// Prepare a new capture cycle for `devices`
    ///
    /// Allocates one fresh, empty artifact per device and computes its
    /// iio-capture command line. Artifacts of the previous cycle are left on
    /// disk.
    pub fn reset<S: AsRef<str>>(&mut self, devices: &[S]) -> Result<()> {
        self.require_not(SupervisorState::Running, "reset")?;

        if devices.is_empty() {
            return Err(CaptureError::Configuration(
                "At least one device is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for device in devices {
            if !seen.insert(device.as_ref()) {
                return Err(CaptureError::Configuration(format!(
                    "Device '{}' listed more than once",
                    device.as_ref()
                )));
            }
        }

        let dir = self.artifact_dir();
        std::fs::create_dir_all(&dir)?;

        let mut slots = Vec::with_capacity(devices.len());
        for device in devices {
            let device = device.as_ref();
            let artifact = dir.join(format!(
                "acme_{}_{}.csv",
                Uuid::new_v4().simple(),
                sanitize(device)
            ));
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&artifact)?;

            let invocation = Invocation::capture(
                &self.binary_path,
                &self.config.host,
                self.config.buffer_size,
                &artifact,
                device,
            );
            log::debug!("ACME cape command: {}", invocation);

            slots.push(DeviceSlot {
                device: device.to_string(),
                artifact,
                invocation,
            });
        }

        self.slots = slots;
        self.processes.clear();
        self.state = SupervisorState::Armed;
        Ok(())
    }

    /// Launch one iio-capture per device
    ///
    /// If any launch fails, the processes started so far are killed and the
    /// supervisor stays armed.
    pub async fn start(&mut self) -> Result<()> {
        self.require(SupervisorState::Armed, "start")?;

        let mut started: Vec<DeviceProcess> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match DeviceProcess::spawn(&slot.device, &slot.artifact, &slot.invocation) {
                Ok(process) => started.push(process),
                Err(e) => {
                    log::error!("{}", e);
                    for process in &mut started {
                        process.kill().await;
                    }
                    return Err(e);
                }
            }
        }

        self.processes = started;
        self.state = SupervisorState::Running;
        Ok(())
    }

    /// Stop every process in device order
    ///
    /// A process leaves the supervisor only once its own stop succeeded, so a
    /// stop that is cancelled part way stays `Running` and can be retried.
    /// The first device that fails to stop cleanly aborts the teardown: its
    /// error is returned, the remaining processes are killed outright, and the
    /// supervisor goes back to idle.
    pub async fn stop(&mut self) -> Result<()> {
        self.require(SupervisorState::Running, "stop")?;

        let mut stopped = 0;
        while let Some(process) = self.processes.first_mut() {
            if let Err(e) = process.stop(&self.config).await {
                let mut rest = std::mem::take(&mut self.processes);
                self.state = SupervisorState::Idle;
                for process in rest.iter_mut().skip(1) {
                    process.kill().await;
                }
                return Err(e);
            }
            self.processes.remove(0);
            stopped += 1;
        }

        log::info!("Stopped {} iio-capture processes", stopped);
        self.state = SupervisorState::Stopped;
        Ok(())
    }

    /// Merge the raw outputs of the last cycle into `output`
    ///
    /// Only devices with at least one active channel are read. Devices whose
    /// artifact turned out empty are left out, together with their channels.
    pub fn data_retrieval(&self, active_channels: &[Channel], output: &Path) -> Result<CombinedOutput> {
        self.require(SupervisorState::Stopped, "retrieve data")?;

        let sources: Vec<(String, PathBuf)> = self
            .slots
            .iter()
            .map(|s| (s.device.clone(), s.artifact.clone()))
            .collect();

        let merged = merge_artifacts(
            &sources,
            active_channels,
            output,
            &self.config.timestamp_column,
            self.config.tie_break,
        )?;

        Ok(CombinedOutput::new(
            output.to_path_buf(),
            merged.channels,
            self.config.sample_rate_hz,
            merged.rows,
        ))
    }

    /// `data_retrieval` into a fresh file next to the raw artifacts
    pub fn data_retrieval_to_temp(&self, active_channels: &[Channel]) -> Result<CombinedOutput> {
        let output = self
            .artifact_dir()
            .join(format!("acme_combined_{}.csv", Uuid::new_v4().simple()));
        self.data_retrieval(active_channels, &output)
    }

    /// Raw artifact paths of the most recent reset, in device order
    pub fn raw_artifacts(&self) -> Vec<PathBuf> {
        self.slots.iter().map(|s| s.artifact.clone()).collect()
    }

    pub fn devices(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.device.as_str()).collect()
    }

    /// Command lines computed by the most recent reset
    pub fn invocations(&self) -> Vec<&Invocation> {
        self.slots.iter().map(|s| &s.invocation).collect()
    }

    /// Pids of the processes currently owned, in device order
    pub fn process_ids(&self) -> Vec<Option<u32>> {
        self.processes.iter().map(|p| p.id()).collect()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Get the path to the iio-capture binary
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.config.sample_rate_hz
    }

    fn artifact_dir(&self) -> PathBuf {
        self.config
            .artifact_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    fn require(&self, expected: SupervisorState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(CaptureError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn require_not(&self, forbidden: SupervisorState, operation: &'static str) -> Result<()> {
        if self.state == forbidden {
            return Err(CaptureError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }
}

/// Make a device id safe to embed in a file name
fn sanitize(device: &str) -> String {
    device
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_creation_invalid_path() {
        let config = CaptureConfig::default().with_binary("/nonexistent/iio-capture");
        let result = CaptureSupervisor::new(config);
        assert!(matches!(result, Err(CaptureError::Configuration(_))));
    }

    #[test]
    fn test_sanitize_device_names() {
        assert_eq!(sanitize("iio:device0"), "iio_device0");
        assert_eq!(sanitize("acme-1"), "acme-1");
        assert_eq!(sanitize("../x"), "___x");
    }
}
