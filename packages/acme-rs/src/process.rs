use parking_lot::Mutex;
use std::io::PipeReader;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::binary::Invocation;
use crate::error::{CaptureError, Result};
use crate::types::CaptureConfig;

/// Most recent output kept per process; older bytes are discarded
pub const OUTPUT_LIMIT: usize = 1024 * 1024;

/// How long `drain_output` waits for the pipe to reach EOF
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// One running iio-capture and everything needed to stop it
///
/// Each device gets its own record; the stop protocol only ever touches the
/// child it was spawned with. A background task keeps reading the merged
/// stdout/stderr pipe for the whole capture so the child never blocks on a
/// full pipe.
pub struct DeviceProcess {
    device: String,
    artifact: PathBuf,
    child: Child,
    output: OutputBuffer,
    collector: Option<JoinHandle<()>>,
}

impl DeviceProcess {
    pub fn spawn(device: &str, artifact: &Path, invocation: &Invocation) -> Result<Self> {
        let spawn_failure = |source| CaptureError::SpawnFailure {
            device: device.to_string(),
            source,
        };

        let (output, stdout) = std::io::pipe().map_err(spawn_failure)?;
        let stderr = stdout.try_clone().map_err(spawn_failure)?;

        // The Command (and with it our copy of the write end) is dropped at
        // the end of this statement, so the pipe reaches EOF once the child
        // and its descendants exit.
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failure)?;

        log::info!(
            "Started iio-capture for {} (pid {:?}): {}",
            device,
            child.id(),
            invocation
        );

        let buffer = OutputBuffer::default();
        let collector = collect_output(output, buffer.clone()).map_err(spawn_failure)?;

        Ok(Self {
            device: device.to_string(),
            artifact: artifact.to_path_buf(),
            child,
            output: buffer,
            collector: Some(collector),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// OS pid, `None` once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Ask the process to stop (SIGTERM)
    pub fn terminate(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                unsafe {
                    libc::kill(pid as i32, libc::SIGTERM);
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
    }

    /// Check for exit `polls` times, sleeping `interval` after each miss
    pub async fn poll_exit(&mut self, polls: u32, interval: Duration) -> Result<Option<ExitStatus>> {
        for attempt in 0..polls {
            if let Some(status) = self.child.try_wait()? {
                log::debug!(
                    "{} exited on poll {} with {}",
                    self.device,
                    attempt + 1,
                    status
                );
                return Ok(Some(status));
            }
            tokio::time::sleep(interval).await;
        }
        Ok(None)
    }

    /// SIGKILL and reap, whether or not the process already exited
    pub async fn force_kill(&mut self) -> Result<ExitStatus> {
        if let Err(e) = self.child.start_kill() {
            log::debug!("Kill of {} reported: {}", self.device, e);
        }
        Ok(self.child.wait().await?)
    }

    /// Take the output collected so far
    ///
    /// Waits briefly for the pipe to close so output written just before exit
    /// is included.
    pub async fn drain_output(&mut self) -> String {
        if let Some(collector) = self.collector.as_mut() {
            if tokio::time::timeout(DRAIN_TIMEOUT, collector).await.is_ok() {
                self.collector = None;
            } else {
                log::debug!("Output pipe of {} still open after exit", self.device);
            }
        }

        let buf = std::mem::take(&mut *self.output.lock());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Graceful stop protocol
    ///
    /// SIGTERM, then up to `grace_polls` exit checks. A timely exit must carry
    /// the graceful exit code and leave the artifact on disk. A process still
    /// running after the grace window is killed and reported.
    pub async fn stop(&mut self, config: &CaptureConfig) -> Result<()> {
        self.terminate();

        match self
            .poll_exit(config.grace_polls, config.poll_interval())
            .await?
        {
            Some(status) if status.code() == Some(config.graceful_exit_code) => {
                log::info!("iio-capture for {} stopped", self.device);
            }
            Some(status) => {
                let output = self.drain_output().await;
                log::error!(
                    "iio-capture for {} exited with an error ({})",
                    self.device,
                    status
                );
                return Err(CaptureError::AbnormalExit {
                    device: self.device.clone(),
                    code: status.code(),
                    status: status.to_string(),
                    output,
                });
            }
            None => {
                let status = self.force_kill().await?;
                let output = self.drain_output().await;
                log::error!(
                    "iio-capture for {} did not terminate gracefully, killed ({})",
                    self.device,
                    status
                );
                return Err(CaptureError::UngracefulShutdown {
                    device: self.device.clone(),
                    output,
                });
            }
        }

        if !self.artifact.is_file() {
            return Err(CaptureError::OutputMissing {
                device: self.device.clone(),
                path: self.artifact.clone(),
            });
        }

        Ok(())
    }

    /// Kill without the grace window, used when tearing down after a failure
    pub async fn kill(&mut self) {
        match self.force_kill().await {
            Ok(status) => log::warn!("Killed iio-capture for {} ({})", self.device, status),
            Err(e) => log::warn!("Failed to kill iio-capture for {}: {}", self.device, e),
        }
    }
}

impl Drop for DeviceProcess {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
    }
}

fn append(buffer: &Mutex<Vec<u8>>, bytes: &[u8]) {
    let mut buf = buffer.lock();
    buf.extend_from_slice(bytes);
    if buf.len() > OUTPUT_LIMIT {
        let excess = buf.len() - OUTPUT_LIMIT;
        buf.drain(..excess);
    }
}

/// Read `pipe` until EOF on a background task, appending into `buffer`
#[cfg(unix)]
fn collect_output(pipe: PipeReader, buffer: OutputBuffer) -> std::io::Result<JoinHandle<()>> {
    use std::os::fd::OwnedFd;
    use tokio::io::AsyncReadExt;

    let mut receiver = tokio::net::unix::pipe::Receiver::from_owned_fd(OwnedFd::from(pipe))?;

    Ok(tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match receiver.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => append(&buffer, &chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Output pipe read failed: {}", e);
                    break;
                }
            }
        }
    }))
}

#[cfg(not(unix))]
fn collect_output(mut pipe: PipeReader, buffer: OutputBuffer) -> std::io::Result<JoinHandle<()>> {
    use std::io::Read;

    Ok(tokio::task::spawn_blocking(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => append(&buffer, &chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Output pipe read failed: {}", e);
                    break;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_most_recent_output() {
        let buffer = Mutex::new(Vec::new());
        append(&buffer, &vec![b'a'; OUTPUT_LIMIT]);
        append(&buffer, b"tail");

        let buf = buffer.lock();
        assert_eq!(buf.len(), OUTPUT_LIMIT);
        assert!(buf.ends_with(b"aatail"));
    }
}
