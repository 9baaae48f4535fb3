//! Still capture through an external command.

use std::time::Duration;

use async_trait::async_trait;
use garagepi_core::{Camera, CaptureError};
use tokio::process::Command;

/// Default capture command: one JPEG on stdout, no preview.
pub const DEFAULT_CAPTURE_COMMAND: &[&str] =
    &["raspistill", "-n", "-t", "500", "-e", "jpg", "-o", "-"];

/// Default capture deadline.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Camera that runs a command and takes its stdout as the frame.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCamera {
    /// Camera running `command` (program followed by arguments).
    pub fn new(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self { program: program.clone(), args: args.to_vec(), timeout })
    }

    /// Camera running [`DEFAULT_CAPTURE_COMMAND`].
    pub fn raspistill() -> Self {
        Self {
            program: DEFAULT_CAPTURE_COMMAND[0].to_string(),
            args: DEFAULT_CAPTURE_COMMAND[1..].iter().map(ToString::to_string).collect(),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CaptureError::Failed(format!("{} timed out", self.program)))?
            .map_err(|e| CaptureError::Failed(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::Empty);
        }

        tracing::debug!(bytes = output.stdout.len(), "frame captured");
        Ok(output.stdout)
    }
}
