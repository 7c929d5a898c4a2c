pub mod executor;

pub use executor::ProcessSandbox;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default wall-clock timeout for a sandboxed execution: 60 seconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default advisory memory ceiling: 512 MiB.
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 512 * 1024 * 1024;

/// Default combined stdout/stderr capture ceiling: 10 MiB.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Invalid execution request: {0}")]
    InvalidRequest(String),
}

/// The resource or policy limit that terminated or rejected an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Timeout,
    OutputExceeded,
    ProcessError,
    NotAllowed,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Violation::Timeout => "timeout",
            Violation::OutputExceeded => "output-exceeded",
            Violation::ProcessError => "process-error",
            Violation::NotAllowed => "not-allowed",
        };
        write!(f, "{tag}")
    }
}

/// A single command execution with its resource bounds
///
/// All limit fields carry system-wide defaults and may be overridden per
/// call. Every limit must be positive; `ProcessSandbox::execute` rejects a
/// zero limit as a programming error before doing anything else.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub command: String,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub max_memory_bytes: u64,
    pub max_output_bytes: usize,
}

impl ExecutionRequest {
    pub fn new<S: Into<String>, P: AsRef<Path>>(command: S, working_dir: P) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Reject malformed limits before any process is created
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.timeout.is_zero() {
            return Err(SandboxError::InvalidRequest(
                "timeout must be positive".to_string(),
            ));
        }
        if self.max_memory_bytes == 0 {
            return Err(SandboxError::InvalidRequest(
                "max_memory_bytes must be positive".to_string(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(SandboxError::InvalidRequest(
                "max_output_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal outcome of one execution request
///
/// Exactly one result is produced per request. Runtime and policy failures
/// are carried in `violation`, never as errors; `violation == None` means
/// the process ran to natural exit within every limit.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub violation: Option<Violation>,
}

impl ExecutionResult {
    pub(crate) fn not_allowed(reason: String) -> Self {
        Self {
            succeeded: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: reason,
            violation: Some(Violation::NotAllowed),
        }
    }

    pub(crate) fn process_error(message: String) -> Self {
        Self {
            succeeded: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: message,
            violation: Some(Violation::ProcessError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ExecutionRequest::new("git status", "/tmp");
        assert_eq!(request.timeout, Duration::from_millis(60_000));
        assert_eq!(request.max_memory_bytes, 512 * 1024 * 1024);
        assert_eq!(request.max_output_bytes, 10 * 1024 * 1024);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_overrides() {
        let request = ExecutionRequest::new("git status", "/tmp")
            .with_timeout(Duration::from_millis(500))
            .with_max_output_bytes(1024)
            .with_max_memory_bytes(64 * 1024 * 1024);
        assert_eq!(request.timeout, Duration::from_millis(500));
        assert_eq!(request.max_output_bytes, 1024);
        assert_eq!(request.max_memory_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let request = ExecutionRequest::new("git status", "/tmp").with_timeout(Duration::ZERO);
        assert!(matches!(
            request.validate(),
            Err(SandboxError::InvalidRequest(_))
        ));

        let request = ExecutionRequest::new("git status", "/tmp").with_max_output_bytes(0);
        assert!(request.validate().is_err());

        let request = ExecutionRequest::new("git status", "/tmp").with_max_memory_bytes(0);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_violation_display() {
        assert_eq!(Violation::Timeout.to_string(), "timeout");
        assert_eq!(Violation::OutputExceeded.to_string(), "output-exceeded");
        assert_eq!(Violation::ProcessError.to_string(), "process-error");
        assert_eq!(Violation::NotAllowed.to_string(), "not-allowed");
    }
}
