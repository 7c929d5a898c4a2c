use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::sandbox::ExecutionResult;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only audit trail of every execution outcome and every policy
/// rejection. Forensics only; command output is never written here, and
/// neither are credentials.
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        let log_path = Self::default_log_path()?;

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/execguard/audit.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set",
            )
        })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("execguard")
            .join("audit.log"))
    }

    /// Log one execution outcome
    ///
    /// The line carries the violation tag when a limit or policy fired,
    /// otherwise the exit code.
    pub fn log_execution(
        &self,
        command: &str,
        working_dir: &Path,
        result: &ExecutionResult,
    ) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let outcome = match result.violation {
            Some(violation) => format!("violation:{violation}"),
            None => format!("exit:{}", result.exit_code),
        };

        let log_entry = format!(
            "[{}] [{}] [{}] [{}] {}\n",
            timestamp,
            user,
            working_dir.display(),
            outcome,
            command
        );

        self.append(&log_entry)
    }

    /// Log a validation rejection for forensics
    ///
    /// Records commands that never reached a process, which is how attack
    /// patterns and LLM misbehavior show up in the trail.
    pub fn log_rejection(
        &self,
        command: &str,
        reason: &str,
        working_dir: &Path,
    ) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());

        let log_entry = format!(
            "[{}] [{}] [{}] [REJECTED] command=\"{}\" reason=\"{}\"\n",
            timestamp,
            user,
            working_dir.display(),
            command,
            reason
        );

        self.append(&log_entry)
    }

    fn append(&self, log_entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(log_entry.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: audit.log -> audit.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
