use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::debug;

use crate::sandbox::{ExecutionRequest, ExecutionResult, SandboxError, Violation};
use crate::security::CommandValidator;

/// Window between the graceful-terminate signal and the forceful kill.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 8192;

/// Executes validated commands as isolated child processes under enforced
/// timeout and output-capture bounds.
///
/// Commands are spawned directly from their parsed argument vector, never
/// through a shell interpreter, which removes the entire shell-injection
/// class. The sandbox re-validates every command itself; it never trusts an
/// upstream caller's claim that validation already happened.
///
/// The memory ceiling is advisory: it is exported to the child as a runtime
/// heap hint (`NODE_OPTIONS`) and is honored only by runtimes that read it.
/// Arbitrary executables are not hard-limited; this is a documented
/// limitation, not an isolation boundary.
pub struct ProcessSandbox {
    validator: CommandValidator,
}

/// Winner of the race among the three in-flight event sources.
/// Settled exactly once; the select loop stops polling after the first hit.
enum Outcome {
    Exited(std::process::ExitStatus),
    Timeout,
    OutputExceeded,
    WaitFailed(String),
}

impl ProcessSandbox {
    pub fn new(validator: CommandValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Execute a command under the request's resource bounds
    ///
    /// Runtime and policy failures are reported inside `ExecutionResult`
    /// via its `violation` field; the only `Err` path is a malformed
    /// request, which indicates a programming error in the caller.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, SandboxError> {
        request.validate()?;

        let validated = match self.validator.validate(&request.command) {
            Ok(validated) => validated,
            Err(e) => {
                debug!(command = %request.command, reason = %e, "command rejected");
                return Ok(ExecutionResult::not_allowed(e.to_string()));
            }
        };

        let mut command = Command::new(&validated.program);
        command
            .args(&validated.args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Advisory heap ceiling for Node.js children; other runtimes
        // ignore it.
        command.env(
            "NODE_OPTIONS",
            format!(
                "--max-old-space-size={}",
                request.max_memory_bytes / (1024 * 1024)
            ),
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(ExecutionResult::process_error(format!(
                    "Failed to spawn '{}': {}",
                    validated.program, e
                )));
            }
        };

        debug!(program = %validated.program, "child spawned");

        let (Some(mut out_pipe), Some(mut err_pipe)) = (child.stdout.take(), child.stderr.take())
        else {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Ok(ExecutionResult::process_error(
                "Failed to capture child output streams".to_string(),
            ));
        };

        // Hard wall-clock deadline measured from spawn, not CPU time.
        let deadline = Instant::now() + request.timeout;
        let max_output = request.max_output_bytes;

        let mut stdout_buf: Vec<u8> = Vec::new();
        let mut stderr_buf: Vec<u8> = Vec::new();
        let mut out_chunk = [0u8; READ_CHUNK];
        let mut err_chunk = [0u8; READ_CHUNK];
        let mut out_open = true;
        let mut err_open = true;

        // Timer expiry, output-threshold crossing, and process exit race to
        // settle a single outcome. Breaking out of the loop is the one and
        // only resolution point; once a source wins, the losers are never
        // polled again.
        let outcome = loop {
            tokio::select! {
                read = out_pipe.read(&mut out_chunk), if out_open => match read {
                    Ok(0) => out_open = false,
                    Ok(n) => {
                        stdout_buf.extend_from_slice(&out_chunk[..n]);
                        if stdout_buf.len() + stderr_buf.len() > max_output {
                            break Outcome::OutputExceeded;
                        }
                    }
                    Err(_) => out_open = false,
                },
                read = err_pipe.read(&mut err_chunk), if err_open => match read {
                    Ok(0) => err_open = false,
                    Ok(n) => {
                        stderr_buf.extend_from_slice(&err_chunk[..n]);
                        if stdout_buf.len() + stderr_buf.len() > max_output {
                            break Outcome::OutputExceeded;
                        }
                    }
                    Err(_) => err_open = false,
                },
                status = child.wait() => match status {
                    Ok(status) => break Outcome::Exited(status),
                    Err(e) => break Outcome::WaitFailed(e.to_string()),
                },
                _ = tokio::time::sleep_until(deadline) => break Outcome::Timeout,
            }
        };

        let result = match outcome {
            Outcome::Exited(status) => {
                // The writers are gone; drain whatever is still buffered in
                // the pipes, bounded by the grace period and the output cap.
                if out_open {
                    let mut rest = Vec::new();
                    if let Ok(Ok(_)) =
                        tokio::time::timeout(GRACE_PERIOD, out_pipe.read_to_end(&mut rest)).await
                    {
                        stdout_buf.extend_from_slice(&rest);
                    }
                }
                if err_open {
                    let mut rest = Vec::new();
                    if let Ok(Ok(_)) =
                        tokio::time::timeout(GRACE_PERIOD, err_pipe.read_to_end(&mut rest)).await
                    {
                        stderr_buf.extend_from_slice(&rest);
                    }
                }

                if stdout_buf.len() + stderr_buf.len() > max_output {
                    cap_buffers(&mut stdout_buf, &mut stderr_buf, max_output);
                    ExecutionResult {
                        succeeded: false,
                        exit_code: status.code().unwrap_or(-1),
                        stdout: into_lossy(stdout_buf),
                        stderr: into_lossy(stderr_buf),
                        violation: Some(Violation::OutputExceeded),
                    }
                } else {
                    let exit_code = status.code().unwrap_or(-1);
                    ExecutionResult {
                        succeeded: status.success(),
                        exit_code,
                        stdout: into_lossy(stdout_buf),
                        stderr: into_lossy(stderr_buf),
                        violation: None,
                    }
                }
            }
            Outcome::Timeout => {
                terminate(&mut child).await;
                cap_buffers(&mut stdout_buf, &mut stderr_buf, max_output);
                ExecutionResult {
                    succeeded: false,
                    exit_code: -1,
                    stdout: into_lossy(stdout_buf),
                    stderr: into_lossy(stderr_buf),
                    violation: Some(Violation::Timeout),
                }
            }
            Outcome::OutputExceeded => {
                terminate(&mut child).await;
                cap_buffers(&mut stdout_buf, &mut stderr_buf, max_output);
                ExecutionResult {
                    succeeded: false,
                    exit_code: -1,
                    stdout: into_lossy(stdout_buf),
                    stderr: into_lossy(stderr_buf),
                    violation: Some(Violation::OutputExceeded),
                }
            }
            Outcome::WaitFailed(message) => {
                terminate(&mut child).await;
                ExecutionResult::process_error(message)
            }
        };

        Ok(result)
    }
}

/// Graceful-terminate the child, escalating to a forceful kill if it has
/// not exited within the grace window. Always reaps the process.
async fn terminate(child: &mut Child) {
    graceful_signal(child);
    if tokio::time::timeout(GRACE_PERIOD, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
fn graceful_signal(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // id() is None once the child has been reaped; nothing to signal then.
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn graceful_signal(child: &mut Child) {
    let _ = child.start_kill();
}

/// Truncate captured output so the combined size never exceeds the limit.
/// Stdout keeps priority; stderr gets whatever budget remains.
fn cap_buffers(stdout: &mut Vec<u8>, stderr: &mut Vec<u8>, max: usize) {
    if stdout.len() > max {
        stdout.truncate(max);
    }
    let remaining = max - stdout.len();
    if stderr.len() > remaining {
        stderr.truncate(remaining);
    }
}

fn into_lossy(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> ProcessSandbox {
        ProcessSandbox::new(CommandValidator::new())
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = TempDir::new().unwrap();
        let request = ExecutionRequest::new("echo hello", dir.path());

        let result = sandbox().execute(&request).await.unwrap();
        assert!(result.succeeded);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.violation, None);
    }

    #[tokio::test]
    async fn test_rejected_command_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let request = ExecutionRequest::new("rm -rf /", dir.path());

        let result = sandbox().execute(&request).await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.violation, Some(Violation::NotAllowed));
        assert!(result.stderr.contains("dangerous pattern"));
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let request = ExecutionRequest::new("cat definitely-not-a-file", dir.path());

        let result = sandbox().execute(&request).await.unwrap();
        assert!(!result.succeeded);
        assert_ne!(result.exit_code, 0);
        assert_eq!(result.violation, None);
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_an_error() {
        let dir = TempDir::new().unwrap();
        let request =
            ExecutionRequest::new("echo hi", dir.path()).with_timeout(Duration::ZERO);

        let result = sandbox().execute(&request).await;
        assert!(matches!(result, Err(SandboxError::InvalidRequest(_))));
    }

    #[test]
    fn test_cap_buffers_stdout_priority() {
        let mut stdout = vec![b'a'; 8];
        let mut stderr = vec![b'b'; 8];
        cap_buffers(&mut stdout, &mut stderr, 10);
        assert_eq!(stdout.len(), 8);
        assert_eq!(stderr.len(), 2);

        let mut stdout = vec![b'a'; 20];
        let mut stderr = vec![b'b'; 8];
        cap_buffers(&mut stdout, &mut stderr, 10);
        assert_eq!(stdout.len(), 10);
        assert_eq!(stderr.len(), 0);
    }
}
