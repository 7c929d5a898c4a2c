use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::sandbox::{ExecutionRequest, ExecutionResult, ProcessSandbox, SandboxError};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Git step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// The destructive git operations this gate knows how to stage and execute
#[derive(Debug, Clone)]
pub enum ActionKind {
    CommitPush {
        message: String,
        remote: String,
        branch: Option<String>,
    },
    BranchCreate {
        name: String,
    },
}

/// One externally requested action, created per request, evaluated once,
/// then discarded. `confirmed` is the caller's explicit affirmative flag;
/// nothing else authorizes execution.
#[derive(Debug, Clone)]
pub struct ConfirmableAction {
    pub kind: ActionKind,
    pub confirmed: bool,
}

impl ConfirmableAction {
    pub fn commit_push(
        message: impl Into<String>,
        remote: impl Into<String>,
        branch: Option<String>,
        confirmed: bool,
    ) -> Self {
        Self {
            kind: ActionKind::CommitPush {
                message: message.into(),
                remote: remote.into(),
                branch,
            },
            confirmed,
        }
    }

    pub fn branch_create(name: impl Into<String>, confirmed: bool) -> Self {
        Self {
            kind: ActionKind::BranchCreate { name: name.into() },
            confirmed,
        }
    }

    /// Every kind currently handled by the gate has externally visible,
    /// hard-to-reverse side effects. Kept as a method so a future
    /// non-destructive kind slots into the same policy check.
    pub fn is_destructive(&self) -> bool {
        match self.kind {
            ActionKind::CommitPush { .. } | ActionKind::BranchCreate { .. } => true,
        }
    }
}

/// Side-effect-free description of exactly what a confirmed action would do
#[derive(Debug, Clone)]
pub struct ActionPreview {
    pub description: String,
    pub target_branch: Option<String>,
    pub commit_message: Option<String>,
    pub staged_files: Vec<String>,
    pub operations: Vec<String>,
}

#[derive(Debug)]
pub struct GateDecision {
    pub proceed: bool,
    pub preview: Option<ActionPreview>,
}

#[derive(Debug)]
pub struct OperationOutcome {
    pub command: String,
    pub result: ExecutionResult,
}

/// Outcome of `ConfirmationGate::run`: either the preview-only path
/// (`proceeded == false`, nothing executed) or the executed sequence with
/// push status reported separately from the fatal steps.
#[derive(Debug)]
pub struct ActionReport {
    pub proceeded: bool,
    pub preview: Option<ActionPreview>,
    pub executed: Vec<OperationOutcome>,
    pub pushed: bool,
    pub push_error: Option<String>,
}

/// Wraps destructive git actions so they only execute when the caller
/// supplies an explicit affirmative flag and dry-run mode is off.
/// Otherwise the gate produces a preview and guarantees zero side effects,
/// including no partial git state changes.
pub struct ConfirmationGate {
    sandbox: Arc<ProcessSandbox>,
    dry_run: bool,
}

impl ConfirmationGate {
    pub fn new(sandbox: Arc<ProcessSandbox>, dry_run: bool) -> Self {
        Self { sandbox, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Decide whether the action may execute
    ///
    /// In dry-run mode, or when the action is destructive and not
    /// confirmed, returns `proceed = false` with a populated preview.
    /// Preview construction only runs read-only git queries through the
    /// sandbox.
    pub async fn evaluate(
        &self,
        action: &ConfirmableAction,
        repo_path: &Path,
    ) -> Result<GateDecision, GateError> {
        if self.dry_run || (action.is_destructive() && !action.confirmed) {
            let preview = self.build_preview(action, repo_path).await?;
            return Ok(GateDecision {
                proceed: false,
                preview: Some(preview),
            });
        }

        Ok(GateDecision {
            proceed: true,
            preview: None,
        })
    }

    /// Evaluate, then execute the operation sequence when authorized
    ///
    /// Branch creation, staging, and commit failures abort the action
    /// (`GateError::StepFailed`). Push failure is non-fatal: the local
    /// commit stands and the report carries the push error separately.
    pub async fn run(
        &self,
        action: &ConfirmableAction,
        repo_path: &Path,
    ) -> Result<ActionReport, GateError> {
        let decision = self.evaluate(action, repo_path).await?;
        if !decision.proceed {
            return Ok(ActionReport {
                proceeded: false,
                preview: decision.preview,
                executed: Vec::new(),
                pushed: false,
                push_error: None,
            });
        }

        let mut executed = Vec::new();
        let mut pushed = false;
        let mut push_error = None;

        for operation in planned_operations(action) {
            let is_push = operation.starts_with("git push");
            let request = ExecutionRequest::new(&operation, repo_path);
            let result = self.sandbox.execute(&request).await?;
            let succeeded = result.succeeded;
            let reason = failure_reason(&result);
            executed.push(OperationOutcome {
                command: operation.clone(),
                result,
            });

            if succeeded {
                if is_push {
                    pushed = true;
                }
            } else if is_push {
                push_error = Some(reason);
            } else {
                return Err(GateError::StepFailed {
                    step: operation,
                    reason,
                });
            }
        }

        Ok(ActionReport {
            proceeded: true,
            preview: None,
            executed,
            pushed,
            push_error,
        })
    }

    async fn build_preview(
        &self,
        action: &ConfirmableAction,
        repo_path: &Path,
    ) -> Result<ActionPreview, GateError> {
        let staged_files = self.staged_files(repo_path).await?;
        let operations = planned_operations(action);

        let (description, target_branch, commit_message) = match &action.kind {
            ActionKind::CommitPush {
                message,
                remote,
                branch,
            } => (
                format!("Commit staged changes and push to '{remote}'"),
                branch.clone(),
                Some(message.clone()),
            ),
            ActionKind::BranchCreate { name } => (
                format!("Create branch '{name}'"),
                Some(name.clone()),
                None,
            ),
        };

        Ok(ActionPreview {
            description,
            target_branch,
            commit_message,
            staged_files,
            operations,
        })
    }

    /// List currently staged files via a read-only git query
    async fn staged_files(&self, repo_path: &Path) -> Result<Vec<String>, GateError> {
        let request = ExecutionRequest::new("git diff --cached --name-only", repo_path);
        let result = self.sandbox.execute(&request).await?;
        if !result.succeeded {
            // Not a repo yet, or no commits; preview with an empty list.
            return Ok(Vec::new());
        }
        Ok(result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// The ordered git commands a confirmed action will execute
fn planned_operations(action: &ConfirmableAction) -> Vec<String> {
    match &action.kind {
        ActionKind::CommitPush {
            message,
            remote,
            branch,
        } => {
            let mut operations = Vec::new();
            if let Some(branch) = branch {
                operations.push(format!("git checkout -b {branch}"));
            }
            operations.push("git add -A".to_string());
            operations.push(format!("git commit -m {}", quote(message)));
            match branch {
                Some(branch) => operations.push(format!("git push -u {remote} {branch}")),
                None => operations.push(format!("git push {remote}")),
            }
            operations
        }
        ActionKind::BranchCreate { name } => vec![format!("git branch {name}")],
    }
}

fn quote(argument: &str) -> Cow<'_, str> {
    shlex::try_quote(argument).unwrap_or(Cow::Borrowed(argument))
}

fn failure_reason(result: &ExecutionResult) -> String {
    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match result.violation {
        Some(violation) => format!("execution violation: {violation}"),
        None => format!("exit code {}", result.exit_code),
    }
}
