//! Git subprocess driving for the merge-test-retry procedure (spec.md §4.4).
//! Every invocation is a `tokio::process::Command` with stdin closed and
//! `kill_on_drop` set, matching the isolation posture of a shell-executing
//! tool: a subprocess hung on a TTY prompt must never wedge the integrator.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{IntegratorError, IntegratorResult};

/// Conflict output is truncated to this many bytes before being recorded in
/// task feedback (spec.md §4.4 step 3: "the first 2 KB of conflict output").
pub const CONFLICT_OUTPUT_LIMIT_BYTES: usize = 2048;

const GIT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GitWorktree {
    pub path: PathBuf,
    pub branch: String,
}

pub enum MergeOutcome {
    Clean,
    Conflict { output: String },
}

pub struct TestOutcome {
    pub success: bool,
    pub output: String,
}

/// Drives `git` against a single repository checkout via subprocess calls.
/// One instance per parent-task integration run.
pub struct GitOps {
    repo_root: PathBuf,
}

impl GitOps {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }

    async fn run(&self, cwd: &Path, args: &[&str]) -> IntegratorResult<(bool, String)> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(cwd).stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(GIT_TIMEOUT, cmd.output())
            .await
            .map_err(|_| IntegratorError::Git(format!("git {args:?} timed out")))??;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.success(), combined))
    }

    /// Creates (or resets) a dedicated worktree at
    /// `workbench/.merge/integrate/{parent-id-prefix}`, checking out a fresh
    /// `integrate/{parent-id-prefix}` branch off the repository's default
    /// branch.
    pub async fn ensure_integration_worktree(&self, workbench_root: &Path, parent_id_prefix: &str) -> IntegratorResult<GitWorktree> {
        let branch = format!("integrate/{parent_id_prefix}");
        let path = workbench_root.join(".merge").join("integrate").join(parent_id_prefix);

        if path.exists() {
            let (ok, out) = self.run(&self.repo_root, &["worktree", "remove", "--force", &path.to_string_lossy()]).await?;
            if !ok {
                tracing::debug!(out, "worktree remove reported non-zero, continuing anyway");
            }
        }
        let _ = self.run(&self.repo_root, &["branch", "-D", &branch]).await?;

        let (ok, out) = self
            .run(&self.repo_root, &["worktree", "add", "-B", &branch, &path.to_string_lossy(), "HEAD"])
            .await?;
        if !ok {
            return Err(IntegratorError::Git(format!("worktree add failed: {out}")));
        }

        Ok(GitWorktree { path, branch })
    }

    /// Merges `subtask_branch` into the integration worktree. On conflict,
    /// the merge is aborted and the (truncated) conflict output returned so
    /// the caller can requeue just this subtask.
    pub async fn merge_branch(&self, worktree: &GitWorktree, subtask_branch: &str) -> IntegratorResult<MergeOutcome> {
        let (ok, out) = self
            .run(&worktree.path, &["merge", "--no-edit", subtask_branch])
            .await?;
        if ok {
            return Ok(MergeOutcome::Clean);
        }

        let _ = self.run(&worktree.path, &["merge", "--abort"]).await?;
        Ok(MergeOutcome::Conflict { output: truncate_conflict_output(out) })
    }

    pub async fn push(&self, worktree: &GitWorktree) -> IntegratorResult<()> {
        let (ok, out) = self
            .run(&worktree.path, &["push", "--force-with-lease", "origin", &worktree.branch])
            .await?;
        if !ok {
            return Err(IntegratorError::Git(format!("push failed: {out}")));
        }
        Ok(())
    }
}

/// Truncates conflict output to [`CONFLICT_OUTPUT_LIMIT_BYTES`], backing off
/// to the nearest earlier char boundary so a cut mid-codepoint (routine in
/// conflict hunks carrying non-ASCII filenames or source text) never panics.
fn truncate_conflict_output(out: String) -> String {
    if out.len() <= CONFLICT_OUTPUT_LIMIT_BYTES {
        return out;
    }
    let mut end = CONFLICT_OUTPUT_LIMIT_BYTES;
    while end > 0 && !out.is_char_boundary(end) {
        end -= 1;
    }
    out[..end].to_string()
}

/// Runs the configured test command inside the integration worktree. A
/// missing test command is treated as an automatic pass (nothing gates the
/// merge).
pub async fn run_test_command(worktree: &GitWorktree, test_command: Option<&str>) -> IntegratorResult<TestOutcome> {
    let Some(command) = test_command else {
        return Ok(TestOutcome { success: true, output: String::new() });
    };

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(command).current_dir(&worktree.path).stdin(Stdio::null()).kill_on_drop(true);

    let result = tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await;
    match result {
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            Ok(TestOutcome { success: output.status.success(), output: combined })
        }
        Ok(Err(e)) => Err(IntegratorError::Git(format!("test command spawn failed: {e}"))),
        Err(_) => Ok(TestOutcome { success: false, output: format!("test command timed out after {GIT_TIMEOUT:?}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_untouched() {
        let out = "clean\n".to_string();
        assert_eq!(truncate_conflict_output(out.clone()), out);
    }

    #[test]
    fn truncation_never_splits_a_multibyte_codepoint() {
        // A 3-byte CJK codepoint straddles the byte-2048 cut point; truncating
        // mid-codepoint must not panic and must yield valid UTF-8.
        let mut out = "x".repeat(CONFLICT_OUTPUT_LIMIT_BYTES - 1);
        out.push('字'); // 3-byte codepoint starting right at the limit
        out.push_str(&"y".repeat(100));

        let truncated = truncate_conflict_output(out);
        assert!(truncated.len() <= CONFLICT_OUTPUT_LIMIT_BYTES);
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }
}
