//! Checkpointed worktree editing
//!
//! Every worktree gets a hidden git repository under the user cache,
//! addressed by a hash of the worktree's absolute path; commits in that
//! repository are the snapshot identifiers. Unified-diff application is
//! bracketed by pre/post snapshots and rolls back on any failure, so a
//! failed apply leaves the worktree byte-identical to its prior state.
//!
//! All operations on one worktree serialize on a per-worktree async mutex;
//! concurrent subagents hitting the same worktree queue up here.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::paths;

/// Post-patch verification behavior. Syntax is strictly weaker than tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    #[default]
    None,
    Syntax,
    Tests,
}

impl VerifyMode {
    /// Empty input means no verification; unknown values are input errors.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "" | "none" => Ok(VerifyMode::None),
            "syntax" => Ok(VerifyMode::Syntax),
            "tests" => Ok(VerifyMode::Tests),
            other => Err(CoreError::Input(format!("unsupported verify mode: {}", other))),
        }
    }
}

/// Snapshot identifiers bracketing one successful apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub pre: String,
    pub post: String,
}

pub struct EditorStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for EditorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorStore {
    /// Store rooted at `<user-cache>/skipper/editor`.
    pub fn new() -> Self {
        Self::with_root(paths::cache_root().join("editor"))
    }

    /// Store rooted at an explicit directory (tests).
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            locks: DashMap::new(),
        }
    }

    /// Snapshot the worktree (or a single file) and return the new head id.
    /// An empty snapshot still produces a fresh identifier.
    pub async fn create_checkpoint(
        &self,
        worktree: &str,
        file_path: &str,
        message: &str,
    ) -> Result<String, CoreError> {
        let abs = resolve_worktree(worktree)?;
        let _guard = self.lock_for(&abs).lock_owned().await;
        self.checkpoint_locked(&abs, file_path, message).await
    }

    /// Apply a unified diff under pre/post snapshot brackets.
    ///
    /// On any failure (patch, verification, post snapshot) the worktree is
    /// restored to the pre snapshot before the error is returned.
    pub async fn apply_unified_diff(
        &self,
        worktree: &str,
        patch: &str,
        mode: VerifyMode,
    ) -> Result<ApplyOutcome, CoreError> {
        let abs = resolve_worktree(worktree)?;
        let _guard = self.lock_for(&abs).lock_owned().await;

        let pre = self
            .checkpoint_locked(&abs, "", "editor checkpoint: pre-apply")
            .await
            .map_err(|e| {
                CoreError::Command(format!("failed to create pre-apply checkpoint: {}", e))
            })?;

        if let Err(e) = self
            .run_git(&abs, &["apply", "--whitespace=nowarn", "-"], Some(patch))
            .await
        {
            self.rollback_locked(&abs, &pre).await.ok();
            return Err(CoreError::Command(format!(
                "failed to apply unified diff (rolled back): {}. Re-read the target files and prefer the patch_file tool for line-addressed edits.",
                e
            )));
        }

        if let Err(e) = self.verify_locked(&abs, mode).await {
            self.rollback_locked(&abs, &pre).await.ok();
            return Err(CoreError::Command(format!(
                "verification failed and changes were rolled back: {}",
                e
            )));
        }

        let post = match self
            .checkpoint_locked(&abs, "", "editor checkpoint: post-apply")
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.rollback_locked(&abs, &pre).await.ok();
                return Err(CoreError::Command(format!(
                    "failed to create post-apply checkpoint; rolled back: {}",
                    e
                )));
            }
        };

        info!(worktree = %abs.display(), pre = %pre, post = %post, "unified diff applied");
        Ok(ApplyOutcome { pre, post })
    }

    /// Restore the worktree to `steps` snapshots before the current head,
    /// deleting untracked files introduced since. Returns the new head id.
    pub async fn undo(&self, worktree: &str, steps: usize) -> Result<String, CoreError> {
        if steps < 1 {
            return Err(CoreError::input("steps must be >= 1"));
        }
        let abs = resolve_worktree(worktree)?;
        let _guard = self.lock_for(&abs).lock_owned().await;
        self.ensure_repo_locked(&abs).await?;

        let target = format!("HEAD~{}", steps);
        self.run_git(&abs, &["reset", "--hard", &target], None).await?;
        self.run_git(&abs, &["clean", "-fd"], None).await?;
        let head = self.run_git(&abs, &["rev-parse", "HEAD"], None).await?;
        Ok(head.trim().to_string())
    }

    /// The last `n` checkpoints as `<short-id> <message>` lines.
    pub async fn history(&self, worktree: &str, n: usize) -> Result<String, CoreError> {
        if n < 1 {
            return Err(CoreError::input("limit must be >= 1"));
        }
        let abs = resolve_worktree(worktree)?;
        let _guard = self.lock_for(&abs).lock_owned().await;
        self.ensure_repo_locked(&abs).await?;

        let count = format!("-{}", n);
        let out = self
            .run_git(&abs, &["log", &count, "--pretty=format:%h %s"], None)
            .await
            .unwrap_or_default();
        if out.trim().is_empty() {
            return Ok("(No editor checkpoints yet)".to_string());
        }
        Ok(out)
    }

    fn lock_for(&self, abs: &Path) -> Arc<Mutex<()>> {
        let key = paths::worktree_key(abs);
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn git_dir(&self, abs: &Path) -> PathBuf {
        self.root.join(paths::worktree_key(abs)).join("git")
    }

    async fn ensure_repo_locked(&self, abs: &Path) -> Result<(), CoreError> {
        let git_dir = self.git_dir(abs);
        if !git_dir.exists() {
            tokio::fs::create_dir_all(&git_dir)
                .await
                .map_err(|e| CoreError::Command(format!("failed to create editor cache: {}", e)))?;
            self.run_git(abs, &["init", "--quiet"], None).await?;
        }
        self.run_git(abs, &["config", "user.name", "skipper-editor"], None)
            .await?;
        self.run_git(abs, &["config", "user.email", "editor@skipper.local"], None)
            .await?;
        Ok(())
    }

    async fn checkpoint_locked(
        &self,
        abs: &Path,
        file_path: &str,
        message: &str,
    ) -> Result<String, CoreError> {
        self.ensure_repo_locked(abs).await?;

        let message = if message.trim().is_empty() {
            "editor checkpoint"
        } else {
            message
        };

        if file_path.trim().is_empty() {
            self.run_git(abs, &["add", "-A"], None).await?;
        } else {
            self.run_git(abs, &["add", "--", file_path.trim()], None).await?;
        }
        self.run_git(abs, &["commit", "--allow-empty", "-m", message], None)
            .await?;
        let head = self.run_git(abs, &["rev-parse", "HEAD"], None).await?;
        Ok(head.trim().to_string())
    }

    async fn rollback_locked(&self, abs: &Path, commit: &str) -> Result<(), CoreError> {
        if let Err(e) = self.run_git(abs, &["reset", "--hard", commit], None).await {
            warn!(worktree = %abs.display(), error = %e, "rollback reset failed");
            return Err(e);
        }
        self.run_git(abs, &["clean", "-fd"], None).await?;
        Ok(())
    }

    async fn verify_locked(&self, abs: &Path, mode: VerifyMode) -> Result<(), CoreError> {
        let Some(argv) = verification_command(abs, mode)? else {
            return Ok(());
        };
        let output = Command::new(argv[0])
            .args(&argv[1..])
            .current_dir(abs)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CoreError::Command(format!("{} failed to start: {}", argv[0], e)))?;
        if output.status.success() {
            return Ok(());
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.trim().is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim());
        }
        Err(CoreError::Command(format!(
            "{} failed:\n{}",
            argv.join(" "),
            combined.trim()
        )))
    }

    async fn run_git(
        &self,
        abs: &Path,
        args: &[&str],
        input: Option<&str>,
    ) -> Result<String, CoreError> {
        let git_dir = self.git_dir(abs);
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(abs)
            .env("GIT_DIR", &git_dir)
            .env("GIT_WORK_TREE", abs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = if let Some(input) = input {
            cmd.stdin(Stdio::piped());
            let mut child = cmd
                .spawn()
                .map_err(|e| CoreError::Command(format!("git failed to start: {}", e)))?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .await
                    .map_err(|e| CoreError::Command(format!("git stdin write failed: {}", e)))?;
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| CoreError::Command(format!("git failed: {}", e)))?
        } else {
            cmd.stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| CoreError::Command(format!("git failed to start: {}", e)))?
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.trim().is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim());
        }

        if !output.status.success() {
            return Err(CoreError::Command(format!(
                "git {} failed: {}",
                args.join(" "),
                combined.trim()
            )));
        }
        Ok(combined.trim().to_string())
    }
}

/// Deterministic verification command for a worktree, or `None` for
/// [`VerifyMode::None`]. Cargo worktrees use check/test, Go worktrees
/// build/test; anything else cannot be verified.
fn verification_command(abs: &Path, mode: VerifyMode) -> Result<Option<Vec<&'static str>>, CoreError> {
    if mode == VerifyMode::None {
        return Ok(None);
    }
    let argv: Vec<&'static str> = if abs.join("Cargo.toml").exists() {
        match mode {
            VerifyMode::Syntax => vec!["cargo", "check", "-q"],
            VerifyMode::Tests => vec!["cargo", "test", "-q"],
            VerifyMode::None => unreachable!(),
        }
    } else if abs.join("go.mod").exists() {
        match mode {
            VerifyMode::Syntax => vec!["go", "build", "./..."],
            VerifyMode::Tests => vec!["go", "test", "./..."],
            VerifyMode::None => unreachable!(),
        }
    } else {
        return Err(CoreError::Command(
            "no recognized build system in worktree (expected Cargo.toml or go.mod)".into(),
        ));
    };
    Ok(Some(argv))
}

fn resolve_worktree(worktree: &str) -> Result<PathBuf, CoreError> {
    let trimmed = worktree.trim();
    if trimmed.is_empty() {
        return Err(CoreError::input("work_tree is required"));
    }
    let p = PathBuf::from(trimmed);
    let abs = if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .map_err(|e| CoreError::Input(format!("failed to resolve worktree path: {}", e)))?
            .join(p)
    };
    std::fs::create_dir_all(&abs)
        .map_err(|e| CoreError::Input(format!("failed to ensure worktree exists: {}", e)))?;
    Ok(abs)
}
