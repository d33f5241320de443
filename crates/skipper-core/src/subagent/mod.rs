//! Subagent manager & factory
//!
//! Splits a mega prompt into tasks, runs one bounded agent loop per task
//! under a concurrency semaphore with per-task timeouts, classifies the
//! outcomes, persists per-task artifacts plus a batch report, and keeps a
//! TTL-scrubbed volatile store of task contexts queryable by TaskID.
//!
//! The manager is an explicit dependency handed to tool contexts; tests
//! construct a fresh one per case.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{snippet, AgentLoop, AgentOutcome, RunContext};
use crate::ai::client::CompletionClient;
use crate::chat::{approx_tokens, History};
use crate::constants::app::LOCAL_DIR_NAME;
use crate::constants::subagent::{
    DEFAULT_CONCURRENCY, DEFAULT_SPLIT_SYMBOL, DEFAULT_TASK_LIST_NAME, DEFAULT_TIMEOUT_SEC,
    DEFAULT_TTL_SEC, MAX_CONCURRENCY, MAX_TIMEOUT_SEC, MAX_TTL_SEC, SCRUB_INTERVAL,
    SNIPPET_CHARS,
};
use crate::editor::EditorStore;
use crate::error::CoreError;
use crate::tools::{get_int, get_str, standard_registry, ToolContext};

const WORKER_SUFFIX: &str = "You are a subagent worker. Complete only the assigned task. Keep \
     the scope narrow. Avoid broad refactors and avoid unrelated files. Do not run long/global \
     commands (full build/test) unless the task explicitly requires it. Use concise tool calls, \
     then return a final answer quickly with changed files and what remains.";

const DEFAULT_WORKER_SYSTEM: &str = "You are a reliable coding subagent.";

/// Parsed `subagent_factory` arguments, before defaulting and clamping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactoryInput {
    pub task_list_name: String,
    pub mega_prompt: String,
    pub split_symbol: String,
    pub split_regex: String,
    pub base_instruction: String,
    pub max_concurrency: i64,
    pub timeout_sec: i64,
    pub ttl_seconds: i64,
    pub output_dir: String,
    pub model: String,
}

impl FactoryInput {
    /// Permissive extraction from a JSON argument object; unset fields take
    /// their documented defaults.
    pub fn from_args(args: &Value) -> Self {
        Self {
            task_list_name: get_str(args, "task_list_name", ""),
            mega_prompt: get_str(args, "mega_prompt", ""),
            split_symbol: get_str(args, "split_symbol", DEFAULT_SPLIT_SYMBOL),
            split_regex: get_str(args, "split_regex", ""),
            base_instruction: get_str(args, "base_instruction", ""),
            max_concurrency: get_int(args, "max_concurrency", DEFAULT_CONCURRENCY as i64),
            timeout_sec: get_int(args, "timeout_sec", DEFAULT_TIMEOUT_SEC as i64),
            ttl_seconds: get_int(args, "ttl_seconds", DEFAULT_TTL_SEC as i64),
            output_dir: get_str(args, "output_dir", ""),
            model: get_str(args, "model", ""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "NOERROR")]
    NoError,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::NoError => "NOERROR",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One task's full record. Mutated only by its worker until stored; the
/// store then hands out clones.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub batch_id: String,
    pub task_list_name: String,
    pub prompt: String,
    pub prompt_preview: String,
    pub instruction: String,
    pub status: TaskStatus,
    pub error_code: String,
    pub error_message: String,
    pub output: String,
    pub output_file: String,
    pub output_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub token_approx: i64,
    pub last_output_snippet: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBrief {
    pub task_id: String,
    pub prompt_preview: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub task_list_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_started: usize,
    pub noerror: Vec<TaskBrief>,
    pub failed: Vec<TaskBrief>,
    pub unknown: Vec<TaskBrief>,
    #[serde(default)]
    pub report_file_path: String,
    pub output_dir: String,
}

/// Everything a batch needs besides the manager itself.
#[derive(Clone)]
pub struct FactoryDeps {
    pub client: Arc<CompletionClient>,
    pub editor: Arc<EditorStore>,
    pub default_model: String,
    /// Parent system prompt inherited by workers
    pub system_prompt: String,
    pub experimental: bool,
    /// Depth the spawned workers run at (parent depth + 1)
    pub child_depth: u8,
}

pub struct Manager {
    tasks: RwLock<HashMap<String, TaskContext>>,
    reports: RwLock<HashMap<String, BatchReport>>,
    scrub_stop: CancellationToken,
}

impl Manager {
    /// Construct a manager and start its 30-second scrub task.
    pub fn new() -> Arc<Self> {
        let manager = Arc::new(Self {
            tasks: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
            scrub_stop: CancellationToken::new(),
        });

        let weak = Arc::downgrade(&manager);
        let stop = manager.scrub_stop.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SCRUB_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tick.tick() => {}
                }
                let Some(manager) = weak.upgrade() else { return };
                manager.scrub_expired().await;
            }
        });

        manager
    }

    /// Stop the scrub task. Stored contexts stay readable until drop.
    pub fn close(&self) {
        self.scrub_stop.cancel();
    }

    /// Remove every task context whose TTL has passed.
    pub async fn scrub_expired(&self) {
        let now = Utc::now();
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| task.expires_at > now);
        let removed = before - tasks.len();
        if removed > 0 {
            info!(removed, "scrubbed expired task contexts");
        }
    }

    /// Fixed-format summary of one task context. `consume` deletes the
    /// entry immediately after reading.
    pub async fn task_context_summary(
        &self,
        task_id: &str,
        consume: bool,
    ) -> Result<String, CoreError> {
        let id = task_id.trim();
        if id.is_empty() {
            return Err(CoreError::input("task_id is required"));
        }

        let task = {
            let tasks = self.tasks.read().await;
            tasks.get(id).cloned()
        };
        let Some(task) = task else {
            return Err(CoreError::Input(format!("task context not found: {}", id)));
        };

        let summary = format!(
            "TaskID: {}\nBatchID: {}\nStatus: {}\nErrorCode: {}\nDurationMs: {}\nPromptPreview: {}\nOutputFile: {}\nOutputHash: {}\nLastOutputSnippet: {}\nErrorMessage: {}",
            task.task_id,
            task.batch_id,
            task.status,
            task.error_code,
            task.duration_ms,
            task.prompt_preview,
            task.output_file,
            task.output_hash,
            task.last_output_snippet,
            task.error_message,
        );

        if consume {
            self.tasks.write().await.remove(id);
        }
        Ok(summary)
    }

    /// Number of stored task contexts (tests and diagnostics).
    pub async fn stored_task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    async fn store_task(&self, task: TaskContext) {
        self.tasks.write().await.insert(task.task_id.clone(), task);
    }

    /// Run one batch: split, spawn workers under the semaphore, collect,
    /// bucket, persist `report.json`.
    pub async fn run_factory(
        self: &Arc<Self>,
        ctx: &RunContext,
        input: FactoryInput,
        deps: FactoryDeps,
    ) -> Result<BatchReport, CoreError> {
        if input.mega_prompt.trim().is_empty() {
            return Err(CoreError::input("mega_prompt is required"));
        }

        let tasks = split_tasks(&input)?;
        if tasks.is_empty() {
            return Err(CoreError::input("no tasks were found after splitting"));
        }

        let task_list_name = {
            let name = sanitize_task_list_name(&input.task_list_name);
            if name.is_empty() {
                DEFAULT_TASK_LIST_NAME.to_string()
            } else {
                name
            }
        };

        let max_conc = clamp_or_default(input.max_concurrency, DEFAULT_CONCURRENCY as i64, MAX_CONCURRENCY as i64) as usize;
        let timeout_sec = clamp_or_default(input.timeout_sec, DEFAULT_TIMEOUT_SEC as i64, MAX_TIMEOUT_SEC as i64) as u64;
        let ttl_sec = clamp_or_default(input.ttl_seconds, DEFAULT_TTL_SEC as i64, MAX_TTL_SEC as i64);

        let model = {
            let m = input.model.trim();
            if m.is_empty() {
                deps.default_model.trim().to_string()
            } else {
                m.to_string()
            }
        };
        if model.is_empty() {
            return Err(CoreError::Config("model is empty".into()));
        }

        let batch_id = format!("batch_{}", unix_nanos());
        let output_dir = {
            let dir = input.output_dir.trim();
            if dir.is_empty() {
                PathBuf::from(LOCAL_DIR_NAME).join("subagents").join(&batch_id)
            } else {
                PathBuf::from(dir)
            }
        };
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| CoreError::Input(format!("failed to create output dir: {}", e)))?;

        info!(
            batch = %batch_id,
            tasks = tasks.len(),
            concurrency = max_conc,
            timeout_sec,
            "starting subagent batch"
        );

        let started_at = Utc::now();
        let suffix = short_batch_id(&batch_id);
        let semaphore = Arc::new(Semaphore::new(max_conc));
        let instruction = input.base_instruction.trim().to_string();

        let mut handles = Vec::with_capacity(tasks.len());
        for (idx, task_prompt) in tasks.into_iter().enumerate() {
            if ctx.check().is_err() {
                break;
            }

            let sem = semaphore.clone();
            let manager = self.clone();
            let deps = deps.clone();
            let model = model.clone();
            let batch_id = batch_id.clone();
            let task_list_name = task_list_name.clone();
            let instruction = instruction.clone();
            let output_dir = output_dir.clone();
            let run_parent = ctx.clone();
            let task_id = format!("{:03}_{}_{}", idx + 1, task_list_name, suffix);

            handles.push(tokio::spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return None,
                };

                let started = Utc::now();
                let mut tctx = TaskContext {
                    task_id: task_id.clone(),
                    batch_id: batch_id.clone(),
                    task_list_name,
                    prompt: task_prompt.clone(),
                    prompt_preview: first_two_lines(&task_prompt),
                    instruction: instruction.clone(),
                    status: TaskStatus::Unknown,
                    error_code: String::new(),
                    error_message: String::new(),
                    output: String::new(),
                    output_file: String::new(),
                    output_hash: String::new(),
                    started_at: started,
                    finished_at: started,
                    duration_ms: 0,
                    token_approx: 0,
                    last_output_snippet: String::new(),
                    expires_at: started + chrono::Duration::seconds(ttl_sec),
                };

                let run_ctx = run_parent.with_timeout(Duration::from_secs(timeout_sec));
                let outcome =
                    run_worker(&run_ctx, &deps, &manager, &model, &task_prompt, &instruction)
                        .await;

                let finished = Utc::now();
                tctx.finished_at = finished;
                tctx.duration_ms = (finished - started).num_milliseconds();
                tctx.output = outcome.output.clone();
                tctx.token_approx = approx_tokens(&outcome.output);
                tctx.last_output_snippet = snippet(&outcome.output, SNIPPET_CHARS);

                match &outcome.error {
                    Some(err) => {
                        tctx.status = TaskStatus::Failed;
                        tctx.error_message = err.to_string();
                        tctx.error_code = classify_error(err).to_string();
                    }
                    None if outcome.output.trim().is_empty() => {
                        tctx.status = TaskStatus::Unknown;
                        tctx.error_code = "empty_output".to_string();
                    }
                    None => tctx.status = TaskStatus::NoError,
                }

                // Artifact write is best-effort: a failed write keeps the
                // context but leaves OutputFile empty.
                let output_file = output_dir.join(format!("{}.txt", task_id));
                let body = build_task_output_file(&tctx);
                match tokio::fs::write(&output_file, &body).await {
                    Ok(()) => {
                        tctx.output_file = output_file.to_string_lossy().into_owned();
                        tctx.output_hash = crate::paths::sha256_hex(&body);
                    }
                    Err(e) => {
                        warn!(task = %task_id, error = %e, "failed to write task output file")
                    }
                }

                manager.store_task(tctx.clone()).await;
                Some(tctx)
            }));
        }

        let mut all: Vec<TaskContext> = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(tctx)) => all.push(tctx),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "subagent worker panicked"),
            }
        }

        all.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        let mut report = BatchReport {
            batch_id: batch_id.clone(),
            task_list_name: task_list_name.clone(),
            started_at,
            finished_at: Utc::now(),
            total_started: all.len(),
            noerror: Vec::new(),
            failed: Vec::new(),
            unknown: Vec::new(),
            report_file_path: String::new(),
            output_dir: output_dir.to_string_lossy().into_owned(),
        };

        for task in &all {
            let brief = TaskBrief {
                task_id: task.task_id.clone(),
                prompt_preview: task.prompt_preview.clone(),
                output_hash: task.output_hash.clone(),
                error_code: task.error_code.clone(),
                output_file: task.output_file.clone(),
            };
            match task.status {
                TaskStatus::NoError => report.noerror.push(brief),
                TaskStatus::Failed => report.failed.push(brief),
                TaskStatus::Unknown => report.unknown.push(brief),
            }
        }

        let report_file = output_dir.join("report.json");
        if let Ok(blob) = serde_json::to_string_pretty(&report) {
            if tokio::fs::write(&report_file, blob).await.is_ok() {
                report.report_file_path = report_file.to_string_lossy().into_owned();
            }
        }

        self.reports
            .write()
            .await
            .insert(report.batch_id.clone(), report.clone());

        info!(
            batch = %report.batch_id,
            noerror = report.noerror.len(),
            failed = report.failed.len(),
            unknown = report.unknown.len(),
            "subagent batch finished"
        );
        Ok(report)
    }
}

/// Run one worker's agent loop with its own history and tool catalog.
async fn run_worker(
    ctx: &RunContext,
    deps: &FactoryDeps,
    manager: &Arc<Manager>,
    model: &str,
    task_prompt: &str,
    instruction: &str,
) -> AgentOutcome {
    let mut worker_system = {
        let parent = deps.system_prompt.trim();
        if parent.is_empty() {
            DEFAULT_WORKER_SYSTEM.to_string()
        } else {
            parent.to_string()
        }
    };
    worker_system.push_str("\n\n");
    worker_system.push_str(WORKER_SUFFIX);

    let user_prompt = if instruction.trim().is_empty() {
        task_prompt.trim().to_string()
    } else {
        format!(
            "Instruction:\n{}\n\nTask:\n{}",
            instruction.trim(),
            task_prompt.trim()
        )
    };

    let tool_ctx = ToolContext::new(ctx.clone())
        .with_model(model)
        .with_system_prompt(deps.system_prompt.clone())
        .with_experimental(deps.experimental)
        .with_depth(deps.child_depth)
        .with_client(deps.client.clone())
        .with_manager(manager.clone())
        .with_editor(deps.editor.clone());

    let agent = AgentLoop {
        client: deps.client.clone(),
        registry: Arc::new(standard_registry(deps.experimental)),
        model: model.to_string(),
        streaming: false,
        sink: None,
        pause: None,
        tool_ctx,
    };

    let mut history = History::new(&worker_system);
    history.add_user(user_prompt);
    agent.run_turn(ctx, &mut history).await
}

/// Bucket an error for the task record.
pub fn classify_error(err: &CoreError) -> &'static str {
    if err.is_deadline() {
        "timeout"
    } else if err.is_canceled() {
        "canceled"
    } else {
        "run_error"
    }
}

/// Split the mega prompt into trimmed, non-empty task prompts. CRLF is
/// normalized first; a valid `split_regex` overrides the literal symbol.
/// A non-empty input that yields nothing becomes a single task.
pub fn split_tasks(input: &FactoryInput) -> Result<Vec<String>, CoreError> {
    let raw = input.mega_prompt.replace("\r\n", "\n");

    let parts: Vec<String> = {
        let split_regex = input.split_regex.trim();
        if !split_regex.is_empty() {
            let re = regex::Regex::new(split_regex)
                .map_err(|e| CoreError::Input(format!("invalid split_regex: {}", e)))?;
            re.split(&raw).map(str::to_string).collect()
        } else {
            let symbol = {
                let s = input.split_symbol.trim();
                if s.is_empty() {
                    DEFAULT_SPLIT_SYMBOL
                } else {
                    s
                }
            };
            raw.split(symbol).map(str::to_string).collect()
        }
    };

    let mut out: Vec<String> = parts
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if out.is_empty() && !raw.trim().is_empty() {
        out.push(raw.trim().to_string());
    }
    Ok(out)
}

/// Human-readable batch summary returned as the factory tool's output.
pub fn format_batch_report(report: &BatchReport) -> String {
    format!(
        "Subagent batch finished.\nBatchID: {}\nTaskList: {}\nStarted: {}\nNOERROR: {}\nFAILED: {}\nUNKNOWN: {}\nOutputDir: {}\nReportFile: {}\nUse tool 'subagent_context_provider' with task_id to inspect failed/unknown tasks.",
        report.batch_id,
        report.task_list_name,
        report.total_started,
        report.noerror.len(),
        report.failed.len(),
        report.unknown.len(),
        report.output_dir,
        report.report_file_path,
    )
}

/// Per-task artifact body: fixed header fields, then labeled blocks.
fn build_task_output_file(task: &TaskContext) -> String {
    format!(
        "TaskID: {}\nBatchID: {}\nTaskList: {}\nStatus: {}\nErrorCode: {}\nErrorMessage: {}\nStartedAt: {}\nFinishedAt: {}\nDurationMs: {}\nPromptPreview:\n{}\n\nInstruction:\n{}\n\nTaskPrompt:\n{}\n\nOutput:\n{}\n",
        task.task_id,
        task.batch_id,
        task.task_list_name,
        task.status,
        task.error_code,
        task.error_message,
        task.started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        task.finished_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        task.duration_ms,
        task.prompt_preview,
        task.instruction,
        task.prompt,
        task.output,
    )
}

fn clamp_or_default(value: i64, default: i64, max: i64) -> i64 {
    if value <= 0 {
        default
    } else {
        value.min(max)
    }
}

/// Lowercased `[a-z0-9_-]+` slug; spaces become underscores.
pub fn sanitize_task_list_name(s: &str) -> String {
    let lowered = s.trim().to_lowercase().replace(' ', "_");
    lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

/// First two lines joined with " | ", for previews.
pub fn first_two_lines(s: &str) -> String {
    let normalized = s.replace("\r\n", "\n");
    let mut lines = normalized.split('\n');
    let first = lines.next().unwrap_or("").trim().to_string();
    match lines.next() {
        Some(second) => format!("{} | {}", first, second.trim()),
        None => first,
    }
}

/// Last ≤6 characters of the batch identifier's numeric tail.
pub fn short_batch_id(batch_id: &str) -> String {
    let trimmed = batch_id.trim();
    if trimmed.is_empty() {
        return "batch".to_string();
    }
    let last = trimmed.rsplit('_').next().unwrap_or(trimmed);
    let chars: Vec<char> = last.chars().collect();
    if chars.len() > 6 {
        chars[chars.len() - 6..].iter().collect()
    } else {
        last.to_string()
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Validate a task id against the published grammar (tests, diagnostics).
pub fn is_valid_task_id(id: &str) -> bool {
    let re = regex::Regex::new(r"^[0-9]{3}_[a-z0-9_-]+_[0-9a-z]{1,6}$").expect("static regex");
    re.is_match(id)
}

/// Validate a batch id against the published grammar.
pub fn is_valid_batch_id(id: &str) -> bool {
    let re = regex::Regex::new(r"^batch_[0-9]+$").expect("static regex");
    re.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn factory_input_defaults() {
        let input = FactoryInput::from_args(&json!({"mega_prompt": "task A"}));
        assert_eq!(input.mega_prompt, "task A");
        assert_eq!(input.split_symbol, DEFAULT_SPLIT_SYMBOL);
        assert_eq!(input.max_concurrency, 3);
        assert_eq!(input.timeout_sec, 600);
        assert_eq!(input.ttl_seconds, 600);
        assert!(input.model.is_empty());
    }

    #[test]
    fn factory_input_accepts_string_numbers() {
        let input = FactoryInput::from_args(&json!({
            "mega_prompt": "x",
            "max_concurrency": "5",
            "timeout_sec": 30,
        }));
        assert_eq!(input.max_concurrency, 5);
        assert_eq!(input.timeout_sec, 30);
    }

    #[test]
    fn split_on_default_symbol_trims_and_drops_empties() {
        let input = FactoryInput {
            mega_prompt: "a\n---TASK---\nb\n---TASK---\n\nc".into(),
            split_symbol: DEFAULT_SPLIT_SYMBOL.into(),
            ..Default::default()
        };
        assert_eq!(split_tasks(&input).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_normalizes_crlf() {
        let input = FactoryInput {
            mega_prompt: "a\r\n---TASK---\r\nb".into(),
            split_symbol: DEFAULT_SPLIT_SYMBOL.into(),
            ..Default::default()
        };
        assert_eq!(split_tasks(&input).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn split_regex_overrides_symbol() {
        let input = FactoryInput {
            mega_prompt: "a\n==1==\nb\n==2==\nc".into(),
            split_symbol: DEFAULT_SPLIT_SYMBOL.into(),
            split_regex: r"==\d+==".into(),
            ..Default::default()
        };
        assert_eq!(split_tasks(&input).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn invalid_split_regex_is_an_input_error() {
        let input = FactoryInput {
            mega_prompt: "a".into(),
            split_regex: "(".into(),
            ..Default::default()
        };
        assert!(split_tasks(&input).is_err());
    }

    #[test]
    fn unsplittable_input_becomes_single_task() {
        let input = FactoryInput {
            mega_prompt: "just one task".into(),
            split_symbol: DEFAULT_SPLIT_SYMBOL.into(),
            ..Default::default()
        };
        assert_eq!(split_tasks(&input).unwrap(), vec!["just one task"]);
    }

    #[test]
    fn clamps_apply_only_above_zero() {
        assert_eq!(clamp_or_default(0, 3, 200), 3);
        assert_eq!(clamp_or_default(-5, 3, 200), 3);
        assert_eq!(clamp_or_default(1, 3, 200), 1);
        assert_eq!(clamp_or_default(999, 3, 200), 200);
        assert_eq!(clamp_or_default(5000, 600, 3600), 3600);
        assert_eq!(clamp_or_default(100_000, 600, 86_400), 86_400);
    }

    #[test]
    fn sanitize_keeps_slug_charset() {
        assert_eq!(sanitize_task_list_name("My Task List"), "my_task_list");
        assert_eq!(sanitize_task_list_name("weird!!chars##"), "weirdchars");
        assert_eq!(sanitize_task_list_name("  "), "");
        assert_eq!(sanitize_task_list_name("ok-2"), "ok-2");
    }

    #[test]
    fn preview_joins_first_two_lines() {
        assert_eq!(first_two_lines("one"), "one");
        assert_eq!(first_two_lines("one\ntwo\nthree"), "one | two");
        assert_eq!(first_two_lines("  a  \r\n  b  "), "a | b");
    }

    #[test]
    fn short_batch_id_takes_numeric_tail() {
        assert_eq!(short_batch_id("batch_1234567890"), "567890");
        assert_eq!(short_batch_id("batch_42"), "42");
        assert_eq!(short_batch_id(""), "batch");
    }

    #[test]
    fn id_grammars() {
        assert!(is_valid_batch_id("batch_1712345678901234567"));
        assert!(!is_valid_batch_id("batch_"));
        assert!(!is_valid_batch_id("run_12"));

        assert!(is_valid_task_id("001_tasklist_567890"));
        assert!(is_valid_task_id("042_my-list_9"));
        assert!(!is_valid_task_id("1_tasklist_567890"));
        assert!(!is_valid_task_id("001_TaskList_567890"));
    }

    #[test]
    fn generated_ids_match_grammar() {
        let batch_id = format!("batch_{}", unix_nanos());
        assert!(is_valid_batch_id(&batch_id));
        let task_id = format!("{:03}_{}_{}", 1, "tasklist", short_batch_id(&batch_id));
        assert!(is_valid_task_id(&task_id));
    }

    #[test]
    fn classify_buckets_errors() {
        assert_eq!(classify_error(&CoreError::DeadlineExceeded), "timeout");
        assert_eq!(classify_error(&CoreError::Canceled), "canceled");
        assert_eq!(
            classify_error(&CoreError::Transport("boom".into())),
            "run_error"
        );
    }

    #[test]
    fn task_output_file_has_fixed_field_order() {
        let now = Utc::now();
        let task = TaskContext {
            task_id: "001_list_abc".into(),
            batch_id: "batch_1".into(),
            task_list_name: "list".into(),
            prompt: "do things".into(),
            prompt_preview: "do things".into(),
            instruction: "carefully".into(),
            status: TaskStatus::NoError,
            error_code: String::new(),
            error_message: String::new(),
            output: "done".into(),
            output_file: String::new(),
            output_hash: String::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 12,
            token_approx: 1,
            last_output_snippet: "done".into(),
            expires_at: now,
        };
        let body = build_task_output_file(&task);
        let field_order = [
            "TaskID: ",
            "BatchID: ",
            "TaskList: ",
            "Status: ",
            "ErrorCode: ",
            "ErrorMessage: ",
            "StartedAt: ",
            "FinishedAt: ",
            "DurationMs: ",
            "PromptPreview:",
            "Instruction:",
            "TaskPrompt:",
            "Output:",
        ];
        let mut last = 0;
        for field in field_order {
            let pos = body[last..].find(field).map(|p| p + last);
            assert!(pos.is_some(), "missing field {}", field);
            last = pos.unwrap();
        }
        assert!(body.contains("Status: NOERROR"));
    }

    #[tokio::test]
    async fn manager_stores_and_consumes_contexts() {
        let manager = Manager::new();
        let now = Utc::now();
        let task = TaskContext {
            task_id: "001_list_abc".into(),
            batch_id: "batch_1".into(),
            task_list_name: "list".into(),
            prompt: "p".into(),
            prompt_preview: "p".into(),
            instruction: String::new(),
            status: TaskStatus::NoError,
            error_code: String::new(),
            error_message: String::new(),
            output: "out".into(),
            output_file: String::new(),
            output_hash: String::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 5,
            token_approx: 1,
            last_output_snippet: "out".into(),
            expires_at: now + chrono::Duration::seconds(60),
        };
        manager.store_task(task).await;

        let summary = manager
            .task_context_summary("001_list_abc", true)
            .await
            .unwrap();
        assert!(summary.starts_with("TaskID: 001_list_abc"));
        assert!(summary.contains("Status: NOERROR"));

        let err = manager
            .task_context_summary("001_list_abc", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("task context not found"));
        manager.close();
    }

    #[tokio::test]
    async fn scrub_removes_only_expired_contexts() {
        let manager = Manager::new();
        let now = Utc::now();
        let mut expired = TaskContext {
            task_id: "001_old_abc".into(),
            batch_id: "batch_1".into(),
            task_list_name: "old".into(),
            prompt: "p".into(),
            prompt_preview: "p".into(),
            instruction: String::new(),
            status: TaskStatus::NoError,
            error_code: String::new(),
            error_message: String::new(),
            output: String::new(),
            output_file: String::new(),
            output_hash: String::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            token_approx: 0,
            last_output_snippet: String::new(),
            expires_at: now - chrono::Duration::seconds(1),
        };
        manager.store_task(expired.clone()).await;
        expired.task_id = "002_new_abc".into();
        expired.expires_at = now + chrono::Duration::seconds(600);
        manager.store_task(expired).await;

        manager.scrub_expired().await;
        assert_eq!(manager.stored_task_count().await, 1);
        assert!(manager
            .task_context_summary("002_new_abc", false)
            .await
            .is_ok());
        manager.close();
    }
}
