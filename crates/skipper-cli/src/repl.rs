//! Interactive REPL
//!
//! Reads stdin lines, streams assistant deltas to stdout, and handles a
//! handful of slash commands. Ctrl-C cancels the in-flight turn instead of
//! killing the process.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use skipper_core::{
    standard_registry, AgentLoop, CompletionClient, Config, EditorStore, History, Manager,
    PauseController, RunContext, ToolContext,
};

const HELP: &str = "Commands:
  /help          show this help
  /models        list models at the configured endpoint
  /clear         reset the conversation
  /pause         toggle cooperative pause (takes effect at the next checkpoint)
  /experimental  toggle the subagent_factory tool
  /tokens        show the approximate token count
  /quit          exit";

fn default_system_prompt() -> String {
    let os_name = if cfg!(windows) { "Windows" } else { "Linux/Mac" };
    format!(
        "You are an advanced terminal assistant.
Current OS: {}

RULES:
1. Use 'run_command' to execute shell commands and 'read_file' first to see line numbers.
2. Use 'patch_file' with its line syntax to edit:
   - \"26--\"         -> Remove line 26.
   - \"26++ code\"    -> Replace line 26 with \"code\".
   - \"0++ code\"     -> Insert \"code\" at the VERY START of the file.
   - \"00++ code\"    -> Append \"code\" to the VERY END of the file.
3. IMPORTANT: patch_file addresses use the ORIGINAL line numbers from 'read_file'. The tool handles the offsets automatically; do not recompute shifted line numbers.
4. HANDLING LONG OUTPUT: if a command returns \"[OUTPUT TRUNCATED]\", do not apologize. Immediately run a narrower command (grep, tail) instead.
5. Always explain your plan briefly before executing commands.",
        os_name
    )
}

struct Session {
    client: Arc<CompletionClient>,
    manager: Arc<Manager>,
    editor: Arc<EditorStore>,
    pause: Arc<PauseController>,
    history: History,
    model: String,
    system_prompt: String,
    experimental: bool,
}

impl Session {
    fn new(config: &Config) -> Result<Self> {
        let client = Arc::new(CompletionClient::new(config)?);
        let system_prompt = default_system_prompt();
        Ok(Self {
            client,
            manager: Manager::new(),
            editor: Arc::new(EditorStore::new()),
            pause: Arc::new(PauseController::new()),
            history: History::new(&system_prompt),
            model: config.model.clone(),
            system_prompt,
            experimental: config.subagent_experimental,
        })
    }

    fn agent(&self, ctx: &RunContext, sink: mpsc::UnboundedSender<String>) -> AgentLoop {
        let tool_ctx = ToolContext::new(ctx.clone())
            .with_model(self.model.clone())
            .with_system_prompt(self.system_prompt.clone())
            .with_experimental(self.experimental)
            .with_client(self.client.clone())
            .with_manager(self.manager.clone())
            .with_editor(self.editor.clone());

        AgentLoop {
            client: self.client.clone(),
            registry: Arc::new(standard_registry(self.experimental)),
            model: self.model.clone(),
            streaming: true,
            sink: Some(sink),
            pause: Some(self.pause.clone()),
            tool_ctx,
        }
    }

    async fn run_turn(&mut self, input: &str) {
        if self.model.trim().is_empty() {
            println!("[System] No model configured. Set 'model' in config.json or SKIPPER_MODEL.");
            return;
        }
        self.history.add_user(input);

        let ctx = RunContext::new();
        let canceller = ctx.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                canceller.cancel();
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            while let Some(delta) = rx.recv().await {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            }
        });

        let agent = self.agent(&ctx, tx);
        let outcome = agent.run_turn(&ctx, &mut self.history).await;
        drop(agent);
        ctrl_c.abort();
        let _ = printer.await;
        println!();

        if outcome.repaired {
            println!("[History Repair] Removed invalid tool messages from current thread.");
        }
        if let Some(err) = outcome.error {
            if err.is_canceled() {
                println!("[System] Request canceled by user.");
            } else {
                println!("[System] Turn ended with error: {}", err);
            }
        }
    }

    async fn handle_command(&mut self, line: &str) -> bool {
        match line {
            "/quit" | "/exit" => return false,
            "/help" => println!("{}", HELP),
            "/models" => match self.client.models(&RunContext::new()).await {
                Ok(models) => {
                    for m in models {
                        println!("{}", m.id);
                    }
                }
                Err(e) => println!("[System] Failed to list models: {}", e),
            },
            "/clear" => {
                self.history.reset(&self.system_prompt);
                println!("[System] Conversation cleared.");
            }
            "/pause" => {
                let paused = self.pause.toggle();
                println!(
                    "[System] {}",
                    if paused {
                        "Paused. The agent will hold at the next checkpoint."
                    } else {
                        "Resumed."
                    }
                );
            }
            "/experimental" => {
                self.experimental = !self.experimental;
                println!(
                    "[System] Subagent experimental mode is now {}.",
                    if self.experimental { "ON" } else { "OFF" }
                );
            }
            "/tokens" => println!(
                "[System] Approximate tokens this session: {}",
                self.history.total_tokens()
            ),
            other => println!("[System] Unknown command '{}'. Try /help.", other),
        }
        true
    }
}

/// Interactive session over stdin/stdout.
pub async fn run(config: Config) -> Result<()> {
    let mut session = Session::new(&config)?;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    println!("skipper ready. /help for commands.");
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('/') {
            if !session.handle_command(&line).await {
                break;
            }
            continue;
        }
        session.run_turn(&line).await;
    }

    session.manager.close();
    Ok(())
}

/// `skipper ask "..."`: one turn, streamed to stdout, then exit.
pub async fn run_single_prompt(config: &Config, prompt: &str) -> Result<()> {
    let mut session = Session::new(config)?;
    session.run_turn(prompt).await;
    session.manager.close();
    Ok(())
}
