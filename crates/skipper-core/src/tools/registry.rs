//! Tool registry
//!
//! Maps tool names to bounded, side-effecting operations and normalizes
//! every outcome to text. Failures never propagate to the agent loop: they
//! become `Error: ...` strings admissible into history so the model can
//! react within its iteration budget.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::cancellation::RunContext;
use crate::ai::client::CompletionClient;
use crate::ai::types::ToolSpec;
use crate::editor::EditorStore;
use crate::subagent::Manager;

/// Tool execution result
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// The `Error: ` prefix is part of the tool wire contract; the model
    /// keys off it.
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            output: format!("Error: {}", msg),
            is_error: true,
        }
    }
}

/// Shared state tools execute against.
#[derive(Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    pub run: RunContext,
    /// Default model for completions issued by tools (subagent factory)
    pub model: String,
    /// System prompt inherited by spawned subagents
    pub system_prompt: String,
    /// Gates `subagent_factory` execution
    pub experimental: bool,
    /// Current subagent nesting depth (0 = root agent)
    pub depth: u8,
    pub client: Option<Arc<CompletionClient>>,
    pub manager: Option<Arc<Manager>>,
    pub editor: Arc<EditorStore>,
}

impl ToolContext {
    pub fn new(run: RunContext) -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            run,
            model: String::new(),
            system_prompt: String::new(),
            experimental: false,
            depth: 0,
            client: None,
            manager: None,
            editor: Arc::new(EditorStore::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_experimental(mut self, on: bool) -> Self {
        self.experimental = on;
        self
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_client(mut self, client: Arc<CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_manager(mut self, manager: Arc<Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn with_editor(mut self, editor: Arc<EditorStore>) -> Self {
        self.editor = editor;
        self
    }
}

/// One callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-Schema for the argument object
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Registry of the tools one agent advertises.
#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations advertised to the model, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| {
                ToolSpec::function(t.name(), t.description(), t.parameters_schema())
            })
            .collect()
    }

    /// Execute a tool by name and normalize the outcome to text.
    ///
    /// Invalid JSON arguments produce an error without side effects. A name
    /// nobody registered yields a stable, literal error text.
    pub async fn dispatch(&self, name: &str, raw_args: &str, ctx: &ToolContext) -> String {
        let Some(tool) = self.get(name) else {
            return format!("Error: unsupported tool '{}'", name);
        };

        let args: Value = if raw_args.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str(raw_args) {
                Ok(v) => v,
                Err(e) => {
                    return format!("Error: invalid arguments for {}: {}", name, e);
                }
            }
        };

        tracing::info!(tool = name, "dispatching tool call");
        let result = tool.execute(args, ctx).await;
        if result.is_error {
            tracing::warn!(tool = name, output = %result.output, "tool returned error");
        }
        result.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the 'text' argument"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
            match args.get("text").and_then(|v| v.as_str()) {
                Some(t) => ToolResult::success(t.to_string()),
                None => ToolResult::error("missing 'text'"),
            }
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(RunContext::new())
    }

    #[tokio::test]
    async fn unknown_tool_yields_stable_literal() {
        let registry = ToolRegistry::new();
        let out = registry.dispatch("nope", "{}", &ctx()).await;
        assert_eq!(out, "Error: unsupported tool 'nope'");
    }

    #[tokio::test]
    async fn invalid_json_reports_without_side_effects() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry.dispatch("echo", "{not json", &ctx()).await;
        assert!(out.starts_with("Error: invalid arguments for echo:"));
    }

    #[tokio::test]
    async fn empty_arguments_parse_as_empty_object() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry.dispatch("echo", "", &ctx()).await;
        assert_eq!(out, "Error: missing 'text'");
    }

    #[tokio::test]
    async fn dispatch_returns_tool_output() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry
            .dispatch("echo", r#"{"text":"hello"}"#, &ctx())
            .await;
        assert_eq!(out, "hello");
    }

    #[test]
    fn specs_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].function.name, "echo");
        assert_eq!(specs[0].kind, "function");
    }
}
