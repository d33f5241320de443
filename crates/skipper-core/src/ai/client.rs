//! Completion client
//!
//! One logical request = one assistant turn. `stream` consumes the SSE form
//! and forwards text deltas to an optional sink as they arrive; `once` uses
//! the non-streaming form. Both share the retry policy and honor the caller's
//! `RunContext` for cancellation and deadlines, including mid-stream.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agent::cancellation::RunContext;
use crate::config::Config;
use crate::constants::{http, retry::MAX_REQUEST_ATTEMPTS};
use crate::error::CoreError;

use super::retry::{is_retryable_status, parse_retry_after, retry_delay_for_attempt};
use super::sse::{event_data, SseLineBuffer, ToolCallAssembler, DONE_SENTINEL};
use super::types::{
    ChatCompletionResponse, ChatRequest, Message, Model, ModelsResponse, Role, StreamChunk,
    ToolSpec,
};

pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        config.validate_for_api()?;
        Ok(Self::from_parts(&config.base_url, &config.api_key))
    }

    /// Construct directly from endpoint + key (tests, subcommands).
    pub fn from_parts(base_url: &str, api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(http::CONNECT_TIMEOUT)
            .timeout(http::STREAM_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("failed to build HTTP client ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /v1/models`
    pub async fn models(&self, ctx: &RunContext) -> Result<Vec<Model>, CoreError> {
        let url = format!("{}/v1/models", self.base_url);
        let resp = self
            .do_with_retry(ctx, || {
                self.http
                    .get(&url)
                    .header("authorization", format!("Bearer {}", self.api_key))
            })
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::Api { status, body });
        }
        let parsed: ModelsResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Protocol(e.to_string()))?;
        Ok(parsed.data)
    }

    /// Streaming completion. Text deltas are forwarded to `sink` as they
    /// arrive; the reassembled assistant message is returned at end of
    /// stream.
    pub async fn stream(
        &self,
        ctx: &RunContext,
        messages: &[Message],
        tools: &[ToolSpec],
        model: &str,
        sink: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<Message, CoreError> {
        let resp = self.post_completions(ctx, messages, tools, model, true).await?;
        self.consume_stream(ctx, resp, sink).await
    }

    /// Non-streaming completion: decodes `choices[0].message`.
    pub async fn once(
        &self,
        ctx: &RunContext,
        messages: &[Message],
        tools: &[ToolSpec],
        model: &str,
    ) -> Result<Message, CoreError> {
        let resp = self
            .post_completions(ctx, messages, tools, model, false)
            .await?;
        let raw = ctx
            .run(async {
                resp.text()
                    .await
                    .map_err(|e| CoreError::Transport(e.to_string()))
            })
            .await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&raw).map_err(|e| CoreError::Protocol(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Protocol("response carried no choices".into()))?;
        Ok(choice.message)
    }

    async fn post_completions(
        &self,
        ctx: &RunContext,
        messages: &[Message],
        tools: &[ToolSpec],
        model: &str,
        stream: bool,
    ) -> Result<reqwest::Response, CoreError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let tools_field = if tools.is_empty() { None } else { Some(tools) };

        let resp = self
            .do_with_retry(ctx, || {
                // The body is rebuilt from scratch every attempt.
                let body = ChatRequest {
                    model,
                    messages,
                    stream,
                    tools: tools_field,
                };
                self.http
                    .post(&url)
                    .header("authorization", format!("Bearer {}", self.api_key))
                    .header("content-type", "application/json")
                    .json(&body)
            })
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::Api { status, body });
        }
        Ok(resp)
    }

    /// Issue a request with the uniform retry policy. Retries transport
    /// failures and retryable statuses; the final response (whatever its
    /// status) is handed back to the caller.
    async fn do_with_retry<F>(
        &self,
        ctx: &RunContext,
        build: F,
    ) -> Result<reqwest::Response, CoreError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = String::new();
        for attempt in 1..=MAX_REQUEST_ATTEMPTS {
            ctx.check()?;

            let outcome = ctx
                .run(async {
                    build()
                        .send()
                        .await
                        .map_err(|e| CoreError::Transport(e.to_string()))
                })
                .await;

            match outcome {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if !is_retryable_status(status) || attempt == MAX_REQUEST_ATTEMPTS {
                        return Ok(resp);
                    }
                    let mut delay = retry_delay_for_attempt(attempt);
                    if let Some(parsed) = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after)
                    {
                        delay = parsed;
                    }
                    warn!(
                        status,
                        attempt,
                        max = MAX_REQUEST_ATTEMPTS,
                        delay_secs = delay.as_secs(),
                        "transient API status, retrying"
                    );
                    drop(resp);
                    ctx.sleep(delay).await?;
                }
                Err(err) if err.is_canceled() || err.is_deadline() => return Err(err),
                Err(CoreError::Transport(e)) => {
                    if attempt == MAX_REQUEST_ATTEMPTS {
                        return Err(CoreError::Transport(format!(
                            "after {} attempts: {}",
                            MAX_REQUEST_ATTEMPTS, e
                        )));
                    }
                    let delay = retry_delay_for_attempt(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max = MAX_REQUEST_ATTEMPTS,
                        delay_secs = delay.as_secs(),
                        "request failed, retrying"
                    );
                    last_err = e;
                    ctx.sleep(delay).await?;
                }
                Err(other) => return Err(other),
            }
        }
        Err(CoreError::Transport(last_err))
    }

    async fn consume_stream(
        &self,
        ctx: &RunContext,
        resp: reqwest::Response,
        sink: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<Message, CoreError> {
        let mut body = resp.bytes_stream();
        let mut lines = SseLineBuffer::new();
        let mut assembler = ToolCallAssembler::new();
        let mut content = String::new();
        let mut events = 0usize;

        'stream: loop {
            let chunk = ctx
                .run(async {
                    body.next()
                        .await
                        .transpose()
                        .map_err(|e| CoreError::Transport(format!("stream error: {}", e)))
                })
                .await?;
            let Some(bytes) = chunk else { break };

            for line in lines.push(&bytes) {
                let Some(data) = event_data(&line) else {
                    continue;
                };
                if data == DONE_SENTINEL {
                    debug!(events, "stream finished");
                    break 'stream;
                }
                events += 1;
                // Unparseable events are skipped rather than failing the turn.
                let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                    debug!(event = events, "skipping unparseable stream event");
                    continue;
                };
                for choice in parsed.choices {
                    if let Some(delta) = choice.delta.content {
                        if !delta.is_empty() {
                            content.push_str(&delta);
                            if let Some(tx) = sink {
                                let _ = tx.send(delta);
                            }
                        }
                    }
                    for fragment in &choice.delta.tool_calls {
                        assembler.absorb(fragment);
                    }
                }
            }
        }

        info!(
            events,
            content_len = content.len(),
            tool_calls = !assembler.is_empty(),
            "assistant turn reassembled"
        );
        Ok(Message {
            role: Role::Assistant,
            content,
            tool_calls: assembler.finish(),
            tool_call_id: None,
        })
    }
}
