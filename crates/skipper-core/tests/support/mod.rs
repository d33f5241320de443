//! Scripted mock LLM server for integration tests
//!
//! A tiny HTTP/1.1 responder on a random local port. Each request is
//! answered from a scenario: either popped from a queue (sequential tests)
//! or chosen by a body-matching handler (concurrent tests, where request
//! order is nondeterministic). Connections are closed after one response.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Scenario {
    /// Non-streaming completion with plain text content.
    Text(String),
    /// Non-streaming completion carrying a single tool call.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// SSE stream of raw `data:` payloads; `[DONE]` is appended.
    Sse(Vec<String>),
    /// HTTP error status with an empty body.
    HttpError(u16),
    /// HTTP error carrying a Retry-After header (seconds).
    HttpErrorRetryAfter(u16, u64),
    /// Wait before answering with the inner scenario.
    Delayed(u64, Box<Scenario>),
}

type Handler = Arc<dyn Fn(&str) -> Scenario + Send + Sync>;

pub struct MockLlmServer {
    pub endpoint: String,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    queue: Option<Arc<Mutex<VecDeque<Scenario>>>>,
}

impl MockLlmServer {
    /// Queue another response (queue-backed servers only).
    pub fn push(&self, scenario: Scenario) {
        self.queue
            .as_ref()
            .expect("push requires a queue-backed server")
            .lock()
            .unwrap()
            .push_back(scenario);
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Server answering requests from a scenario queue, in request order.
pub fn start_mock_llm_server() -> MockLlmServer {
    let queue: Arc<Mutex<VecDeque<Scenario>>> = Arc::new(Mutex::new(VecDeque::new()));
    let pop_queue = queue.clone();
    let handler: Handler = Arc::new(move |_body| {
        pop_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scenario::Text("ok".to_string()))
    });
    let mut server = start_with_handler(handler);
    server.queue = Some(queue);
    server
}

/// Server choosing the response per request body, for concurrent callers.
pub fn start_mock_llm_server_with<F>(handler: F) -> MockLlmServer
where
    F: Fn(&str) -> Scenario + Send + Sync + 'static,
{
    start_with_handler(Arc::new(handler))
}

fn start_with_handler(handler: Handler) -> MockLlmServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock llm server");
    listener
        .set_nonblocking(true)
        .expect("nonblocking listener");
    let endpoint = format!("http://{}", listener.local_addr().unwrap());

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                return;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    let handler = handler.clone();
                    // One thread per connection so delayed scenarios do not
                    // block concurrent requests.
                    thread::spawn(move || handle_connection(stream, handler));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(_) => return,
            }
        }
    });

    MockLlmServer {
        endpoint,
        stop,
        handle: Some(handle),
        queue: None,
    }
}

fn handle_connection(mut stream: TcpStream, handler: Handler) {
    let _ = stream.set_nonblocking(false);
    let body = match read_request_body(&mut stream) {
        Some(b) => b,
        None => return,
    };

    let mut scenario = handler(&body);
    while let Scenario::Delayed(ms, inner) = scenario {
        thread::sleep(Duration::from_millis(ms));
        scenario = *inner;
    }

    match scenario {
        Scenario::Text(content) => {
            let body = serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": content}
                }]
            })
            .to_string();
            respond(&mut stream, 200, "application/json", &[], body.as_bytes());
        }
        Scenario::ToolCall {
            id,
            name,
            arguments,
        } => {
            let body = serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": arguments}
                        }]
                    }
                }]
            })
            .to_string();
            respond(&mut stream, 200, "application/json", &[], body.as_bytes());
        }
        Scenario::Sse(payloads) => {
            let mut body = String::new();
            for p in payloads {
                body.push_str("data: ");
                body.push_str(&p);
                body.push_str("\n\n");
            }
            body.push_str("data: [DONE]\n\n");
            respond(&mut stream, 200, "text/event-stream", &[], body.as_bytes());
        }
        Scenario::HttpError(status) => {
            respond(&mut stream, status, "text/plain", &[], b"mock error");
        }
        Scenario::HttpErrorRetryAfter(status, secs) => {
            let header = format!("Retry-After: {}", secs);
            respond(&mut stream, status, "text/plain", &[header], b"mock error");
        }
        Scenario::Delayed(..) => unreachable!("delays resolved above"),
    }
}

fn read_request_body(stream: &mut TcpStream) -> Option<String> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let header_end = find_subslice(&buf, b"\r\n\r\n");
        if let Some(end) = header_end {
            let headers = String::from_utf8_lossy(&buf[..end]).to_string();
            let content_length = headers
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            let total = end + 4 + content_length;
            if buf.len() >= total {
                return Some(String::from_utf8_lossy(&buf[end + 4..total]).to_string());
            }
        }
        match stream.read(&mut chunk) {
            Ok(0) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(_) => return None,
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn respond(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    extra_headers: &[String],
    body: &[u8],
) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Status",
    };
    let mut response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason,
        content_type,
        body.len()
    );
    for header in extra_headers {
        response.push_str(header);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
