#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use unseen::classifier::client::TextGeneration;
use unseen::transform::error::TransformError;
use unseen::tree::node_model::{ElementKind, ElementNode};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Transport,
    Status(u16),
    NoText,
}

/// Transport double: replays a script, then repeats `steady` forever.
/// Records the (tokio) instant of every call.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Reply>>,
    steady: Reply,
    latency: Option<Duration>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn always(text: &str) -> Self {
        Self::scripted(vec![], Reply::Text(text.to_string()))
    }

    pub fn scripted(script: Vec<Reply>, steady: Reply) -> Self {
        Self {
            script: Mutex::new(script.into()),
            steady,
            latency: None,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(vec![]),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGeneration for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<String, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.steady.clone());

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Transport => Err(TransformError::Transport("connection reset".into())),
            Reply::Status(status) => Err(TransformError::HttpStatus {
                status,
                body: "upstream error".into(),
            }),
            Reply::NoText => Err(TransformError::MissingText("no candidates".into())),
        }
    }
}

pub const APPLY_RESPONSE: &str = r##"```json
{"elements":{"apply-button":{"text":"New","href":"/x","style":{"color":"red","hover":{"color":"blue"}}}}}
```"##;

/// Banking hero section: heading, two calls to action, unkeyed footer.
pub fn hero_tree() -> ElementNode {
    ElementNode::new(ElementKind::Container)
        .with_class("hero")
        .with_child(
            ElementNode::new(ElementKind::Text)
                .with_id("main-heading")
                .with_text("Banking made simple"),
        )
        .with_child(
            ElementNode::new(ElementKind::Container)
                .with_class("actions")
                .with_child(
                    ElementNode::new(ElementKind::Button)
                        .with_id("apply-button")
                        .with_class("btn")
                        .with_text("Apply now")
                        .with_href("/apply")
                        .with_style("padding", "8px"),
                )
                .with_child(
                    ElementNode::new(ElementKind::Link)
                        .with_id("learn-more")
                        .with_text("Learn more")
                        .with_href("/learn"),
                ),
        )
        .with_child(ElementNode::new(ElementKind::Container).with_text_child("Trusted by millions"))
}

pub fn apply_button() -> ElementNode {
    ElementNode::new(ElementKind::Button)
        .with_id("apply-button")
        .with_text("Old")
}

/// Request as seen by `serve_once`.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Accept one HTTP/1.1 connection on a local port, answer with `status` and
/// a JSON `body`, and hand back what the client sent.
pub async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1beta/models/test:generateContent", listener.local_addr().unwrap());
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
        let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);

        while raw.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        let request_body = String::from_utf8_lossy(&raw[header_end..]).to_string();

        let response = format!(
            "HTTP/1.1 {} TEST\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        CapturedRequest {
            request_line,
            headers,
            body: request_body,
        }
    });

    (url, handle)
}
