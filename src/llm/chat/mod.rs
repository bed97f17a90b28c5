pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt, Future };
use log::warn;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use self::openai::OpenAIChatClient;
use super::LlmConfig;
use crate::error::RelayError;
use crate::models::chat::ChatMessage;

/// Incremental text from an upstream completion, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// Per-call overrides, usually taken from a persona.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions
    ) -> Result<CompletionResponse, RelayError>;

    /// Streams the completion. Providers without native streaming deliver the whole
    /// answer as a single chunk.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions
    ) -> Result<TokenStream, RelayError> {
        let resp = self.complete(messages, options).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(resp.response) })))
    }

    fn get_model(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> TokenStream
    where
        F: FnOnce(mpsc::Sender<Result<String, RelayError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, RelayError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

/// Splits a byte stream into complete lines. Network chunks can end mid-line (or mid
/// UTF-8 sequence), so the unterminated tail is held until the next push.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            match String::from_utf8(raw) {
                Ok(line) => lines.push(line.trim_end_matches(&['\r', '\n'][..]).to_string()),
                Err(e) => warn!("Dropping non UTF-8 stream line: {}", e),
            }
        }
        lines
    }

    /// Returns whatever is left once the upstream closed without a final newline.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        String::from_utf8(self.pending)
            .ok()
            .map(|s| s.trim_end().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// One parsed server-sent-event line from a completion stream.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamLine {
    Token(String),
    Done,
    Skip,
}

/// Drives an upstream streaming response, handing each parsed token to the channel.
/// Returns when the upstream ends, reports done, or the receiver hangs up.
pub async fn pump_lines(
    resp: reqwest::Response,
    tx: mpsc::Sender<Result<String, RelayError>>,
    parse: fn(&str) -> StreamLine
) {
    let mut bytes = resp.bytes_stream();
    let mut buffer = LineBuffer::default();

    while let Some(chunk) = bytes.next().await {
        match chunk {
            Ok(buf) => {
                for line in buffer.push(&buf) {
                    match parse(&line) {
                        StreamLine::Token(tok) => {
                            if tx.send(Ok(tok)).await.is_err() {
                                return;
                            }
                        }
                        StreamLine::Done => {
                            return;
                        }
                        StreamLine::Skip => {}
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(RelayError::Http(e))).await;
                return;
            }
        }
    }

    if let Some(line) = buffer.finish() {
        if let StreamLine::Token(tok) = parse(&line) {
            let _ = tx.send(Ok(tok)).await;
        }
    }
}
