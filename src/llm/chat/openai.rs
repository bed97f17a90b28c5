use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{
    create_streaming_response,
    pump_lines,
    ChatClient,
    CompletionOptions,
    CompletionResponse,
    StreamLine,
    TokenStream,
};
use crate::error::RelayError;
use crate::llm::{ bearer_client, LlmConfig };
use crate::models::chat::ChatMessage;

const CHAT_ROUTE: &str = "/v1/chat/completions";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    url: String,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    #[serde(rename = "finish_reason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAIDelta {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(api_key: &str, model: String, base_url: &str) -> Result<Self, RelayError> {
        let http = bearer_client(api_key)?;
        Ok(Self {
            http,
            model,
            url: format!("{}{}", base_url.trim_end_matches('/'), CHAT_ROUTE),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, RelayError> {
        let api_key = config.require_key()?;
        Self::new(api_key, config.completion_model.clone(), &config.base_url)
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &'a CompletionOptions,
        stream: bool
    ) -> OpenAIChatRequest<'a> {
        OpenAIChatRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream: if stream { Some(true) } else { None },
        }
    }
}

/// Parses one SSE line of a chat completion stream.
pub fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return StreamLine::Skip;
    };
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(stream_resp) => {
            let mut token = String::new();
            let mut finished = false;
            for choice in stream_resp.choices {
                if let Some(content) = choice.delta.content {
                    token.push_str(&content);
                }
                if choice.finish_reason.is_some() {
                    finished = true;
                }
            }
            if !token.is_empty() {
                StreamLine::Token(token)
            } else if finished {
                StreamLine::Done
            } else {
                StreamLine::Skip
            }
        }
        Err(e) => {
            debug!("JSON parse error: {} for data: {}", e, data);
            StreamLine::Skip
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions
    ) -> Result<CompletionResponse, RelayError> {
        let req = self.build_request(messages, options, false);
        let resp = self.http.post(&self.url).json(&req).send().await?;
        let parsed = RelayError::check(resp).await?.json::<OpenAIResponse>().await?;

        let content = parsed.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RelayError::Malformed("completion has no message content".into()))?;

        Ok(CompletionResponse { response: content })
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions
    ) -> Result<TokenStream, RelayError> {
        let req = self.build_request(messages, options, true);
        let resp = self.http.post(&self.url).json(&req).send().await?;
        let resp = RelayError::check(resp).await?;

        Ok(create_streaming_response(move |tx| pump_lines(resp, tx, parse_stream_line)))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> OpenAIChatClient {
        OpenAIChatClient::new("test-key", "gpt-test".into(), &server.base_url()).unwrap()
    }

    #[test]
    fn parses_delta_tokens_and_done() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_stream_line(line), StreamLine::Token("Hel".into()));
        assert_eq!(parse_stream_line("data: [DONE]"), StreamLine::Done);
        assert_eq!(parse_stream_line(": keep-alive"), StreamLine::Skip);
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            StreamLine::Done
        );
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model":"gpt-test"}"#);
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Hello!" } }]
            }));
        }).await;

        let resp = client(&server)
            .complete(&[ChatMessage::user("Hi")], &CompletionOptions::default()).await
            .unwrap();
        assert_eq!(resp.response, "Hello!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn persona_model_override_is_sent() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").json_body_partial(r#"{"model":"gpt-big"}"#);
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "ok" } }]
            }));
        }).await;

        let options = CompletionOptions { model: Some("gpt-big".into()), ..Default::default() };
        client(&server).complete(&[ChatMessage::user("Hi")], &options).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        }).await;

        let err = client(&server)
            .complete(&[ChatMessage::user("Hi")], &CompletionOptions::default()).await
            .unwrap_err();
        assert!(matches!(err, RelayError::Malformed(_)));
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).body("rate limited");
        }).await;

        let err = client(&server)
            .complete(&[ChatMessage::user("Hi")], &CompletionOptions::default()).await
            .unwrap_err();
        match err {
            RelayError::Upstream { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_yields_tokens_in_order() {
        let server = MockServer::start_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n"
        );
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").json_body_partial(r#"{"stream":true}"#);
            then.status(200).header("content-type", "text/event-stream").body(body);
        }).await;

        let stream = client(&server)
            .complete_stream(&[ChatMessage::user("Hi")], &CompletionOptions::default()).await
            .unwrap();
        let tokens: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(tokens, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[test]
    fn missing_key_is_rejected() {
        let config = LlmConfig {
            api_key: None,
            base_url: "http://localhost".into(),
            completion_model: "m".into(),
        };
        assert!(matches!(
            OpenAIChatClient::from_config(&config),
            Err(RelayError::MissingCredential(_))
        ));
    }
}
