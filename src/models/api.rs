use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::chat::ChatMessage;
use crate::documents::RoiEstimate;

/// Body of `/api/chat` and `/api/chat/stream`.
///
/// Older widgets post a single `message` string instead of a `messages` array; both are
/// accepted and the single message is treated as one user turn.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
}

impl ChatRequest {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        let mut messages = self.messages;
        if let Some(single) = self.message {
            messages.push(ChatMessage::user(single));
        }
        messages
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub ok: bool,
    pub reply: String,
    pub persona: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub demo: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub ok: bool,
    pub id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct RealtimeSessionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RealtimeSessionResponse {
    pub ok: bool,
    pub client_secret: String,
    pub expires_at: i64,
    pub model: String,
    pub voice: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeRequest {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoiRequest {
    #[serde(default)]
    pub employees: Option<f64>,
    #[serde(default)]
    pub hours_saved_per_week: Option<f64>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub implementation_cost: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RoiResponse {
    pub ok: bool,
    pub estimate: RoiEstimate,
    pub summary: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub demo: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub ok: bool,
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsRequest {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub properties: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub ok: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct WidgetMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
}

/// JSON form of a widget audio upload, for embeds that cannot post a raw blob.
#[derive(Debug, Default, Deserialize)]
pub struct WidgetAudioJson {
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WidgetReplyResponse {
    pub ok: bool,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub history_len: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub demo: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub session: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub chat: bool,
    pub speech: bool,
    pub transcription: bool,
    pub realtime: bool,
    pub email: bool,
    pub sms: bool,
    pub analytics: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
    pub providers: ProviderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_becomes_user_turn() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"Hi there"}"#).unwrap();
        let messages = req.into_messages();
        assert_eq!(messages, vec![ChatMessage::user("Hi there")]);
    }

    #[test]
    fn demo_flag_omitted_when_false() {
        let body = serde_json::to_value(ChatResponse {
            ok: true,
            reply: "hello".into(),
            persona: "default".into(),
            demo: false,
        }).unwrap();
        assert!(body.get("demo").is_none());
    }
}
