//! Embed widget protocol: one server-side chat panel per session id.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ Path, State };
use axum::http::{ header, HeaderMap };
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{ debug, warn };

use super::AppState;
use crate::error::ApiError;
use crate::llm::audio::file_name_for_mime;
use crate::models::api::{ HistoryResponse, WidgetAudioJson, WidgetMessageRequest, WidgetReplyResponse };
use crate::validate::require_field;
use crate::widget::{ ChatPanel, WidgetError, DEFAULT_WELCOME, REPLY_FAILED };

const MAX_SESSION_ID_LEN: usize = 128;
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

fn check_session_id(session: &str) -> Result<(), ApiError> {
    let valid = !session.is_empty() &&
        session.len() <= MAX_SESSION_ID_LEN &&
        session.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest("session must be 1-128 letters, digits, '-' or '_'".into()))
    }
}

impl From<WidgetError> for ApiError {
    fn from(err: WidgetError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Runs one user turn through the session's panel and stores the result. A second turn
/// for the same session while one is in flight is rejected as `AwaitingReply`.
async fn converse(
    state: &AppState,
    session: &str,
    text: &str,
    transcript: Option<String>
) -> Result<WidgetReplyResponse, ApiError> {
    let _turn = state.pending.begin(session).ok_or(WidgetError::AwaitingReply)?;
    let welcome = state.assistant.welcome(None).await.unwrap_or_else(|| DEFAULT_WELCOME.to_string());
    let stored = state.history
        .get_conversation(session).await
        .map(|c| c.messages)
        .unwrap_or_default();
    let mut panel = ChatPanel::resume(stored, welcome);

    let messages = panel.send(text)?.to_vec();

    match state.assistant.reply(None, &messages).await {
        Ok((_, reply)) => {
            state.assistant.check_for_lead("widget", &messages);
            let demo = reply.is_demo();
            let text = reply.into_text();
            panel.receive_reply(text.clone());
            state.history.save_conversation(session, panel.messages()).await;
            Ok(WidgetReplyResponse {
                ok: true,
                reply: text,
                transcript,
                history_len: panel.messages().len(),
                demo,
            })
        }
        Err(e) => {
            panel.fail(REPLY_FAILED);
            state.history.save_conversation(session, panel.messages()).await;
            Err(e.into())
        }
    }
}

pub async fn message(
    State(state): State<AppState>,
    Path(session): Path<String>,
    payload: Result<Json<WidgetMessageRequest>, JsonRejection>
) -> Result<Json<WidgetReplyResponse>, ApiError> {
    check_session_id(&session)?;
    let Json(req) = payload?;
    let content = require_field("content", req.content.as_deref())?;
    converse(&state, &session, content, None).await.map(Json)
}

/// Accepts the recording as a raw body (content type = audio MIME type) or as JSON with a
/// base64 payload.
pub async fn audio(
    State(state): State<AppState>,
    Path(session): Path<String>,
    headers: HeaderMap,
    body: Bytes
) -> Result<Json<WidgetReplyResponse>, ApiError> {
    check_session_id(&session)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_AUDIO_MIME)
        .to_string();
    let (audio, mime) = if content_type.starts_with("application/json") {
        decode_json_audio(&body)?
    } else {
        (body, content_type)
    };
    if audio.is_empty() {
        return Err(ApiError::BadRequest("audio is required".into()));
    }

    let Some(transcriber) = state.transcriber.clone() else {
        debug!("Transcription not configured, widget {} gets a demo reply", session);
        let stored = state.history.get_conversation(&session).await;
        return Ok(
            Json(WidgetReplyResponse {
                ok: true,
                reply: state.assistant.demo_text().await,
                transcript: None,
                history_len: stored.map(|c| c.messages.len()).unwrap_or(0),
                demo: true,
            })
        );
    };

    let transcript = transcriber.transcribe(audio, file_name_for_mime(&mime), &mime).await?;
    if transcript.is_empty() {
        warn!("Widget {} audio produced an empty transcript", session);
        return Err(ApiError::BadRequest("no speech detected in audio".into()));
    }
    converse(&state, &session, &transcript, Some(transcript.clone())).await.map(Json)
}

fn decode_json_audio(body: &[u8]) -> Result<(Bytes, String), ApiError> {
    let req: WidgetAudioJson = serde_json
        ::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
    let encoded = require_field("audio_base64", req.audio_base64.as_deref())?;
    // Browsers often send a data URL; keep only the payload.
    let encoded = encoded.rsplit_once(',').map(|(_, data)| data).unwrap_or(encoded);
    let audio = BASE64.decode(encoded).map_err(|e| {
        ApiError::BadRequest(format!("audio_base64 is not valid base64: {}", e))
    })?;
    let mime = req.mime_type.filter(|m| !m.trim().is_empty()).unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string());
    Ok((Bytes::from(audio), mime))
}

pub async fn history(
    State(state): State<AppState>,
    Path(session): Path<String>
) -> Result<Json<HistoryResponse>, ApiError> {
    check_session_id(&session)?;
    let messages = state.history
        .get_conversation(&session).await
        .map(|c| c.messages)
        .unwrap_or_default();
    Ok(Json(HistoryResponse { ok: true, session, messages }))
}
