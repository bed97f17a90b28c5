use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ Multipart, State };
use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::{ debug, info, warn };
use serde_json::Value as JsonValue;

use super::AppState;
use crate::documents::{
    canned_roi_summary,
    canned_scope,
    compute_roi,
    scope_values,
    ROI_TEMPLATE,
    SCOPE_TEMPLATE,
};
use crate::error::{ ApiError, RelayError };
use crate::llm::audio::{ file_name_for_mime, MAX_SPEECH_CHARS };
use crate::models::api::{
    Accepted,
    AnalyticsRequest,
    ChatRequest,
    ChatResponse,
    HealthResponse,
    LeadRequest,
    LeadResponse,
    ProviderStatus,
    RealtimeSessionRequest,
    RealtimeSessionResponse,
    RoiRequest,
    RoiResponse,
    ScopeRequest,
    SpeechRequest,
    TranscriptionResponse,
};
use crate::models::lead::Lead;
use crate::notify::spawn_best_effort;
use crate::relay::{ relay_stream, single_chunk, AUDIO_MPEG, TEXT_MARKDOWN, TEXT_PLAIN };
use crate::validate::{
    require_field,
    require_messages,
    require_number,
    require_text,
    validate_lead,
};

const DEFAULT_LEAD_SOURCE: &str = "contact_form";
const DEFAULT_AUDIO_MIME: &str = "audio/webm";
const TRANSCRIPTION_DEMO_MESSAGE: &str =
    "Voice input is in demo mode right now. Please type your message instead.";

/// Accepts an empty or content-type-less body as the request's defaults.
pub(crate) fn json_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        providers: ProviderStatus {
            chat: state.assistant.is_live(),
            speech: state.speech.is_some(),
            transcription: state.transcriber.is_some(),
            realtime: state.realtime.is_some(),
            email: state.email.is_some(),
            sms: state.sms.is_some(),
            analytics: state.analytics.is_some(),
        },
    })
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    let persona = req.persona.clone();
    let messages = req.into_messages();
    require_messages(&messages)?;

    let (persona, reply) = state.assistant.reply(persona.as_deref(), &messages).await?;
    state.assistant.check_for_lead("chat", &messages);

    Ok(
        Json(ChatResponse {
            ok: true,
            demo: reply.is_demo(),
            reply: reply.into_text(),
            persona,
        })
    )
}

pub async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let persona = req.persona.clone();
    let messages = req.into_messages();
    require_messages(&messages)?;

    let response = match state.assistant.reply_stream(persona.as_deref(), &messages).await? {
        Some(tokens) => relay_stream(tokens, TEXT_PLAIN).await?,
        None => single_chunk(state.assistant.demo_text().await, TEXT_PLAIN),
    };
    // The first chunk has arrived, so the upstream call succeeded.
    state.assistant.check_for_lead("chat", &messages);
    Ok(response)
}

/// Contact form submission. The inbox email is the point of the request and is awaited;
/// the owner SMS is a detached extra.
pub async fn lead(
    State(state): State<AppState>,
    payload: Result<Json<LeadRequest>, JsonRejection>
) -> Result<Json<LeadResponse>, ApiError> {
    let req = json_or_default(payload)?;
    validate_lead(&req)?;
    let email = state.email.clone().ok_or(RelayError::MissingCredential("email"))?;

    let mut lead = Lead::new(trimmed(req.source).unwrap_or_else(|| DEFAULT_LEAD_SOURCE.to_string()));
    lead.name = trimmed(req.name);
    lead.email = trimmed(req.email);
    lead.phone = trimmed(req.phone);
    lead.company = trimmed(req.company);
    lead.message = trimmed(req.message);

    email.send_lead(&lead).await?;
    info!("Lead {} captured from {}", lead.id, lead.source);

    if let Some(sms) = state.sms.clone() {
        let summary = lead.summary();
        spawn_best_effort("Lead SMS", async move { sms.notify_owner(&summary).await.map(|_| ()) });
    }

    Ok(Json(LeadResponse { ok: true, id: lead.id }))
}

pub async fn realtime_session(
    State(state): State<AppState>,
    payload: Result<Json<RealtimeSessionRequest>, JsonRejection>
) -> Result<Json<RealtimeSessionResponse>, ApiError> {
    let req = json_or_default(payload)?;
    let client = state.realtime.clone().ok_or(RelayError::MissingCredential("realtime voice"))?;

    let session = client.mint_session(
        trimmed(req.model).as_deref(),
        trimmed(req.voice).as_deref()
    ).await?;

    Ok(
        Json(RealtimeSessionResponse {
            ok: true,
            client_secret: session.client_secret,
            expires_at: session.expires_at,
            model: session.model,
            voice: session.voice,
        })
    )
}

pub async fn scope(
    State(state): State<AppState>,
    payload: Result<Json<ScopeRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let goals = require_field("goals", req.goals.as_deref())?;
    let values = scope_values(&req, goals);

    match state.assistant.stream_template("scope", SCOPE_TEMPLATE, &values).await? {
        Some(tokens) => relay_stream(tokens, TEXT_MARKDOWN).await,
        None => Ok(single_chunk(canned_scope(&req, goals), TEXT_MARKDOWN)),
    }
}

pub async fn roi(
    State(state): State<AppState>,
    payload: Result<Json<RoiRequest>, JsonRejection>
) -> Result<Json<RoiResponse>, ApiError> {
    let Json(req) = payload?;
    let estimate = compute_roi(
        require_number("employees", req.employees)?,
        require_number("hours_saved_per_week", req.hours_saved_per_week)?,
        require_number("hourly_rate", req.hourly_rate)?,
        require_number("implementation_cost", req.implementation_cost)?
    );

    // The figures stand on their own, so a failed write-up degrades to the canned summary.
    let generated = match state.assistant.complete_template("roi", ROI_TEMPLATE, &estimate.template_values()).await {
        Ok(summary) => summary.filter(|s| !s.trim().is_empty()),
        Err(e) => {
            warn!("ROI summary generation failed, using canned summary: {}", e);
            None
        }
    };
    let demo = generated.is_none();
    let summary = generated.unwrap_or_else(|| canned_roi_summary(&estimate));

    Ok(Json(RoiResponse { ok: true, estimate, summary, demo }))
}

pub async fn tts(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let text = require_text("text", req.text.as_deref(), MAX_SPEECH_CHARS)?;
    let client = state.speech.clone().ok_or(RelayError::MissingCredential("speech synthesis"))?;

    let audio = client.synthesize(text, trimmed(req.voice).as_deref()).await?;
    relay_stream(audio, AUDIO_MPEG).await
}

pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut multipart = multipart?;

    let mut upload: Option<(Bytes, String)> = None;
    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("audio") | Some("file")) {
            continue;
        }
        let mime = field.content_type().unwrap_or(DEFAULT_AUDIO_MIME).to_string();
        let data = field.bytes().await?;
        if !data.is_empty() {
            upload = Some((data, mime));
            break;
        }
    }
    let (audio, mime) = upload.ok_or_else(|| ApiError::BadRequest("audio is required".into()))?;

    let Some(client) = state.transcriber.clone() else {
        debug!("Transcription not configured, returning demo response");
        return Ok(
            Json(TranscriptionResponse {
                ok: true,
                text: String::new(),
                demo: true,
                message: Some(TRANSCRIPTION_DEMO_MESSAGE.to_string()),
            })
        );
    };

    let text = client.transcribe(audio, file_name_for_mime(&mime), &mime).await?;
    Ok(Json(TranscriptionResponse { ok: true, text, demo: false, message: None }))
}

/// Accepted immediately; forwarding happens on a detached task.
pub async fn analytics(
    State(state): State<AppState>,
    payload: Result<Json<AnalyticsRequest>, JsonRejection>
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let event = require_field("event", req.event.as_deref())?.to_string();
    let properties = req.properties.unwrap_or_else(|| JsonValue::Object(Default::default()));

    match state.analytics.clone() {
        Some(client) => {
            spawn_best_effort("Analytics forward", async move { client.track(&event, &properties).await });
        }
        None => debug!("Analytics not configured, dropping event '{}'", event),
    }

    Ok((StatusCode::ACCEPTED, Json(Accepted { ok: true })))
}
