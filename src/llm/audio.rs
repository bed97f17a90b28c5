//! Speech synthesis and transcription against the language model provider.

use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::{ debug, info };
use reqwest::multipart::{ Form, Part };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::pin::Pin;

use super::bearer_client;
use crate::config::OpenAiSettings;
use crate::error::RelayError;

/// Raw upstream bytes, relayed to the caller untouched.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

const SPEECH_ROUTE: &str = "/v1/audio/speech";
const TRANSCRIPTION_ROUTE: &str = "/v1/audio/transcriptions";

/// Upper bound the provider accepts for one synthesis request.
pub const MAX_SPEECH_CHARS: usize = 4096;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

pub struct SpeechClient {
    http: HttpClient,
    url: String,
    model: String,
    default_voice: String,
}

impl SpeechClient {
    pub fn from_settings(settings: &OpenAiSettings) -> Result<Self, RelayError> {
        let api_key = settings.api_key
            .as_deref()
            .ok_or(RelayError::MissingCredential("speech synthesis"))?;
        Ok(Self {
            http: bearer_client(api_key)?,
            url: format!("{}{}", settings.base_url.trim_end_matches('/'), SPEECH_ROUTE),
            model: settings.tts_model.clone(),
            default_voice: settings.tts_voice.clone(),
        })
    }

    /// Requests MP3 audio and returns the provider's body as a byte stream.
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<ByteStream, RelayError> {
        let preview: String = text.chars().take(50).collect();
        info!("TTS: \"{}\"", preview);

        let req = SpeechRequest {
            model: &self.model,
            input: text,
            voice: voice.unwrap_or(&self.default_voice),
            response_format: "mp3",
        };
        let resp = self.http.post(&self.url).json(&req).send().await?;
        let resp = RelayError::check(resp).await?;

        Ok(Box::pin(resp.bytes_stream().map(|chunk| chunk.map_err(RelayError::Http))))
    }
}

pub struct TranscriptionClient {
    http: HttpClient,
    url: String,
    model: String,
}

impl TranscriptionClient {
    pub fn from_settings(settings: &OpenAiSettings) -> Result<Self, RelayError> {
        let api_key = settings.api_key
            .as_deref()
            .ok_or(RelayError::MissingCredential("transcription"))?;
        Ok(Self {
            http: bearer_client(api_key)?,
            url: format!("{}{}", settings.base_url.trim_end_matches('/'), TRANSCRIPTION_ROUTE),
            model: settings.transcribe_model.clone(),
        })
    }

    pub async fn transcribe(
        &self,
        audio: Bytes,
        file_name: &str,
        mime_type: &str
    ) -> Result<String, RelayError> {
        debug!("Transcribing {} bytes of {}", audio.len(), mime_type);

        let part = Part::bytes(audio.to_vec()).file_name(file_name.to_string()).mime_str(mime_type)?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        let resp = self.http.post(&self.url).multipart(form).send().await?;
        let parsed = RelayError::check(resp).await?.json::<TranscriptionResponse>().await?;

        let text = parsed.text
            .ok_or_else(|| RelayError::Malformed("transcription has no text".into()))?
            .trim()
            .to_string();
        info!("Transcribed {} chars", text.len());
        Ok(text)
    }
}

/// Picks a file extension the provider recognises for a browser recording's MIME type.
pub fn file_name_for_mime(mime_type: &str) -> &'static str {
    let base = mime_type.split(';').next().unwrap_or("").trim();
    match base {
        "audio/webm" | "video/webm" => "recording.webm",
        "audio/ogg" | "audio/opus" => "recording.ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "recording.m4a",
        "audio/mpeg" | "audio/mp3" => "recording.mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "recording.wav",
        _ => "recording.webm",
    }
}
