use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::bearer_client;
use crate::config::OpenAiSettings;
use crate::error::RelayError;

const SESSIONS_ROUTE: &str = "/v1/realtime/sessions";

#[derive(Serialize)]
struct SessionRequest<'a> {
    model: &'a str,
    voice: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    client_secret: Option<ClientSecret>,
}

#[derive(Deserialize)]
struct ClientSecret {
    value: Option<String>,
    #[serde(default)]
    expires_at: i64,
}

/// Ephemeral credential the browser uses for one WebRTC connection. Never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeSession {
    pub client_secret: String,
    pub expires_at: i64,
    pub model: String,
    pub voice: String,
}

pub struct RealtimeClient {
    http: HttpClient,
    url: String,
    default_model: String,
    default_voice: String,
}

impl RealtimeClient {
    pub fn from_settings(settings: &OpenAiSettings) -> Result<Self, RelayError> {
        let api_key = settings.api_key
            .as_deref()
            .ok_or(RelayError::MissingCredential("realtime voice"))?;
        Ok(Self {
            http: bearer_client(api_key)?,
            url: format!("{}{}", settings.base_url.trim_end_matches('/'), SESSIONS_ROUTE),
            default_model: settings.realtime_model.clone(),
            default_voice: settings.realtime_voice.clone(),
        })
    }

    pub async fn mint_session(
        &self,
        model: Option<&str>,
        voice: Option<&str>
    ) -> Result<RealtimeSession, RelayError> {
        let model = model.unwrap_or(&self.default_model);
        let voice = voice.unwrap_or(&self.default_voice);

        let resp = self.http.post(&self.url).json(&SessionRequest { model, voice }).send().await?;
        let parsed = RelayError::check(resp).await?.json::<SessionResponse>().await?;

        let secret = parsed.client_secret
            .ok_or_else(|| RelayError::Malformed("session has no client_secret".into()))?;
        let value = secret.value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RelayError::Malformed("client_secret has no value".into()))?;

        info!("Minted realtime session (model={}, voice={})", model, voice);
        Ok(RealtimeSession {
            client_secret: value,
            expires_at: secret.expires_at,
            model: model.to_string(),
            voice: voice.to_string(),
        })
    }
}
