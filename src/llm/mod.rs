pub mod audio;
pub mod chat;
pub mod realtime;

use reqwest::header::{ HeaderMap, HeaderValue, AUTHORIZATION };
use reqwest::Client as HttpClient;

use crate::config::OpenAiSettings;
use crate::error::RelayError;

/// Connection settings for one language model provider account.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub completion_model: String,
}

impl LlmConfig {
    pub fn from_settings(settings: &OpenAiSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            completion_model: settings.chat_model.clone(),
        }
    }

    pub fn require_key(&self) -> Result<&str, RelayError> {
        self.api_key.as_deref().ok_or(RelayError::MissingCredential("language model"))
    }

    pub fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }
}

/// Builds a client that sends the provider's bearer token on every request.
pub fn bearer_client(api_key: &str) -> Result<HttpClient, RelayError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
            RelayError::InvalidConfig(format!("Invalid API key format: {}", e))
        )?
    );
    HttpClient::builder().default_headers(headers).build().map_err(RelayError::Http)
}
