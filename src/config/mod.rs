pub mod prompt;

use crate::cli::Args;
use crate::error::RelayError;
use log::info;
use url::Url;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_VOICE: &str = "alloy";
pub const DEFAULT_TRANSCRIBE_MODEL: &str = "whisper-1";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";
pub const DEFAULT_REALTIME_VOICE: &str = "verse";

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty_opt(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(non_empty)
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub transcribe_model: String,
    pub realtime_model: String,
    pub realtime_voice: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
            transcribe_model: DEFAULT_TRANSCRIBE_MODEL.to_string(),
            realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            realtime_voice: DEFAULT_REALTIME_VOICE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub from: String,
    pub to: Option<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.resend.com".to_string(),
            from: "Website <leads@example.com>".to_string(),
            to: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub notify_number: Option<String>,
    pub base_url: String,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            notify_number: None,
            base_url: "https://api.twilio.com".to_string(),
        }
    }
}

impl SmsSettings {
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() &&
            self.auth_token.is_some() &&
            self.from_number.is_some() &&
            self.notify_number.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Resolved runtime configuration. Built from `Args`; tests build it directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAiSettings,
    pub email: EmailSettings,
    pub sms: SmsSettings,
    pub analytics: AnalyticsSettings,
    pub prompts_path: Option<String>,
    pub widget_max_sessions: usize,
    pub max_body_bytes: usize,
    pub rate_limit_per_second: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiSettings::default(),
            email: EmailSettings::default(),
            sms: SmsSettings::default(),
            analytics: AnalyticsSettings::default(),
            prompts_path: None,
            widget_max_sessions: 1000,
            max_body_bytes: 10 * 1024 * 1024,
            rate_limit_per_second: 0,
        }
    }
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            openai: OpenAiSettings {
                api_key: non_empty(&args.openai_api_key),
                base_url: args.openai_base_url.trim_end_matches('/').to_string(),
                chat_model: non_empty_opt(&args.chat_model).unwrap_or_else(||
                    DEFAULT_CHAT_MODEL.to_string()
                ),
                tts_model: non_empty_opt(&args.tts_model).unwrap_or_else(||
                    DEFAULT_TTS_MODEL.to_string()
                ),
                tts_voice: non_empty_opt(&args.tts_voice).unwrap_or_else(||
                    DEFAULT_TTS_VOICE.to_string()
                ),
                transcribe_model: non_empty_opt(&args.transcribe_model).unwrap_or_else(||
                    DEFAULT_TRANSCRIBE_MODEL.to_string()
                ),
                realtime_model: non_empty_opt(&args.realtime_model).unwrap_or_else(||
                    DEFAULT_REALTIME_MODEL.to_string()
                ),
                realtime_voice: non_empty_opt(&args.realtime_voice).unwrap_or_else(||
                    DEFAULT_REALTIME_VOICE.to_string()
                ),
            },
            email: EmailSettings {
                api_key: non_empty(&args.resend_api_key),
                base_url: args.resend_base_url.trim_end_matches('/').to_string(),
                from: args.lead_email_from.clone(),
                to: non_empty(&args.lead_email_to),
            },
            sms: SmsSettings {
                account_sid: non_empty(&args.twilio_account_sid),
                auth_token: non_empty(&args.twilio_auth_token),
                from_number: non_empty(&args.twilio_from_number),
                notify_number: non_empty(&args.lead_sms_to),
                base_url: args.twilio_base_url.trim_end_matches('/').to_string(),
            },
            analytics: AnalyticsSettings {
                endpoint: non_empty(&args.analytics_endpoint),
                api_key: non_empty(&args.analytics_api_key),
            },
            prompts_path: non_empty_opt(&args.prompts_path),
            widget_max_sessions: args.widget_max_sessions.max(1),
            max_body_bytes: args.max_body_bytes,
            rate_limit_per_second: args.rate_limit_per_second,
        }
    }

    /// Rejects provider URLs that could never be reached, before any request is made.
    pub fn validate(&self) -> Result<(), RelayError> {
        let urls = [
            ("OPENAI_BASE_URL", Some(self.openai.base_url.as_str())),
            ("RESEND_BASE_URL", Some(self.email.base_url.as_str())),
            ("TWILIO_BASE_URL", Some(self.sms.base_url.as_str())),
            ("ANALYTICS_ENDPOINT", self.analytics.endpoint.as_deref()),
        ];
        for (name, value) in urls {
            let Some(value) = value else {
                continue;
            };
            let parsed = Url::parse(value).map_err(|e| {
                RelayError::InvalidConfig(format!("{} '{}' is not a valid URL: {}", name, value, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(RelayError::InvalidConfig(format!("{} must be an http(s) URL", name)));
            }
        }
        Ok(())
    }

    /// Logs which integrations are live. Never prints secret values.
    pub fn log_summary(&self) {
        let status = |present: bool| if present { "configured" } else { "missing" };
        info!("--- Core Configuration ---");
        info!("LLM API Key: {}", status(self.openai.api_key.is_some()));
        info!("LLM Base URL: {}", self.openai.base_url);
        info!("Chat Model: {}", self.openai.chat_model);
        info!("TTS Model/Voice: {} / {}", self.openai.tts_model, self.openai.tts_voice);
        info!("Transcription Model: {}", self.openai.transcribe_model);
        info!(
            "Realtime Model/Voice: {} / {}",
            self.openai.realtime_model,
            self.openai.realtime_voice
        );
        info!("Email API Key: {}", status(self.email.api_key.is_some()));
        info!("Lead Inbox: {}", status(self.email.to.is_some()));
        info!("SMS Alerts: {}", status(self.sms.is_configured()));
        info!("Analytics: {}", status(self.analytics.endpoint.is_some()));
        info!("Prompts Path: {}", self.prompts_path.as_deref().unwrap_or("built-in"));
        info!("Widget Session Cap: {}", self.widget_max_sessions);
        info!("Rate Limit: {}/s", self.rate_limit_per_second);
        info!("-------------------------");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn blank_credentials_are_treated_as_unset() {
        let args = Args::parse_from([
            "consult-relay",
            "--openai-api-key",
            "   ",
            "--chat-model",
            "",
            "--openai-base-url",
            "http://localhost:9000/",
        ]);
        let config = AppConfig::from_args(&args);
        assert!(config.openai.api_key.is_none());
        assert_eq!(config.openai.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.openai.base_url, "http://localhost:9000");
    }

    #[test]
    fn default_urls_are_valid() {
        let args = Args::parse_from(["consult-relay"]);
        assert!(AppConfig::from_args(&args).validate().is_ok());
    }

    #[test]
    fn bad_analytics_endpoint_is_rejected() {
        let mut config = AppConfig::default();
        config.openai.base_url = "https://api.openai.com".into();
        config.email.base_url = "https://api.resend.com".into();
        config.sms.base_url = "https://api.twilio.com".into();
        config.analytics.endpoint = Some("ftp://events.example.com".into());
        assert!(matches!(config.validate(), Err(RelayError::InvalidConfig(_))));
        config.analytics.endpoint = Some("not a url".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn sms_requires_every_field() {
        let mut sms = SmsSettings::default();
        sms.account_sid = Some("AC123".into());
        sms.auth_token = Some("secret".into());
        sms.from_number = Some("+15550100".into());
        assert!(!sms.is_configured());
        sms.notify_number = Some("+15550199".into());
        assert!(sms.is_configured());
    }
}
