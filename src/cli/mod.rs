use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Language Model Provider Args ---
    /// API key for the hosted language model provider. Chat, speech, transcription and
    /// realtime routes fall back to demo mode when empty.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub openai_api_key: String,

    /// Base URL of the language model provider API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub openai_base_url: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, gpt-4o)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Model used for text-to-speech.
    #[arg(long, env = "TTS_MODEL")]
    pub tts_model: Option<String>,

    /// Voice used for text-to-speech when the request does not name one.
    #[arg(long, env = "TTS_VOICE")]
    pub tts_voice: Option<String>,

    /// Model used for speech-to-text.
    #[arg(long, env = "TRANSCRIBE_MODEL")]
    pub transcribe_model: Option<String>,

    /// Model used when minting realtime voice sessions.
    #[arg(long, env = "REALTIME_MODEL")]
    pub realtime_model: Option<String>,

    /// Voice used for realtime sessions.
    #[arg(long, env = "REALTIME_VOICE")]
    pub realtime_voice: Option<String>,

    // --- Email Provider Args ---
    /// API key for the transactional email provider.
    #[arg(long, env = "RESEND_API_KEY", default_value = "")]
    pub resend_api_key: String,

    /// Base URL of the transactional email provider.
    #[arg(long, env = "RESEND_BASE_URL", default_value = "https://api.resend.com")]
    pub resend_base_url: String,

    /// Sender address for lead notification emails.
    #[arg(long, env = "LEAD_EMAIL_FROM", default_value = "Website <leads@example.com>")]
    pub lead_email_from: String,

    /// Inbox that receives lead notifications.
    #[arg(long, env = "LEAD_EMAIL_TO", default_value = "")]
    pub lead_email_to: String,

    // --- SMS Provider Args ---
    #[arg(long, env = "TWILIO_ACCOUNT_SID", default_value = "")]
    pub twilio_account_sid: String,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", default_value = "")]
    pub twilio_auth_token: String,

    /// Sending number registered with the SMS provider.
    #[arg(long, env = "TWILIO_FROM_NUMBER", default_value = "")]
    pub twilio_from_number: String,

    /// Phone number that receives lead SMS alerts.
    #[arg(long, env = "LEAD_SMS_TO", default_value = "")]
    pub lead_sms_to: String,

    #[arg(long, env = "TWILIO_BASE_URL", default_value = "https://api.twilio.com")]
    pub twilio_base_url: String,

    // --- Analytics Args ---
    /// Event ingestion endpoint. Events are dropped when unset.
    #[arg(long, env = "ANALYTICS_ENDPOINT", default_value = "")]
    pub analytics_endpoint: String,

    #[arg(long, env = "ANALYTICS_API_KEY", default_value = "")]
    pub analytics_api_key: String,

    // --- General App Args ---
    /// Optional path to a persona prompt file. Built-in personas are used when unset.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Maximum number of live embed-widget sessions kept in memory.
    #[arg(long, env = "WIDGET_MAX_SESSIONS", default_value = "1000")]
    pub widget_max_sessions: usize,

    /// Maximum accepted request body size in bytes (audio uploads included).
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "10485760")]
    pub max_body_bytes: usize,

    /// Global request budget per second. 0 disables rate limiting.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "20")]
    pub rate_limit_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
