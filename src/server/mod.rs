pub mod api;
pub mod widget;

use axum::extract::{ DefaultBodyLimit, Request, State };
use axum::middleware::{ self, Next };
use axum::response::{ IntoResponse, Response };
use axum::routing::{ get, post };
use axum::Router;
use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use log::{ info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::limit::RequestBodyLimitLayer;

use crate::agent::SiteAssistant;
use crate::cli::Args;
use crate::config::prompt::PromptStore;
use crate::config::AppConfig;
use crate::error::{ ApiError, RelayError };
use crate::history::{ HistoryStore, MemoryHistoryStore, PendingTurns };
use crate::llm::audio::{ SpeechClient, TranscriptionClient };
use crate::llm::chat::new_client as new_chat_client;
use crate::llm::realtime::RealtimeClient;
use crate::llm::LlmConfig;
use crate::notify::analytics::AnalyticsClient;
use crate::notify::email::EmailClient;
use crate::notify::sms::SmsClient;
use crate::notify::{ ChannelNotifier, LeadNotifier };

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Everything a handler can reach. Integrations without credentials are `None` and the
/// matching routes fall back or report 503.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub assistant: SiteAssistant,
    pub speech: Option<Arc<SpeechClient>>,
    pub transcriber: Option<Arc<TranscriptionClient>>,
    pub realtime: Option<Arc<RealtimeClient>>,
    pub email: Option<Arc<EmailClient>>,
    pub sms: Option<Arc<SmsClient>>,
    pub analytics: Option<Arc<AnalyticsClient>>,
    pub history: Arc<dyn HistoryStore>,
    pub pending: PendingTurns,
    limiter: Option<Arc<Limiter>>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self, RelayError> {
        Self::build(config, None)
    }

    /// Like `from_config`, with lead notifications going to `notifier` instead of the
    /// configured email/SMS channels.
    pub fn with_notifier(config: AppConfig, notifier: Arc<dyn LeadNotifier>) -> Result<Self, RelayError> {
        Self::build(config, Some(notifier))
    }

    fn build(config: AppConfig, notifier: Option<Arc<dyn LeadNotifier>>) -> Result<Self, RelayError> {
        config.validate()?;
        let prompts = PromptStore::new(config.prompts_path.clone())
            .map_err(|e| RelayError::InvalidConfig(format!("prompts: {}", e)))?;

        let chat_client = match new_chat_client(&LlmConfig::from_settings(&config.openai)) {
            Ok(client) => Some(client),
            Err(RelayError::MissingCredential(what)) => {
                info!("{} not configured, chat runs in demo mode", what);
                None
            }
            Err(e) => {
                return Err(e);
            }
        };

        let email = optional(EmailClient::from_settings(&config.email))?;
        let sms = optional(SmsClient::from_settings(&config.sms))?;
        let notifier = notifier.unwrap_or_else(|| {
            Arc::new(ChannelNotifier::new(email.clone(), sms.clone())) as Arc<dyn LeadNotifier>
        });

        let limiter = NonZeroU32::new(config.rate_limit_per_second).map(|per_second| {
            Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
        });

        Ok(Self {
            assistant: SiteAssistant::new(chat_client, Arc::new(prompts), notifier),
            speech: optional(SpeechClient::from_settings(&config.openai))?,
            transcriber: optional(TranscriptionClient::from_settings(&config.openai))?,
            realtime: optional(RealtimeClient::from_settings(&config.openai))?,
            email,
            sms,
            analytics: optional(AnalyticsClient::from_settings(&config.analytics))?,
            history: Arc::new(MemoryHistoryStore::new(config.widget_max_sessions)),
            pending: PendingTurns::default(),
            limiter,
            config: Arc::new(config),
        })
    }
}

/// A missing credential disables one integration; any other failure is fatal.
fn optional<T>(built: Result<T, RelayError>) -> Result<Option<Arc<T>>, RelayError> {
    match built {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(RelayError::MissingCredential(what)) => {
            info!("{} not configured", what);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let max_body = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(api::health))
        .route("/api/chat", post(api::chat))
        .route("/api/chat/stream", post(api::chat_stream))
        .route("/api/lead", post(api::lead))
        .route("/api/realtime/session", post(api::realtime_session))
        .route("/api/scope", post(api::scope))
        .route("/api/roi", post(api::roi))
        .route("/api/tts", post(api::tts))
        .route("/api/transcribe", post(api::transcribe))
        .route("/api/analytics", post(api::analytics))
        .route("/widget/{session}/messages", post(widget::message))
        .route("/widget/{session}/audio", post(widget::audio))
        .route("/widget/{session}/history", get(widget::history))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(cors)
        .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("Global rate limit exceeded, rejecting {} {}", req.method(), req.uri().path());
            return ApiError::TooManyRequests.into_response();
        }
    }
    next.run(req).await
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::from_args(&args);
    config.log_summary();

    let state = AppState::from_config(config)?;
    let app = build_router(state);
    let addr: SocketAddr = args.server_addr.parse()?;

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!("HTTPS server listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).handle(handle).serve(app.into_make_service()).await?;
        }
        (true, _, _) => {
            return Err("ENABLE_TLS is set but TLS_CERT_PATH or TLS_KEY_PATH is missing".into());
        }
        _ => {
            let listener = tokio::net::TcpListener
                ::bind(addr).await
                .map_err(|e| format!("Failed to bind {}: {}. Try a different port.", addr, e))?;
            info!("HTTP server listening on http://{}", addr);
            axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
