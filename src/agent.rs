use log::{ debug, info };
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::prompt::{ render, PromptConfig, PromptStore };
use crate::error::RelayError;
use crate::lead::newly_actionable_lead;
use crate::llm::chat::{ ChatClient, CompletionOptions, TokenStream };
use crate::models::chat::{ ChatMessage, Role };
use crate::notify::{ spawn_lead_notification, LeadNotifier };

pub const DEMO_PHRASE: &str = "I'm running in demo mode right now";

const DEMO_REPLY: &str =
    "Thanks for reaching out! I'm running in demo mode right now, so I can't answer in \
     detail. Leave your name and email and someone from {company} will get back to you.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Generated(String),
    /// Canned text served because no language model is configured.
    Demo(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Generated(text) | Reply::Demo(text) => text,
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Reply::Demo(_))
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Generated(text) | Reply::Demo(text) => text,
        }
    }
}

/// A request ready to send upstream: persona resolved, system prompt in front.
struct Prepared {
    persona: String,
    messages: Vec<ChatMessage>,
    options: CompletionOptions,
}

/// The website assistant: persona selection, the language model call (or the demo
/// fallback), and lead detection on every conversation it sees.
#[derive(Clone)]
pub struct SiteAssistant {
    chat_client: Option<Arc<dyn ChatClient>>,
    prompts: Arc<PromptStore>,
    notifier: Arc<dyn LeadNotifier>,
}

impl SiteAssistant {
    pub fn new(
        chat_client: Option<Arc<dyn ChatClient>>,
        prompts: Arc<PromptStore>,
        notifier: Arc<dyn LeadNotifier>
    ) -> Self {
        match &chat_client {
            Some(client) => info!("Site assistant using model {}", client.get_model()),
            None => info!("Site assistant in demo mode (no language model configured)"),
        }
        Self { chat_client, prompts, notifier }
    }

    pub fn is_live(&self) -> bool {
        self.chat_client.is_some()
    }

    pub async fn welcome(&self, persona: Option<&str>) -> Option<String> {
        let config = self.prompts.current().await;
        let (_, persona) = config.persona(persona);
        config.welcome(persona)
    }

    /// Resolves the persona name without calling upstream.
    pub async fn persona_name(&self, persona: Option<&str>) -> String {
        self.prompts.current().await.persona(persona).0.to_string()
    }

    pub async fn reply(
        &self,
        persona: Option<&str>,
        messages: &[ChatMessage]
    ) -> Result<(String, Reply), RelayError> {
        let config = self.prompts.current().await;
        let prepared = prepare(&config, persona, messages);
        let Some(client) = &self.chat_client else {
            return Ok((prepared.persona, Reply::Demo(demo_reply(&config))));
        };

        debug!("Chat ({}) with {} turns", prepared.persona, prepared.messages.len());
        let resp = client.complete(&prepared.messages, &prepared.options).await?;
        Ok((prepared.persona, Reply::Generated(resp.response)))
    }

    /// Streams the reply. Demo mode yields `Ok(None)`; the caller decides how to send the
    /// canned text.
    pub async fn reply_stream(
        &self,
        persona: Option<&str>,
        messages: &[ChatMessage]
    ) -> Result<Option<TokenStream>, RelayError> {
        let Some(client) = &self.chat_client else {
            return Ok(None);
        };
        let config = self.prompts.current().await;
        let prepared = prepare(&config, persona, messages);
        debug!("Streaming chat ({}) with {} turns", prepared.persona, prepared.messages.len());
        client.complete_stream(&prepared.messages, &prepared.options).await.map(Some)
    }

    pub async fn demo_text(&self) -> String {
        let config = self.prompts.current().await;
        demo_reply(&config)
    }

    /// Renders `template` for `persona` and returns the complete answer, or `None` in
    /// demo mode.
    pub async fn complete_template(
        &self,
        persona: &str,
        template: &str,
        values: &HashMap<String, String>
    ) -> Result<Option<String>, RelayError> {
        let Some(client) = &self.chat_client else {
            return Ok(None);
        };
        let prepared = self.prepare_template(persona, template, values).await?;
        let resp = client.complete(&prepared.messages, &prepared.options).await?;
        Ok(Some(resp.response))
    }

    pub async fn stream_template(
        &self,
        persona: &str,
        template: &str,
        values: &HashMap<String, String>
    ) -> Result<Option<TokenStream>, RelayError> {
        let Some(client) = &self.chat_client else {
            return Ok(None);
        };
        let prepared = self.prepare_template(persona, template, values).await?;
        client.complete_stream(&prepared.messages, &prepared.options).await.map(Some)
    }

    /// Fires a detached owner notification when the newest user turn completes a name plus
    /// contact. A lead already complete before that turn was notified earlier and is skipped.
    /// Returns the task handle so tests can await it.
    pub fn check_for_lead(&self, source: &str, messages: &[ChatMessage]) -> Option<JoinHandle<()>> {
        let candidate = newly_actionable_lead(messages)?;
        let lead = candidate.into_lead(source, messages);
        info!("Lead detected in {} conversation ({})", source, lead.display_name());
        Some(spawn_lead_notification(Arc::clone(&self.notifier), lead))
    }

    async fn prepare_template(
        &self,
        persona: &str,
        template: &str,
        values: &HashMap<String, String>
    ) -> Result<Prepared, RelayError> {
        let config = self.prompts.current().await;
        let request = config
            .render_template(template, values)
            .map_err(|e| RelayError::InvalidConfig(e.to_string()))?;
        Ok(prepare(&config, Some(persona), &[ChatMessage::user(request)]))
    }
}

/// Puts the persona's system prompt first. Caller-supplied system turns are dropped so a
/// browser cannot replace the persona.
fn prepare(config: &PromptConfig, persona: Option<&str>, messages: &[ChatMessage]) -> Prepared {
    let (name, persona) = config.persona(persona);
    let mut full = Vec::with_capacity(messages.len() + 1);
    full.push(ChatMessage::system(config.system_prompt(persona)));
    full.extend(messages.iter().filter(|m| m.role != Role::System).cloned());

    Prepared {
        persona: name.to_string(),
        messages: full,
        options: CompletionOptions {
            model: persona.model.clone(),
            temperature: persona.temperature,
            max_tokens: None,
        },
    }
}

fn demo_reply(config: &PromptConfig) -> String {
    render(DEMO_REPLY, &config.variables)
}
