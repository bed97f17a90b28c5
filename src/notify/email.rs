use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use crate::config::EmailSettings;
use crate::error::RelayError;
use crate::llm::bearer_client;
use crate::models::lead::Lead;

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Transactional email provider client.
pub struct EmailClient {
    http: HttpClient,
    url: String,
    from: String,
    inbox: String,
}

impl EmailClient {
    pub fn from_settings(settings: &EmailSettings) -> Result<Self, RelayError> {
        let api_key = settings.api_key.as_deref().ok_or(RelayError::MissingCredential("email"))?;
        let inbox = settings.to.clone().ok_or(RelayError::MissingCredential("lead inbox"))?;
        Ok(Self {
            http: bearer_client(api_key)?,
            url: format!("{}/emails", settings.base_url.trim_end_matches('/')),
            from: settings.from.clone(),
            inbox,
        })
    }

    /// Sends one message and returns the provider's message id.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        reply_to: Option<&str>
    ) -> Result<String, RelayError> {
        let req = SendEmailRequest { from: &self.from, to: vec![to], subject, html, reply_to };
        let resp = self.http.post(&self.url).json(&req).send().await?;
        let parsed = RelayError::check(resp).await?.json::<SendEmailResponse>().await?;
        let id = parsed.id.ok_or_else(|| RelayError::Malformed("email response has no id".into()))?;
        info!("Email {} sent: {}", id, subject);
        Ok(id)
    }

    /// Notifies the company inbox about a lead. Replies go straight to the lead.
    pub async fn send_lead(&self, lead: &Lead) -> Result<String, RelayError> {
        let subject = format!("New lead from {}: {}", lead.source, lead.display_name());
        self.send(&self.inbox, &subject, &lead_html(lead), lead.email.as_deref()).await
    }
}

pub fn lead_html(lead: &Lead) -> String {
    let row = |label: &str, value: Option<&str>| -> String {
        value
            .map(|v| format!("<tr><th align=\"left\">{}</th><td>{}</td></tr>", label, escape_html(v)))
            .unwrap_or_default()
    };
    format!(
        "<h2>New website lead</h2><table>{}{}{}{}{}</table>{}",
        row("Name", lead.name.as_deref()),
        row("Email", lead.email.as_deref()),
        row("Phone", lead.phone.as_deref()),
        row("Company", lead.company.as_deref()),
        row("Source", Some(&lead.source)),
        lead.message
            .as_deref()
            .map(|m| format!("<h3>Message</h3><pre>{}</pre>", escape_html(m)))
            .unwrap_or_default()
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
