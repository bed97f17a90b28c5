use log::info;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::config::SmsSettings;
use crate::error::RelayError;

/// SMS bodies longer than this are split into several billable segments upstream.
const MAX_SMS_CHARS: usize = 320;

#[derive(Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

pub struct SmsClient {
    http: HttpClient,
    url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    notify_number: String,
}

impl SmsClient {
    pub fn from_settings(settings: &SmsSettings) -> Result<Self, RelayError> {
        let missing = || RelayError::MissingCredential("sms");
        let account_sid = settings.account_sid.clone().ok_or_else(missing)?;
        Ok(Self {
            http: HttpClient::new(),
            url: format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                settings.base_url.trim_end_matches('/'),
                account_sid
            ),
            auth_token: settings.auth_token.clone().ok_or_else(missing)?,
            from_number: settings.from_number.clone().ok_or_else(missing)?,
            notify_number: settings.notify_number.clone().ok_or_else(missing)?,
            account_sid,
        })
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<String, RelayError> {
        let body = truncate_chars(body, MAX_SMS_CHARS);
        let form = [("To", to), ("From", self.from_number.as_str()), ("Body", body.as_str())];
        let resp = self.http
            .post(&self.url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send().await?;
        let parsed = RelayError::check(resp).await?.json::<MessageResponse>().await?;
        let sid = parsed.sid.ok_or_else(|| RelayError::Malformed("sms response has no sid".into()))?;
        info!("SMS {} queued", sid);
        Ok(sid)
    }

    /// Texts the configured owner number.
    pub async fn notify_owner(&self, body: &str) -> Result<String, RelayError> {
        self.send(&self.notify_number, body).await
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn long_bodies_are_truncated() {
        let text = "x".repeat(400);
        let out = truncate_chars(&text, MAX_SMS_CHARS);
        assert_eq!(out.chars().count(), MAX_SMS_CHARS);
        assert!(out.ends_with('…'));
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn notify_owner_posts_form_with_basic_auth() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/2010-04-01/Accounts/AC123/Messages.json")
                .header_exists("authorization")
                .x_www_form_urlencoded_tuple("To", "+15550199")
                .x_www_form_urlencoded_tuple("From", "+15550100");
            then.status(201).json_body(json!({ "sid": "SM1" }));
        }).await;

        let client = SmsClient::from_settings(&SmsSettings {
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550100".into()),
            notify_number: Some("+15550199".into()),
            base_url: server.base_url(),
        }).unwrap();
        assert_eq!(client.notify_owner("New lead").await.unwrap(), "SM1");
        mock.assert_async().await;
    }
}
