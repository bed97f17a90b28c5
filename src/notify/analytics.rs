use chrono::Utc;
use log::debug;
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::AnalyticsSettings;
use crate::error::RelayError;

#[derive(Serialize)]
struct AnalyticsEvent<'a> {
    event: &'a str,
    properties: &'a JsonValue,
    timestamp: String,
}

pub struct AnalyticsClient {
    http: HttpClient,
    endpoint: String,
    api_key: Option<String>,
}

impl AnalyticsClient {
    pub fn from_settings(settings: &AnalyticsSettings) -> Result<Self, RelayError> {
        let endpoint = settings.endpoint.clone().ok_or(RelayError::MissingCredential("analytics"))?;
        Ok(Self { http: HttpClient::new(), endpoint, api_key: settings.api_key.clone() })
    }

    pub async fn track(&self, event: &str, properties: &JsonValue) -> Result<(), RelayError> {
        let body = AnalyticsEvent { event, properties, timestamp: Utc::now().to_rfc3339() };
        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        RelayError::check(req.send().await?).await?;
        debug!("Analytics event '{}' forwarded", event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn track_forwards_event_with_key() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/events")
                .header("authorization", "Bearer an_key")
                .json_body_partial(r#"{"event":"cta_click","properties":{"button":"book"}}"#);
            then.status(204);
        }).await;

        let client = AnalyticsClient::from_settings(&AnalyticsSettings {
            endpoint: Some(format!("{}/events", server.base_url())),
            api_key: Some("an_key".into()),
        }).unwrap();
        client.track("cta_click", &json!({ "button": "book" })).await.unwrap();
        mock.assert_async().await;
    }
}
