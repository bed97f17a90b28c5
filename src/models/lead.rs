use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

/// A prospective customer's contact details. Forwarded once, then dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: Option<String>,
    pub source: String,
    pub captured_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            email: None,
            phone: None,
            company: None,
            message: None,
            source: source.into(),
            captured_at: Utc::now(),
        }
    }

    /// Best available way to reach the lead.
    pub fn contact(&self) -> Option<&str> {
        self.email.as_deref().or(self.phone.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown visitor")
    }

    /// One-line summary used for SMS bodies and log lines.
    pub fn summary(&self) -> String {
        let mut out = format!("New lead ({}): {}", self.source, self.display_name());
        if let Some(company) = &self.company {
            out.push_str(&format!(" from {}", company));
        }
        if let Some(contact) = self.contact() {
            out.push_str(&format!(" - {}", contact));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prefers_email_over_phone() {
        let mut lead = Lead::new("chat");
        lead.name = Some("Ada".into());
        lead.email = Some("ada@example.com".into());
        lead.phone = Some("+1 555 010 0199".into());
        assert_eq!(lead.summary(), "New lead (chat): Ada - ada@example.com");
    }

    #[test]
    fn summary_without_name() {
        let mut lead = Lead::new("contact_form");
        lead.company = Some("Acme".into());
        assert_eq!(lead.summary(), "New lead (contact_form): Unknown visitor from Acme");
    }
}
