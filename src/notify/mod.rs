pub mod analytics;
pub mod email;
pub mod sms;

use async_trait::async_trait;
use log::{ info, warn };
use std::sync::Arc;
use tokio::task::JoinHandle;

use self::email::EmailClient;
use self::sms::SmsClient;
use crate::error::RelayError;
use crate::models::lead::Lead;

#[async_trait]
pub trait LeadNotifier: Send + Sync {
    async fn notify(&self, lead: &Lead) -> Result<(), RelayError>;
}

/// Sends a lead to every configured owner channel (email, then SMS).
pub struct ChannelNotifier {
    email: Option<Arc<EmailClient>>,
    sms: Option<Arc<SmsClient>>,
}

impl ChannelNotifier {
    pub fn new(email: Option<Arc<EmailClient>>, sms: Option<Arc<SmsClient>>) -> Self {
        Self { email, sms }
    }

    pub fn is_configured(&self) -> bool {
        self.email.is_some() || self.sms.is_some()
    }
}

#[async_trait]
impl LeadNotifier for ChannelNotifier {
    async fn notify(&self, lead: &Lead) -> Result<(), RelayError> {
        if !self.is_configured() {
            return Err(RelayError::MissingCredential("lead notification"));
        }

        let mut first_error = None;
        if let Some(email) = &self.email {
            if let Err(e) = email.send_lead(lead).await {
                first_error.get_or_insert(e);
            }
        }
        if let Some(sms) = &self.sms {
            if let Err(e) = sms.notify_owner(&lead.summary()).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Fires a lead notification on a detached task.
///
/// The caller's response never waits on this and never learns the outcome: failures
/// are logged and dropped. Tasks still running at process exit are lost.
pub fn spawn_lead_notification(notifier: Arc<dyn LeadNotifier>, lead: Lead) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.notify(&lead).await {
            Ok(()) => info!("Lead {} notification sent ({})", lead.id, lead.source),
            Err(e) => warn!("Lead {} notification failed: {}", lead.id, e),
        }
    })
}

/// Runs a best-effort side call on a detached task, logging failure.
pub fn spawn_best_effort<F>(label: &'static str, fut: F) -> JoinHandle<()>
    where F: std::future::Future<Output = Result<(), RelayError>> + Send + 'static
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!("{} failed: {}", label, e);
        }
    })
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn unconfigured_channels_report_missing_credential() {
        let notifier = ChannelNotifier::new(None, None);
        let err = notifier.notify(&Lead::new("chat")).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn detached_failure_is_swallowed() {
        let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
        let handle = spawn_lead_notification(notifier.clone(), Lead::new("chat"));
        // The task completes normally even though the notifier failed.
        handle.await.unwrap();
        assert_eq!(notifier.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn best_effort_errors_do_not_panic() {
        let handle = spawn_best_effort("analytics", async {
            Err(RelayError::MissingCredential("analytics"))
        });
        handle.await.unwrap();
    }
}
