//! Notification transport trait

use async_trait::async_trait;

use crate::error::NotifyError;

/// Delivers a run summary to operators
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message to every recipient
    async fn send(&self, subject: &str, body: &str, recipients: &[String])
    -> Result<(), NotifyError>;

    /// Short transport name, for logs
    fn transport(&self) -> &'static str;
}
