//! Password reset notifications
//!
//! Delivery is best effort: the account service spawns the send and only
//! logs a failure. Email delivery itself is outside this crate; the default
//! notifier writes to the log.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_code(&self, email: &str, first_name: &str, code: &str) -> Result<()>;
}

/// Logs that a code was issued. The code itself only appears at debug level.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_code(&self, email: &str, first_name: &str, code: &str) -> Result<()> {
        tracing::info!("Password reset code issued for {} <{}>", first_name, email);
        tracing::debug!("Reset code for {}: {}", email, code);
        Ok(())
    }
}
