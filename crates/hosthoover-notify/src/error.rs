//! Error types for hosthoover-notify

use thiserror::Error;

/// Errors that can occur while delivering a notification
#[derive(Error, Debug, Clone)]
pub enum NotifyError {
    /// No recipients given
    #[error("no recipients configured")]
    NoRecipients,

    /// Sender or recipient is not a valid mailbox
    #[error("invalid address {address}: {reason}")]
    InvalidAddress {
        /// Offending address
        address: String,
        /// Parser message
        reason: String,
    },

    /// Message could not be assembled
    #[error("failed to build message: {0}")]
    MessageBuild(String),

    /// Transport rejected or failed to deliver
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}
