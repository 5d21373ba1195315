//! hosthoover-notify: Failure notifications
//!
//! Provides the `send(subject, body, recipients)` contract and an SMTP transport.

pub mod error;
pub mod smtp;
pub mod traits;

pub use error::NotifyError;
pub use smtp::{SmtpNotifier, SmtpSettings};
pub use traits::Notifier;
