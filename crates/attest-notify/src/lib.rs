//! Outbound notifications for submitted attestations.
//!
//! Delivery is attempted exactly once. Callers treat a failed send as a warning: by the time a
//! notification goes out, the attestation it describes is already on the log.

mod message;
mod smtp;

pub use message::attestation_summary;
pub use smtp::{SmtpNotifier, SmtpSettings};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("no recipients")]
    NoRecipients,
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A message ready to hand to a [`Notifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Whether a successful `send` actually reaches the recipients.
    fn delivers(&self) -> bool {
        true
    }
}

/// Writes notifications to the log instead of delivering them.
///
/// Used when no mail transport is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        log::info!(
            "notification (not delivered, no mail transport configured) to [{}]: {}\n{}",
            notification.recipients.join(", "),
            notification.subject,
            notification.body
        );
        Ok(())
    }

    fn delivers(&self) -> bool {
        false
    }
}
