use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::{Notification, Notifier, NotifyError};

/// Connection settings for an SMTP relay that speaks STARTTLS.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub timeout: Duration,
}

/// Delivers notifications through an SMTP relay. One attempt per message, no retry.
pub struct SmtpNotifier {
    sender: Mailbox,
    transport: SmtpTransport,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let sender = parse_mailbox(&settings.sender)?;

        let mut builder = SmtpTransport::starttls_relay(&settings.host)?
            .port(settings.port)
            .timeout(Some(settings.timeout));
        if let Some(username) = settings.username.as_ref() {
            let password = settings
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            sender,
            transport: builder.build(),
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &notification.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        Ok(builder.body(notification.body.clone())?)
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;
        self.transport.send(&message)?;
        log::info!(
            "sent `{}` to {} recipient(s)",
            notification.subject,
            notification.recipients.len()
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|source| NotifyError::Address {
            address: address.to_string(),
            source,
        })
}
