use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;

pub struct EmailClient {
    host: Option<String>,
    username: String,
    password: String,
    from: String,
    to: String,
}

impl EmailClient {
    pub fn new() -> Self {
        Self {
            host: env::var("SMTP_HOST").ok().filter(|v| !v.is_empty()),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: env::var("EMAIL_FROM").unwrap_or_default(),
            to: env::var("EMAIL_TO").unwrap_or_default(),
        }
    }

    /// Sends a plain-text notification. Does nothing when SMTP is not
    /// configured; a notification must never take the engine down.
    pub fn send(&self, subject: &str, body: &str) {
        let Some(host) = &self.host else {
            log::debug!("[EMAIL] SMTP not configured; skipping '{}'", subject);
            return;
        };
        let (Ok(from), Ok(to)) = (self.from.parse(), self.to.parse()) else {
            log::warn!("[EMAIL] invalid EMAIL_FROM/EMAIL_TO; skipping '{}'", subject);
            return;
        };
        let message = match Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
        {
            Ok(message) => message,
            Err(err) => {
                log::warn!("[EMAIL] failed to build message: {:?}", err);
                return;
            }
        };
        let transport = match SmtpTransport::relay(host) {
            Ok(builder) => builder
                .credentials(Credentials::new(
                    self.username.clone(),
                    self.password.clone(),
                ))
                .build(),
            Err(err) => {
                log::warn!("[EMAIL] failed to create SMTP transport: {:?}", err);
                return;
            }
        };
        if let Err(err) = transport.send(&message) {
            log::warn!("[EMAIL] failed to send '{}': {:?}", subject, err);
        }
    }
}

impl Default for EmailClient {
    fn default() -> Self {
        Self::new()
    }
}
