use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::time::{sleep, Duration};

use crate::{config::Config, service::error::NotificationError};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotificationError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the SMTP transport, or `None` when no SMTP host is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, NotificationError> {
        if config.smtp_host.trim().is_empty() {
            return Ok(None);
        }

        let from: Mailbox = config
            .from_email
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(config.from_email.clone()))?;

        // 465 is implicit TLS, everything else negotiates STARTTLS.
        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| NotificationError::Transport(e.to_string()))?
        .port(config.smtp_port);

        let builder = if config.smtp_username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
        };

        Ok(Some(SmtpMailer {
            transport: builder.build(),
            from,
        }))
    }
}

pub fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, NotificationError> {
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|_| NotificationError::InvalidAddress(email.to.clone()))?;

    let mut builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_HTML);

    if let Some(reply_to) = &email.reply_to {
        let reply_to: Mailbox = reply_to
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(reply_to.clone()))?;
        builder = builder.reply_to(reply_to);
    }

    builder
        .body(email.html_body.clone())
        .map_err(|e| NotificationError::Transport(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
        let message = build_message(&self.from, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Replaces every `{{key}}` in the template. Values are inserted as given.
pub fn render_template(template: &str, placeholders: &[(&str, String)]) -> String {
    let mut html = template.to_string();
    for (key, value) in placeholders {
        html = html.replace(&format!("{{{{{}}}}}", key), value);
    }
    html
}

/// Strips markup from user-supplied text before it lands in an email body.
pub fn sanitize_text(input: &str) -> String {
    ammonia::Builder::default()
        .tags(std::collections::HashSet::from(["br"]))
        .clean(input)
        .to_string()
}

pub async fn send_with_retries(
    transport: &dyn MailTransport,
    email: &OutgoingEmail,
    base_delay: Duration,
) -> Result<(), NotificationError> {
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match transport.deliver(email).await {
            Ok(()) => {
                tracing::info!("Email sent to {} ({})", email.to, email.subject);
                return Ok(());
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!("Email to {} rejected: {}", email.to, e);
                return Err(e);
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < MAX_RETRIES {
                    let delay = base_delay * 2_u32.pow(attempt - 1);
                    tracing::warn!(
                        "Email send attempt {} failed for {}. Retrying in {}ms...",
                        attempt,
                        email.to,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    let error = last_error
        .unwrap_or_else(|| NotificationError::Transport("Unknown email sending error".to_string()));
    tracing::error!("Email failed for {} after {} attempts: {}", email.to, MAX_RETRIES, error);
    Err(error)
}

pub fn default_retry_delay() -> Duration {
    Duration::from_millis(RETRY_DELAY_MS)
}
