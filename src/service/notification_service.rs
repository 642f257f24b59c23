// service/notification_service.rs
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::{
    dtos::listingdtos::{ContactNotice, SellerInquiryDto},
    mail::{
        mails::{self, MailContext},
        sendmail::{send_with_retries, MailTransport, OutgoingEmail},
    },
    models::listingmodel::Listing,
    service::error::NotificationError,
    utils::clock::Clock,
};

/// Outbound email capabilities. Every call reports failure explicitly.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_confirmation(&self, listing: &Listing) -> Result<(), NotificationError>;

    async fn send_reminder(&self, listing: &Listing) -> Result<(), NotificationError>;

    async fn send_admin_notice(&self, listing: &Listing) -> Result<(), NotificationError>;

    async fn send_contact_notice(&self, notice: &ContactNotice) -> Result<(), NotificationError>;

    async fn send_seller_inquiry(
        &self,
        listing: &Listing,
        inquiry: &SellerInquiryDto,
    ) -> Result<(), NotificationError>;
}

pub struct EmailNotificationService {
    transport: Option<Arc<dyn MailTransport>>,
    context: MailContext,
    clock: Arc<dyn Clock>,
    retry_delay: Duration,
}

impl EmailNotificationService {
    pub fn new(
        transport: Option<Arc<dyn MailTransport>>,
        context: MailContext,
        clock: Arc<dyn Clock>,
        retry_delay: Duration,
    ) -> Self {
        if transport.is_none() {
            tracing::warn!("SMTP is not configured, outbound email will fail until SMTP_HOST is set");
        }
        Self {
            transport,
            context,
            clock,
            retry_delay,
        }
    }

    async fn send(&self, email: OutgoingEmail) -> Result<(), NotificationError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(NotificationError::NotConfigured)?;
        send_with_retries(&**transport, &email, self.retry_delay).await
    }
}

#[async_trait]
impl NotificationGateway for EmailNotificationService {
    async fn send_confirmation(&self, listing: &Listing) -> Result<(), NotificationError> {
        self.send(mails::listing_confirmation_email(listing, &self.context))
            .await
    }

    async fn send_reminder(&self, listing: &Listing) -> Result<(), NotificationError> {
        self.send(mails::expiration_reminder_email(
            listing,
            self.clock.now(),
            &self.context,
        ))
        .await
    }

    async fn send_admin_notice(&self, listing: &Listing) -> Result<(), NotificationError> {
        self.send(mails::admin_notice_email(listing, &self.context))
            .await
    }

    async fn send_contact_notice(&self, notice: &ContactNotice) -> Result<(), NotificationError> {
        self.send(mails::contact_form_email(notice, &self.context))
            .await
    }

    async fn send_seller_inquiry(
        &self,
        listing: &Listing,
        inquiry: &SellerInquiryDto,
    ) -> Result<(), NotificationError> {
        self.send(mails::seller_inquiry_email(listing, inquiry, &self.context))
            .await
    }
}

/// Work handed to the background dispatcher.
#[derive(Debug, Clone)]
pub enum NotificationJob {
    Confirmation(Listing),
    AdminNotice(Listing),
}

impl NotificationJob {
    fn describe(&self) -> String {
        match self {
            NotificationJob::Confirmation(l) => format!("confirmation for listing {}", l.id),
            NotificationJob::AdminNotice(l) => format!("admin notice for listing {}", l.id),
        }
    }
}

/// Fire-and-forget front for the gateway: a bounded queue drained by one worker
/// task, which logs every failure.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationJob>,
}

impl NotificationDispatcher {
    pub fn start(gateway: Arc<dyn NotificationGateway>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<NotificationJob>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let result = match &job {
                    NotificationJob::Confirmation(listing) => gateway.send_confirmation(listing).await,
                    NotificationJob::AdminNotice(listing) => gateway.send_admin_notice(listing).await,
                };
                match result {
                    Ok(()) => tracing::debug!("Sent {}", job.describe()),
                    Err(e) => tracing::error!("Failed to send {}: {}", job.describe(), e),
                }
            }
            tracing::info!("Notification dispatcher stopped");
        });

        Self { sender }
    }

    /// Queues the job without waiting. A full or closed queue drops the job with a log line.
    pub fn dispatch(&self, job: NotificationJob) {
        if let Err(e) = self.sender.try_send(job) {
            match e {
                mpsc::error::TrySendError::Full(job) => {
                    tracing::warn!("Notification queue is full, dropping {}", job.describe())
                }
                mpsc::error::TrySendError::Closed(job) => {
                    tracing::error!("Notification queue is closed, dropping {}", job.describe())
                }
            }
        }
    }
}
