// service/lifecycle_service.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    db::listingdb::ListingExt,
    models::listingmodel::{Listing, ListingStatus},
    service::{error::ServiceError, notification_service::NotificationGateway},
    utils::clock::Clock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleDates {
    pub submission_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub expired: u64,
    pub pending_reminders: usize,
}

/// Decides when listings expire and when sellers get reminded.
pub struct LifecycleService {
    store: Arc<dyn ListingExt>,
    notifier: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    listing_duration_days: i64,
    reminder_days_before: i64,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn ListingExt>,
        notifier: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        listing_duration_days: i64,
        reminder_days_before: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            listing_duration_days,
            reminder_days_before,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Dates for a listing submitted right now. A relist gets a fresh pair.
    pub fn dates_for_new_listing(&self) -> LifecycleDates {
        let submission_date = self.clock.now();
        LifecycleDates {
            submission_date,
            expiration_date: submission_date + Duration::days(self.listing_duration_days),
        }
    }

    /// Flips every overdue active listing to expired. Sellers are not notified.
    pub async fn run_expiration(&self) -> Result<u64, ServiceError> {
        let expired = self.store.expire_old_listings(self.clock.now()).await?;

        if expired > 0 {
            tracing::info!("Expired {} listings", expired);
        } else {
            tracing::info!("No listings to expire");
        }

        Ok(expired)
    }

    /// Sends due reminders one listing at a time. A failed send leaves the
    /// listing unmarked so the next run picks it up again.
    pub async fn run_reminders(&self) -> Result<ReminderReport, ServiceError> {
        let now = self.clock.now();
        let listings = self
            .store
            .get_listings_needing_reminder(self.reminder_days_before, now)
            .await?;

        let mut report = ReminderReport {
            candidates: listings.len(),
            ..Default::default()
        };
        tracing::info!("Reminder run started: {} listings need reminders", report.candidates);

        for listing in &listings {
            if self.remind(listing, now).await {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            "Reminder run finished: {} sent, {} failed",
            report.sent,
            report.failed
        );
        Ok(report)
    }

    async fn remind(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        if let Err(e) = self.notifier.send_reminder(listing).await {
            tracing::error!("Failed to send reminder for listing {}: {}", listing.id, e);
            return false;
        }

        match self.store.mark_reminder_sent(listing.id, now).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(
                    "Reminder sent for listing {} but it was no longer eligible to be marked",
                    listing.id
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    "Reminder sent for listing {} but marking it failed: {}",
                    listing.id,
                    e
                );
                false
            }
        }
    }

    /// Catches up on expirations missed while the process was down and reports,
    /// without sending, how many reminders are waiting for the scheduled run.
    pub async fn startup_reconciliation(&self) -> Result<StartupReport, ServiceError> {
        let expired = self.run_expiration().await?;
        let pending = self
            .store
            .get_listings_needing_reminder(self.reminder_days_before, self.clock.now())
            .await?
            .len();

        if pending > 0 {
            tracing::info!("{} listings need reminders, deferred to scheduled run", pending);
        }

        Ok(StartupReport {
            expired,
            pending_reminders: pending,
        })
    }

    /// Administrative take-down: active or expired listings become removed.
    pub async fn remove_listing(&self, listing_id: i64) -> Result<Listing, ServiceError> {
        let listing = self
            .store
            .update_listing_status(listing_id, ListingStatus::Removed, self.clock.now())
            .await?;
        tracing::info!("Listing {} removed", listing_id);
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_client, residential_listing};
    use crate::service::notification_service::testing::{RecordingGateway, SentNotification};
    use crate::utils::clock::ManualClock;
    use chrono::TimeZone;

    struct Harness {
        store: Arc<crate::db::db::DBClient>,
        gateway: Arc<RecordingGateway>,
        clock: Arc<ManualClock>,
        engine: LifecycleService,
    }

    async fn harness(start: DateTime<Utc>, gateway: RecordingGateway) -> Harness {
        let store = Arc::new(memory_client().await);
        let gateway = Arc::new(gateway);
        let clock = Arc::new(ManualClock::new(start));
        let engine = LifecycleService::new(store.clone(), gateway.clone(), clock.clone(), 14, 2);
        Harness {
            store,
            gateway,
            clock,
            engine,
        }
    }

    fn march(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_dates_for_new_listing_use_configured_duration() {
        let h = harness(march(1, 12), RecordingGateway::default()).await;
        let dates = h.engine.dates_for_new_listing();
        assert_eq!(dates.submission_date, march(1, 12));
        assert_eq!(dates.expiration_date, march(15, 12));

        h.clock.advance(Duration::days(3));
        assert_eq!(h.engine.dates_for_new_listing().expiration_date, march(18, 12));
    }

    #[tokio::test]
    async fn test_expiration_run_is_idempotent_and_silent() {
        let h = harness(march(1, 12), RecordingGateway::default()).await;
        let id = h.store.insert_listing(&residential_listing(march(1, 12), 14)).await.unwrap();

        assert_eq!(h.engine.run_expiration().await.unwrap(), 0);

        h.clock.set(march(16, 0));
        assert_eq!(h.engine.run_expiration().await.unwrap(), 1);
        assert_eq!(h.engine.run_expiration().await.unwrap(), 0);

        let listing = h.store.get_listing_by_id(id).await.unwrap().unwrap();
        assert_eq!(listing.status, ListingStatus::Expired);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reminders_sent_once_and_marked() {
        let h = harness(march(13, 9), RecordingGateway::default()).await;
        let due = h.store.insert_listing(&residential_listing(march(1, 12), 14)).await.unwrap();
        let later = h.store.insert_listing(&residential_listing(march(10, 12), 14)).await.unwrap();

        let report = h.engine.run_reminders().await.unwrap();
        assert_eq!(report, ReminderReport { candidates: 1, sent: 1, failed: 0 });
        assert_eq!(h.gateway.sent(), vec![SentNotification::Reminder(due)]);
        assert!(h.store.get_listing_by_id(due).await.unwrap().unwrap().reminder_sent);
        assert!(!h.store.get_listing_by_id(later).await.unwrap().unwrap().reminder_sent);

        let again = h.engine.run_reminders().await.unwrap();
        assert_eq!(again, ReminderReport::default());
        assert_eq!(h.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reminder_is_retried_next_run_without_blocking_others() {
        let h = harness(march(13, 9), RecordingGateway::default()).await;
        let bounced = h.store.insert_listing(&residential_listing(march(1, 12), 14)).await.unwrap();
        let fine = h.store.insert_listing(&residential_listing(march(1, 13), 14)).await.unwrap();
        *h.gateway.failing_ids.lock().unwrap() = vec![bounced];

        let report = h.engine.run_reminders().await.unwrap();
        assert_eq!(report, ReminderReport { candidates: 2, sent: 1, failed: 1 });
        assert!(!h.store.get_listing_by_id(bounced).await.unwrap().unwrap().reminder_sent);
        assert!(h.store.get_listing_by_id(fine).await.unwrap().unwrap().reminder_sent);

        h.gateway.failing_ids.lock().unwrap().clear();
        h.clock.set(march(14, 9));
        let retry = h.engine.run_reminders().await.unwrap();
        assert_eq!(retry, ReminderReport { candidates: 1, sent: 1, failed: 0 });
        assert_eq!(
            h.gateway.sent(),
            vec![SentNotification::Reminder(fine), SentNotification::Reminder(bounced)]
        );
    }

    #[tokio::test]
    async fn test_startup_reconciliation_expires_but_does_not_remind() {
        let h = harness(march(14, 8), RecordingGateway::default()).await;
        let overdue = h.store.insert_listing(&residential_listing(march(1, 12), 10)).await.unwrap();
        h.store.insert_listing(&residential_listing(march(1, 12), 14)).await.unwrap();
        h.store.insert_listing(&residential_listing(march(2, 12), 14)).await.unwrap();

        let report = h.engine.startup_reconciliation().await.unwrap();
        assert_eq!(report, StartupReport { expired: 1, pending_reminders: 2 });
        assert!(h.gateway.sent().is_empty());
        assert_eq!(
            h.store.get_listing_by_id(overdue).await.unwrap().unwrap().status,
            ListingStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_remove_listing_is_terminal() {
        let h = harness(march(1, 12), RecordingGateway::default()).await;
        let id = h.store.insert_listing(&residential_listing(march(1, 12), 14)).await.unwrap();

        let removed = h.engine.remove_listing(id).await.unwrap();
        assert_eq!(removed.status, ListingStatus::Removed);

        let err = h.engine.remove_listing(id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStatusTransition { .. }));

        h.clock.set(march(20, 0));
        assert_eq!(h.engine.run_expiration().await.unwrap(), 0);
    }
}
