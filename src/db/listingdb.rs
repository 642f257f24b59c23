use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::db::DBClient,
    models::listingmodel::{Listing, ListingStatus, NewListing, NewPhoto, Photo},
    service::error::ServiceError,
};

/// Listing and photo persistence. Every time-dependent query takes `now` from the caller.
#[async_trait]
pub trait ListingExt: Send + Sync {
    async fn insert_listing(&self, listing: &NewListing) -> Result<i64, ServiceError>;

    async fn insert_photo(&self, listing_id: i64, photo: &NewPhoto) -> Result<i64, ServiceError>;

    /// Listing row and all of its photos in one transaction.
    async fn insert_listing_with_photos(
        &self,
        listing: &NewListing,
        photos: &[NewPhoto],
    ) -> Result<i64, ServiceError>;

    async fn get_active_listings(&self, now: DateTime<Utc>) -> Result<Vec<Listing>, ServiceError>;

    async fn get_listing_by_id(&self, listing_id: i64) -> Result<Option<Listing>, ServiceError>;

    async fn get_photos_by_listing_id(&self, listing_id: i64) -> Result<Vec<Photo>, ServiceError>;

    async fn update_listing_status(
        &self,
        listing_id: i64,
        status: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing, ServiceError>;

    async fn expire_old_listings(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;

    async fn get_listings_needing_reminder(
        &self,
        reminder_days_before: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Listing>, ServiceError>;

    /// Returns false when the flag was already set or the listing is no longer active.
    async fn mark_reminder_sent(&self, listing_id: i64, now: DateTime<Utc>) -> Result<bool, ServiceError>;

    /// Deletes the listing and, by cascade, its photos. Returns the photos that were removed.
    async fn delete_listing(&self, listing_id: i64) -> Result<Vec<Photo>, ServiceError>;
}

/// Exclusive upper bound on expiration dates that fall inside the reminder window.
///
/// A listing is due once `date(expiration) - days <= today`, i.e. its expiration
/// falls before midnight (UTC) that starts day `today + days + 1`.
pub fn reminder_window_end(now: DateTime<Utc>, reminder_days_before: i64) -> DateTime<Utc> {
    let days = reminder_days_before.max(0) as u64 + 1;
    let boundary = now
        .date_naive()
        .checked_add_days(Days::new(days))
        .unwrap_or(chrono::NaiveDate::MAX);
    boundary.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn check_required(listing: &NewListing) -> Result<(), ServiceError> {
    let required = [
        ("first_name", &listing.first_name),
        ("last_name", &listing.last_name),
        ("email", &listing.email),
        ("phone", &listing.phone),
        ("address", &listing.address),
        ("city", &listing.city),
        ("state", &listing.state),
        ("zip", &listing.zip),
        ("description", &listing.description),
        ("listing_source", &listing.listing_source),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    if listing.property_type.is_residential()
        && (listing.bedrooms.is_none() || listing.bathrooms.is_none())
    {
        return Err(ServiceError::Validation(
            "Bedrooms and bathrooms are required for residential properties".to_string(),
        ));
    }

    if listing.expiration_date <= listing.submission_date {
        return Err(ServiceError::Validation(
            "Expiration date must be after the submission date".to_string(),
        ));
    }

    Ok(())
}

async fn insert_listing_row(
    conn: &mut SqliteConnection,
    listing: &NewListing,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO listings (
            first_name, last_name, email, phone, private_contact,
            address, city, state, zip, property_type, price, sqft,
            bedrooms, bathrooms, year_built, lot_size, features, description,
            building_class, zoning, occupancy_rate, cap_rate, gross_income,
            operating_expenses, number_of_units, parking_spaces, lease_type,
            mls_number, external_url, listing_source,
            submission_date, expiration_date, status, reminder_sent,
            created_at, updated_at
        ) VALUES (
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?
        )
        "#,
    )
    .bind(&listing.first_name)
    .bind(&listing.last_name)
    .bind(&listing.email)
    .bind(&listing.phone)
    .bind(listing.private_contact)
    .bind(&listing.address)
    .bind(&listing.city)
    .bind(&listing.state)
    .bind(&listing.zip)
    .bind(listing.property_type)
    .bind(listing.price)
    .bind(listing.sqft)
    .bind(listing.bedrooms)
    .bind(listing.bathrooms)
    .bind(listing.year_built)
    .bind(listing.lot_size)
    .bind(&listing.features)
    .bind(&listing.description)
    .bind(&listing.building_class)
    .bind(&listing.zoning)
    .bind(listing.occupancy_rate)
    .bind(listing.cap_rate)
    .bind(listing.gross_income)
    .bind(listing.operating_expenses)
    .bind(listing.number_of_units)
    .bind(listing.parking_spaces)
    .bind(&listing.lease_type)
    .bind(&listing.mls_number)
    .bind(&listing.external_url)
    .bind(&listing.listing_source)
    .bind(listing.submission_date)
    .bind(listing.expiration_date)
    .bind(ListingStatus::Active)
    .bind(listing.submission_date)
    .bind(listing.submission_date)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn insert_photo_row(
    conn: &mut SqliteConnection,
    listing_id: i64,
    photo: &NewPhoto,
) -> Result<i64, ServiceError> {
    let result = sqlx::query(
        r#"
        INSERT INTO photos (listing_id, locator, original_name, size, mime_type, display_order, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(listing_id)
    .bind(&photo.locator)
    .bind(&photo.original_name)
    .bind(photo.size)
    .bind(&photo.mime_type)
    .bind(photo.display_order)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            ServiceError::ListingNotFound(listing_id)
        }
        other => ServiceError::Storage(other),
    })?;

    Ok(result.last_insert_rowid())
}

#[async_trait]
impl ListingExt for DBClient {
    async fn insert_listing(&self, listing: &NewListing) -> Result<i64, ServiceError> {
        check_required(listing)?;

        let mut conn = self.pool.acquire().await?;
        let id = insert_listing_row(&mut conn, listing).await?;
        Ok(id)
    }

    async fn insert_photo(&self, listing_id: i64, photo: &NewPhoto) -> Result<i64, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        insert_photo_row(&mut conn, listing_id, photo).await
    }

    async fn insert_listing_with_photos(
        &self,
        listing: &NewListing,
        photos: &[NewPhoto],
    ) -> Result<i64, ServiceError> {
        check_required(listing)?;

        let mut tx = self.pool.begin().await?;
        let listing_id = insert_listing_row(&mut tx, listing).await?;
        for photo in photos {
            insert_photo_row(&mut tx, listing_id, photo).await?;
        }
        tx.commit().await?;

        Ok(listing_id)
    }

    async fn get_active_listings(&self, now: DateTime<Utc>) -> Result<Vec<Listing>, ServiceError> {
        // Re-checks the date so a listing is hidden even before the expiry job flips its status.
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE status = 'active' AND expiration_date > ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    async fn get_listing_by_id(&self, listing_id: i64) -> Result<Option<Listing>, ServiceError> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(listing)
    }

    async fn get_photos_by_listing_id(&self, listing_id: i64) -> Result<Vec<Photo>, ServiceError> {
        let photos = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE listing_id = ? ORDER BY display_order ASC, id ASC",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    async fn update_listing_status(
        &self,
        listing_id: i64,
        status: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing, ServiceError> {
        let sources = ListingStatus::sources_for(status);
        if !sources.is_empty() {
            let allowed = sources
                .iter()
                .map(|s| format!("'{}'", s.to_str()))
                .collect::<Vec<_>>()
                .join(", ");

            let updated = sqlx::query_as::<_, Listing>(&format!(
                r#"
                UPDATE listings SET status = ?, updated_at = ?
                WHERE id = ? AND status IN ({})
                RETURNING *
                "#,
                allowed
            ))
            .bind(status)
            .bind(now)
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(listing) = updated {
                return Ok(listing);
            }
        }

        match self.get_listing_by_id(listing_id).await? {
            Some(current) => Err(ServiceError::InvalidStatusTransition {
                id: listing_id,
                from: current.status,
                to: status,
            }),
            None => Err(ServiceError::ListingNotFound(listing_id)),
        }
    }

    async fn expire_old_listings(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = 'expired', updated_at = ?
            WHERE status = 'active' AND expiration_date <= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_listings_needing_reminder(
        &self,
        reminder_days_before: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Listing>, ServiceError> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE status = 'active'
            AND reminder_sent = 0
            AND expiration_date < ?
            AND expiration_date > ?
            ORDER BY expiration_date ASC, id ASC
            "#,
        )
        .bind(reminder_window_end(now, reminder_days_before))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    async fn mark_reminder_sent(&self, listing_id: i64, now: DateTime<Utc>) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE listings SET reminder_sent = 1, updated_at = ?
            WHERE id = ? AND status = 'active' AND reminder_sent = 0
            "#,
        )
        .bind(now)
        .bind(listing_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_listing(&self, listing_id: i64) -> Result<Vec<Photo>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let photos = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE listing_id = ? ORDER BY display_order ASC, id ASC",
        )
        .bind(listing_id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::ListingNotFound(listing_id));
        }

        tx.commit().await?;
        Ok(photos)
    }
}
