pub mod error;
pub mod lifecycle_service;
pub mod listing_service;
pub mod notification_service;
pub mod scheduler;
