use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::itinerary::{ItineraryDay, ItineraryItem};
use crate::models::trip::{BudgetBreakdown, LocalTips, Trip, TripStatus};

pub mod memory;
pub mod mongo;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// Fields written to a trip once its itinerary has been replaced.
#[derive(Debug, Clone)]
pub struct GenerationUpdate {
    pub budget_breakdown: Option<BudgetBreakdown>,
    pub local_tips: Option<LocalTips>,
    pub status: TripStatus,
    pub updated_at: DateTime<Utc>,
}

/// Persistence for trips and their itinerary rows.
///
/// Operations are fine grained: the generator sequences the
/// delete/insert phases itself and decides which failures are fatal.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError>;
    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>, StoreError>;
    async fn find_trip_by_slug(&self, slug: &str) -> Result<Option<Trip>, StoreError>;
    /// Newest first.
    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, StoreError>;
    async fn set_public_slug(&self, trip_id: &str, slug: &str) -> Result<(), StoreError>;
    /// Removes the trip with its days and items. Returns false when no trip matched.
    async fn delete_trip(&self, trip_id: &str) -> Result<bool, StoreError>;

    async fn day_ids_for_trip(&self, trip_id: &str) -> Result<Vec<String>, StoreError>;
    async fn delete_items_for_days(&self, day_ids: &[String]) -> Result<u64, StoreError>;
    async fn delete_days_for_trip(&self, trip_id: &str) -> Result<u64, StoreError>;
    async fn insert_day(&self, day: &ItineraryDay) -> Result<(), StoreError>;
    async fn insert_items(&self, items: &[ItineraryItem]) -> Result<(), StoreError>;
    /// Ordered by day number.
    async fn days_for_trip(&self, trip_id: &str) -> Result<Vec<ItineraryDay>, StoreError>;
    /// Ordered by sort order.
    async fn items_for_days(&self, day_ids: &[String]) -> Result<Vec<ItineraryItem>, StoreError>;

    async fn finish_generation(&self, trip_id: &str, update: &GenerationUpdate) -> Result<(), StoreError>;

    /// Atomically claims the per-trip generation token. A token older than
    /// `stale_before` is treated as abandoned and may be taken over.
    async fn try_lock_generation(
        &self,
        trip_id: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Releases the token only if it is still the one claimed at `locked_at`.
    async fn unlock_generation(&self, trip_id: &str, locked_at: DateTime<Utc>) -> Result<(), StoreError>;
}
