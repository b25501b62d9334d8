use async_trait::async_trait;
use bson::{doc, to_bson};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion},
    Client, Collection, IndexModel,
};
use std::time::Duration;

use super::{GenerationUpdate, StoreError, TripStore};
use crate::config::DataStoreConfig;
use crate::models::itinerary::{ItineraryDay, ItineraryItem};
use crate::models::trip::Trip;

const TRIPS: &str = "trips";
const DAYS: &str = "itinerary_days";
const ITEMS: &str = "itinerary_items";

pub async fn create_mongo_client(config: &DataStoreConfig) -> Result<Client, StoreError> {
    log::info!("Connecting to MongoDB database '{}'", config.database);

    let mut client_options = ClientOptions::parse(&config.url).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    // The admin key always wins over any password embedded in the URL.
    let mut credential = client_options.credential.take().unwrap_or_default();
    if credential.username.is_none() {
        credential.username = Some(config.user.clone());
    }
    credential.password = Some(config.key.clone());
    client_options.credential = Some(credential);

    let client = Client::with_options(client_options)?;

    match client
        .database(&config.database)
        .run_command(doc! {"ping": 1})
        .await
    {
        Ok(_) => log::info!("Connected to MongoDB and verified with ping"),
        Err(e) => log::warn!(
            "Connected to MongoDB but ping failed, requests may fail until it recovers: {}",
            e
        ),
    }

    Ok(client)
}

#[derive(Clone)]
pub struct MongoTripStore {
    client: Client,
    database: String,
}

impl MongoTripStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Day numbers are unique per trip; items and shared trips are looked up by key.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = IndexOptions::builder().unique(true).build();
        self.days()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "trip_id": 1, "day_number": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.items()
            .create_index(IndexModel::builder().keys(doc! { "day_id": 1 }).build())
            .await?;
        self.trips()
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build())
            .await?;
        // Unshared trips store a null slug, so only string slugs take part in uniqueness.
        let shared_only = IndexOptions::builder()
            .unique(true)
            .partial_filter_expression(doc! { "public_slug": { "$type": "string" } })
            .build();
        self.trips()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "public_slug": 1 })
                    .options(shared_only)
                    .build(),
            )
            .await?;
        Ok(())
    }

    fn trips(&self) -> Collection<Trip> {
        self.client.database(&self.database).collection(TRIPS)
    }

    fn days(&self) -> Collection<ItineraryDay> {
        self.client.database(&self.database).collection(DAYS)
    }

    fn items(&self) -> Collection<ItineraryItem> {
        self.client.database(&self.database).collection(ITEMS)
    }
}

#[async_trait]
impl TripStore for MongoTripStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database(&self.database)
            .run_command(doc! {"ping": 1})
            .await?;
        Ok(())
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        self.trips().insert_one(trip).await?;
        Ok(())
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips().find_one(doc! { "_id": trip_id }).await?)
    }

    async fn find_trip_by_slug(&self, slug: &str) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips().find_one(doc! { "public_slug": slug }).await?)
    }

    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, StoreError> {
        let cursor = self.trips().find(doc! { "user_id": user_id }).await?;
        let mut trips: Vec<Trip> = cursor.try_collect().await?;
        // created_at is stored as an RFC 3339 string, so order here rather than in the query.
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn set_public_slug(&self, trip_id: &str, slug: &str) -> Result<(), StoreError> {
        self.trips()
            .update_one(
                doc! { "_id": trip_id },
                doc! { "$set": { "public_slug": slug, "updated_at": to_bson(&Utc::now())? } },
            )
            .await?;
        Ok(())
    }

    async fn delete_trip(&self, trip_id: &str) -> Result<bool, StoreError> {
        let day_ids = self.day_ids_for_trip(trip_id).await?;
        if !day_ids.is_empty() {
            self.delete_items_for_days(&day_ids).await?;
            self.delete_days_for_trip(trip_id).await?;
        }
        let result = self.trips().delete_one(doc! { "_id": trip_id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn day_ids_for_trip(&self, trip_id: &str) -> Result<Vec<String>, StoreError> {
        let days = self.days_for_trip(trip_id).await?;
        Ok(days.into_iter().map(|day| day.id).collect())
    }

    async fn delete_items_for_days(&self, day_ids: &[String]) -> Result<u64, StoreError> {
        let result = self
            .items()
            .delete_many(doc! { "day_id": { "$in": day_ids.to_vec() } })
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_days_for_trip(&self, trip_id: &str) -> Result<u64, StoreError> {
        let result = self.days().delete_many(doc! { "trip_id": trip_id }).await?;
        Ok(result.deleted_count)
    }

    async fn insert_day(&self, day: &ItineraryDay) -> Result<(), StoreError> {
        self.days().insert_one(day).await?;
        Ok(())
    }

    async fn insert_items(&self, items: &[ItineraryItem]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        self.items().insert_many(items).await?;
        Ok(())
    }

    async fn days_for_trip(&self, trip_id: &str) -> Result<Vec<ItineraryDay>, StoreError> {
        let cursor = self
            .days()
            .find(doc! { "trip_id": trip_id })
            .sort(doc! { "day_number": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn items_for_days(&self, day_ids: &[String]) -> Result<Vec<ItineraryItem>, StoreError> {
        if day_ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .items()
            .find(doc! { "day_id": { "$in": day_ids.to_vec() } })
            .sort(doc! { "sort_order": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn finish_generation(&self, trip_id: &str, update: &GenerationUpdate) -> Result<(), StoreError> {
        self.trips()
            .update_one(
                doc! { "_id": trip_id },
                doc! { "$set": {
                    "budget_breakdown": to_bson(&update.budget_breakdown)?,
                    "local_tips": to_bson(&update.local_tips)?,
                    "status": to_bson(&update.status)?,
                    "updated_at": to_bson(&update.updated_at)?,
                } },
            )
            .await?;
        Ok(())
    }

    async fn try_lock_generation(
        &self,
        trip_id: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // A single conditional update is the check-and-set; a null match also covers a missing field.
        let result = self
            .trips()
            .update_one(
                doc! {
                    "_id": trip_id,
                    "$or": [
                        { "generation_lock_ms": null },
                        { "generation_lock_ms": { "$lt": stale_before.timestamp_millis() } },
                    ],
                },
                doc! { "$set": { "generation_lock_ms": now.timestamp_millis() } },
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn unlock_generation(&self, trip_id: &str, locked_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.trips()
            .update_one(
                doc! { "_id": trip_id, "generation_lock_ms": locked_at.timestamp_millis() },
                doc! { "$unset": { "generation_lock_ms": "" } },
            )
            .await?;
        Ok(())
    }
}
