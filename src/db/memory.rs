use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{GenerationUpdate, StoreError, TripStore};
use crate::models::itinerary::{ItineraryDay, ItineraryItem};
use crate::models::trip::Trip;

#[derive(Default)]
struct Tables {
    trips: Vec<Trip>,
    days: Vec<ItineraryDay>,
    items: Vec<ItineraryItem>,
    generation_locks: HashMap<String, DateTime<Utc>>,
}

/// Process-local store with the same semantics as the MongoDB one.
#[derive(Default)]
pub struct InMemoryTripStore {
    tables: Mutex<Tables>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all_days(&self) -> Vec<ItineraryDay> {
        self.tables.lock().await.days.clone()
    }

    pub async fn all_items(&self) -> Vec<ItineraryItem> {
        self.tables.lock().await.items.clone()
    }

    pub async fn all_trips(&self) -> Vec<Trip> {
        self.tables.lock().await.trips.clone()
    }

    pub async fn is_generation_locked(&self, trip_id: &str) -> bool {
        self.tables.lock().await.generation_locks.contains_key(trip_id)
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.trips.iter().any(|existing| existing.id == trip.id) {
            return Err(StoreError::Unavailable(format!("duplicate trip id {}", trip.id)));
        }
        tables.trips.push(trip.clone());
        Ok(())
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.trips.iter().find(|trip| trip.id == trip_id).cloned())
    }

    async fn find_trip_by_slug(&self, slug: &str) -> Result<Option<Trip>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .trips
            .iter()
            .find(|trip| trip.public_slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, StoreError> {
        let tables = self.tables.lock().await;
        let mut trips: Vec<Trip> = tables
            .trips
            .iter()
            .filter(|trip| trip.user_id == user_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn set_public_slug(&self, trip_id: &str, slug: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(trip) = tables.trips.iter_mut().find(|trip| trip.id == trip_id) {
            trip.public_slug = Some(slug.to_string());
            trip.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_trip(&self, trip_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let day_ids: Vec<String> = tables
            .days
            .iter()
            .filter(|day| day.trip_id == trip_id)
            .map(|day| day.id.clone())
            .collect();
        tables.items.retain(|item| !day_ids.contains(&item.day_id));
        tables.days.retain(|day| day.trip_id != trip_id);
        tables.generation_locks.remove(trip_id);

        let before = tables.trips.len();
        tables.trips.retain(|trip| trip.id != trip_id);
        Ok(tables.trips.len() < before)
    }

    async fn day_ids_for_trip(&self, trip_id: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .days
            .iter()
            .filter(|day| day.trip_id == trip_id)
            .map(|day| day.id.clone())
            .collect())
    }

    async fn delete_items_for_days(&self, day_ids: &[String]) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.items.len();
        tables.items.retain(|item| !day_ids.contains(&item.day_id));
        Ok((before - tables.items.len()) as u64)
    }

    async fn delete_days_for_trip(&self, trip_id: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.days.len();
        tables.days.retain(|day| day.trip_id != trip_id);
        Ok((before - tables.days.len()) as u64)
    }

    async fn insert_day(&self, day: &ItineraryDay) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        // Mirrors the unique (trip_id, day_number) index.
        if tables
            .days
            .iter()
            .any(|existing| existing.trip_id == day.trip_id && existing.day_number == day.day_number)
        {
            return Err(StoreError::Unavailable(format!(
                "day {} already exists for trip {}",
                day.day_number, day.trip_id
            )));
        }
        tables.days.push(day.clone());
        Ok(())
    }

    async fn insert_items(&self, items: &[ItineraryItem]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(orphan) = items
            .iter()
            .find(|item| !tables.days.iter().any(|day| day.id == item.day_id))
        {
            return Err(StoreError::Unavailable(format!(
                "item '{}' references missing day {}",
                orphan.place_name, orphan.day_id
            )));
        }
        tables.items.extend_from_slice(items);
        Ok(())
    }

    async fn days_for_trip(&self, trip_id: &str) -> Result<Vec<ItineraryDay>, StoreError> {
        let tables = self.tables.lock().await;
        let mut days: Vec<ItineraryDay> = tables
            .days
            .iter()
            .filter(|day| day.trip_id == trip_id)
            .cloned()
            .collect();
        days.sort_by_key(|day| day.day_number);
        Ok(days)
    }

    async fn items_for_days(&self, day_ids: &[String]) -> Result<Vec<ItineraryItem>, StoreError> {
        let tables = self.tables.lock().await;
        let mut items: Vec<ItineraryItem> = tables
            .items
            .iter()
            .filter(|item| day_ids.contains(&item.day_id))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.sort_order);
        Ok(items)
    }

    async fn finish_generation(&self, trip_id: &str, update: &GenerationUpdate) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(trip) = tables.trips.iter_mut().find(|trip| trip.id == trip_id) {
            trip.budget_breakdown = update.budget_breakdown.clone();
            trip.local_tips = update.local_tips.clone();
            trip.status = update.status;
            trip.updated_at = update.updated_at;
        }
        Ok(())
    }

    async fn try_lock_generation(
        &self,
        trip_id: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.trips.iter().any(|trip| trip.id == trip_id) {
            return Ok(false);
        }
        match tables.generation_locks.get(trip_id) {
            Some(locked_at) if *locked_at >= stale_before => Ok(false),
            _ => {
                tables.generation_locks.insert(trip_id.to_string(), now);
                Ok(true)
            }
        }
    }

    async fn unlock_generation(&self, trip_id: &str, locked_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let held = tables.generation_locks.get(trip_id).map(DateTime::timestamp_millis);
        if held == Some(locked_at.timestamp_millis()) {
            tables.generation_locks.remove(trip_id);
        }
        Ok(())
    }
}
