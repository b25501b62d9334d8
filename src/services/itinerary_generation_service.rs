use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{GenerationUpdate, StoreError, TripStore};
use crate::models::generation::GenerateItineraryRequest;
use crate::models::itinerary::ItineraryDay;
use crate::models::trip::TripStatus;
use crate::services::llm_gateway::{ChatModel, GatewayError};
use crate::services::prompt::{build_itinerary_prompt, SYSTEM_INSTRUCTION};
use crate::services::response_parser::{parse_itinerary, Expectations, ParsedItinerary, ResponseFormatError};

const DEFAULT_LOCK_TTL_SECS: i64 = 600;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Trip not found")]
    TripNotFound,
    #[error("Itinerary generation already in progress for this trip")]
    InProgress,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Invalid AI response format: {0}")]
    InvalidResponse(#[from] ResponseFormatError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct ItineraryGenerationConfig {
    /// How long a generation token is honoured before another request may take it over.
    pub lock_ttl: Duration,
}

impl Default for ItineraryGenerationConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECS),
        }
    }
}

/// What a successful run actually wrote. Day and item failures are tolerated,
/// so a success can still be partial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub days_written: usize,
    pub days_skipped: Vec<u32>,
    pub items_written: usize,
    pub item_batches_failed: Vec<u32>,
    pub days_replaced: usize,
}

pub struct ItineraryGenerator {
    store: Arc<dyn TripStore>,
    model: Arc<dyn ChatModel>,
    config: ItineraryGenerationConfig,
}

impl ItineraryGenerator {
    pub fn new(store: Arc<dyn TripStore>, model: Arc<dyn ChatModel>) -> Self {
        Self::with_config(store, model, ItineraryGenerationConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn TripStore>,
        model: Arc<dyn ChatModel>,
        config: ItineraryGenerationConfig,
    ) -> Self {
        Self { store, model, config }
    }

    /// Generates and persists a fresh itinerary for the trip, replacing any previous one.
    ///
    /// `owner_id` must own the trip. The per-trip generation token is held for
    /// the whole run and released on every exit path.
    pub async fn generate(
        &self,
        owner_id: &str,
        req: &GenerateItineraryRequest,
    ) -> Result<GenerationReport, GenerationError> {
        let trip = self
            .store
            .find_trip(&req.trip_id)
            .await?
            .filter(|trip| trip.user_id == owner_id)
            .ok_or(GenerationError::TripNotFound)?;

        let now = Utc::now();
        if !self
            .store
            .try_lock_generation(&trip.id, now, now - self.config.lock_ttl)
            .await?
        {
            log::warn!("Rejected concurrent generation for trip {}", trip.id);
            return Err(GenerationError::InProgress);
        }

        let result = self.run(req).await;

        if let Err(e) = self.store.unlock_generation(&trip.id, now).await {
            log::error!("Failed to release generation token for trip {}: {}", trip.id, e);
        }

        match &result {
            Ok(report) => log::info!(
                "Generated itinerary for trip {}: {} days ({} skipped), {} items ({} failed batches)",
                trip.id,
                report.days_written,
                report.days_skipped.len(),
                report.items_written,
                report.item_batches_failed.len()
            ),
            Err(e) => log::error!("generate-itinerary error for trip {}: {}", trip.id, e),
        }

        result
    }

    async fn run(&self, req: &GenerateItineraryRequest) -> Result<GenerationReport, GenerationError> {
        let prompt = build_itinerary_prompt(req);
        let content = self.model.complete(SYSTEM_INSTRUCTION, &prompt).await?;

        let expectations = Expectations {
            num_days: req.num_days,
            budget_min: req.budget_min,
            budget_max: req.budget_max,
        };
        let itinerary = parse_itinerary(&content, &expectations).map_err(|e| {
            log::error!("Failed to parse AI response ({}): {}", e, content);
            e
        })?;
        for warning in &itinerary.warnings {
            log::warn!("Trip {}: {}", req.trip_id, warning);
        }

        let mut report = GenerationReport {
            days_replaced: self.clear_itinerary(&req.trip_id).await?,
            ..GenerationReport::default()
        };

        let ParsedItinerary {
            days,
            budget_breakdown,
            local_tips,
            ..
        } = itinerary;

        for day in days {
            let created_at = Utc::now();
            let row = ItineraryDay {
                id: Uuid::new_v4().to_string(),
                trip_id: req.trip_id.clone(),
                day_number: day.day_number,
                summary: day.summary,
                created_at,
            };

            if let Err(e) = self.store.insert_day(&row).await {
                log::warn!("Day insert error for trip {} day {}: {}", req.trip_id, day.day_number, e);
                report.days_skipped.push(day.day_number);
                continue;
            }
            report.days_written += 1;

            if day.activities.is_empty() {
                continue;
            }

            let items: Vec<_> = day
                .activities
                .into_iter()
                .map(|activity| activity.into_item(&row.id, created_at))
                .collect();

            match self.store.insert_items(&items).await {
                Ok(()) => report.items_written += items.len(),
                Err(e) => {
                    log::error!("Items insert error for trip {} day {}: {}", req.trip_id, day.day_number, e);
                    report.item_batches_failed.push(day.day_number);
                }
            }
        }

        self.store
            .finish_generation(
                &req.trip_id,
                &GenerationUpdate {
                    budget_breakdown,
                    local_tips,
                    status: TripStatus::Generated,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        Ok(report)
    }

    /// Items go first so no item is ever left pointing at a deleted day.
    async fn clear_itinerary(&self, trip_id: &str) -> Result<usize, StoreError> {
        let day_ids = self.store.day_ids_for_trip(trip_id).await?;
        if day_ids.is_empty() {
            return Ok(0);
        }
        self.store.delete_items_for_days(&day_ids).await?;
        self.store.delete_days_for_trip(trip_id).await?;
        Ok(day_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryTripStore;
    use crate::models::trip::NewTripRequest;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedModel(String);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, GatewayError> {
            Ok(self.0.clone())
        }
    }

    async fn seeded_store(user_id: &str) -> (Arc<InMemoryTripStore>, String) {
        let store = Arc::new(InMemoryTripStore::new());
        let trip = NewTripRequest {
            destination: "Goa".to_string(),
            start_date: None,
            end_date: None,
            num_days: Some(2),
            budget_min: None,
            budget_max: None,
            currency: None,
            interests: vec!["Beaches".to_string()],
            travel_style: None,
            travel_pace: None,
        }
        .into_trip(user_id)
        .unwrap();
        store.insert_trip(&trip).await.unwrap();
        (store, trip.id)
    }

    fn request(trip_id: &str) -> GenerateItineraryRequest {
        serde_json::from_value(json!({
            "tripId": trip_id,
            "destination": "Goa",
            "numDays": 2,
            "interests": ["Beaches"]
        }))
        .unwrap()
    }

    #[actix_rt::test]
    async fn test_report_counts_written_rows() {
        let (store, trip_id) = seeded_store("user-1").await;
        let content = json!({
            "days": [
                { "day_number": 1, "activities": [{ "place_name": "Baga Beach" }, { "place_name": "Fort Aguada" }] },
                { "day_number": 2, "activities": [] }
            ]
        })
        .to_string();
        let generator = ItineraryGenerator::new(store.clone(), Arc::new(FixedModel(content)));

        let first = generator.generate("user-1", &request(&trip_id)).await.unwrap();
        assert_eq!(first.days_written, 2);
        assert_eq!(first.items_written, 2);
        assert_eq!(first.days_replaced, 0);
        assert!(first.days_skipped.is_empty());

        let second = generator.generate("user-1", &request(&trip_id)).await.unwrap();
        assert_eq!(second.days_replaced, 2);
        assert_eq!(store.all_days().await.len(), 2);
    }

    #[actix_rt::test]
    async fn test_owner_mismatch_is_not_found() {
        let (store, trip_id) = seeded_store("user-1").await;
        let generator = ItineraryGenerator::new(store.clone(), Arc::new(FixedModel(String::new())));

        let err = generator.generate("user-2", &request(&trip_id)).await.unwrap_err();
        assert!(matches!(err, GenerationError::TripNotFound));
        assert!(!store.is_generation_locked(&trip_id).await);
    }

    #[actix_rt::test]
    async fn test_empty_completion_is_invalid_and_unlocks() {
        let (store, trip_id) = seeded_store("user-1").await;
        let generator = ItineraryGenerator::new(store.clone(), Arc::new(FixedModel(String::new())));

        let err = generator.generate("user-1", &request(&trip_id)).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
        assert!(!store.is_generation_locked(&trip_id).await);
    }
}
