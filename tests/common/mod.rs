#![allow(dead_code)]

use actix_rt::time::sleep;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tripwise_api::app::AppState;
use tripwise_api::db::memory::InMemoryTripStore;
use tripwise_api::db::{GenerationUpdate, StoreError, TripStore};
use tripwise_api::middleware::auth::Claims;
use tripwise_api::models::itinerary::{ItineraryDay, ItineraryItem};
use tripwise_api::models::trip::{NewTripRequest, Trip};
use tripwise_api::services::itinerary_generation_service::ItineraryGenerator;
use tripwise_api::services::llm_gateway::{ChatModel, GatewayError};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_GATEWAY_KEY: &str = "sk-test-1234567890";

pub fn get_test_user_id() -> String {
    "test_user_123".to_string()
}

pub fn get_other_user_id() -> String {
    "test_user_456".to_string()
}

pub fn bearer_token(user_id: &str) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: Some("test@example.com".to_string()),
        exp: now + 3600,
        iat: Some(now),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("token encodes");
    format!("Bearer {}", token)
}

pub fn expired_token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: None,
        exp: 1_000_000,
        iat: None,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("token encodes");
    format!("Bearer {}", token)
}

/// One canned answer from the model.
#[derive(Clone)]
pub enum Reply {
    Content(String),
    RateLimited,
    UsageLimit,
    Upstream(u16),
}

/// Chat model that plays back queued replies and records every prompt it saw.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_json(&self, value: &Value) {
        self.push(Reply::Content(value.to_string()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Content(content)) => Ok(content),
            Some(Reply::RateLimited) => Err(GatewayError::RateLimited),
            Some(Reply::UsageLimit) => Err(GatewayError::UsageLimit),
            Some(Reply::Upstream(status)) => Err(GatewayError::Upstream {
                status,
                body: "upstream failure".to_string(),
            }),
            None => Err(GatewayError::Envelope("no scripted reply".to_string())),
        }
    }
}

/// Store failures to inject, keyed by day number.
#[derive(Default, Clone)]
pub struct StoreFaults {
    pub fail_days: HashSet<u32>,
    pub fail_item_batches: HashSet<u32>,
    /// Every share slug lookup finds an existing trip.
    pub slugs_taken: bool,
}

/// Wraps the in-memory store and fails selected day or item inserts.
pub struct FlakyStore {
    inner: Arc<InMemoryTripStore>,
    faults: StoreFaults,
}

impl FlakyStore {
    fn injected(what: &str, day_number: u32) -> StoreError {
        StoreError::Unavailable(format!("injected {} failure for day {}", what, day_number))
    }
}

#[async_trait]
impl TripStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        self.inner.insert_trip(trip).await
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>, StoreError> {
        self.inner.find_trip(trip_id).await
    }

    async fn find_trip_by_slug(&self, slug: &str) -> Result<Option<Trip>, StoreError> {
        if self.faults.slugs_taken {
            return Ok(self.inner.all_trips().await.into_iter().next());
        }
        self.inner.find_trip_by_slug(slug).await
    }

    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, StoreError> {
        self.inner.trips_for_user(user_id).await
    }

    async fn set_public_slug(&self, trip_id: &str, slug: &str) -> Result<(), StoreError> {
        self.inner.set_public_slug(trip_id, slug).await
    }

    async fn delete_trip(&self, trip_id: &str) -> Result<bool, StoreError> {
        self.inner.delete_trip(trip_id).await
    }

    async fn day_ids_for_trip(&self, trip_id: &str) -> Result<Vec<String>, StoreError> {
        self.inner.day_ids_for_trip(trip_id).await
    }

    async fn delete_items_for_days(&self, day_ids: &[String]) -> Result<u64, StoreError> {
        self.inner.delete_items_for_days(day_ids).await
    }

    async fn delete_days_for_trip(&self, trip_id: &str) -> Result<u64, StoreError> {
        self.inner.delete_days_for_trip(trip_id).await
    }

    async fn insert_day(&self, day: &ItineraryDay) -> Result<(), StoreError> {
        if self.faults.fail_days.contains(&day.day_number) {
            return Err(Self::injected("day", day.day_number));
        }
        self.inner.insert_day(day).await
    }

    async fn insert_items(&self, items: &[ItineraryItem]) -> Result<(), StoreError> {
        if let Some(first) = items.first() {
            let days = self.inner.all_days().await;
            if let Some(day) = days.iter().find(|day| day.id == first.day_id) {
                if self.faults.fail_item_batches.contains(&day.day_number) {
                    return Err(Self::injected("item batch", day.day_number));
                }
            }
        }
        self.inner.insert_items(items).await
    }

    async fn days_for_trip(&self, trip_id: &str) -> Result<Vec<ItineraryDay>, StoreError> {
        self.inner.days_for_trip(trip_id).await
    }

    async fn items_for_days(&self, day_ids: &[String]) -> Result<Vec<ItineraryItem>, StoreError> {
        self.inner.items_for_days(day_ids).await
    }

    async fn finish_generation(&self, trip_id: &str, update: &GenerationUpdate) -> Result<(), StoreError> {
        self.inner.finish_generation(trip_id, update).await
    }

    async fn try_lock_generation(
        &self,
        trip_id: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.try_lock_generation(trip_id, now, stale_before).await
    }

    async fn unlock_generation(&self, trip_id: &str, locked_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.unlock_generation(trip_id, locked_at).await
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryTripStore>,
    pub model: Arc<ScriptedModel>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_faults(StoreFaults::default())
    }

    pub fn with_faults(faults: StoreFaults) -> Self {
        let store = Arc::new(InMemoryTripStore::new());
        let model = Arc::new(ScriptedModel::default());

        let app_store: Arc<dyn TripStore> = Arc::new(FlakyStore {
            inner: store.clone(),
            faults,
        });
        let generator = ItineraryGenerator::new(app_store.clone(), model.clone());

        let state = AppState {
            store: app_store,
            generator: Arc::new(generator),
            jwt_secret: TEST_JWT_SECRET.to_string(),
            gateway_key: TEST_GATEWAY_KEY.to_string(),
        };

        Self { store, model, state }
    }

    pub fn create_app(
        &self,
    ) -> actix_web::App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        tripwise_api::app::create_app(&self.state)
    }

    pub async fn seed_trip(&self, user_id: &str, destination: &str, num_days: u32) -> Trip {
        let trip = NewTripRequest {
            destination: destination.to_string(),
            start_date: None,
            end_date: None,
            num_days: Some(num_days),
            budget_min: Some(5000.0),
            budget_max: Some(30000.0),
            currency: None,
            interests: vec!["Beaches".to_string(), "Food".to_string()],
            travel_style: None,
            travel_pace: None,
        }
        .into_trip(user_id)
        .expect("valid trip");
        self.store.insert_trip(&trip).await.expect("trip stored");
        trip
    }
}

/// Request body the web client sends for a seeded trip.
pub fn generate_body(trip: &Trip) -> Value {
    json!({
        "tripId": trip.id,
        "destination": trip.destination,
        "numDays": trip.num_days,
        "budgetMin": trip.budget_min,
        "budgetMax": trip.budget_max,
        "interests": trip.interests,
        "travelStyle": "couple",
        "travelPace": "relaxed",
        "startDate": null
    })
}

fn activity(place: &str, slot: &str, sort_order: u32, is_backup: bool) -> Value {
    json!({
        "place_name": place,
        "description": format!("Visit {}", place),
        "time_slot": slot,
        "start_time": "09:00",
        "duration_minutes": 90,
        "estimated_cost": 500,
        "coordinates": { "lat": 15.55, "lng": 73.75 },
        "tips": "Go early",
        "is_backup": is_backup,
        "transport_mode": "cab",
        "transport_duration_minutes": 20,
        "transport_cost": 300,
        "sort_order": sort_order
    })
}

/// A well-formed model answer with `num_days` days of three primary stops and one backup.
pub fn itinerary_json(num_days: u32) -> Value {
    let days: Vec<Value> = (1..=num_days)
        .map(|n| {
            json!({
                "day_number": n,
                "summary": format!("Day {} on the coast", n),
                "activities": [
                    activity(&format!("Beach {}", n), "morning", 1, false),
                    activity(&format!("Fort {}", n), "afternoon", 2, false),
                    activity(&format!("Market {}", n), "evening", 3, false),
                    activity(&format!("Museum {}", n), "afternoon", 1, true)
                ]
            })
        })
        .collect();

    json!({
        "days": days,
        "budget_breakdown": {
            "accommodation": 9000,
            "food": 4000,
            "transport": 2500,
            "activities": 2000,
            "miscellaneous": 500
        },
        "local_tips": {
            "tips": ["Carry cash for shacks"],
            "scams": ["Overpriced taxi rides from the airport"]
        }
    })
}

pub async fn wait_for_server_ready(port: u16) {
    for _ in 0..30 {
        if reqwest::get(format!("http://127.0.0.1:{}/health", port)).await.is_ok() {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("Server failed to start within timeout");
}
