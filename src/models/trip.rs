use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::itinerary::DayWithItems;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TravelStyle {
    Solo,
    Couple,
    Friends,
    Family,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TravelPace {
    Relaxed,
    Packed,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    #[default]
    Draft,
    Generating,
    Generated,
}

/// Estimated spend per category, in the trip currency.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BudgetBreakdown {
    pub accommodation: f64,
    pub food: f64,
    pub transport: f64,
    pub activities: f64,
    pub miscellaneous: f64,
}

impl BudgetBreakdown {
    pub fn total(&self) -> f64 {
        self.accommodation + self.food + self.transport + self.activities + self.miscellaneous
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct LocalTips {
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub scams: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Trip {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub num_days: u32,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub travel_style: Option<TravelStyle>,
    pub travel_pace: Option<TravelPace>,
    #[serde(default)]
    pub status: TripStatus,
    pub budget_breakdown: Option<BudgetBreakdown>,
    pub local_tips: Option<LocalTips>,
    pub public_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// A copy owned by the same user, back in draft with no share link.
    pub fn duplicate(&self) -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4().to_string(),
            destination: format!("{} (copy)", self.destination),
            status: TripStatus::Draft,
            public_slug: None,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewTripRequest {
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub num_days: Option<u32>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub travel_style: Option<TravelStyle>,
    pub travel_pace: Option<TravelPace>,
}

impl NewTripRequest {
    /// Validates the request and turns it into a draft trip for `user_id`.
    pub fn into_trip(self, user_id: &str) -> Result<Trip, String> {
        let destination = self.destination.trim().to_string();
        if destination.is_empty() {
            return Err("destination is required".to_string());
        }

        let num_days = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                if end < start {
                    return Err("end_date must not be before start_date".to_string());
                }
                (end - start).num_days() as u32 + 1
            }
            _ => self.num_days.unwrap_or(0),
        };
        if num_days == 0 {
            return Err("num_days must be at least 1".to_string());
        }

        let interests: Vec<String> = self
            .interests
            .into_iter()
            .map(|interest| interest.trim().to_string())
            .filter(|interest| !interest.is_empty())
            .collect();
        if interests.is_empty() {
            return Err("select at least one interest".to_string());
        }

        for (name, value) in [("budget_min", self.budget_min), ("budget_max", self.budget_max)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("{} must be a non-negative number", name));
                }
            }
        }

        let now = Utc::now();
        Ok(Trip {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            destination,
            start_date: self.start_date,
            end_date: self.end_date,
            num_days,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            currency: Some(self.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string())),
            interests,
            travel_style: self.travel_style,
            travel_pace: self.travel_pace,
            status: TripStatus::Draft,
            budget_breakdown: None,
            local_tips: None,
            public_slug: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A trip together with its generated itinerary, as served to clients.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TripDetails {
    #[serde(flatten)]
    pub trip: Trip,
    pub days: Vec<DayWithItems>,
}
