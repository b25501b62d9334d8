use serde::{Deserialize, Serialize};

use super::trip::DEFAULT_CURRENCY;

/// Body of the generate-itinerary call, camelCased as the web client sends it.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateItineraryRequest {
    pub trip_id: String,
    pub destination: String,
    pub num_days: u32,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub travel_style: Option<String>,
    pub travel_pace: Option<String>,
    pub start_date: Option<String>,
    pub currency: Option<String>,
}

impl GenerateItineraryRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.trip_id.trim().is_empty() {
            return Err("tripId is required".to_string());
        }
        if self.destination.trim().is_empty() {
            return Err("destination is required".to_string());
        }
        if self.num_days == 0 {
            return Err("numDays must be at least 1".to_string());
        }
        for (name, value) in [("budgetMin", self.budget_min), ("budgetMax", self.budget_max)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("{} must be a non-negative number", name));
                }
            }
        }
        Ok(())
    }

    pub fn currency(&self) -> &str {
        self.currency
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerateItineraryResponse {
    pub success: bool,
}
