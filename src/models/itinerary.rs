use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    #[default]
    Morning,
    Afternoon,
    Evening,
}

impl TimeSlot {
    pub fn parse(raw: &str) -> Option<TimeSlot> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "morning" => Some(TimeSlot::Morning),
            "afternoon" => Some(TimeSlot::Afternoon),
            "evening" => Some(TimeSlot::Evening),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Walk,
    Bus,
    Cab,
    Auto,
}

impl TransportMode {
    pub fn parse(raw: &str) -> Option<TransportMode> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "walk" => Some(TransportMode::Walk),
            "bus" => Some(TransportMode::Bus),
            "cab" => Some(TransportMode::Cab),
            "auto" => Some(TransportMode::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ItineraryDay {
    #[serde(rename = "_id")]
    pub id: String,
    pub trip_id: String,
    pub day_number: u32,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ItineraryItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub day_id: String,
    pub place_name: String,
    pub description: Option<String>,
    pub time_slot: TimeSlot,
    pub start_time: Option<String>,
    pub duration_minutes: u32,
    pub estimated_cost: f64,
    pub coordinates: Option<Coordinates>,
    pub tips: Option<String>,
    pub is_backup: bool,
    pub transport_mode: Option<TransportMode>,
    pub transport_duration_minutes: Option<u32>,
    pub transport_cost: f64,
    pub sort_order: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DayWithItems {
    #[serde(flatten)]
    pub day: ItineraryDay,
    pub items: Vec<ItineraryItem>,
}

/// Joins items onto their days. Days come out by day number; within a day the
/// primary schedule precedes backups, then slots run morning to evening and
/// `sort_order` breaks ties.
pub fn assemble_days(mut days: Vec<ItineraryDay>, items: Vec<ItineraryItem>) -> Vec<DayWithItems> {
    days.sort_by_key(|day| day.day_number);

    let mut assembled: Vec<DayWithItems> = days
        .into_iter()
        .map(|day| DayWithItems {
            day,
            items: Vec::new(),
        })
        .collect();

    for item in items {
        if let Some(entry) = assembled.iter_mut().find(|entry| entry.day.id == item.day_id) {
            entry.items.push(item);
        }
    }

    for entry in assembled.iter_mut() {
        entry
            .items
            .sort_by_key(|item| (item.is_backup, item.time_slot, item.sort_order));
    }

    assembled
}
