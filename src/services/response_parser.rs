//! Turns free-form model output into a validated itinerary.
//!
//! The model is asked for bare JSON but may still wrap it in Markdown fences,
//! so those are stripped first. Only a syntax error counts as "not JSON"; the
//! parsed document is then walked field by field, types included. A single
//! violation rejects the whole response and every violation is reported with
//! its path, e.g. `days[1].activities[0].coordinates.lat`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::itinerary::{Coordinates, ItineraryItem, TimeSlot, TransportMode};
use crate::models::trip::{BudgetBreakdown, LocalTips};

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ResponseFormatError {
    #[error("response is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("{}", join_field_errors(.0))]
    Schema(Vec<FieldError>),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the caller asked for; used only for soft checks that log a warning.
#[derive(Debug, Clone, Copy)]
pub struct Expectations {
    pub num_days: u32,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItinerary {
    pub days: Vec<ParsedDay>,
    pub budget_breakdown: Option<BudgetBreakdown>,
    pub local_tips: Option<LocalTips>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDay {
    pub day_number: u32,
    pub summary: Option<String>,
    pub activities: Vec<ParsedActivity>,
}

/// An activity with every default already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedActivity {
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
}

impl ParsedActivity {
    pub fn into_item(self, day_id: &str, created_at: DateTime<Utc>) -> ItineraryItem {
        ItineraryItem {
            id: Uuid::new_v4().to_string(),
            day_id: day_id.to_string(),
            place_name: self.place_name,
            description: self.description,
            time_slot: self.time_slot,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            estimated_cost: self.estimated_cost,
            coordinates: self.coordinates,
            tips: self.tips,
            is_backup: self.is_backup,
            transport_mode: self.transport_mode,
            transport_duration_minutes: self.transport_duration_minutes,
            transport_cost: self.transport_cost,
            sort_order: self.sort_order,
            created_at,
        }
    }
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?i)```(?:json)?\n?").expect("fence pattern is valid"))
}

/// Removes every Markdown code fence marker and surrounding whitespace.
pub fn strip_code_fences(content: &str) -> String {
    fence_pattern().replace_all(content, "").trim().to_string()
}

/// Collects violations while walking the raw document.
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn object<'v>(&mut self, path: &str, value: Option<&'v Value>) -> Option<&'v Map<String, Value>> {
        match value? {
            Value::Object(map) => Some(map),
            _ => {
                self.fail(path, "must be an object");
                None
            }
        }
    }

    fn array<'v>(&mut self, path: &str, value: Option<&'v Value>) -> Option<&'v Vec<Value>> {
        match value? {
            Value::Array(values) => Some(values),
            _ => {
                self.fail(path, "must be an array");
                None
            }
        }
    }

    fn number(&mut self, path: &str, value: Option<&Value>) -> Option<f64> {
        match value? {
            Value::Number(n) => n.as_f64(),
            _ => {
                self.fail(path, "must be a number");
                None
            }
        }
    }

    fn string(&mut self, path: &str, value: Option<&Value>) -> Option<String> {
        match value? {
            Value::String(s) => non_blank(s),
            _ => {
                self.fail(path, "must be a string");
                None
            }
        }
    }

    /// Like `string`, but absent or blank is a violation too.
    fn required_string(&mut self, path: &str, value: Option<&Value>) -> Option<String> {
        match value {
            None | Some(Value::String(_)) => {
                let parsed = value.and_then(|v| v.as_str()).and_then(non_blank);
                if parsed.is_none() {
                    self.fail(path, "is required");
                }
                parsed
            }
            other => self.string(path, other),
        }
    }

    fn boolean(&mut self, path: &str, value: Option<&Value>) -> Option<bool> {
        match value? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.fail(path, "must be a boolean");
                None
            }
        }
    }

    fn strings(&mut self, path: &str, value: Option<&Value>) -> Vec<String> {
        let Some(values) = self.array(path, value) else {
            return Vec::new();
        };
        values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| self.string(&format!("{}[{}]", path, i), Some(v)))
            .collect()
    }

    fn amount(&mut self, path: &str, value: Option<&Value>) -> Option<f64> {
        match self.number(path, value) {
            Some(v) if !v.is_finite() || v < 0.0 => {
                self.fail(path, "must be a non-negative number");
                None
            }
            other => other,
        }
    }

    fn whole(&mut self, path: &str, value: Option<&Value>) -> Option<u32> {
        let value = self.amount(path, value)?;
        if value > u32::MAX as f64 {
            self.fail(path, "is too large");
            return None;
        }
        Some(value.round() as u32)
    }
}

/// A present, non-null field.
fn field<'v>(map: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    map.get(key).filter(|value| !value.is_null())
}

fn non_blank(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_itinerary(content: &str, expect: &Expectations) -> Result<ParsedItinerary, ResponseFormatError> {
    let cleaned = strip_code_fences(content);
    let document: Value = serde_json::from_str(&cleaned)?;

    let mut check = Checker { errors: Vec::new() };
    let mut warnings = Vec::new();

    let Some(root) = check.object("(root)", Some(&document)) else {
        return Err(ResponseFormatError::Schema(check.errors));
    };

    let raw_days: Vec<&Value> = match field(root, "days") {
        None => {
            check.fail("days", "is required");
            Vec::new()
        }
        value => match check.array("days", value) {
            Some(days) if days.is_empty() => {
                check.fail("days", "must contain at least one day");
                Vec::new()
            }
            Some(days) => days.iter().collect(),
            None => Vec::new(),
        },
    };

    let mut seen_numbers = HashSet::new();
    let mut days = Vec::with_capacity(raw_days.len());

    for (d, raw_day) in raw_days.into_iter().enumerate() {
        let day_path = format!("days[{}]", d);
        let Some(raw_day) = check.object(&day_path, Some(raw_day)) else {
            continue;
        };

        let number_path = format!("{}.day_number", day_path);
        let day_number = match field(raw_day, "day_number") {
            None => {
                check.fail(number_path, "is required");
                None
            }
            value => match check.number(&number_path, value) {
                None => None,
                Some(n) if n.fract() != 0.0 || n < 1.0 || n > u32::MAX as f64 => {
                    check.fail(number_path, "must be a whole number of at least 1");
                    None
                }
                Some(n) => {
                    let n = n as u32;
                    if !seen_numbers.insert(n) {
                        check.fail(number_path, format!("duplicates day {}", n));
                    }
                    Some(n)
                }
            },
        };
        let summary = check.string(&format!("{}.summary", day_path), field(raw_day, "summary"));

        let raw_activities = check
            .array(&format!("{}.activities", day_path), field(raw_day, "activities"))
            .map(|values| values.iter().collect::<Vec<_>>())
            .unwrap_or_default();

        let mut activities = Vec::new();
        for (a, raw) in raw_activities.into_iter().enumerate() {
            let path = format!("{}.activities[{}]", day_path, a);
            let Some(raw) = check.object(&path, Some(raw)) else {
                continue;
            };
            let at = |name: &str| format!("{}.{}", path, name);

            let place_name = check.required_string(&at("place_name"), field(raw, "place_name"));

            let time_slot = match check.string(&at("time_slot"), field(raw, "time_slot")) {
                None => Some(TimeSlot::Morning),
                Some(slot) => {
                    let parsed = TimeSlot::parse(&slot);
                    if parsed.is_none() {
                        check.fail(
                            at("time_slot"),
                            format!("'{}' is not one of morning, afternoon, evening", slot),
                        );
                    }
                    parsed
                }
            };

            let transport_mode = match check.string(&at("transport_mode"), field(raw, "transport_mode")) {
                None => None,
                Some(mode) if mode.eq_ignore_ascii_case("none") => None,
                Some(mode) => {
                    let parsed = TransportMode::parse(&mode);
                    if parsed.is_none() {
                        check.fail(
                            at("transport_mode"),
                            format!("'{}' is not one of walk, bus, cab, auto", mode),
                        );
                    }
                    parsed
                }
            };

            let coordinates = match check.object(&at("coordinates"), field(raw, "coordinates")) {
                None => None,
                Some(coords) => {
                    if field(coords, "lat").is_none() || field(coords, "lng").is_none() {
                        check.fail(at("coordinates"), "must have both lat and lng");
                    }
                    let lat = match check.number(&at("coordinates.lat"), field(coords, "lat")) {
                        Some(lat) if !(-90.0..=90.0).contains(&lat) => {
                            check.fail(at("coordinates.lat"), "must be between -90 and 90");
                            None
                        }
                        other => other,
                    };
                    let lng = match check.number(&at("coordinates.lng"), field(coords, "lng")) {
                        Some(lng) if !(-180.0..=180.0).contains(&lng) => {
                            check.fail(at("coordinates.lng"), "must be between -180 and 180");
                            None
                        }
                        other => other,
                    };
                    lat.zip(lng).map(|(lat, lng)| Coordinates { lat, lng })
                }
            };

            let description = check.string(&at("description"), field(raw, "description"));
            let start_time = check.string(&at("start_time"), field(raw, "start_time"));
            let tips = check.string(&at("tips"), field(raw, "tips"));
            let is_backup = check
                .boolean(&at("is_backup"), field(raw, "is_backup"))
                .unwrap_or(false);
            let duration_minutes = check
                .whole(&at("duration_minutes"), field(raw, "duration_minutes"))
                .unwrap_or(DEFAULT_DURATION_MINUTES);
            let estimated_cost = check
                .amount(&at("estimated_cost"), field(raw, "estimated_cost"))
                .unwrap_or(0.0);
            let transport_duration_minutes = check.whole(
                &at("transport_duration_minutes"),
                field(raw, "transport_duration_minutes"),
            );
            let transport_cost = check
                .amount(&at("transport_cost"), field(raw, "transport_cost"))
                .unwrap_or(0.0);
            // Falls back to list position, so order is only as stable as the model's own list.
            let sort_order = check
                .whole(&at("sort_order"), field(raw, "sort_order"))
                .unwrap_or(a as u32);

            if let (Some(place_name), Some(time_slot)) = (place_name, time_slot) {
                activities.push(ParsedActivity {
                    place_name,
                    description,
                    time_slot,
                    start_time,
                    duration_minutes,
                    estimated_cost,
                    coordinates,
                    tips,
                    is_backup,
                    transport_mode,
                    transport_duration_minutes,
                    transport_cost,
                    sort_order,
                });
            }
        }

        if let Some(day_number) = day_number {
            if !activities.iter().any(|activity| !activity.is_backup) {
                warnings.push(format!("day {} has no primary activities", day_number));
            }
            days.push(ParsedDay {
                day_number,
                summary,
                activities,
            });
        }
    }

    let budget_breakdown = check
        .object("budget_breakdown", field(root, "budget_breakdown"))
        .and_then(|raw| {
            let mut category = |name: &str| {
                let path = format!("budget_breakdown.{}", name);
                match field(raw, name) {
                    None => {
                        check.fail(path, "is required");
                        None
                    }
                    value => check.amount(&path, value),
                }
            };
            let accommodation = category("accommodation");
            let food = category("food");
            let transport = category("transport");
            let activities = category("activities");
            let miscellaneous = category("miscellaneous");
            Some(BudgetBreakdown {
                accommodation: accommodation?,
                food: food?,
                transport: transport?,
                activities: activities?,
                miscellaneous: miscellaneous?,
            })
        });

    let local_tips = check
        .object("local_tips", field(root, "local_tips"))
        .map(|raw| LocalTips {
            tips: check.strings("local_tips.tips", field(raw, "tips")),
            scams: check.strings("local_tips.scams", field(raw, "scams")),
        });

    if !check.errors.is_empty() {
        return Err(ResponseFormatError::Schema(check.errors));
    }

    if days.len() != expect.num_days as usize {
        warnings.push(format!(
            "requested {} days but the model returned {}",
            expect.num_days,
            days.len()
        ));
    }
    if let Some(breakdown) = &budget_breakdown {
        let total = breakdown.total();
        let below = expect.budget_min.map_or(false, |min| total < min);
        let above = expect.budget_max.map_or(false, |max| total > max);
        if below || above {
            warnings.push(format!("budget breakdown totals {} which is outside the requested range", total));
        }
    }

    Ok(ParsedItinerary {
        days,
        budget_breakdown,
        local_tips,
        warnings,
    })
}
