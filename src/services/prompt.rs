use crate::models::generation::GenerateItineraryRequest;

pub const SYSTEM_INSTRUCTION: &str =
    "You are a travel planning expert. Always respond with valid JSON only, no markdown formatting.";

const RESPONSE_SCHEMA: &str = r#"{
  "days": [
    {
      "day_number": 1,
      "summary": "Brief summary of the day",
      "activities": [
        {
          "place_name": "Place Name",
          "description": "What to do here",
          "time_slot": "morning|afternoon|evening",
          "start_time": "09:00 AM",
          "duration_minutes": 90,
          "estimated_cost": 500,
          "coordinates": { "lat": 15.4909, "lng": 73.8278 },
          "tips": "Local tip for this place",
          "is_backup": false,
          "transport_mode": "walk|bus|cab|auto",
          "transport_duration_minutes": 15,
          "transport_cost": 100,
          "sort_order": 1
        }
      ]
    }
  ],
  "budget_breakdown": {
    "accommodation": 5000,
    "food": 3000,
    "transport": 2000,
    "activities": 3000,
    "miscellaneous": 1000
  },
  "local_tips": {
    "tips": ["Tip 1", "Tip 2", "Tip 3"],
    "scams": ["Common scam 1", "Common scam 2"]
  }
}"#;

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "INR" => Some("₹"),
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

fn money(amount: f64, code: &str) -> String {
    match currency_symbol(code) {
        Some(symbol) => format!("{}{}", symbol, amount),
        None => format!("{} {}", amount, code),
    }
}

fn or_unspecified(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("not specified")
}

/// Renders the user turn for one generation request. Same input, same prompt.
pub fn build_itinerary_prompt(req: &GenerateItineraryRequest) -> String {
    let currency = req.currency().to_ascii_uppercase();
    let pace = or_unspecified(req.travel_pace.as_deref());

    let budget = match (req.budget_min, req.budget_max) {
        (Some(min), Some(max)) => format!("{} to {} ({})", money(min, &currency), money(max, &currency), currency),
        (None, Some(max)) => format!("up to {} ({})", money(max, &currency), currency),
        (Some(min), None) => format!("from {} ({})", money(min, &currency), currency),
        (None, None) => format!("flexible ({})", currency),
    };

    let budget_rule = match (req.budget_min, req.budget_max) {
        (Some(min), Some(max)) => format!(
            "- Budget breakdown should fit within {}-{}",
            money(min, &currency),
            money(max, &currency)
        ),
        _ => "- Budget breakdown should be realistic for the travel style".to_string(),
    };

    format!(
        "You are a travel planning AI. Create a detailed {num_days}-day itinerary for {destination}.

Travel details:
- Budget: {budget}
- Interests: {interests}
- Travel style: {style}
- Travel pace: {pace}
- Start date: {start}

Return a JSON object with this EXACT structure (no markdown, just pure JSON):
{schema}

Rules:
- Include 3-5 activities per day for {pace} pace
- For each day include 1-2 backup/rainy day activities (is_backup: true)
- Include realistic coordinates for the places
{budget_rule}
- Include transport suggestions between consecutive activities
- Add local tips specific to {destination}
- All costs in {currency}",
        num_days = req.num_days,
        destination = req.destination.trim(),
        budget = budget,
        interests = req.interests.join(", "),
        style = or_unspecified(req.travel_style.as_deref()),
        pace = pace,
        start = req
            .start_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("flexible"),
        schema = RESPONSE_SCHEMA,
        budget_rule = budget_rule,
        currency = currency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goa() -> GenerateItineraryRequest {
        GenerateItineraryRequest {
            trip_id: "trip-1".to_string(),
            destination: "Goa".to_string(),
            num_days: 3,
            budget_min: Some(5000.0),
            budget_max: Some(30000.0),
            interests: vec!["beaches".to_string(), "nightlife".to_string()],
            travel_style: Some("friends".to_string()),
            travel_pace: Some("packed".to_string()),
            start_date: None,
            currency: None,
        }
    }

    #[test]
    fn test_prompt_renders_trip_parameters() {
        let prompt = build_itinerary_prompt(&goa());
        assert!(prompt.contains("Create a detailed 3-day itinerary for Goa."));
        assert!(prompt.contains("- Budget: ₹5000 to ₹30000 (INR)"));
        assert!(prompt.contains("- Interests: beaches, nightlife"));
        assert!(prompt.contains("- Travel style: friends"));
        assert!(prompt.contains("- Start date: flexible"));
        assert!(prompt.contains("Include 3-5 activities per day for packed pace"));
        assert!(prompt.contains("- Budget breakdown should fit within ₹5000-₹30000"));
        assert!(prompt.contains("- Add local tips specific to Goa"));
        assert!(prompt.contains("\"budget_breakdown\""));
        assert!(prompt.contains("\"scams\""));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_itinerary_prompt(&goa()), build_itinerary_prompt(&goa()));
    }

    #[test]
    fn test_prompt_uses_start_date_and_currency() {
        let mut req = goa();
        req.start_date = Some("2026-12-20".to_string());
        req.currency = Some("usd".to_string());
        req.budget_min = None;
        let prompt = build_itinerary_prompt(&req);
        assert!(prompt.contains("- Start date: 2026-12-20"));
        assert!(prompt.contains("- Budget: up to $30000 (USD)"));
        assert!(prompt.contains("- All costs in USD"));
    }

    #[test]
    fn test_unknown_currency_falls_back_to_code() {
        assert_eq!(money(1200.0, "THB"), "1200 THB");
        assert_eq!(money(99.5, "EUR"), "€99.5");
    }
}
