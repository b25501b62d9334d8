use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

use crate::db::TripStore;

#[derive(Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub services: HashMap<String, ServiceStatus>,
    pub environment: String,
    pub version: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct ServiceStatus {
    pub status: String,
    pub details: Option<String>,
}

/// API key of the model gateway, kept apart from the rest of the app state
/// so the health check can report it masked.
#[derive(Clone)]
pub struct GatewayKey(pub String);

pub async fn health_check(
    store: web::Data<dyn TripStore>,
    gateway_key: web::Data<GatewayKey>,
) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let store_result = check_store(store.get_ref()).await;
    health
        .services
        .insert("data_store".to_string(), store_result.clone());

    let gateway_result = check_gateway_key(&gateway_key.0);
    health
        .services
        .insert("ai_gateway".to_string(), gateway_result.clone());

    if store_result.status != "ok" || gateway_result.status != "ok" {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}

async fn check_store(store: &dyn TripStore) -> ServiceStatus {
    match store.ping().await {
        Ok(()) => ServiceStatus {
            status: "ok".to_string(),
            details: Some("Connected successfully to the data store".to_string()),
        },
        Err(e) => {
            log::error!("Data store health check failed: {}", e);

            ServiceStatus {
                status: "error".to_string(),
                details: Some(format!("Failed to connect: {}", e)),
            }
        }
    }
}

fn check_gateway_key(key: &str) -> ServiceStatus {
    if key.trim().is_empty() {
        return ServiceStatus {
            status: "error".to_string(),
            details: Some("LLM_API_KEY not configured".to_string()),
        };
    }

    ServiceStatus {
        status: "ok".to_string(),
        details: Some(format!("AI gateway key configured ({})", mask_key(key))),
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-live-1234567890"), "sk-l***7890");
        assert_eq!(mask_key("short"), "***");
    }

    #[test]
    fn test_blank_key_is_an_error() {
        assert_eq!(check_gateway_key("  ").status, "error");
        assert_eq!(check_gateway_key("sk-live-1234567890").status, "ok");
    }
}
