use std::io;
use std::sync::Arc;

use actix_web::HttpServer;
use env_logger::Env;

use tripwise_api::app::{create_app, AppState};
use tripwise_api::config::ServiceConfig;
use tripwise_api::db::mongo::{create_mongo_client, MongoTripStore};
use tripwise_api::db::TripStore;
use tripwise_api::services::itinerary_generation_service::{
    ItineraryGenerationConfig, ItineraryGenerator,
};
use tripwise_api::services::llm_gateway::LlmGateway;

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));
    log::info!("Application starting...");

    let config = ServiceConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let client = create_mongo_client(&config.data_store)
        .await
        .map_err(|e| startup_error("Failed to create MongoDB client", e))?;
    let mongo_store = MongoTripStore::new(client, config.data_store.database.clone());
    if let Err(e) = mongo_store.ensure_indexes().await {
        log::warn!("Could not ensure indexes: {}", e);
    }
    let store: Arc<dyn TripStore> = Arc::new(mongo_store);
    log::info!("Data store ready ({})", config.data_store.database);

    let gateway = LlmGateway::new(&config.llm)
        .map_err(|e| startup_error("Failed to build AI gateway client", e))?;

    let lock_ttl = chrono::Duration::from_std(config.generation_lock_ttl)
        .map_err(|e| startup_error("Invalid GENERATION_LOCK_TTL_SECS", e))?;
    let generator = ItineraryGenerator::with_config(
        store.clone(),
        Arc::new(gateway),
        ItineraryGenerationConfig { lock_ttl },
    );

    let state = AppState {
        store,
        generator: Arc::new(generator),
        jwt_secret: config.jwt_secret.clone(),
        gateway_key: config.llm.api_key.clone(),
    };

    log::info!("Starting HTTP server on {}:{}", config.host, config.port);

    HttpServer::new(move || create_app(&state))
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
}
