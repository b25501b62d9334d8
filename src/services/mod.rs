pub mod itinerary_generation_service;
pub mod llm_gateway;
pub mod prompt;
pub mod response_parser;
