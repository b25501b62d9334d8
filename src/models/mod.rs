pub mod generation;
pub mod itinerary;
pub mod trip;
