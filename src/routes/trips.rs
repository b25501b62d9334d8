use actix_web::{web, HttpResponse};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::db::TripStore;
use crate::error::ApiError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::itinerary::assemble_days;
use crate::models::trip::{NewTripRequest, Trip, TripDetails};

const SLUG_LENGTH: usize = 8;
const SLUG_ATTEMPTS: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub public_slug: String,
}

pub fn config(cfg: &mut web::ServiceConfig, auth: AuthMiddleware) {
    cfg.service(
        web::scope("/api")
            .route("/shared/{slug}", web::get().to(get_shared))
            .service(
                web::scope("/trips")
                    .wrap(auth)
                    .route("", web::post().to(create_trip))
                    .route("", web::get().to(list_trips))
                    .route("/{id}", web::get().to(get_trip))
                    .route("/{id}", web::delete().to(delete_trip))
                    .route("/{id}/duplicate", web::post().to(duplicate_trip))
                    .route("/{id}/share", web::post().to(share_trip)),
            ),
    );
}

async fn owned_trip(store: &dyn TripStore, trip_id: &str, user: &AuthenticatedUser) -> Result<Trip, ApiError> {
    store
        .find_trip(trip_id)
        .await?
        .filter(|trip| trip.user_id == user.user_id)
        .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))
}

async fn with_itinerary(store: &dyn TripStore, trip: Trip) -> Result<TripDetails, ApiError> {
    let days = store.days_for_trip(&trip.id).await?;
    let day_ids: Vec<String> = days.iter().map(|day| day.id.clone()).collect();
    let items = store.items_for_days(&day_ids).await?;
    Ok(TripDetails {
        trip,
        days: assemble_days(days, items),
    })
}

fn new_public_slug() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SLUG_LENGTH)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/*
    POST /api/trips
*/
pub async fn create_trip(
    user: AuthenticatedUser,
    store: web::Data<dyn TripStore>,
    input: web::Json<NewTripRequest>,
) -> Result<HttpResponse, ApiError> {
    let trip = input
        .into_inner()
        .into_trip(&user.user_id)
        .map_err(ApiError::BadRequest)?;
    store.insert_trip(&trip).await?;
    log::info!("Created trip {} for user {}", trip.id, user.user_id);
    Ok(HttpResponse::Created().json(trip))
}

/*
    GET /api/trips
*/
pub async fn list_trips(
    user: AuthenticatedUser,
    store: web::Data<dyn TripStore>,
) -> Result<HttpResponse, ApiError> {
    let trips = store.trips_for_user(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(trips))
}

/*
    GET /api/trips/{id}
*/
pub async fn get_trip(
    user: AuthenticatedUser,
    store: web::Data<dyn TripStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = owned_trip(store.get_ref(), &path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(with_itinerary(store.get_ref(), trip).await?))
}

/*
    DELETE /api/trips/{id}
*/
pub async fn delete_trip(
    user: AuthenticatedUser,
    store: web::Data<dyn TripStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = owned_trip(store.get_ref(), &path.into_inner(), &user).await?;
    if !store.delete_trip(&trip.id).await? {
        return Err(ApiError::NotFound("Trip not found".to_string()));
    }
    log::info!("Deleted trip {} with its itinerary", trip.id);
    Ok(HttpResponse::NoContent().finish())
}

/*
    POST /api/trips/{id}/duplicate
*/
pub async fn duplicate_trip(
    user: AuthenticatedUser,
    store: web::Data<dyn TripStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = owned_trip(store.get_ref(), &path.into_inner(), &user).await?;
    let copy = trip.duplicate();
    store.insert_trip(&copy).await?;
    Ok(HttpResponse::Created().json(copy))
}

/*
    POST /api/trips/{id}/share
*/
pub async fn share_trip(
    user: AuthenticatedUser,
    store: web::Data<dyn TripStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = owned_trip(store.get_ref(), &path.into_inner(), &user).await?;
    if let Some(public_slug) = trip.public_slug {
        return Ok(HttpResponse::Ok().json(ShareResponse { public_slug }));
    }

    for _ in 0..SLUG_ATTEMPTS {
        let slug = new_public_slug();
        if store.find_trip_by_slug(&slug).await?.is_none() {
            store.set_public_slug(&trip.id, &slug).await?;
            return Ok(HttpResponse::Ok().json(ShareResponse { public_slug: slug }));
        }
    }

    log::error!("Could not find a free share slug for trip {}", trip.id);
    Err(ApiError::Internal("Could not create a share link, please retry".to_string()))
}

/*
    GET /api/shared/{slug} (public)
*/
pub async fn get_shared(
    store: web::Data<dyn TripStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = store
        .find_trip_by_slug(&path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))?;
    Ok(HttpResponse::Ok().json(with_itinerary(store.get_ref(), trip).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_slug_shape() {
        let slug = new_public_slug();
        assert_eq!(slug.len(), SLUG_LENGTH);
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
