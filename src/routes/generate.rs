use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::generation::{GenerateItineraryRequest, GenerateItineraryResponse};
use crate::services::itinerary_generation_service::ItineraryGenerator;

pub fn config(cfg: &mut web::ServiceConfig, auth: AuthMiddleware) {
    cfg.service(
        web::scope("/functions/v1")
            .wrap(auth)
            .route("/generate-itinerary", web::post().to(generate_itinerary)),
    );
}

/*
    /functions/v1/generate-itinerary
*/
pub async fn generate_itinerary(
    user: AuthenticatedUser,
    generator: web::Data<ItineraryGenerator>,
    input: web::Json<GenerateItineraryRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = input.into_inner();
    request.validate().map_err(ApiError::BadRequest)?;

    generator.generate(&user.user_id, &request).await?;

    Ok(HttpResponse::Ok().json(GenerateItineraryResponse { success: true }))
}
