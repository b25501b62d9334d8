use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse},
    http::header::{self, HeaderName},
    http::Method,
    middleware::Logger,
    web, App, Error, HttpResponse,
};
use futures::future::{ready, Either, TryFutureExt};

use crate::db::TripStore;
use crate::error::json_error_handler;
use crate::middleware::auth::AuthMiddleware;
use crate::routes;
use crate::routes::health::GatewayKey;
use crate::services::itinerary_generation_service::ItineraryGenerator;

/// Everything the HTTP layer shares between workers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TripStore>,
    pub generator: Arc<ItineraryGenerator>,
    pub jwt_secret: String,
    pub gateway_key: String,
}

fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allow_any_method()
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-supabase-client-platform"),
            HeaderName::from_static("x-supabase-client-platform-version"),
            HeaderName::from_static("x-supabase-client-runtime"),
            HeaderName::from_static("x-supabase-client-runtime-version"),
        ])
        .max_age(3600)
}

pub fn create_app(
    state: &AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let auth = AuthMiddleware::new(&state.jwt_secret);
    let generate_auth = auth.clone();

    App::new()
        .app_data(web::Data::from(state.store.clone()))
        .app_data(web::Data::from(state.generator.clone()))
        .app_data(web::Data::new(GatewayKey(state.gateway_key.clone())))
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        // Plain OPTIONS calls without an Origin get past CORS; answer them on every path.
        .wrap_fn(|req, srv| {
            if req.method() == Method::OPTIONS {
                let res = req
                    .into_response(HttpResponse::Ok().finish())
                    .map_into_right_body();
                return Either::Left(ready(Ok(res)));
            }
            Either::Right(srv.call(req).map_ok(ServiceResponse::map_into_left_body))
        })
        .wrap(cors())
        .wrap(Logger::default())
        .route("/health", web::get().to(routes::health::health_check))
        .configure(|cfg| routes::generate::config(cfg, generate_auth))
        .configure(|cfg| routes::trips::config(cfg, auth))
}
