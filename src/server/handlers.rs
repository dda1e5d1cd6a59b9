use crate::{logger, models::GenerationRequest, service::ImageService};
use actix_web::{http::StatusCode, web, HttpResponse};
use serde_json::json;

/// POST /generate-image
pub async fn generate_image(
    service: web::Data<ImageService>,
    request: web::Json<GenerationRequest>,
) -> HttpResponse {
    let _timer = logger::timer("generate-image");
    let response = service.handle(request.into_inner()).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(response.body)
}

/// GET /health
pub async fn health(service: web::Data<ImageService>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "providers": service.provider_names(),
        "moderation": service.moderation_enabled(),
        "storage": service.store_name(),
        "notifications": service.notifications_enabled(),
    }))
}
