pub mod handlers;

use crate::{config::Config, error::Result, service::ImageService};
use actix_web::{error::InternalError, web, App, HttpResponse, HttpServer};
use serde_json::json;

/// Registers routes and the JSON body error mapping.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let body = json!({
            "status": "error",
            "message": "Invalid request body",
            "prompt": "",
            "details": { "reason": "invalid_request", "error": err.to_string() }
        });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }))
    .route("/generate-image", web::post().to(handlers::generate_image))
    .route("/health", web::get().to(handlers::health));
}

pub async fn run(config: Config) -> Result<()> {
    let service = web::Data::new(ImageService::from_config(&config)?);
    let bind = (config.host.clone(), config.port_or_default());

    log::info!("🚀 Listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || App::new().app_data(service.clone()).configure(configure))
        .bind(bind)
        .map_err(|e| crate::error::ImageBotError::ConfigError(format!("Failed to bind: {}", e)))?
        .run()
        .await
        .map_err(|e| crate::error::ImageBotError::InternalError(e.to_string()))
}
