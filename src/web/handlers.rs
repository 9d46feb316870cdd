use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde_json::json;
use tera::Context;

use crate::relay::{self, RelayError};
use crate::web::models::ChatRequest;
use crate::AppState;

// Index page handler
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let context = Context::new();
    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Chat endpoint: relay one request to the completion provider
pub async fn chat(
    data: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> impl Responder {
    let req = req.into_inner();
    info!(
        "Chat request: {:?} ({} prior entries)",
        req.message,
        req.conversation.len()
    );

    match relay::handle_chat(data.provider.as_ref(), &data.defaults, req).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err @ RelayError::InvalidRequest) => {
            HttpResponse::BadRequest().json(json!({ "error": err.to_string() }))
        }
        Err(RelayError::Provider(text)) => {
            error!("Provider error: {}", text);
            HttpResponse::NotImplemented().json(json!({ "error": text }))
        }
        Err(err @ RelayError::Unexpected(_)) => {
            error!("Unexpected error: {:#}", anyhow::Error::new(err));
            HttpResponse::BadGateway().json(json!({ "error": "An unexpected error occurred" }))
        }
    }
}
