//! handlers/webhook_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::{models::email_model::ResendWebhookEvent, services::email_service::EmailService};

/// POST /webhooks/resend
///
/// Un id de proveedor desconocido responde 200 con 0 filas actualizadas.
pub async fn resend_webhook_endpoint(
    email_service: web::Data<EmailService>,
    body: web::Json<ResendWebhookEvent>,
) -> HttpResponse {
    let event = body.into_inner();
    match email_service.apply_webhook(&event).await {
        Ok(updated) => HttpResponse::Ok().json(json!({
            "success": true,
            "type": event.event_type,
            "actualizados": updated
        })),
        Err(e) => e.to_response(),
    }
}
