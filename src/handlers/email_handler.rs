//! handlers/email_handler.rs
use actix_web::{web, HttpResponse};

use crate::{
    error::ServiceResult,
    models::email_model::{EmailRecord, SendEmailRequest, SendEmailResponse, TemplatedEmailRequest},
    services::email_service::EmailService,
};

/// Un fallo del proveedor ya quedó registrado: se responde 502 con el id del registro.
fn delivery_response(result: ServiceResult<EmailRecord>) -> HttpResponse {
    match result {
        Ok(record) => {
            let body = SendEmailResponse {
                success: record.exito,
                record_id: record.id,
                provider_message_id: record.provider_message_id,
                error: record.error_message,
            };
            if body.success {
                HttpResponse::Ok().json(body)
            } else {
                log::error!("Email {} no entregado: {:?}", body.record_id, body.error);
                HttpResponse::BadGateway().json(body)
            }
        }
        Err(e) => e.to_response(),
    }
}

/// POST /correos
pub async fn send_email_endpoint(
    email_service: web::Data<EmailService>,
    body: web::Json<SendEmailRequest>,
) -> HttpResponse {
    delivery_response(email_service.send_direct(body.into_inner()).await)
}

/// POST /correos/plantilla
pub async fn send_templated_email_endpoint(
    email_service: web::Data<EmailService>,
    body: web::Json<TemplatedEmailRequest>,
) -> HttpResponse {
    delivery_response(email_service.send_templated(body.into_inner()).await)
}

/// GET /correos/trato/{tratoId}
pub async fn deal_emails_endpoint(
    email_service: web::Data<EmailService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match email_service.list_for_deal(&deal_id).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => e.to_response(),
    }
}
