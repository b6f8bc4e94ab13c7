//! handlers/follow_up_handler.rs
//! Endpoints de /correos-seguimiento. Activar y desactivar sólo cambian la bandera; el
//! envío siempre lo hace el job (o `procesar-manual`).
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::services::{deal_service::DealService, follow_up_service::FollowUpService};

/// POST /correos-seguimiento/activar/{tratoId}
pub async fn activate_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match deal_service.activate_follow_up(&deal_id).await {
        Ok(deal) => HttpResponse::Ok().json(json!({
            "success": true,
            "tratoId": deal.id,
            "followUpActive": deal.follow_up_active,
            "followUpActivatedAt": deal.follow_up_activated_at
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /correos-seguimiento/desactivar/{tratoId}
pub async fn deactivate_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match deal_service.deactivate_follow_up(&deal_id).await {
        Ok(deal) => HttpResponse::Ok().json(json!({
            "success": true,
            "tratoId": deal.id,
            "followUpActive": deal.follow_up_active
        })),
        Err(e) => e.to_response(),
    }
}

/// GET /correos-seguimiento/estado/{tratoId}
pub async fn status_endpoint(
    follow_up_service: web::Data<FollowUpService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match follow_up_service.status(&deal_id).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => e.to_response(),
    }
}

/// POST /correos-seguimiento/procesar-manual
pub async fn run_now_endpoint(follow_up_service: web::Data<FollowUpService>) -> HttpResponse {
    log::info!("(follow_up) Ejecución manual solicitada");
    match follow_up_service.run_once().await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => e.to_response(),
    }
}

/// POST /correos-seguimiento/verificar-pendientes
pub async fn pending_endpoint(follow_up_service: web::Data<FollowUpService>) -> HttpResponse {
    match follow_up_service.pending().await {
        Ok(pending) => HttpResponse::Ok().json(json!({
            "total": pending.len(),
            "pendientes": pending
        })),
        Err(e) => e.to_response(),
    }
}
