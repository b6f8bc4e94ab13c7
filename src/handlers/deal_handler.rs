//! handlers/deal_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::deal_model::{CreateDealRequest, DealFilter, MovePhaseQuery, UpdateDealRequest};
use crate::services::deal_service::DealService;

/// GET /tratos
pub async fn list_deals_endpoint(deal_service: web::Data<DealService>) -> HttpResponse {
    match deal_service.list_deals().await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

/// GET /tratos/filtrar?propietarioId=&startDate=&endDate=
pub async fn filter_deals_endpoint(
    deal_service: web::Data<DealService>,
    query: web::Query<DealFilter>,
) -> HttpResponse {
    match deal_service.filter_deals(query.into_inner()).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

/// POST /tratos
pub async fn create_deal_endpoint(
    deal_service: web::Data<DealService>,
    body: web::Json<CreateDealRequest>,
) -> HttpResponse {
    match deal_service.create_deal(body.into_inner()).await {
        Ok(deal) => HttpResponse::Created().json(deal),
        Err(e) => e.to_response(),
    }
}

/// GET /tratos/{id}
pub async fn get_deal_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match deal_service.get_deal_detail(&deal_id).await {
        Ok(detail) => HttpResponse::Ok().json(detail),
        Err(e) => e.to_response(),
    }
}

/// PUT /tratos/{id}
pub async fn update_deal_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
    body: web::Json<UpdateDealRequest>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match deal_service.update_deal(&deal_id, body.into_inner()).await {
        Ok(deal) => HttpResponse::Ok().json(deal),
        Err(e) => e.to_response(),
    }
}

/// DELETE /tratos/{id}
pub async fn delete_deal_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match deal_service.delete_deal(&deal_id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "id": deal_id })),
        Err(e) => e.to_response(),
    }
}

/// PUT /tratos/{id}/mover-fase?nuevaFase=...&actividadId=...
pub async fn move_phase_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
    query: web::Query<MovePhaseQuery>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    let query = query.into_inner();
    match deal_service
        .move_to(&deal_id, &query.nueva_fase, query.actividad_id.as_deref())
        .await
    {
        Ok(deal) => HttpResponse::Ok().json(deal),
        Err(e) => e.to_response(),
    }
}

/// GET /tratos/{id}/desatendido
pub async fn neglected_endpoint(
    deal_service: web::Data<DealService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match deal_service.is_neglected(&deal_id).await {
        Ok(neglected) => HttpResponse::Ok().json(json!({
            "tratoId": deal_id,
            "neglected": neglected
        })),
        Err(e) => e.to_response(),
    }
}
