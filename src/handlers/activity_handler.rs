//! handlers/activity_handler.rs
use actix_web::{web, HttpResponse};

use crate::models::activity_model::{CompleteActivityRequest, ScheduleActivityRequest};
use crate::services::activity_service::ActivityService;

/// POST /tratos/actividades
pub async fn schedule_activity_endpoint(
    activity_service: web::Data<ActivityService>,
    body: web::Json<ScheduleActivityRequest>,
) -> HttpResponse {
    match activity_service.schedule(body.into_inner()).await {
        Ok(activity) => HttpResponse::Created().json(activity),
        Err(e) => e.to_response(),
    }
}

/// PUT /tratos/actividades/{id}/completar
pub async fn complete_activity_endpoint(
    activity_service: web::Data<ActivityService>,
    path: web::Path<String>,
    body: web::Json<CompleteActivityRequest>,
) -> HttpResponse {
    let activity_id = path.into_inner();
    match activity_service
        .complete(&activity_id, body.into_inner())
        .await
    {
        Ok(activity) => HttpResponse::Ok().json(activity),
        Err(e) => e.to_response(),
    }
}

/// GET /tratos/actividades/usuario/{usuarioId}
pub async fn user_activities_endpoint(
    activity_service: web::Data<ActivityService>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    match activity_service.open_for_user(&user_id).await {
        Ok(buckets) => HttpResponse::Ok().json(buckets),
        Err(e) => e.to_response(),
    }
}
