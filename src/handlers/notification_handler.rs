//! handlers/notification_handler.rs
use actix_web::{web, HttpResponse};
use chrono::Duration;
use serde_json::json;

use crate::{
    error::ServiceError,
    models::notification_model::{ManualCleanupQuery, UserQuery},
    services::notification_service::NotificationService,
};

/// GET /notificaciones/user?usuarioId=&soloNoLeidas=
pub async fn list_user_notifications_endpoint(
    notification_service: web::Data<NotificationService>,
    query: web::Query<UserQuery>,
) -> HttpResponse {
    let query = query.into_inner();
    match notification_service
        .list_for_user(&query.usuario_id, query.solo_no_leidas)
        .await
    {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

/// GET /notificaciones/user/contador-no-leidas?usuarioId=
pub async fn unread_count_endpoint(
    notification_service: web::Data<NotificationService>,
    query: web::Query<UserQuery>,
) -> HttpResponse {
    match notification_service.unread_count(&query.usuario_id).await {
        Ok(count) => HttpResponse::Ok().json(json!({
            "usuarioId": query.usuario_id,
            "noLeidas": count
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /notificaciones/{id}/marcar-leida
pub async fn mark_read_endpoint(
    notification_service: web::Data<NotificationService>,
    path: web::Path<String>,
) -> HttpResponse {
    let notification_id = path.into_inner();
    match notification_service.mark_read(&notification_id).await {
        Ok(notification) => HttpResponse::Ok().json(notification),
        Err(e) => e.to_response(),
    }
}

/// POST /notificaciones/marcar-todas-leidas?usuarioId=
pub async fn mark_all_read_endpoint(
    notification_service: web::Data<NotificationService>,
    query: web::Query<UserQuery>,
) -> HttpResponse {
    match notification_service.mark_all_read(&query.usuario_id).await {
        Ok(updated) => HttpResponse::Ok().json(json!({
            "success": true,
            "actualizadas": updated
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /notificaciones/limpiar-leidas (retención configurada)
pub async fn cleanup_read_endpoint(
    notification_service: web::Data<NotificationService>,
) -> HttpResponse {
    let retention = notification_service.read_retention();
    match notification_service.cleanup_read(retention).await {
        Ok(deleted) => HttpResponse::Ok().json(json!({
            "success": true,
            "eliminadas": deleted,
            "dias": retention.num_days()
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /notificaciones/limpiar-leidas-manual?dias=
pub async fn cleanup_read_manual_endpoint(
    notification_service: web::Data<NotificationService>,
    query: web::Query<ManualCleanupQuery>,
) -> HttpResponse {
    let days = query
        .dias
        .unwrap_or_else(|| notification_service.read_retention().num_days());

    let Some(older_than) = Duration::try_days(days) else {
        return ServiceError::InvalidArgument(format!("dias fuera de rango: {days}")).to_response();
    };

    match notification_service.cleanup_read(older_than).await {
        Ok(deleted) => HttpResponse::Ok().json(json!({
            "success": true,
            "eliminadas": deleted,
            "dias": days
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /notificaciones/verificar-programadas
pub async fn check_scheduled_endpoint(
    notification_service: web::Data<NotificationService>,
) -> HttpResponse {
    match notification_service.check_scheduled().await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => e.to_response(),
    }
}
