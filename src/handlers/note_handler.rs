//! handlers/note_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::note_model::{CreateNoteRequest, EditNoteRequest};
use crate::services::note_service::NoteService;

/// GET /tratos/{id}/notas
pub async fn list_notes_endpoint(
    note_service: web::Data<NoteService>,
    path: web::Path<String>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match note_service.list(&deal_id).await {
        Ok(notes) => HttpResponse::Ok().json(notes),
        Err(e) => e.to_response(),
    }
}

/// POST /tratos/{id}/notas
pub async fn add_note_endpoint(
    note_service: web::Data<NoteService>,
    path: web::Path<String>,
    body: web::Json<CreateNoteRequest>,
) -> HttpResponse {
    let deal_id = path.into_inner();
    match note_service.add_note(&deal_id, body.into_inner()).await {
        Ok(note) => HttpResponse::Created().json(note),
        Err(e) => e.to_response(),
    }
}

/// PUT /tratos/{id}/notas/{notaId}
pub async fn edit_note_endpoint(
    note_service: web::Data<NoteService>,
    path: web::Path<(String, String)>,
    body: web::Json<EditNoteRequest>,
) -> HttpResponse {
    let (deal_id, note_id) = path.into_inner();
    match note_service
        .edit_note(&deal_id, &note_id, body.into_inner())
        .await
    {
        Ok(note) => HttpResponse::Ok().json(note),
        Err(e) => e.to_response(),
    }
}

/// DELETE /tratos/{id}/notas/{notaId}
pub async fn delete_note_endpoint(
    note_service: web::Data<NoteService>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (deal_id, note_id) = path.into_inner();
    match note_service.delete_note(&deal_id, &note_id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "id": note_id })),
        Err(e) => e.to_response(),
    }
}
