//! models/note_model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nota de texto de un trato. Sólo se agrega o se edita, y muere con su trato.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealNote {
    pub id: String,
    pub deal_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_by: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// POST /tratos/{id}/notas
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub author_id: String,
    pub content: String,
}

/// PUT /tratos/{id}/notas/{notaId}
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditNoteRequest {
    pub editor_id: String,
    pub content: String,
}
