//! services/note_service.rs
//! Notas por trato: se agregan, se editan (dejando rastro de quién y cuándo) y se borran.

use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::{
    clock::Clock,
    db,
    error::{ServiceError, ServiceResult},
    models::note_model::{CreateNoteRequest, DealNote, EditNoteRequest},
};

const MAX_NOTE_LEN: usize = 10_000;

#[derive(Debug, sqlx::FromRow)]
struct NoteRow {
    id: String,
    trato_id: String,
    autor_id: String,
    contenido: String,
    creada_en: String,
    editada_por: Option<String>,
    editada_en: Option<String>,
}

impl TryFrom<NoteRow> for DealNote {
    type Error = ServiceError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        Ok(DealNote {
            created_at: db::parse_ts(&row.creada_en)?,
            edited_at: db::parse_opt_ts(row.editada_en.as_deref())?,
            id: row.id,
            deal_id: row.trato_id,
            author_id: row.autor_id,
            content: row.contenido,
            edited_by: row.editada_por,
        })
    }
}

pub(crate) async fn list_for_deal(pool: &Pool<Sqlite>, deal_id: &str) -> ServiceResult<Vec<DealNote>> {
    let rows = sqlx::query_as::<_, NoteRow>(
        r#"
        SELECT id, trato_id, autor_id, contenido, creada_en, editada_por, editada_en
        FROM notas_trato
        WHERE trato_id = ?1
        ORDER BY creada_en ASC
        "#,
    )
    .bind(deal_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(DealNote::try_from).collect()
}

#[derive(Clone)]
pub struct NoteService {
    db_pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
}

impl NoteService {
    pub fn new(db_pool: Pool<Sqlite>, clock: Arc<dyn Clock>) -> Self {
        Self { db_pool, clock }
    }

    pub async fn list(&self, deal_id: &str) -> ServiceResult<Vec<DealNote>> {
        list_for_deal(&self.db_pool, deal_id).await
    }

    pub async fn add_note(&self, deal_id: &str, req: CreateNoteRequest) -> ServiceResult<DealNote> {
        validate_content(&req.content)?;
        if req.author_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "authorId es obligatorio".to_string(),
            ));
        }

        let id = db::new_id();
        let now = db::ts(self.clock.now());
        let result = sqlx::query(
            r#"
            INSERT INTO notas_trato (id, trato_id, autor_id, contenido, creada_en)
            SELECT ?1, t.id, ?3, ?4, ?5 FROM tratos t WHERE t.id = ?2
            "#,
        )
        .bind(&id)
        .bind(deal_id)
        .bind(req.author_id.trim())
        .bind(req.content.trim())
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::deal_not_found(deal_id));
        }
        self.get_note(deal_id, &id).await
    }

    pub async fn edit_note(
        &self,
        deal_id: &str,
        note_id: &str,
        req: EditNoteRequest,
    ) -> ServiceResult<DealNote> {
        validate_content(&req.content)?;

        let now = db::ts(self.clock.now());
        let result = sqlx::query(
            r#"
            UPDATE notas_trato
            SET contenido = ?3, editada_por = ?4, editada_en = ?5
            WHERE id = ?1 AND trato_id = ?2
            "#,
        )
        .bind(note_id)
        .bind(deal_id)
        .bind(req.content.trim())
        .bind(req.editor_id.trim())
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!(
                "Note {note_id} of deal {deal_id}"
            )));
        }
        self.get_note(deal_id, note_id).await
    }

    pub async fn delete_note(&self, deal_id: &str, note_id: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM notas_trato WHERE id = ?1 AND trato_id = ?2")
            .bind(note_id)
            .bind(deal_id)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!(
                "Note {note_id} of deal {deal_id}"
            )));
        }
        Ok(())
    }

    async fn get_note(&self, deal_id: &str, note_id: &str) -> ServiceResult<DealNote> {
        let row = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, trato_id, autor_id, contenido, creada_en, editada_por, editada_en
            FROM notas_trato
            WHERE id = ?1 AND trato_id = ?2
            "#,
        )
        .bind(note_id)
        .bind(deal_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Note {note_id} of deal {deal_id}")))?;
        row.try_into()
    }
}

fn validate_content(content: &str) -> ServiceResult<()> {
    if content.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "La nota no puede estar vacía".to_string(),
        ));
    }
    if content.chars().count() > MAX_NOTE_LEN {
        return Err(ServiceError::InvalidArgument(format!(
            "La nota excede {MAX_NOTE_LEN} caracteres"
        )));
    }
    Ok(())
}
