//! services/activity_service.rs
//! Programación y cierre de actividades. Cerrar una actividad es lo único que escribe
//! `ultima_actividad_en` del trato con un instante propio.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::{
    clock::Clock,
    db,
    error::{ServiceError, ServiceResult},
    models::{
        activity_model::{
            Activity, ActivityBuckets, ActivityKind, ActivityOutcome, ActivityStatus,
            CompleteActivityRequest, ScheduleActivityRequest,
        },
        notification_model::{NewNotification, NotificationKind},
    },
    services::{deal_service, notification_service::NotificationService},
};

const MAX_NOTE_LEN: usize = 4000;
const MAX_NEXT_ACTION_LEN: usize = 500;

pub(crate) const SELECT_ACTIVITY: &str = r#"
    SELECT id, trato_id, tipo, subtipo_tarea, asignado_a, titulo, fecha_limite,
           hora_inicio, duracion_minutos, vence_en, estado, completada_en,
           completada_por, respuesta, nivel_interes, informacion_enviada,
           siguiente_accion, notas, creada_en
    FROM actividades
"#;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ActivityRow {
    id: String,
    trato_id: String,
    tipo: String,
    subtipo_tarea: Option<String>,
    asignado_a: String,
    titulo: Option<String>,
    fecha_limite: String,
    hora_inicio: Option<String>,
    duracion_minutos: Option<i64>,
    vence_en: String,
    estado: String,
    completada_en: Option<String>,
    completada_por: Option<String>,
    respuesta: Option<bool>,
    nivel_interes: Option<String>,
    informacion_enviada: Option<bool>,
    siguiente_accion: Option<String>,
    notas: Option<String>,
    creada_en: String,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = ServiceError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let status: ActivityStatus = row.estado.parse()?;
        let outcome = match status {
            ActivityStatus::Closed => Some(ActivityOutcome {
                response: row.respuesta,
                interest_level: row.nivel_interes.as_deref().map(str::parse).transpose()?,
                info_sent: row.informacion_enviada,
                next_action: row.siguiente_accion,
            }),
            ActivityStatus::Open => None,
        };
        let start_time = row
            .hora_inicio
            .as_deref()
            .map(|raw| {
                chrono::NaiveTime::parse_from_str(raw, "%H:%M:%S").map_err(|e| {
                    ServiceError::Internal(anyhow::anyhow!("Hora inválida '{raw}': {e}"))
                })
            })
            .transpose()?;

        Ok(Activity {
            kind: row.tipo.parse()?,
            task_subtype: row.subtipo_tarea.as_deref().map(str::parse).transpose()?,
            due_date: db::parse_date(&row.fecha_limite)?,
            due_at: db::parse_ts(&row.vence_en)?,
            completed_at: db::parse_opt_ts(row.completada_en.as_deref())?,
            created_at: db::parse_ts(&row.creada_en)?,
            start_time,
            status,
            outcome,
            id: row.id,
            deal_id: row.trato_id,
            assignee_id: row.asignado_a,
            title: row.titulo,
            duration_minutes: row.duracion_minutos,
            completed_by: row.completada_por,
            note: row.notas,
        })
    }
}

pub(crate) async fn fetch_activity(
    pool: &Pool<Sqlite>,
    activity_id: &str,
) -> ServiceResult<Option<Activity>> {
    let sql = format!("{SELECT_ACTIVITY} WHERE id = ?1");
    let row = sqlx::query_as::<_, ActivityRow>(&sql)
        .bind(activity_id)
        .fetch_optional(pool)
        .await?;
    row.map(Activity::try_from).transpose()
}

pub(crate) async fn list_for_deal(
    pool: &Pool<Sqlite>,
    deal_id: &str,
) -> ServiceResult<Vec<Activity>> {
    let sql = format!("{SELECT_ACTIVITY} WHERE trato_id = ?1 ORDER BY vence_en ASC, creada_en ASC");
    let rows = sqlx::query_as::<_, ActivityRow>(&sql)
        .bind(deal_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(Activity::try_from).collect()
}

/// Instante de cierre de una actividad cerrada que pertenece a `deal_id`.
pub(crate) async fn closed_activity_timestamp(
    pool: &Pool<Sqlite>,
    deal_id: &str,
    activity_id: &str,
) -> ServiceResult<Option<DateTime<Utc>>> {
    let raw = sqlx::query_scalar::<_, Option<String>>(
        "SELECT completada_en FROM actividades WHERE id = ?1 AND trato_id = ?2 AND estado = 'CLOSED'",
    )
    .bind(activity_id)
    .bind(deal_id)
    .fetch_optional(pool)
    .await?
    .flatten();
    Ok(db::parse_opt_ts(raw.as_deref())?)
}

#[derive(Clone)]
pub struct ActivityService {
    db_pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
    notifications: NotificationService,
}

impl ActivityService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        clock: Arc<dyn Clock>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db_pool,
            clock,
            notifications,
        }
    }

    /// Crea una actividad OPEN. Un trato puede tener varias abiertas a la vez.
    pub async fn schedule(&self, req: ScheduleActivityRequest) -> ServiceResult<Activity> {
        validate_schedule(&req)?;

        let id = db::new_id();
        let now = db::ts(self.clock.now());
        let due_at = Activity::due_instant(req.due_date, req.start_time);

        // El INSERT ... SELECT sólo inserta si el trato existe en el mismo statement.
        let result = sqlx::query(
            r#"
            INSERT INTO actividades (
                id, trato_id, tipo, subtipo_tarea, asignado_a, titulo, fecha_limite,
                hora_inicio, duracion_minutos, vence_en, estado, creada_en
            )
            SELECT ?1, t.id, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'OPEN', ?11
            FROM tratos t
            WHERE t.id = ?2
            "#,
        )
        .bind(&id)
        .bind(&req.deal_id)
        .bind(req.kind.as_str())
        .bind(req.task_subtype.map(|s| s.as_str()))
        .bind(req.assignee_id.trim())
        .bind(&req.title)
        .bind(req.due_date.to_string())
        .bind(req.start_time.map(|t| t.format("%H:%M:%S").to_string()))
        .bind(req.duration_minutes)
        .bind(db::ts(due_at))
        .bind(&now)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::deal_not_found(&req.deal_id));
        }

        log::info!(
            "Actividad {} ({}) programada para trato {} con vencimiento {}",
            id,
            req.kind,
            req.deal_id,
            due_at
        );
        self.get_activity(&id).await
    }

    pub async fn get_activity(&self, activity_id: &str) -> ServiceResult<Activity> {
        fetch_activity(&self.db_pool, activity_id)
            .await?
            .ok_or_else(|| ServiceError::activity_not_found(activity_id))
    }

    /// Cierra la actividad y, en la misma transacción, mueve `ultima_actividad_en` del
    /// trato al instante de cierre.
    pub async fn complete(
        &self,
        activity_id: &str,
        req: CompleteActivityRequest,
    ) -> ServiceResult<Activity> {
        validate_outcome(&req)?;

        let completed_at = self.clock.now();
        let completed_at_str = db::ts(completed_at);
        let outcome = &req.outcome;

        let mut tx = self.db_pool.begin().await?;

        let closed = sqlx::query(
            r#"
            UPDATE actividades
            SET estado = 'CLOSED',
                completada_en = ?2,
                completada_por = ?3,
                respuesta = ?4,
                nivel_interes = ?5,
                informacion_enviada = ?6,
                siguiente_accion = ?7,
                notas = ?8
            WHERE id = ?1 AND estado = 'OPEN'
            "#,
        )
        .bind(activity_id)
        .bind(&completed_at_str)
        .bind(req.completed_by.trim())
        .bind(outcome.response)
        .bind(outcome.interest_level.map(|l| l.as_str()))
        .bind(outcome.info_sent)
        .bind(outcome.next_action.as_deref().map(str::trim))
        .bind(&req.note)
        .execute(&mut *tx)
        .await?;

        if closed.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, String>("SELECT estado FROM actividades WHERE id = ?1")
                .bind(activity_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => ServiceError::AlreadyClosed(activity_id.to_string()),
                None => ServiceError::activity_not_found(activity_id),
            });
        }

        sqlx::query(
            r#"
            UPDATE tratos
            SET ultima_actividad_en = ?2,
                modificado_en = ?2
            WHERE id = (SELECT trato_id FROM actividades WHERE id = ?1)
            "#,
        )
        .bind(activity_id)
        .bind(&completed_at_str)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let activity = self.get_activity(activity_id).await?;
        log::info!(
            "Actividad {} completada por {} (trato {})",
            activity.id,
            req.completed_by,
            activity.deal_id
        );

        self.notify_owner_of_completion(&activity).await;
        Ok(activity)
    }

    /// Actividades abiertas de un usuario agrupadas por tipo (para el tablero).
    pub async fn open_for_user(&self, user_id: &str) -> ServiceResult<ActivityBuckets> {
        let sql = format!(
            "{SELECT_ACTIVITY} WHERE asignado_a = ?1 AND estado = 'OPEN' ORDER BY vence_en ASC"
        );
        let rows = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?;
        let activities = rows
            .into_iter()
            .map(Activity::try_from)
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(ActivityBuckets::from_activities(activities))
    }

    /// Avisa al propietario cuando otra persona cierra una actividad de su trato.
    /// El cierre ya quedó confirmado: un fallo aquí sólo se registra.
    async fn notify_owner_of_completion(&self, activity: &Activity) {
        let deal = match deal_service::fetch_deal(&self.db_pool, &activity.deal_id).await {
            Ok(Some(deal)) => deal,
            Ok(None) => return,
            Err(e) => {
                log::error!(
                    "No se pudo leer el trato {} para avisar del cierre: {}",
                    activity.deal_id,
                    e
                );
                return;
            }
        };

        let completed_by = activity.completed_by.as_deref().unwrap_or_default();
        if completed_by == deal.owner_id {
            return;
        }

        let candidate = NewNotification {
            user_id: deal.owner_id.clone(),
            kind: NotificationKind::ActividadCompletada,
            message: format!(
                "{} completó la {} '{}' del trato '{}'",
                completed_by,
                activity.kind.label(),
                activity.title.as_deref().unwrap_or("sin título"),
                deal.name
            ),
            deal_id: Some(deal.id.clone()),
            activity_id: Some(activity.id.clone()),
        };
        if let Err(e) = self.notifications.dispatch(candidate).await {
            log::error!(
                "No se pudo notificar el cierre de la actividad {}: {}",
                activity.id,
                e
            );
        }
    }
}

fn validate_schedule(req: &ScheduleActivityRequest) -> ServiceResult<()> {
    if req.assignee_id.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "assigneeId es obligatorio".to_string(),
        ));
    }
    match (req.kind, req.task_subtype) {
        (ActivityKind::Task, None) => {
            return Err(ServiceError::InvalidArgument(
                "Las tareas requieren taskSubtype".to_string(),
            ))
        }
        (ActivityKind::Call | ActivityKind::Meeting, Some(_)) => {
            return Err(ServiceError::InvalidArgument(format!(
                "taskSubtype sólo aplica a tareas, no a {}",
                req.kind
            )))
        }
        _ => {}
    }
    if let Some(minutes) = req.duration_minutes {
        if minutes <= 0 {
            return Err(ServiceError::InvalidArgument(format!(
                "Duración inválida: {minutes} minutos"
            )));
        }
    }
    Ok(())
}

fn validate_outcome(req: &CompleteActivityRequest) -> ServiceResult<()> {
    if req.completed_by.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "completedBy es obligatorio".to_string(),
        ));
    }
    if let Some(next) = &req.outcome.next_action {
        if next.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "nextAction no puede estar vacío".to_string(),
            ));
        }
        if next.chars().count() > MAX_NEXT_ACTION_LEN {
            return Err(ServiceError::InvalidArgument(format!(
                "nextAction excede {MAX_NEXT_ACTION_LEN} caracteres"
            )));
        }
    }
    if let Some(note) = &req.note {
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(ServiceError::InvalidArgument(format!(
                "La nota excede {MAX_NOTE_LEN} caracteres"
            )));
        }
    }
    Ok(())
}
