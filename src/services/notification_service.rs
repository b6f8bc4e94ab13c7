//! services/notification_service.rs
//! Avisos internos: revisión programada con deduplicación, lectura y limpieza.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Sqlite};

use crate::{
    clock::Clock,
    config::app_config::EngineConfig,
    db,
    error::{ServiceError, ServiceResult},
    models::{
        activity_model::ActivityKind,
        notification_model::{
            DispatchReport, NewNotification, Notification, NotificationKind, NotificationStatus,
        },
    },
    services::{
        deal_service::{self, SELECT_DEAL, TERMINAL_PHASES_SQL},
        neglect,
    },
};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: String,
    usuario_id: String,
    tipo: String,
    mensaje: String,
    trato_id: Option<String>,
    actividad_id: Option<String>,
    estado: String,
    creada_en: String,
    leida_en: Option<String>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = ServiceError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            kind: row.tipo.parse()?,
            status: row.estado.parse()?,
            created_at: db::parse_ts(&row.creada_en)?,
            read_at: db::parse_opt_ts(row.leida_en.as_deref())?,
            id: row.id,
            user_id: row.usuario_id,
            message: row.mensaje,
            deal_id: row.trato_id,
            activity_id: row.actividad_id,
        })
    }
}

const SELECT_NOTIFICATION: &str = r#"
    SELECT id, usuario_id, tipo, mensaje, trato_id, actividad_id, estado, creada_en, leida_en
    FROM notificaciones
"#;

/// Actividad abierta con los datos de su trato, tal como la necesita el armado de mensajes.
#[derive(Debug, sqlx::FromRow)]
struct DueActivityRow {
    id: String,
    tipo: String,
    titulo: Option<String>,
    asignado_a: String,
    vence_en: String,
    trato_id: String,
    trato_nombre: String,
}

#[derive(Clone)]
pub struct NotificationService {
    db_pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl NotificationService {
    pub fn new(db_pool: Pool<Sqlite>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            db_pool,
            clock,
            config,
        }
    }

    fn dedup_window(&self, kind: NotificationKind) -> Duration {
        if kind.repeats_daily() {
            self.config.deal_alert_dedup()
        } else {
            self.config.activity_dedup()
        }
    }

    /// Inserta la notificación salvo que ya exista una equivalente reciente.
    ///
    /// La verificación y la inserción van en un solo statement; además el índice único
    /// (usuario, tipo, mensaje, bucket) frena a dos pasadas concurrentes. Devuelve `false`
    /// si se descartó por duplicada.
    pub async fn dispatch(&self, candidate: NewNotification) -> ServiceResult<bool> {
        let now = self.clock.now();
        let window = self.dedup_window(candidate.kind);
        let bucket = now.timestamp().div_euclid(window.num_seconds().max(1));
        let cutoff = db::ts(now - window);

        let result = sqlx::query(
            r#"
            INSERT INTO notificaciones (
                id, usuario_id, tipo, mensaje, trato_id, actividad_id,
                estado, bucket, creada_en, leida_en
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, 'UNREAD', ?7, ?8, NULL
            WHERE NOT EXISTS (
                SELECT 1 FROM notificaciones
                WHERE usuario_id = ?2 AND tipo = ?3 AND mensaje = ?4 AND creada_en >= ?9
            )
            ON CONFLICT(usuario_id, tipo, mensaje, bucket) DO NOTHING
            "#,
        )
        .bind(db::new_id())
        .bind(&candidate.user_id)
        .bind(candidate.kind.as_str())
        .bind(&candidate.message)
        .bind(&candidate.deal_id)
        .bind(&candidate.activity_id)
        .bind(bucket)
        .bind(db::ts(now))
        .bind(cutoff)
        .execute(&self.db_pool)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            log::debug!(
                "Notificación {} creada para {}: {}",
                candidate.kind.as_str(),
                candidate.user_id,
                candidate.message
            );
        }
        Ok(created)
    }

    /// Pasada periódica: actividades por vencer o vencidas, tratos desatendidos y
    /// tratos con fecha de cierre cercana. Un candidato que falla no frena al resto.
    pub async fn check_scheduled(&self) -> ServiceResult<DispatchReport> {
        let now = self.clock.now();
        let mut candidates = self.upcoming_activity_candidates(now).await?;
        candidates.extend(self.overdue_activity_candidates(now).await?);
        candidates.extend(self.deal_level_candidates(now).await?);

        let mut report = DispatchReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            match self.dispatch(candidate.clone()).await {
                Ok(true) => report.created += 1,
                Ok(false) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    log::error!(
                        "(check_scheduled) No se pudo crear {} para {}: {}",
                        candidate.kind.as_str(),
                        candidate.user_id,
                        e
                    );
                }
            }
        }

        log::info!(
            "(check_scheduled) candidatos={} creadas={} duplicadas={} fallidas={}",
            report.candidates,
            report.created,
            report.duplicates,
            report.failed
        );
        Ok(report)
    }

    async fn due_activities(
        &self,
        from: Option<DateTime<Utc>>,
        to: DateTime<Utc>,
        include_upper: bool,
    ) -> ServiceResult<Vec<DueActivityRow>> {
        let upper = if include_upper { "<=" } else { "<" };
        let sql = format!(
            r#"
            SELECT a.id, a.tipo, a.titulo, a.asignado_a, a.vence_en,
                   t.id AS trato_id, t.nombre AS trato_nombre
            FROM actividades a
            JOIN tratos t ON t.id = a.trato_id
            WHERE a.estado = 'OPEN'
              AND (?1 IS NULL OR a.vence_en >= ?1)
              AND a.vence_en {upper} ?2
            ORDER BY a.vence_en ASC
            "#
        );
        let rows = sqlx::query_as::<_, DueActivityRow>(&sql)
            .bind(from.map(db::ts))
            .bind(db::ts(to))
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    async fn upcoming_activity_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<NewNotification>> {
        let rows = self
            .due_activities(Some(now), now + self.config.lookahead(), true)
            .await?;
        rows.into_iter()
            .map(|row| -> ServiceResult<NewNotification> {
                let due_at = db::parse_ts(&row.vence_en)?;
                let kind: ActivityKind = row.tipo.parse()?;
                Ok(NewNotification {
                    message: format!(
                        "Tu {} '{}' del trato '{}' vence a las {}",
                        kind.label(),
                        row.titulo.as_deref().unwrap_or("sin título"),
                        row.trato_nombre,
                        due_at.format("%H:%M")
                    ),
                    user_id: row.asignado_a,
                    kind: NotificationKind::ActividadProxima,
                    deal_id: Some(row.trato_id),
                    activity_id: Some(row.id),
                })
            })
            .collect()
    }

    async fn overdue_activity_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<NewNotification>> {
        let rows = self.due_activities(None, now, false).await?;
        rows.into_iter()
            .map(|row| -> ServiceResult<NewNotification> {
                let due_at = db::parse_ts(&row.vence_en)?;
                let kind: ActivityKind = row.tipo.parse()?;
                Ok(NewNotification {
                    message: format!(
                        "La {} '{}' del trato '{}' está vencida desde el {}",
                        kind.label(),
                        row.titulo.as_deref().unwrap_or("sin título"),
                        row.trato_nombre,
                        due_at.format("%Y-%m-%d %H:%M")
                    ),
                    user_id: row.asignado_a,
                    kind: NotificationKind::ActividadVencida,
                    deal_id: Some(row.trato_id),
                    activity_id: Some(row.id),
                })
            })
            .collect()
    }

    async fn deal_level_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<NewNotification>> {
        let sql = format!("{SELECT_DEAL} WHERE fase NOT IN {TERMINAL_PHASES_SQL}");
        let deals = deal_service::fetch_deals(&self.db_pool, &sql).await?;

        let today = now.date_naive();
        let horizon = (now + self.config.close_date_horizon()).date_naive();
        let threshold = self.config.neglect_threshold();

        let mut candidates = Vec::new();
        for deal in deals {
            if neglect::deal_is_neglected(&deal, now, threshold) {
                candidates.push(NewNotification {
                    user_id: deal.owner_id.clone(),
                    kind: NotificationKind::TratoDesatendido,
                    message: format!(
                        "El trato '{}' lleva más de {} días sin actividad",
                        deal.name, self.config.neglect_threshold_days
                    ),
                    deal_id: Some(deal.id.clone()),
                    activity_id: None,
                });
            }
            if let Some(close) = deal.target_close_date {
                if close >= today && close <= horizon {
                    candidates.push(NewNotification {
                        user_id: deal.owner_id.clone(),
                        kind: NotificationKind::TratoCierreProximo,
                        message: format!(
                            "El trato '{}' tiene fecha de cierre el {}",
                            deal.name, close
                        ),
                        deal_id: Some(deal.id.clone()),
                        activity_id: None,
                    });
                }
            }
        }
        Ok(candidates)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> ServiceResult<Vec<Notification>> {
        let sql = format!(
            "{SELECT_NOTIFICATION} WHERE usuario_id = ?1 AND (?2 = 0 OR estado = 'UNREAD') ORDER BY creada_en DESC"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .fetch_all(&self.db_pool)
            .await?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    pub async fn unread_count(&self, user_id: &str) -> ServiceResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notificaciones WHERE usuario_id = ?1 AND estado = 'UNREAD'",
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(count)
    }

    /// UNREAD → READ. Si ya estaba leída no cambia nada (ni la fecha de lectura).
    pub async fn mark_read(&self, notification_id: &str) -> ServiceResult<Notification> {
        let now = db::ts(self.clock.now());
        sqlx::query(
            "UPDATE notificaciones SET estado = 'READ', leida_en = ?2 WHERE id = ?1 AND estado = 'UNREAD'",
        )
        .bind(notification_id)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        let sql = format!("{SELECT_NOTIFICATION} WHERE id = ?1");
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(notification_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Notification {notification_id}")))?;
        row.try_into()
    }

    /// Devuelve cuántas pasaron a leídas.
    pub async fn mark_all_read(&self, user_id: &str) -> ServiceResult<u64> {
        let now = db::ts(self.clock.now());
        let result = sqlx::query(
            "UPDATE notificaciones SET estado = 'READ', leida_en = ?2 WHERE usuario_id = ?1 AND estado = 'UNREAD'",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.db_pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Borra las leídas cuya lectura es anterior a `now - older_than`. Nunca toca UNREAD.
    pub async fn cleanup_read(&self, older_than: Duration) -> ServiceResult<u64> {
        if older_than < Duration::zero() {
            return Err(ServiceError::InvalidArgument(
                "La retención no puede ser negativa".to_string(),
            ));
        }
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(older_than)
            .map(db::ts)
            .ok_or_else(|| {
                ServiceError::InvalidArgument(format!(
                    "Retención fuera de rango: {} días",
                    older_than.num_days()
                ))
            })?;
        let result = sqlx::query(
            "DELETE FROM notificaciones WHERE estado = ?1 AND leida_en IS NOT NULL AND leida_en < ?2",
        )
        .bind(NotificationStatus::Read.as_str())
        .bind(cutoff)
        .execute(&self.db_pool)
        .await?;

        let deleted = result.rows_affected();
        log::info!("(cleanup_read) {} notificaciones leídas eliminadas", deleted);
        Ok(deleted)
    }

    pub fn read_retention(&self) -> Duration {
        self.config.read_retention()
    }
}
