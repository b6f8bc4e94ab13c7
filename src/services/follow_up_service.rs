//! services/follow_up_service.rs
//! Motor de correos de seguimiento: como mucho un envío por trato y ventana de cadencia.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::{stream, StreamExt};
use sqlx::{Pool, Sqlite};

use crate::{
    clock::Clock,
    config::app_config::EngineConfig,
    db,
    error::{ServiceError, ServiceResult},
    models::{
        deal_model::Deal,
        email_model::{EmailKind, OutgoingEmail},
        follow_up_model::{FollowUpOutcome, FollowUpRunReport, FollowUpStatus, PendingFollowUp},
    },
    services::{
        deal_service::{self, SELECT_DEAL, TERMINAL_PHASES_SQL},
        email_service::{EmailService, PendingEmail},
        template_service,
    },
};

/// Índice absoluto de la ventana de cadencia que contiene `now`.
pub fn cadence_window(now: DateTime<Utc>, cadence: Duration) -> i64 {
    now.timestamp().div_euclid(cadence.num_seconds().max(1))
}

#[derive(Debug, sqlx::FromRow)]
struct FollowUpHistory {
    sent_count: i64,
    last_sent_at: Option<String>,
    last_success: Option<bool>,
}

#[derive(Clone)]
pub struct FollowUpService {
    db_pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
    email_service: EmailService,
    config: EngineConfig,
}

impl FollowUpService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        clock: Arc<dyn Clock>,
        email_service: EmailService,
        config: EngineConfig,
    ) -> Self {
        Self {
            db_pool,
            clock,
            email_service,
            config,
        }
    }

    async fn eligible_deals(&self) -> ServiceResult<Vec<Deal>> {
        let sql = format!(
            "{SELECT_DEAL} WHERE seguimiento_activo = 1 AND fase NOT IN {TERMINAL_PHASES_SQL} ORDER BY creado_en ASC"
        );
        deal_service::fetch_deals(&self.db_pool, &sql).await
    }

    async fn history(&self, deal_id: &str) -> ServiceResult<FollowUpHistory> {
        let history = sqlx::query_as::<_, FollowUpHistory>(
            r#"
            SELECT COUNT(*) AS sent_count,
                   (SELECT creado_en FROM email_records
                     WHERE trato_id = ?1 AND tipo = ?2
                     ORDER BY creado_en DESC LIMIT 1) AS last_sent_at,
                   (SELECT exito FROM email_records
                     WHERE trato_id = ?1 AND tipo = ?2
                     ORDER BY creado_en DESC LIMIT 1) AS last_success
            FROM email_records
            WHERE trato_id = ?1 AND tipo = ?2
            "#,
        )
        .bind(deal_id)
        .bind(EmailKind::Seguimiento.as_str())
        .fetch_one(&self.db_pool)
        .await?;
        Ok(history)
    }

    /// Decide si al trato le toca correo en `now`. Sin envíos previos toca de inmediato;
    /// si no, cuando pasó una cadencia completa desde el último intento.
    async fn plan(&self, deal: &Deal, now: DateTime<Utc>) -> ServiceResult<Option<PendingFollowUp>> {
        let history = self.history(&deal.id).await?;
        let last_sent_at = db::parse_opt_ts(history.last_sent_at.as_deref())?;
        let cadence = self.config.cadence();

        let due = match last_sent_at {
            None => true,
            Some(last) => now - last >= cadence,
        };
        if !due {
            return Ok(None);
        }

        Ok(Some(PendingFollowUp {
            deal_id: deal.id.clone(),
            deal_name: deal.name.clone(),
            cadence_window: cadence_window(now, cadence),
            sequence: history.sent_count,
            last_sent_at,
        }))
    }

    /// Una pasada del job. Los tratos se procesan en paralelo y el fallo de uno no
    /// interrumpe a los demás.
    pub async fn run_once(&self) -> ServiceResult<FollowUpRunReport> {
        let deals = self.eligible_deals().await?;
        let mut report = FollowUpRunReport {
            eligible: deals.len(),
            ..Default::default()
        };

        let results: Vec<(String, ServiceResult<FollowUpOutcome>)> = stream::iter(deals)
            .map(|deal| async move {
                let deal_id = deal.id.clone();
                (deal_id, self.process_deal(&deal).await)
            })
            .buffer_unordered(self.config.job_concurrency.max(1))
            .collect()
            .await;

        for (deal_id, result) in results {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.errors += 1;
                    log::error!("(follow_up) Error procesando trato {}: {}", deal_id, e);
                }
            }
        }

        log::info!(
            "(follow_up) elegibles={} enviados={} fallidos={} sin_turno={} omitidos={} errores={}",
            report.eligible,
            report.sent,
            report.failed,
            report.not_due,
            report.skipped,
            report.errors
        );
        Ok(report)
    }

    /// Procesa un trato: decide, reserva la ventana, envía y registra.
    pub async fn process_deal(&self, deal: &Deal) -> ServiceResult<FollowUpOutcome> {
        let now = self.clock.now();
        let Some(plan) = self.plan(deal, now).await? else {
            return Ok(FollowUpOutcome::NotDue);
        };

        let (contact_email, vars) = self.email_service.deal_context(deal).await?;
        let template = template_service::follow_up_template(plan.sequence);
        let (subject, body) = template.render(&vars);
        let recipient = contact_email.clone().unwrap_or_default();

        let reserved = self
            .email_service
            .insert_pending(PendingEmail {
                deal_id: Some(&deal.id),
                kind: EmailKind::Seguimiento,
                recipient: &recipient,
                subject: &subject,
                body: &body,
                cadence_window: Some(plan.cadence_window),
                sequence: Some(plan.sequence),
                recent_cutoff: Some(now - self.config.cadence()),
            })
            .await?;

        let Some(record_id) = reserved else {
            log::info!(
                "(follow_up) Ventana {} del trato {} ya ocupada o trato inactivo; se omite",
                plan.cadence_window,
                deal.id
            );
            return Ok(FollowUpOutcome::AlreadyClaimed);
        };

        let Some(to) = contact_email else {
            self.email_service
                .record_failure(&record_id, "El trato no tiene contacto con correo")
                .await?;
            log::warn!("(follow_up) Trato {} sin destinatario; intento registrado como fallido", deal.id);
            return Ok(FollowUpOutcome::Failed);
        };

        let email = OutgoingEmail {
            to,
            subject,
            html_body: body,
            attachments: vec![],
        };
        let record = self.email_service.attempt_delivery(&record_id, &email).await?;

        log::info!(
            "(follow_up) Trato {} ventana {} secuencia {} ({}): {}",
            deal.id,
            plan.cadence_window,
            plan.sequence,
            template.name,
            if record.exito { "enviado" } else { "fallido" }
        );
        Ok(if record.exito {
            FollowUpOutcome::Sent
        } else {
            FollowUpOutcome::Failed
        })
    }

    /// Simulación: tratos a los que les tocaría correo ahora, sin enviar nada.
    pub async fn pending(&self) -> ServiceResult<Vec<PendingFollowUp>> {
        let now = self.clock.now();
        let mut pending = Vec::new();
        for deal in self.eligible_deals().await? {
            if let Some(plan) = self.plan(&deal, now).await? {
                pending.push(plan);
            }
        }
        Ok(pending)
    }

    pub async fn status(&self, deal_id: &str) -> ServiceResult<FollowUpStatus> {
        let deal = deal_service::fetch_deal(&self.db_pool, deal_id)
            .await?
            .ok_or_else(|| ServiceError::deal_not_found(deal_id))?;
        let history = self.history(deal_id).await?;
        let last_sent_at = db::parse_opt_ts(history.last_sent_at.as_deref())?;

        let next_due_at = deal.follow_up_active.then(|| match last_sent_at {
            Some(last) => last + self.config.cadence(),
            None => deal.follow_up_activated_at.unwrap_or(deal.updated_at),
        });

        Ok(FollowUpStatus {
            deal_id: deal.id,
            follow_up_active: deal.follow_up_active,
            activated_at: deal.follow_up_activated_at,
            cadence_days: self.config.follow_up_cadence_days,
            sent_count: history.sent_count,
            last_sent_at,
            last_success: history.last_success,
            next_due_at,
        })
    }
}
