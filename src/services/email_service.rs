//! services/email_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lettre::Address;
use sqlx::{Pool, Sqlite};

use crate::{
    clock::Clock,
    db,
    error::{ServiceError, ServiceResult},
    models::{
        deal_model::Deal,
        email_model::{
            DeliveryStatus, EmailKind, EmailRecord, OutgoingEmail, ResendWebhookEvent,
            SendEmailRequest, TemplatedEmailRequest,
        },
    },
    services::{
        deal_service, directory_service::ContactDirectory, mail_transport::MailTransport,
        template_service,
    },
};

#[derive(Debug, sqlx::FromRow)]
struct EmailRow {
    id: String,
    trato_id: Option<String>,
    tipo: String,
    destinatario: String,
    asunto: String,
    cuerpo: String,
    exito: bool,
    estado_entrega: String,
    proveedor_id: Option<String>,
    error_message: Option<String>,
    ventana: Option<i64>,
    secuencia: Option<i64>,
    creado_en: String,
    actualizado_en: String,
}

impl TryFrom<EmailRow> for EmailRecord {
    type Error = ServiceError;

    fn try_from(row: EmailRow) -> Result<Self, Self::Error> {
        Ok(EmailRecord {
            kind: row.tipo.parse()?,
            delivery_status: row.estado_entrega.parse()?,
            created_at: db::parse_ts(&row.creado_en)?,
            updated_at: db::parse_ts(&row.actualizado_en)?,
            id: row.id,
            deal_id: row.trato_id,
            recipient: row.destinatario,
            subject: row.asunto,
            body: row.cuerpo,
            exito: row.exito,
            provider_message_id: row.proveedor_id,
            error_message: row.error_message,
            cadence_window: row.ventana,
            sequence: row.secuencia,
        })
    }
}

const SELECT_EMAIL: &str = r#"
    SELECT id, trato_id, tipo, destinatario, asunto, cuerpo, exito, estado_entrega,
           proveedor_id, error_message, ventana, secuencia, creado_en, actualizado_en
    FROM email_records
"#;

/// Datos de una fila nueva antes de intentar la entrega.
pub(crate) struct PendingEmail<'a> {
    pub deal_id: Option<&'a str>,
    pub kind: EmailKind,
    pub recipient: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub cadence_window: Option<i64>,
    pub sequence: Option<i64>,
    /// Seguimiento: no se reserva si hay otro seguimiento del trato creado después de este instante.
    pub recent_cutoff: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct EmailService {
    db_pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn MailTransport>,
    directory: ContactDirectory,
    sender_name: String,
}

impl EmailService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn MailTransport>,
        directory: ContactDirectory,
        sender_name: String,
    ) -> Self {
        Self {
            db_pool,
            clock,
            transport,
            directory,
            sender_name,
        }
    }

    // ----------------------------------------------------------------
    // Envíos a petición (POST /correos, /correos/plantilla)
    // ----------------------------------------------------------------

    pub async fn send_direct(&self, req: SendEmailRequest) -> ServiceResult<EmailRecord> {
        validate_recipient(&req.recipient)?;
        if req.subject.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "El asunto es obligatorio".to_string(),
            ));
        }
        if let Some(deal_id) = &req.deal_id {
            deal_service::require_deal(&self.db_pool, deal_id).await?;
        }

        let record_id = self
            .insert_pending(PendingEmail {
                deal_id: req.deal_id.as_deref(),
                kind: EmailKind::Directo,
                recipient: req.recipient.trim(),
                subject: &req.subject,
                body: &req.body,
                cadence_window: None,
                sequence: None,
                recent_cutoff: None,
            })
            .await?
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("Inserción de correo ignorada")))?;

        let email = OutgoingEmail {
            to: req.recipient.trim().to_string(),
            subject: req.subject,
            html_body: req.body,
            attachments: req.attachments.unwrap_or_default(),
        };
        self.attempt_delivery(&record_id, &email).await
    }

    pub async fn send_templated(&self, req: TemplatedEmailRequest) -> ServiceResult<EmailRecord> {
        let template = template_service::find_template(&req.template)?;
        let deal = deal_service::require_deal(&self.db_pool, &req.deal_id).await?;
        let (contact_email, mut vars) = self.deal_context(&deal).await?;
        vars.extend(req.variables);

        let recipient = req.recipient.or(contact_email).ok_or_else(|| {
            ServiceError::InvalidArgument(format!(
                "El trato {} no tiene contacto con correo; indique recipient",
                deal.id
            ))
        })?;
        validate_recipient(&recipient)?;

        let (subject, body) = template.render(&vars);
        let record_id = self
            .insert_pending(PendingEmail {
                deal_id: Some(&deal.id),
                kind: EmailKind::Plantilla,
                recipient: recipient.trim(),
                subject: &subject,
                body: &body,
                cadence_window: None,
                sequence: None,
                recent_cutoff: None,
            })
            .await?
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("Inserción de correo ignorada")))?;

        let email = OutgoingEmail {
            to: recipient.trim().to_string(),
            subject,
            html_body: body,
            attachments: req.attachments.unwrap_or_default(),
        };
        self.attempt_delivery(&record_id, &email).await
    }

    pub async fn list_for_deal(&self, deal_id: &str) -> ServiceResult<Vec<EmailRecord>> {
        let sql = format!("{SELECT_EMAIL} WHERE trato_id = ?1 ORDER BY creado_en DESC");
        let rows = sqlx::query_as::<_, EmailRow>(&sql)
            .bind(deal_id)
            .fetch_all(&self.db_pool)
            .await?;
        rows.into_iter().map(EmailRecord::try_from).collect()
    }

    pub async fn get_record(&self, record_id: &str) -> ServiceResult<EmailRecord> {
        let sql = format!("{SELECT_EMAIL} WHERE id = ?1");
        let row = sqlx::query_as::<_, EmailRow>(&sql)
            .bind(record_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Email record {record_id}")))?;
        row.try_into()
    }

    // ----------------------------------------------------------------
    // Piezas compartidas con el motor de seguimiento
    // ----------------------------------------------------------------

    /// Variables de plantilla de un trato y el correo de su contacto principal.
    pub(crate) async fn deal_context(
        &self,
        deal: &Deal,
    ) -> ServiceResult<(Option<String>, HashMap<String, String>)> {
        let contact = match &deal.contact_id {
            Some(id) => self.directory.contact(id).await?,
            None => None,
        };
        let company = match &deal.company_id {
            Some(id) => self.directory.company_name(id).await?,
            None => None,
        };

        let mut vars = HashMap::new();
        vars.insert("trato".to_string(), deal.name.clone());
        vars.insert(
            "contacto".to_string(),
            contact
                .as_ref()
                .map(|c| c.nombre.clone())
                .unwrap_or_else(|| "cliente".to_string()),
        );
        vars.insert(
            "empresa".to_string(),
            company.unwrap_or_else(|| "su empresa".to_string()),
        );
        vars.insert("remitente".to_string(), self.sender_name.clone());
        if let Some(amount) = deal.expected_amount {
            vars.insert(
                "monto".to_string(),
                format!("{:.2} {}", amount, deal.currency.as_deref().unwrap_or("")).trim_end().to_string(),
            );
        }
        vars.insert("fase".to_string(), deal.phase.to_string());

        Ok((contact.and_then(|c| c.email), vars))
    }

    /// Inserta la fila en estado PENDIENTE antes de tocar al proveedor.
    ///
    /// Para correos de seguimiento el índice único (trato, ventana) decide quién envía, y
    /// el mismo statement exige que el trato siga activo y abierto y que no haya otro
    /// seguimiento posterior a `recent_cutoff`. `None` = no se reservó.
    pub(crate) async fn insert_pending(&self, pending: PendingEmail<'_>) -> ServiceResult<Option<String>> {
        let id = db::new_id();
        let now = db::ts(self.clock.now());

        let cutoff = match (pending.kind, pending.recent_cutoff) {
            (EmailKind::Seguimiento, Some(cutoff)) => Some(db::ts(cutoff)),
            _ => None,
        };
        let guard = if pending.kind == EmailKind::Seguimiento {
            let mut guard = format!(
                "EXISTS (SELECT 1 FROM tratos WHERE id = ?2 AND seguimiento_activo = 1 AND fase NOT IN {})",
                deal_service::TERMINAL_PHASES_SQL
            );
            if cutoff.is_some() {
                guard.push_str(
                    " AND NOT EXISTS (SELECT 1 FROM email_records \
                     WHERE trato_id = ?2 AND tipo = ?3 AND creado_en > ?10)",
                );
            }
            guard
        } else {
            "1 = 1".to_string()
        };
        let sql = format!(
            r#"
            INSERT INTO email_records (
                id, trato_id, tipo, destinatario, asunto, cuerpo, exito, estado_entrega,
                proveedor_id, error_message, ventana, secuencia, creado_en, actualizado_en
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, 0, 'PENDIENTE', NULL, NULL, ?7, ?8, ?9, ?9
            WHERE {guard}
            ON CONFLICT(trato_id, ventana) DO NOTHING
            "#
        );

        let mut query = sqlx::query(&sql)
            .bind(&id)
            .bind(pending.deal_id)
            .bind(pending.kind.as_str())
            .bind(pending.recipient)
            .bind(pending.subject)
            .bind(pending.body)
            .bind(pending.cadence_window)
            .bind(pending.sequence)
            .bind(now);
        if let Some(cutoff) = cutoff {
            query = query.bind(cutoff);
        }
        let result = query.execute(&self.db_pool).await?;

        Ok((result.rows_affected() > 0).then_some(id))
    }

    /// Entrega el correo y deja el resultado en la fila. Un fallo del proveedor queda
    /// registrado (`exito = false`) y no se propaga como error.
    pub(crate) async fn attempt_delivery(
        &self,
        record_id: &str,
        email: &OutgoingEmail,
    ) -> ServiceResult<EmailRecord> {
        let (exito, status, provider_id, error) = match self.transport.send(email).await {
            Ok(provider_id) => (true, DeliveryStatus::Sent, Some(provider_id), None),
            Err(e) => {
                let failure = ServiceError::DeliveryFailure(format!("{e:#}"));
                log::error!(
                    "Correo {} a {} vía {}: {}",
                    record_id,
                    email.to,
                    self.transport.name(),
                    failure
                );
                (false, DeliveryStatus::Failed, None, Some(failure.to_string()))
            }
        };

        self.record_result(record_id, exito, status, provider_id.as_deref(), error.as_deref())
            .await?;
        self.get_record(record_id).await
    }

    /// Marca fallida una fila reservada que no llegó al proveedor (p.ej. sin destinatario).
    pub(crate) async fn record_failure(&self, record_id: &str, error: &str) -> ServiceResult<()> {
        self.record_result(record_id, false, DeliveryStatus::Failed, None, Some(error))
            .await
    }

    async fn record_result(
        &self,
        record_id: &str,
        exito: bool,
        status: DeliveryStatus,
        provider_id: Option<&str>,
        error: Option<&str>,
    ) -> ServiceResult<()> {
        sqlx::query(
            r#"
            UPDATE email_records
            SET exito = ?2, estado_entrega = ?3, proveedor_id = ?4, error_message = ?5,
                actualizado_en = ?6
            WHERE id = ?1
            "#,
        )
        .bind(record_id)
        .bind(exito)
        .bind(status.as_str())
        .bind(provider_id)
        .bind(error)
        .bind(db::ts(self.clock.now()))
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    // ----------------------------------------------------------------
    // Webhook del proveedor
    // ----------------------------------------------------------------

    /// Aplica un evento de entrega a las filas existentes con ese id de proveedor.
    /// Nunca crea envíos; un evento viejo no pisa un estado más avanzado.
    pub async fn apply_webhook(&self, event: &ResendWebhookEvent) -> ServiceResult<u64> {
        let Some(status) = DeliveryStatus::from_resend_event(&event.event_type) else {
            log::info!("(webhook) Evento ignorado: {}", event.event_type);
            return Ok(0);
        };

        let lower: Vec<String> = [
            DeliveryStatus::Pendiente,
            DeliveryStatus::Sent,
            DeliveryStatus::Delayed,
            DeliveryStatus::Delivered,
            DeliveryStatus::Opened,
            DeliveryStatus::Clicked,
            DeliveryStatus::Bounced,
            DeliveryStatus::Complained,
            DeliveryStatus::Failed,
        ]
        .iter()
        .filter(|s| s.rank() < status.rank())
        .map(|s| format!("'{}'", s.as_str()))
        .collect();

        if lower.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            UPDATE email_records
            SET estado_entrega = ?2,
                actualizado_en = ?3
            WHERE proveedor_id = ?1 AND estado_entrega IN ({})
            "#,
            lower.join(", ")
        );
        let result = sqlx::query(&sql)
            .bind(&event.data.email_id)
            .bind(status.as_str())
            .bind(db::ts(self.clock.now()))
            .execute(&self.db_pool)
            .await?;

        let updated = result.rows_affected();
        log::info!(
            "(webhook) {} para {}: {} filas actualizadas",
            status.as_str(),
            event.data.email_id,
            updated
        );
        Ok(updated)
    }
}

fn validate_recipient(recipient: &str) -> ServiceResult<()> {
    recipient
        .trim()
        .parse::<Address>()
        .map(|_| ())
        .map_err(|e| ServiceError::InvalidArgument(format!("Destinatario inválido '{recipient}': {e}")))
}
