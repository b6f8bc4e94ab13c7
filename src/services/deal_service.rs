//! services/deal_service.rs
//! Tratos: CRUD mínimo y la máquina de estados de fases / seguimiento.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use sqlx::{Pool, Sqlite};

use crate::{
    clock::Clock,
    db,
    error::{ServiceError, ServiceResult},
    models::{
        activity_model::ActivityBuckets,
        deal_model::{
            CreateDealRequest, Deal, DealDetail, DealFilter, DealSummary, Phase,
            UpdateDealRequest,
        },
    },
    services::{
        activity_service, directory_service::ContactDirectory, neglect, note_service,
    },
};

/// Las dos fases terminales, listas para un `NOT IN` de SQL.
pub(crate) const TERMINAL_PHASES_SQL: &str = "('CERRADO_GANADO', 'CERRADO_PERDIDO')";

pub(crate) const SELECT_DEAL: &str = r#"
    SELECT id, nombre, descripcion, propietario_id, empresa_id, contacto_id,
           monto_esperado, moneda, probabilidad, fecha_cierre, fase,
           seguimiento_activo, seguimiento_activado_en, ultima_actividad_en,
           creado_en, modificado_en
    FROM tratos
"#;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DealRow {
    id: String,
    nombre: String,
    descripcion: Option<String>,
    propietario_id: String,
    empresa_id: Option<String>,
    contacto_id: Option<String>,
    monto_esperado: Option<f64>,
    moneda: Option<String>,
    probabilidad: Option<i64>,
    fecha_cierre: Option<String>,
    fase: String,
    seguimiento_activo: bool,
    seguimiento_activado_en: Option<String>,
    ultima_actividad_en: Option<String>,
    creado_en: String,
    modificado_en: String,
}

impl TryFrom<DealRow> for Deal {
    type Error = ServiceError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        Ok(Deal {
            phase: row.fase.parse()?,
            target_close_date: row.fecha_cierre.as_deref().map(db::parse_date).transpose()?,
            follow_up_activated_at: db::parse_opt_ts(row.seguimiento_activado_en.as_deref())?,
            last_activity_at: db::parse_opt_ts(row.ultima_actividad_en.as_deref())?,
            created_at: db::parse_ts(&row.creado_en)?,
            updated_at: db::parse_ts(&row.modificado_en)?,
            id: row.id,
            name: row.nombre,
            description: row.descripcion,
            owner_id: row.propietario_id,
            company_id: row.empresa_id,
            contact_id: row.contacto_id,
            expected_amount: row.monto_esperado,
            currency: row.moneda,
            probability: row.probabilidad,
            follow_up_active: row.seguimiento_activo,
        })
    }
}

pub(crate) async fn fetch_deal(pool: &Pool<Sqlite>, deal_id: &str) -> ServiceResult<Option<Deal>> {
    let sql = format!("{SELECT_DEAL} WHERE id = ?1");
    let row = sqlx::query_as::<_, DealRow>(&sql)
        .bind(deal_id)
        .fetch_optional(pool)
        .await?;
    row.map(Deal::try_from).transpose()
}

pub(crate) async fn require_deal(pool: &Pool<Sqlite>, deal_id: &str) -> ServiceResult<Deal> {
    fetch_deal(pool, deal_id)
        .await?
        .ok_or_else(|| ServiceError::deal_not_found(deal_id))
}

pub(crate) async fn fetch_deals(pool: &Pool<Sqlite>, sql: &str) -> ServiceResult<Vec<Deal>> {
    let rows = sqlx::query_as::<_, DealRow>(sql).fetch_all(pool).await?;
    rows.into_iter().map(Deal::try_from).collect()
}

#[derive(Clone)]
pub struct DealService {
    db_pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
    directory: ContactDirectory,
    neglect_threshold: Duration,
}

impl DealService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        clock: Arc<dyn Clock>,
        directory: ContactDirectory,
        neglect_threshold: Duration,
    ) -> Self {
        Self {
            db_pool,
            clock,
            directory,
            neglect_threshold,
        }
    }

    pub async fn create_deal(&self, req: CreateDealRequest) -> ServiceResult<Deal> {
        validate_name(&req.name)?;
        if req.owner_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "ownerId es obligatorio".to_string(),
            ));
        }
        validate_amounts(req.expected_amount, req.probability)?;

        let phase = match req.phase.as_deref() {
            Some(raw) => raw.parse::<Phase>()?,
            None => Phase::Clasificacion,
        };
        let follow_up_active = req.follow_up_active && !phase.is_terminal();
        if req.follow_up_active && !follow_up_active {
            log::warn!(
                "Trato '{}' creado en fase terminal {}: el seguimiento queda apagado",
                req.name,
                phase
            );
        }

        let id = db::new_id();
        let now = db::ts(self.clock.now());
        let activated_at = follow_up_active.then(|| now.clone());

        sqlx::query(
            r#"
            INSERT INTO tratos (
                id, nombre, descripcion, propietario_id, empresa_id, contacto_id,
                monto_esperado, moneda, probabilidad, fecha_cierre, fase,
                seguimiento_activo, seguimiento_activado_en, ultima_actividad_en,
                creado_en, modificado_en
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, ?14, ?14)
            "#,
        )
        .bind(&id)
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(&req.owner_id)
        .bind(&req.company_id)
        .bind(&req.contact_id)
        .bind(req.expected_amount)
        .bind(&req.currency)
        .bind(req.probability)
        .bind(req.target_close_date.map(|d| d.to_string()))
        .bind(phase.as_str())
        .bind(follow_up_active)
        .bind(activated_at)
        .bind(&now)
        .execute(&self.db_pool)
        .await?;

        log::info!("Trato {} creado en fase {}", id, phase);
        require_deal(&self.db_pool, &id).await
    }

    /// Actualiza sólo los campos descriptivos presentes en el request.
    pub async fn update_deal(&self, deal_id: &str, req: UpdateDealRequest) -> ServiceResult<Deal> {
        let current = require_deal(&self.db_pool, deal_id).await?;

        if let Some(name) = &req.name {
            validate_name(name)?;
        }
        validate_amounts(req.expected_amount, req.probability)?;

        let now = db::ts(self.clock.now());
        sqlx::query(
            r#"
            UPDATE tratos
            SET nombre = ?2,
                descripcion = ?3,
                propietario_id = ?4,
                empresa_id = ?5,
                contacto_id = ?6,
                monto_esperado = ?7,
                moneda = ?8,
                probabilidad = ?9,
                fecha_cierre = ?10,
                modificado_en = ?11
            WHERE id = ?1
            "#,
        )
        .bind(deal_id)
        .bind(req.name.map(|n| n.trim().to_string()).unwrap_or(current.name))
        .bind(req.description.or(current.description))
        .bind(req.owner_id.unwrap_or(current.owner_id))
        .bind(req.company_id.or(current.company_id))
        .bind(req.contact_id.or(current.contact_id))
        .bind(req.expected_amount.or(current.expected_amount))
        .bind(req.currency.or(current.currency))
        .bind(req.probability.or(current.probability))
        .bind(
            req.target_close_date
                .or(current.target_close_date)
                .map(|d| d.to_string()),
        )
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        require_deal(&self.db_pool, deal_id).await
    }

    pub async fn get_deal(&self, deal_id: &str) -> ServiceResult<Deal> {
        require_deal(&self.db_pool, deal_id).await
    }

    pub async fn get_deal_detail(&self, deal_id: &str) -> ServiceResult<DealDetail> {
        let deal = require_deal(&self.db_pool, deal_id).await?;

        let company_name = match &deal.company_id {
            Some(id) => self.directory.company_name(id).await?,
            None => None,
        };
        let contact_name = match &deal.contact_id {
            Some(id) => self.directory.contact(id).await?.map(|c| c.nombre),
            None => None,
        };
        let activities = activity_service::list_for_deal(&self.db_pool, deal_id).await?;
        let notes = note_service::list_for_deal(&self.db_pool, deal_id).await?;

        Ok(DealDetail {
            neglected: self.neglected(&deal),
            company_name,
            contact_name,
            activities: ActivityBuckets::from_activities(activities),
            notes,
            deal,
        })
    }

    pub async fn list_deals(&self) -> ServiceResult<Vec<DealSummary>> {
        let sql = format!("{SELECT_DEAL} ORDER BY creado_en DESC");
        let deals = fetch_deals(&self.db_pool, &sql).await?;
        Ok(self.summarize(deals))
    }

    /// GET /tratos/filtrar: propietario y rango (inclusive) de fecha de creación.
    pub async fn filter_deals(&self, filter: DealFilter) -> ServiceResult<Vec<DealSummary>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(ServiceError::InvalidArgument(
                    "startDate no puede ser posterior a endDate".to_string(),
                ));
            }
        }

        let sql = format!(
            r#"{SELECT_DEAL}
            WHERE (?1 IS NULL OR propietario_id = ?1)
              AND (?2 IS NULL OR creado_en >= ?2)
              AND (?3 IS NULL OR creado_en < ?3)
            ORDER BY creado_en DESC"#
        );
        let start = filter.start_date.map(day_start);
        let end = filter
            .end_date
            .and_then(|d| d.succ_opt())
            .map(day_start);

        let rows = sqlx::query_as::<_, DealRow>(&sql)
            .bind(filter.propietario_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.db_pool)
            .await?;
        let deals = rows
            .into_iter()
            .map(Deal::try_from)
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(self.summarize(deals))
    }

    /// Borra el trato; actividades, notas y correos caen en cascada.
    pub async fn delete_deal(&self, deal_id: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM tratos WHERE id = ?1")
            .bind(deal_id)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::deal_not_found(deal_id));
        }
        log::info!("Trato {} eliminado", deal_id);
        Ok(())
    }

    pub async fn is_neglected(&self, deal_id: &str) -> ServiceResult<bool> {
        let deal = require_deal(&self.db_pool, deal_id).await?;
        Ok(self.neglected(&deal))
    }

    /// Mueve el trato a `target_phase`. Cualquier orden está permitido; entrar a una fase
    /// terminal apaga el seguimiento aunque alguien lo haya encendido a mano.
    ///
    /// Si el movimiento lo justifica una actividad cerrada del mismo trato, su instante de
    /// cierre se refleja en `last_activity_at` (nunca hacia atrás).
    pub async fn move_to(
        &self,
        deal_id: &str,
        target_phase: &str,
        triggering_activity: Option<&str>,
    ) -> ServiceResult<Deal> {
        let phase: Phase = target_phase.parse()?;

        let activity_stamp = match triggering_activity {
            Some(activity_id) => Some(
                activity_service::closed_activity_timestamp(&self.db_pool, deal_id, activity_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InvalidArgument(format!(
                            "La actividad {activity_id} no está cerrada o no pertenece al trato {deal_id}"
                        ))
                    })?,
            ),
            None => None,
        };

        let now = db::ts(self.clock.now());
        let result = sqlx::query(
            r#"
            UPDATE tratos
            SET fase = ?2,
                seguimiento_activo = CASE WHEN ?3 THEN 0 ELSE seguimiento_activo END,
                ultima_actividad_en = CASE
                    WHEN ?4 IS NOT NULL AND (ultima_actividad_en IS NULL OR ultima_actividad_en < ?4)
                    THEN ?4 ELSE ultima_actividad_en END,
                modificado_en = ?5
            WHERE id = ?1
            "#,
        )
        .bind(deal_id)
        .bind(phase.as_str())
        .bind(phase.is_terminal())
        .bind(activity_stamp.map(db::ts))
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::deal_not_found(deal_id));
        }

        log::info!("Trato {} movido a fase {}", deal_id, phase);
        require_deal(&self.db_pool, deal_id).await
    }

    /// Enciende el envío automático. Sólo cambia la bandera: el job es el único que envía.
    pub async fn activate_follow_up(&self, deal_id: &str) -> ServiceResult<Deal> {
        let now = db::ts(self.clock.now());
        let sql = format!(
            r#"
            UPDATE tratos
            SET seguimiento_activado_en = CASE WHEN seguimiento_activo = 1
                    THEN seguimiento_activado_en ELSE ?2 END,
                seguimiento_activo = 1,
                modificado_en = ?2
            WHERE id = ?1 AND fase NOT IN {TERMINAL_PHASES_SQL}
            "#
        );
        let result = sqlx::query(&sql)
            .bind(deal_id)
            .bind(now)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.terminal_or_missing(deal_id).await);
        }
        log::info!("Seguimiento activado para trato {}", deal_id);
        require_deal(&self.db_pool, deal_id).await
    }

    /// Apaga el envío automático; en fase terminal la bandera ya está apagada y se rechaza.
    pub async fn deactivate_follow_up(&self, deal_id: &str) -> ServiceResult<Deal> {
        let now = db::ts(self.clock.now());
        let sql = format!(
            r#"
            UPDATE tratos
            SET seguimiento_activo = 0,
                modificado_en = ?2
            WHERE id = ?1 AND fase NOT IN {TERMINAL_PHASES_SQL}
            "#
        );
        let result = sqlx::query(&sql)
            .bind(deal_id)
            .bind(now)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.terminal_or_missing(deal_id).await);
        }
        log::info!("Seguimiento desactivado para trato {}", deal_id);
        require_deal(&self.db_pool, deal_id).await
    }

    async fn terminal_or_missing(&self, deal_id: &str) -> ServiceError {
        match fetch_deal(&self.db_pool, deal_id).await {
            Ok(Some(deal)) => ServiceError::InvalidState(format!(
                "El trato {} está en fase terminal {}",
                deal_id, deal.phase
            )),
            Ok(None) => ServiceError::deal_not_found(deal_id),
            Err(e) => e,
        }
    }

    fn neglected(&self, deal: &Deal) -> bool {
        neglect::deal_is_neglected(deal, self.clock.now(), self.neglect_threshold)
    }

    fn summarize(&self, deals: Vec<Deal>) -> Vec<DealSummary> {
        let now = self.clock.now();
        deals
            .into_iter()
            .map(|deal| DealSummary {
                neglected: neglect::deal_is_neglected(&deal, now, self.neglect_threshold),
                deal,
            })
            .collect()
    }
}

fn day_start(date: NaiveDate) -> String {
    db::ts(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn validate_name(name: &str) -> ServiceResult<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "El nombre del trato es obligatorio".to_string(),
        ));
    }
    Ok(())
}

fn validate_amounts(amount: Option<f64>, probability: Option<i64>) -> ServiceResult<()> {
    if let Some(amount) = amount {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ServiceError::InvalidArgument(format!(
                "Monto esperado inválido: {amount}"
            )));
        }
    }
    if let Some(p) = probability {
        if !(0..=100).contains(&p) {
            return Err(ServiceError::InvalidArgument(format!(
                "La probabilidad debe estar entre 0 y 100: {p}"
            )));
        }
    }
    Ok(())
}
