//! models/deal_model.rs
//! Trato (deal), sus fases y los cuerpos JSON de la API de tratos.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::models::activity_model::ActivityBuckets;
use crate::models::note_model::DealNote;

/// Fases del embudo de ventas, en orden. `CerradoGanado` y `CerradoPerdido` son terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Clasificacion,
    PrimerContacto,
    EnvioDeInformacion,
    Reunion,
    CotizacionPropuestaPractica,
    NegociacionRevision,
    CerradoGanado,
    CerradoPerdido,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Clasificacion,
        Phase::PrimerContacto,
        Phase::EnvioDeInformacion,
        Phase::Reunion,
        Phase::CotizacionPropuestaPractica,
        Phase::NegociacionRevision,
        Phase::CerradoGanado,
        Phase::CerradoPerdido,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Clasificacion => "CLASIFICACION",
            Phase::PrimerContacto => "PRIMER_CONTACTO",
            Phase::EnvioDeInformacion => "ENVIO_DE_INFORMACION",
            Phase::Reunion => "REUNION",
            Phase::CotizacionPropuestaPractica => "COTIZACION_PROPUESTA_PRACTICA",
            Phase::NegociacionRevision => "NEGOCIACION_REVISION",
            Phase::CerradoGanado => "CERRADO_GANADO",
            Phase::CerradoPerdido => "CERRADO_PERDIDO",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::CerradoGanado | Phase::CerradoPerdido)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ServiceError::InvalidPhase(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub company_id: Option<String>,
    pub contact_id: Option<String>,
    pub expected_amount: Option<f64>,
    pub currency: Option<String>,
    pub probability: Option<i64>,
    pub target_close_date: Option<NaiveDate>,
    pub phase: Phase,
    pub follow_up_active: bool,
    pub follow_up_activated_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /tratos
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealRequest {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub company_id: Option<String>,
    pub contact_id: Option<String>,
    pub expected_amount: Option<f64>,
    pub currency: Option<String>,
    pub probability: Option<i64>,
    pub target_close_date: Option<NaiveDate>,
    /// Fase inicial; por defecto CLASIFICACION
    pub phase: Option<String>,
    #[serde(default)]
    pub follow_up_active: bool,
}

/// PUT /tratos/{id}. La fase y el seguimiento sólo cambian por sus propias operaciones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub company_id: Option<String>,
    pub contact_id: Option<String>,
    pub expected_amount: Option<f64>,
    pub currency: Option<String>,
    pub probability: Option<i64>,
    pub target_close_date: Option<NaiveDate>,
}

/// PUT /tratos/{id}/mover-fase?nuevaFase=...&actividadId=...
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePhaseQuery {
    pub nueva_fase: String,
    pub actividad_id: Option<String>,
}

/// GET /tratos/filtrar
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealFilter {
    pub propietario_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Trato tal como sale en listados: con la bandera de desatendido calculada al vuelo.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealSummary {
    #[serde(flatten)]
    pub deal: Deal,
    pub neglected: bool,
}

/// GET /tratos/{id}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDetail {
    #[serde(flatten)]
    pub deal: Deal,
    pub neglected: bool,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub activities: ActivityBuckets,
    pub notes: Vec<DealNote>,
}
