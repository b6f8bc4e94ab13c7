//! models/notification_model.rs
//! Notificaciones internas para los usuarios (no confundir con los correos a clientes).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ActividadProxima,
    ActividadVencida,
    ActividadCompletada,
    TratoDesatendido,
    TratoCierreProximo,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ActividadProxima => "ACTIVIDAD_PROXIMA",
            NotificationKind::ActividadVencida => "ACTIVIDAD_VENCIDA",
            NotificationKind::ActividadCompletada => "ACTIVIDAD_COMPLETADA",
            NotificationKind::TratoDesatendido => "TRATO_DESATENDIDO",
            NotificationKind::TratoCierreProximo => "TRATO_CIERRE_PROXIMO",
        }
    }

    /// Recordatorios que, mientras la condición siga vigente, se repiten a lo sumo una
    /// vez por ventana larga (diaria por defecto).
    pub fn repeats_daily(&self) -> bool {
        matches!(
            self,
            NotificationKind::ActividadVencida
                | NotificationKind::TratoDesatendido
                | NotificationKind::TratoCierreProximo
        )
    }
}

impl FromStr for NotificationKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVIDAD_PROXIMA" => Ok(NotificationKind::ActividadProxima),
            "ACTIVIDAD_VENCIDA" => Ok(NotificationKind::ActividadVencida),
            "ACTIVIDAD_COMPLETADA" => Ok(NotificationKind::ActividadCompletada),
            "TRATO_DESATENDIDO" => Ok(NotificationKind::TratoDesatendido),
            "TRATO_CIERRE_PROXIMO" => Ok(NotificationKind::TratoCierreProximo),
            other => Err(ServiceError::InvalidArgument(format!(
                "Tipo de notificación desconocido: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "UNREAD",
            NotificationStatus::Read => "READ",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNREAD" => Ok(NotificationStatus::Unread),
            "READ" => Ok(NotificationStatus::Read),
            other => Err(ServiceError::InvalidArgument(format!(
                "Estado de notificación desconocido: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub deal_id: Option<String>,
    pub activity_id: Option<String>,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Aviso candidato antes de pasar por la deduplicación.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub deal_id: Option<String>,
    pub activity_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub usuario_id: String,
    #[serde(default)]
    pub solo_no_leidas: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualCleanupQuery {
    pub dias: Option<i64>,
}

/// Resumen de una pasada de `check_scheduled`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub candidates: usize,
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
}
