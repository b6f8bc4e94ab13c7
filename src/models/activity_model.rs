//! models/activity_model.rs
//! Actividades programadas (tareas, llamadas, reuniones) ligadas a un trato.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Task,
    Call,
    Meeting,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Task => "TASK",
            ActivityKind::Call => "CALL",
            ActivityKind::Meeting => "MEETING",
        }
    }

    /// Nombre para mensajes al usuario.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Task => "tarea",
            ActivityKind::Call => "llamada",
            ActivityKind::Meeting => "reunión",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TASK" => Ok(ActivityKind::Task),
            "CALL" => Ok(ActivityKind::Call),
            "MEETING" => Ok(ActivityKind::Meeting),
            other => Err(ServiceError::InvalidArgument(format!(
                "Tipo de actividad desconocido: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskSubtype {
    Correo,
    Whatsapp,
    Documentacion,
    Otro,
}

impl TaskSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSubtype::Correo => "CORREO",
            TaskSubtype::Whatsapp => "WHATSAPP",
            TaskSubtype::Documentacion => "DOCUMENTACION",
            TaskSubtype::Otro => "OTRO",
        }
    }
}

impl FromStr for TaskSubtype {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CORREO" => Ok(TaskSubtype::Correo),
            "WHATSAPP" => Ok(TaskSubtype::Whatsapp),
            "DOCUMENTACION" => Ok(TaskSubtype::Documentacion),
            "OTRO" => Ok(TaskSubtype::Otro),
            other => Err(ServiceError::InvalidArgument(format!(
                "Subtipo de tarea desconocido: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Open,
    Closed,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Open => "OPEN",
            ActivityStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for ActivityStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(ActivityStatus::Open),
            "CLOSED" => Ok(ActivityStatus::Closed),
            other => Err(ServiceError::InvalidArgument(format!(
                "Estado de actividad desconocido: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestLevel {
    Alto,
    Medio,
    Bajo,
    Nulo,
}

impl InterestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestLevel::Alto => "ALTO",
            InterestLevel::Medio => "MEDIO",
            InterestLevel::Bajo => "BAJO",
            InterestLevel::Nulo => "NULO",
        }
    }
}

impl FromStr for InterestLevel {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALTO" => Ok(InterestLevel::Alto),
            "MEDIO" => Ok(InterestLevel::Medio),
            "BAJO" => Ok(InterestLevel::Bajo),
            "NULO" => Ok(InterestLevel::Nulo),
            other => Err(ServiceError::InvalidArgument(format!(
                "Nivel de interés desconocido: {other}"
            ))),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resultado capturado al cerrar una actividad.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub response: Option<bool>,
    pub interest_level: Option<InterestLevel>,
    pub info_sent: Option<bool>,
    pub next_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub deal_id: String,
    pub kind: ActivityKind,
    pub task_subtype: Option<TaskSubtype>,
    pub assignee_id: String,
    pub title: Option<String>,
    pub due_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    /// Instante de vencimiento: fecha + hora de inicio (o inicio del día)
    pub due_at: DateTime<Utc>,
    pub status: ActivityStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    /// Sólo presente cuando la actividad está cerrada
    pub outcome: Option<ActivityOutcome>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn due_instant(date: NaiveDate, time: Option<NaiveTime>) -> DateTime<Utc> {
        date.and_time(time.unwrap_or(NaiveTime::MIN)).and_utc()
    }
}

/// POST /tratos/actividades
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleActivityRequest {
    pub deal_id: String,
    pub kind: ActivityKind,
    pub task_subtype: Option<TaskSubtype>,
    pub assignee_id: String,
    pub title: Option<String>,
    pub due_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
}

/// PUT /tratos/actividades/{id}/completar
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteActivityRequest {
    pub completed_by: String,
    #[serde(flatten)]
    pub outcome: ActivityOutcome,
    pub note: Option<String>,
}

/// Actividades abiertas agrupadas por tipo, más el historial cerrado.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBuckets {
    pub tasks: Vec<Activity>,
    pub calls: Vec<Activity>,
    pub meetings: Vec<Activity>,
    pub closed: Vec<Activity>,
}

impl ActivityBuckets {
    pub fn from_activities(activities: Vec<Activity>) -> Self {
        let mut buckets = ActivityBuckets::default();
        for activity in activities {
            match (activity.status, activity.kind) {
                (ActivityStatus::Closed, _) => buckets.closed.push(activity),
                (ActivityStatus::Open, ActivityKind::Task) => buckets.tasks.push(activity),
                (ActivityStatus::Open, ActivityKind::Call) => buckets.calls.push(activity),
                (ActivityStatus::Open, ActivityKind::Meeting) => buckets.meetings.push(activity),
            }
        }
        buckets
    }
}
