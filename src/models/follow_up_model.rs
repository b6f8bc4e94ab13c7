//! models/follow_up_model.rs
//! Vistas del motor de correos de seguimiento.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// GET /correos-seguimiento/estado/{tratoId}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpStatus {
    pub deal_id: String,
    pub follow_up_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub cadence_days: i64,
    pub sent_count: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub last_success: Option<bool>,
    /// `None` si el seguimiento está apagado
    pub next_due_at: Option<DateTime<Utc>>,
}

/// Trato al que le toca correo en esta pasada.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFollowUp {
    pub deal_id: String,
    pub deal_name: String,
    pub cadence_window: i64,
    pub sequence: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Resultado de procesar un trato dentro del job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Sent,
    Failed,
    NotDue,
    /// Otra pasada ya ocupó la ventana, o el trato dejó de ser elegible
    AlreadyClaimed,
}

/// Resumen de una pasada del job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRunReport {
    pub eligible: usize,
    pub sent: usize,
    pub failed: usize,
    pub not_due: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl FollowUpRunReport {
    pub fn record(&mut self, outcome: FollowUpOutcome) {
        match outcome {
            FollowUpOutcome::Sent => self.sent += 1,
            FollowUpOutcome::Failed => self.failed += 1,
            FollowUpOutcome::NotDue => self.not_due += 1,
            FollowUpOutcome::AlreadyClaimed => self.skipped += 1,
        }
    }
}
