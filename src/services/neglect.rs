//! services/neglect.rs
//! Detección de tratos desatendidos. No guarda estado: se recalcula en cada lectura.

use chrono::{DateTime, Duration, Utc};

use crate::models::deal_model::{Deal, Phase};

/// Un trato abierto está desatendido si su última actividad (o su creación, si nunca
/// tuvo una) quedó más atrás que `threshold`.
pub fn is_neglected(
    phase: Phase,
    last_activity_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> bool {
    if phase.is_terminal() {
        return false;
    }
    let reference = last_activity_at.unwrap_or(created_at);
    now - reference > threshold
}

pub fn deal_is_neglected(deal: &Deal, now: DateTime<Utc>, threshold: Duration) -> bool {
    is_neglected(
        deal.phase,
        deal.last_activity_at,
        deal.created_at,
        now,
        threshold,
    )
}
