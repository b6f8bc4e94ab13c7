//! error.rs
//! Errores de dominio del servicio y su traducción a HTTP.

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Activity {0} is already closed")]
    AlreadyClosed(String),

    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn deal_not_found(id: &str) -> Self {
        ServiceError::NotFound(format!("Deal {id}"))
    }

    pub fn activity_not_found(id: &str) -> Self {
        ServiceError::NotFound(format!("Activity {id}"))
    }

    /// Fase desconocida y argumentos mal formados comparten el mismo 400.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidArgument(_) | ServiceError::InvalidPhase(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidArgument(_)
            | ServiceError::InvalidPhase(_)
            | ServiceError::AlreadyClosed(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::DeliveryFailure(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Respuesta JSON con el mismo formato que usan todos los endpoints.
    pub fn to_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(json!({
            "success": false,
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_http_codes() {
        assert_eq!(
            ServiceError::deal_not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidPhase("NOT_A_PHASE".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidState("terminal".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_phase_counts_as_invalid_argument() {
        assert!(ServiceError::InvalidPhase("X".into()).is_invalid_argument());
        assert!(!ServiceError::AlreadyClosed("a".into()).is_invalid_argument());
    }
}
