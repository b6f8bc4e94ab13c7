use std::collections::HashMap;
use std::str::FromStr;

use base64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
}

fn serialize_base64<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&base64::encode(data))
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    base64::decode(&s).map_err(serde::de::Error::custom)
}

/// Origen del correo registrado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailKind {
    Seguimiento,
    Directo,
    Plantilla,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::Seguimiento => "SEGUIMIENTO",
            EmailKind::Directo => "DIRECTO",
            EmailKind::Plantilla => "PLANTILLA",
        }
    }
}

impl FromStr for EmailKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEGUIMIENTO" => Ok(EmailKind::Seguimiento),
            "DIRECTO" => Ok(EmailKind::Directo),
            "PLANTILLA" => Ok(EmailKind::Plantilla),
            other => Err(ServiceError::InvalidArgument(format!(
                "Tipo de correo desconocido: {other}"
            ))),
        }
    }
}

/// Estado de entrega que reporta el proveedor (vía webhook) o el propio envío.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pendiente,
    Sent,
    Delayed,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pendiente => "PENDIENTE",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delayed => "DELAYED",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Opened => "OPENED",
            DeliveryStatus::Clicked => "CLICKED",
            DeliveryStatus::Bounced => "BOUNCED",
            DeliveryStatus::Complained => "COMPLAINED",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    /// Los eventos llegan desordenados; un estado de menor rango no pisa a uno mayor.
    pub fn rank(&self) -> u8 {
        match self {
            DeliveryStatus::Pendiente => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delayed => 2,
            DeliveryStatus::Delivered => 3,
            DeliveryStatus::Opened => 4,
            DeliveryStatus::Clicked => 5,
            DeliveryStatus::Bounced | DeliveryStatus::Complained | DeliveryStatus::Failed => 6,
        }
    }

    /// Traduce el `type` de un evento de Resend (`email.delivered`, ...).
    pub fn from_resend_event(event_type: &str) -> Option<Self> {
        match event_type {
            "email.sent" => Some(DeliveryStatus::Sent),
            "email.delivery_delayed" => Some(DeliveryStatus::Delayed),
            "email.delivered" => Some(DeliveryStatus::Delivered),
            "email.opened" => Some(DeliveryStatus::Opened),
            "email.clicked" => Some(DeliveryStatus::Clicked),
            "email.bounced" => Some(DeliveryStatus::Bounced),
            "email.complained" => Some(DeliveryStatus::Complained),
            "email.failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
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
        .into_iter()
        .find(|st| st.as_str() == s)
        .ok_or_else(|| ServiceError::InvalidArgument(format!("Estado de entrega desconocido: {s}")))
    }
}

/// Una fila por intento de envío.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub id: String,
    pub deal_id: Option<String>,
    pub kind: EmailKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub exito: bool,
    pub delivery_status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    /// Ventana de cadencia (sólo correos de seguimiento)
    pub cadence_window: Option<i64>,
    pub sequence: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mensaje listo para entregarse al transporte.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// POST /correos
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub deal_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Option<Vec<EmailAttachment>>,
}

/// POST /correos/plantilla
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatedEmailRequest {
    pub deal_id: String,
    pub template: String,
    /// Si falta se usa el correo del contacto principal del trato
    pub recipient: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub attachments: Option<Vec<EmailAttachment>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    pub record_id: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

/// Evento de webhook de Resend (sólo los campos que usamos).
#[derive(Debug, Clone, Deserialize)]
pub struct ResendWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: Option<String>,
    pub data: ResendWebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendWebhookData {
    pub email_id: String,
}
