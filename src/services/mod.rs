//! services/mod.rs
//! Módulo que agrupa las capas de negocio: tratos, actividades, notas, correos y notificaciones.

pub mod activity_service;
pub mod deal_service;
pub mod directory_service;
pub mod email_service;
pub mod follow_up_service;
pub mod mail_transport;
pub mod neglect;
pub mod note_service;
pub mod notification_service;
pub mod template_service;
