//! handlers/mod.rs
//! Módulo que agrupa los handlers HTTP (tratos, actividades, notas, correos, notificaciones).
pub mod activity_handler;
pub mod deal_handler;
pub mod email_handler;
pub mod follow_up_handler;
pub mod note_handler;
pub mod notification_handler;
pub mod webhook_handler;
