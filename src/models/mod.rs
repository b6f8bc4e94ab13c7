//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod activity_model;
pub mod deal_model;
pub mod email_model;
pub mod follow_up_model;
pub mod note_model;
pub mod notification_model;
