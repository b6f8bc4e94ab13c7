//! config/mod.rs
//! Configuración global del servicio.

pub mod app_config;
