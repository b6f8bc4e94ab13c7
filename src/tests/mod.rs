//! tests/mod.rs
//! Pruebas de integración contra una base SQLite real en un directorio temporal.

mod support;

mod activity_tests;
mod http_tests;
mod notification_tests;
