//! logger.rs
//! Configuración del logger usando env_logger.

pub fn init_logger() {
    // RUST_LOG manda; sin él, info para el servicio y warn para sqlx (logea cada query).
    let default_filter = "info,sqlx=warn";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(false)
        .init();
}
