use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;

use crate::app::AppServices;
use crate::clock::SystemClock;
use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::scheduler::JobScheduler;
use crate::services::mail_transport::build_transport;

mod app;
mod clock;
mod config;
mod db;
mod error;
mod handlers;
mod logger;
mod models;
mod scheduler;
mod services;

#[cfg(test)]
mod tests;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env();

    // 1) Carpeta de la base (data/ por defecto)
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("No se pudo crear {}", parent.display()))?;
        }
    }

    // 2) Conexión y migraciones
    let db_pool = db::connect(&config.database_path, config.db_max_connections).await?;
    db::run_migrations(&db_pool).await?;

    // 3) Servicios
    let transport = build_transport(&config.mail)?;
    let services = AppServices::build(db_pool, Arc::new(SystemClock), transport, &config);

    // 4) Jobs en segundo plano
    let scheduler = JobScheduler::new(
        config.jobs.clone(),
        services.follow_up_service.clone(),
        services.notification_service.clone(),
    );
    let _jobs = scheduler.start();

    // Levantar servidor
    log::info!("Levantando servidor en {}:{}", config.host, config.port);
    HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .configure(move |cfg| services.configure(cfg))
            .configure(app::init_app)
    })
    .workers(config.workers)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
