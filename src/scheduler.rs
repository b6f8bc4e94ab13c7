//! scheduler.rs
//! Jobs periódicos: correos de seguimiento, revisión de notificaciones y limpieza de leídas.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::app_config::JobsConfig;
use crate::error::ServiceResult;
use crate::services::{
    follow_up_service::FollowUpService, notification_service::NotificationService,
};

#[derive(Clone)]
pub struct JobScheduler {
    config: JobsConfig,
    follow_up_service: FollowUpService,
    notification_service: NotificationService,
}

impl JobScheduler {
    pub fn new(
        config: JobsConfig,
        follow_up_service: FollowUpService,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            config,
            follow_up_service,
            notification_service,
        }
    }

    /// Lanza los tres loops. Con `JOBS_ENABLED=false` no lanza nada.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        if !self.config.enabled {
            log::warn!("Jobs programados deshabilitados (JOBS_ENABLED=false)");
            return vec![];
        }

        let follow_up = self.follow_up_service.clone();
        let checker = self.notification_service.clone();
        let cleaner = self.notification_service.clone();

        vec![
            spawn_job(
                "correos-seguimiento",
                self.config.follow_up_interval_secs,
                move || {
                    let svc = follow_up.clone();
                    async move { svc.run_once().await.map(|_| ()) }
                },
            ),
            spawn_job(
                "notificaciones-programadas",
                self.config.notification_interval_secs,
                move || {
                    let svc = checker.clone();
                    async move {
                        let report = svc.check_scheduled().await?;
                        log::info!(
                            "(scheduler) notificaciones: candidatas={} creadas={} duplicadas={} fallidas={}",
                            report.candidates,
                            report.created,
                            report.duplicates,
                            report.failed
                        );
                        Ok(())
                    }
                },
            ),
            spawn_job(
                "limpieza-leidas",
                self.config.cleanup_interval_secs,
                move || {
                    let svc = cleaner.clone();
                    async move {
                        let deleted = svc.cleanup_read(svc.read_retention()).await?;
                        log::info!("(scheduler) notificaciones leídas eliminadas: {}", deleted);
                        Ok(())
                    }
                },
            ),
        ]
    }
}

/// Corre `job` cada `every_secs`; el primer tick es inmediato. Un error sólo se registra,
/// la siguiente ejecución sigue su curso.
fn spawn_job<F, Fut>(name: &'static str, every_secs: u64, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ServiceResult<()>> + Send + 'static,
{
    let period = Duration::from_secs(every_secs.max(1));
    log::info!("(scheduler) Job '{}' cada {:?}", name, period);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            log::debug!("(scheduler) Ejecutando '{}'", name);
            if let Err(e) = job().await {
                log::error!("(scheduler) Job '{}' falló: {}", name, e);
            }
        }
    })
}
