//! config/app_config.rs
//! Parámetros del servicio: se leen de variables de entorno (o .env) con valores por defecto.

use std::env;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Proveedor de correo con el que se entregan los emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    Resend,
    Smtp,
    /// Sólo registra el envío en el log (desarrollo).
    Log,
}

impl FromStr for MailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resend" => Ok(MailProvider::Resend),
            "smtp" => Ok(MailProvider::Smtp),
            "log" => Ok(MailProvider::Log),
            other => Err(format!("Proveedor de correo desconocido: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub provider: MailProvider,
    pub from_address: String,
    pub from_name: String,
    pub resend_api_key: Option<String>,
    pub resend_base_url: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            provider: MailProvider::Log,
            from_address: "ventas@localhost".to_string(),
            from_name: "Equipo Comercial".to_string(),
            resend_api_key: None,
            resend_base_url: "https://api.resend.com".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
        }
    }
}

/// Ventanas de tiempo del motor de tratos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Días entre correos de seguimiento de un mismo trato
    pub follow_up_cadence_days: i64,
    /// Días sin actividad a partir de los cuales un trato está desatendido
    pub neglect_threshold_days: i64,
    /// Minutos hacia adelante en los que una actividad abierta genera aviso
    pub notification_lookahead_minutes: i64,
    /// Ventana de deduplicación para avisos de actividades
    pub activity_dedup_minutes: i64,
    /// Ventana de deduplicación para avisos a nivel trato (desatendido, cierre)
    pub deal_alert_dedup_hours: i64,
    /// Días antes de la fecha de cierre en que se avisa al propietario
    pub close_date_horizon_days: i64,
    /// Días que se conservan las notificaciones ya leídas
    pub read_retention_days: i64,
    /// Tratos procesados en paralelo por el job de correos
    pub job_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            follow_up_cadence_days: 3,
            neglect_threshold_days: 7,
            notification_lookahead_minutes: 60,
            activity_dedup_minutes: 60,
            deal_alert_dedup_hours: 24,
            close_date_horizon_days: 3,
            read_retention_days: 30,
            job_concurrency: 4,
        }
    }
}

impl EngineConfig {
    pub fn cadence(&self) -> Duration {
        Duration::days(self.follow_up_cadence_days)
    }

    pub fn neglect_threshold(&self) -> Duration {
        Duration::days(self.neglect_threshold_days)
    }

    pub fn lookahead(&self) -> Duration {
        Duration::minutes(self.notification_lookahead_minutes)
    }

    /// Nunca menor que la anticipación: una actividad próxima avisa una sola vez.
    pub fn activity_dedup(&self) -> Duration {
        Duration::minutes(
            self.activity_dedup_minutes
                .max(self.notification_lookahead_minutes),
        )
    }

    pub fn deal_alert_dedup(&self) -> Duration {
        Duration::hours(self.deal_alert_dedup_hours)
    }

    pub fn close_date_horizon(&self) -> Duration {
        Duration::days(self.close_date_horizon_days)
    }

    pub fn read_retention(&self) -> Duration {
        Duration::days(self.read_retention_days)
    }
}

/// Periodicidad (segundos) de cada job en segundo plano.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub enabled: bool,
    pub follow_up_interval_secs: u64,
    pub notification_interval_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        JobsConfig {
            enabled: true,
            follow_up_interval_secs: 24 * 60 * 60,
            notification_interval_secs: 5 * 60,
            cleanup_interval_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_path: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub engine: EngineConfig,
    pub jobs: JobsConfig,
    pub mail: MailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: "data/tratos.db".to_string(),
            db_max_connections: 5,
            host: "0.0.0.0".to_string(),
            port: 5022,
            workers: 2,
            engine: EngineConfig::default(),
            jobs: JobsConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl AppConfig {
    /// Construye la configuración desde el entorno; cada variable ausente toma el default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = AppConfig::default();

        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fn num<T: FromStr>(raw: Option<String>, key: &str, fallback: T) -> T {
            match raw {
                Some(v) => v.trim().parse().unwrap_or_else(|_| {
                    log::warn!("Valor inválido para {}: '{}', se usa el default", key, v);
                    fallback
                }),
                None => fallback,
            }
        }

        let provider = match parsed("MAIL_PROVIDER") {
            Some(v) => v.parse().unwrap_or_else(|e: String| {
                log::warn!("{}; se usa 'log'", e);
                MailProvider::Log
            }),
            None => d.mail.provider,
        };

        AppConfig {
            database_path: parsed("DATABASE_PATH").unwrap_or(d.database_path),
            db_max_connections: num(
                parsed("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                d.db_max_connections,
            ),
            host: parsed("HOST").unwrap_or(d.host),
            port: num(parsed("PORT"), "PORT", d.port),
            workers: num(parsed("WORKERS"), "WORKERS", d.workers),
            engine: EngineConfig {
                follow_up_cadence_days: num(
                    parsed("FOLLOW_UP_CADENCE_DAYS"),
                    "FOLLOW_UP_CADENCE_DAYS",
                    d.engine.follow_up_cadence_days,
                )
                .max(1),
                neglect_threshold_days: num(
                    parsed("NEGLECT_THRESHOLD_DAYS"),
                    "NEGLECT_THRESHOLD_DAYS",
                    d.engine.neglect_threshold_days,
                ),
                notification_lookahead_minutes: num(
                    parsed("NOTIFICATION_LOOKAHEAD_MINUTES"),
                    "NOTIFICATION_LOOKAHEAD_MINUTES",
                    d.engine.notification_lookahead_minutes,
                ),
                activity_dedup_minutes: num(
                    parsed("ACTIVITY_DEDUP_MINUTES"),
                    "ACTIVITY_DEDUP_MINUTES",
                    d.engine.activity_dedup_minutes,
                )
                .max(1),
                deal_alert_dedup_hours: num(
                    parsed("DEAL_ALERT_DEDUP_HOURS"),
                    "DEAL_ALERT_DEDUP_HOURS",
                    d.engine.deal_alert_dedup_hours,
                )
                .max(1),
                close_date_horizon_days: num(
                    parsed("CLOSE_DATE_HORIZON_DAYS"),
                    "CLOSE_DATE_HORIZON_DAYS",
                    d.engine.close_date_horizon_days,
                ),
                read_retention_days: num(
                    parsed("READ_RETENTION_DAYS"),
                    "READ_RETENTION_DAYS",
                    d.engine.read_retention_days,
                ),
                job_concurrency: num(
                    parsed("JOB_CONCURRENCY"),
                    "JOB_CONCURRENCY",
                    d.engine.job_concurrency,
                )
                .max(1),
            },
            jobs: JobsConfig {
                enabled: num(parsed("JOBS_ENABLED"), "JOBS_ENABLED", d.jobs.enabled),
                follow_up_interval_secs: num(
                    parsed("FOLLOW_UP_INTERVAL_SECS"),
                    "FOLLOW_UP_INTERVAL_SECS",
                    d.jobs.follow_up_interval_secs,
                )
                .max(1),
                notification_interval_secs: num(
                    parsed("NOTIFICATION_INTERVAL_SECS"),
                    "NOTIFICATION_INTERVAL_SECS",
                    d.jobs.notification_interval_secs,
                )
                .max(1),
                cleanup_interval_secs: num(
                    parsed("CLEANUP_INTERVAL_SECS"),
                    "CLEANUP_INTERVAL_SECS",
                    d.jobs.cleanup_interval_secs,
                )
                .max(1),
            },
            mail: MailConfig {
                provider,
                from_address: parsed("MAIL_FROM").unwrap_or(d.mail.from_address),
                from_name: parsed("MAIL_FROM_NAME").unwrap_or(d.mail.from_name),
                resend_api_key: parsed("RESEND_API_KEY"),
                resend_base_url: parsed("RESEND_BASE_URL").unwrap_or(d.mail.resend_base_url),
                smtp_host: parsed("SMTP_HOST"),
                smtp_port: num(parsed("SMTP_PORT"), "SMTP_PORT", d.mail.smtp_port),
                smtp_user: parsed("SMTP_USER"),
                smtp_pass: parsed("SMTP_PASS"),
            },
        }
    }
}
