//! tests/support.rs
//! Piezas comunes de las pruebas: base temporal, reloj manual y transporte que graba.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Pool, Sqlite};
use tempfile::TempDir;

use crate::app::AppServices;
use crate::clock::{Clock, ManualClock};
use crate::config::app_config::AppConfig;
use crate::db;
use crate::models::deal_model::{CreateDealRequest, Deal};
use crate::models::email_model::OutgoingEmail;
use crate::services::mail_transport::MailTransport;

pub const OWNER: &str = "ana";
pub const CONTACT_EMAIL: &str = "lucia@transportes.mx";

/// Transporte de correo que guarda lo enviado y puede fallar a pedido.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("SMTP 554: rechazado"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("prov-{}", sent.len()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct TestEnv {
    // Mantiene vivo el directorio de la base mientras dure la prueba
    _dir: TempDir,
    pub pool: Pool<Sqlite>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<RecordingTransport>,
    pub services: AppServices,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub async fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("tratos.db");
    let pool = db::connect(&db_path.to_string_lossy(), 5)
        .await
        .expect("connect");
    db::run_migrations(&pool).await.expect("migrations");

    sqlx::query("INSERT INTO empresas (id, nombre) VALUES ('emp-1', 'Transportes del Norte')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO contactos (id, empresa_id, nombre, email) VALUES ('con-1', 'emp-1', 'Lucía', ?1), ('con-2', 'emp-1', 'Sin Correo', NULL)",
    )
    .bind(CONTACT_EMAIL)
    .execute(&pool)
    .await
    .unwrap();

    let clock = Arc::new(ManualClock::new(start_time()));
    let transport = Arc::new(RecordingTransport::default());
    let config = AppConfig::default();
    let services = AppServices::build(pool.clone(), clock.clone(), transport.clone(), &config);

    TestEnv {
        _dir: dir,
        pool,
        clock,
        transport,
        services,
    }
}

pub fn deal_request(name: &str) -> CreateDealRequest {
    CreateDealRequest {
        name: name.to_string(),
        description: None,
        owner_id: OWNER.to_string(),
        company_id: Some("emp-1".to_string()),
        contact_id: Some("con-1".to_string()),
        expected_amount: Some(150_000.0),
        currency: Some("MXN".to_string()),
        probability: Some(40),
        target_close_date: None,
        phase: None,
        follow_up_active: false,
    }
}

impl TestEnv {
    pub async fn create_deal(&self, name: &str) -> Deal {
        self.services
            .deal_service
            .create_deal(deal_request(name))
            .await
            .unwrap()
    }

    pub async fn create_following_deal(&self, name: &str) -> Deal {
        self.services
            .deal_service
            .create_deal(CreateDealRequest {
                follow_up_active: true,
                ..deal_request(name)
            })
            .await
            .unwrap()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
