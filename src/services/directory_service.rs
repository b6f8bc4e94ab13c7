//! services/directory_service.rs
//! Lectura de empresas y contactos. Su CRUD vive en otro sistema; aquí sólo se consultan
//! nombres y correos para armar notificaciones y plantillas.

use sqlx::{Pool, Sqlite};

use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ContactInfo {
    pub id: String,
    pub nombre: String,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ContactDirectory {
    db_pool: Pool<Sqlite>,
}

impl ContactDirectory {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        ContactDirectory { db_pool }
    }

    pub async fn company_name(&self, company_id: &str) -> ServiceResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT nombre FROM empresas WHERE id = ?1")
            .bind(company_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(name)
    }

    pub async fn contact(&self, contact_id: &str) -> ServiceResult<Option<ContactInfo>> {
        let contact = sqlx::query_as::<_, ContactInfo>(
            "SELECT id, nombre, email FROM contactos WHERE id = ?1",
        )
        .bind(contact_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(contact)
    }
}
