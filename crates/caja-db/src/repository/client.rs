//! # Client Repository
//!
//! Tenant enumeration for the automation loop ("list active clients").

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caja_core::validation::validate_client_id;
use caja_core::Client;

#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Inserts a client with a generated id.
    pub async fn create(&self, name: &str) -> DbResult<Client> {
        self.insert(&Uuid::new_v4().to_string(), name).await
    }

    /// Inserts a client with a caller-chosen id.
    pub async fn insert(&self, id: &str, name: &str) -> DbResult<Client> {
        validate_client_id(id)?;

        let client = Client {
            id: id.to_string(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO clients (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&client.id)
            .bind(&client.name)
            .bind(client.is_active)
            .bind(client.created_at)
            .execute(&self.pool)
            .await?;

        debug!(client_id = %client.id, "Client created");
        Ok(client)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, name, is_active, created_at FROM clients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    /// All active clients, ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT id, name, is_active, created_at FROM clients WHERE is_active = 1 ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = clients.len(), "Loaded active clients");
        Ok(clients)
    }

    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE clients SET is_active = ?1 WHERE id = ?2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_list_active_skips_inactive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clients = db.clients();

        clients.insert("a", "Alpha").await.unwrap();
        clients.insert("b", "Beta").await.unwrap();
        clients.set_active("b", false).await.unwrap();

        let active = clients.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");

        assert!(clients.set_active("missing", true).await.unwrap_err().is_not_found());
        assert!(clients.insert("a", "Again").await.unwrap_err().is_unique_violation());
    }
}
