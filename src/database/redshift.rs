//! Redshift warehouse backend implementation
//!
//! Talks to the cluster over the Postgres wire protocol. Statements go
//! through the simple query protocol, which Redshift supports for every
//! statement the pipeline issues (including `COPY`), and values come back
//! as text.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::SimpleQueryMessage;
use tracing::{debug, error, info};

use super::config::mask_password;
use super::{QueryResult, Warehouse, WarehouseError, WarehouseResult};
use crate::sql::Dialect;
use crate::staging::StagingCopy;

/// Redshift warehouse backend
pub struct RedshiftBackend {
    /// Connection string
    connection_string: String,
    /// Client (wrapped for async access)
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl RedshiftBackend {
    /// Connect to a cluster
    ///
    /// # Arguments
    /// * `connection_string` - libpq-style connection string
    pub async fn connect(connection_string: &str) -> WarehouseResult<Self> {
        let masked = mask_password(connection_string);
        debug!(connection = %masked, "Connecting to Redshift");

        let (client, connection) =
            tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
                .await
                .map_err(|e| {
                    WarehouseError::ConnectionFailed(format!(
                        "Failed to connect to Redshift: {}",
                        e
                    ))
                })?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Redshift connection error: {}", e);
            }
        });

        info!(connection = %masked, "Connected to Redshift");

        Ok(Self {
            connection_string: connection_string.to_string(),
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Get the connection string (masked for security)
    pub fn connection_string_masked(&self) -> String {
        mask_password(&self.connection_string)
    }

    async fn simple_query(&self, sql: &str) -> Result<Vec<SimpleQueryMessage>, tokio_postgres::Error> {
        let client = self.client.lock().await;
        client.simple_query(sql).await
    }
}

/// Total rows reported by the command-complete messages
fn rows_affected(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|message| match message {
            SimpleQueryMessage::CommandComplete(rows) => *rows,
            _ => 0,
        })
        .sum()
}

/// Collect the rows of a simple query response as JSON objects
fn collect_rows(messages: &[SimpleQueryMessage]) -> (Vec<String>, Vec<serde_json::Value>) {
    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::new();

    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            if columns.is_empty() {
                columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }

            let mut map = serde_json::Map::new();
            for (i, column) in columns.iter().enumerate() {
                let value = row
                    .get(i)
                    .map(|text| serde_json::Value::String(text.to_string()))
                    .unwrap_or(serde_json::Value::Null);
                map.insert(column.clone(), value);
            }
            rows.push(serde_json::Value::Object(map));
        }
    }

    (columns, rows)
}

#[async_trait(?Send)]
impl Warehouse for RedshiftBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Redshift
    }

    fn backend_type(&self) -> &'static str {
        "redshift"
    }

    async fn execute(&self, sql: &str) -> WarehouseResult<u64> {
        let messages = self
            .simple_query(sql)
            .await
            .map_err(|e| WarehouseError::QueryFailed(format!("Execute failed: {}", e)))?;

        Ok(rows_affected(&messages))
    }

    async fn execute_query(&self, sql: &str) -> WarehouseResult<QueryResult> {
        let start = std::time::Instant::now();

        let messages = self
            .simple_query(sql)
            .await
            .map_err(|e| WarehouseError::QueryFailed(format!("Query failed: {}", e)))?;

        let (columns, rows) = collect_rows(&messages);

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn copy_into(&self, copy: &StagingCopy) -> WarehouseResult<u64> {
        let messages =
            self.simple_query(&copy.to_sql())
                .await
                .map_err(|e| WarehouseError::LoadFailed {
                    table: copy.table.to_string(),
                    message: e.to_string(),
                })?;

        Ok(rows_affected(&messages))
    }

    async fn health_check(&self) -> WarehouseResult<bool> {
        let result = self.execute_query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }

    async fn close(&self) -> WarehouseResult<()> {
        // The connection task ends when the client is dropped
        Ok(())
    }
}
