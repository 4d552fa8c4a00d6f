//! ScyllaDB schema creation

use scylla::Session;

use crate::error::PersistenceError;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create the key-value table
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let kv_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.kv_store (
            entry_key TEXT,
            value_json TEXT,
            updated_at_ms BIGINT,
            PRIMARY KEY (entry_key)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(kv_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create kv_store table: {}", e)))?;

    Ok(())
}
