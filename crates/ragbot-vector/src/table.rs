//! LanceDB connection helpers.
use std::sync::Arc;

use arrow_schema::Schema;
use lancedb::{connect, Connection, Table};
use tracing::info;

use ragbot_core::{Error, Result, UpstreamKind};

pub(crate) const SERVICE: &str = "lancedb";

pub(crate) fn lance_err(e: impl std::fmt::Display) -> Error {
    Error::upstream(SERVICE, UpstreamKind::Transport, e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(lance_err)
}

/// Open `name`, creating it empty with `schema` when missing.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
    let names = conn.table_names().execute().await.map_err(lance_err)?;
    if names.iter().any(|n| n == name) {
        return conn.open_table(name).execute().await.map_err(lance_err);
    }
    match conn.create_empty_table(name, schema).execute().await {
        Ok(table) => {
            info!("Created LanceDB table: {}", name);
            Ok(table)
        }
        // created by someone else in the meantime
        Err(lancedb::Error::TableAlreadyExists { .. }) => conn.open_table(name).execute().await.map_err(lance_err),
        Err(e) => Err(lance_err(e)),
    }
}

/// Quote a string literal for a LanceDB SQL predicate.
pub fn sql_literal(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }
