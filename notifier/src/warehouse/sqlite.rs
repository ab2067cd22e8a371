use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{FieldSchema, JobEvent, JOB_EVENT_SCHEMA};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{RowError, TableRef, Warehouse};

/// Local table store. One database file stands in for one project, and
/// tables are named `<dataset>__<table>`.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    pub fn table_name(table: &TableRef) -> String {
        format!("{}__{}", table.dataset, table.table)
    }

    #[cfg(test)]
    pub fn count_rows(&self, table: &TableRef) -> Result<i64> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&Self::table_name(table)));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![Self::table_name(table)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn create_table(&self, table: &TableRef, schema: &[FieldSchema]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(&create_table_sql(&Self::table_name(table), schema), [])?;
        Ok(())
    }

    async fn insert_rows(&self, table: &TableRef, rows: &[JobEvent]) -> Result<Vec<RowError>> {
        let conn = self.lock()?;
        let columns: Vec<String> = JOB_EVENT_SCHEMA.iter().map(|f| quote_ident(f.name)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&Self::table_name(table)),
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;

        let mut errors = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let record = serde_json::to_value(row)?;
            let values: Vec<Option<String>> = JOB_EVENT_SCHEMA
                .iter()
                .map(|f| match record.get(f.name) {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Null) | None => None,
                    Some(other) => Some(other.to_string()),
                })
                .collect();

            if let Err(e) = stmt.execute(params_from_iter(values)) {
                errors.push(RowError {
                    index,
                    reason: "sqlite".to_string(),
                    location: None,
                    message: e.to_string(),
                });
            }
        }
        Ok(errors)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// STRING and TIMESTAMP both land in TEXT columns; timestamps keep the
/// warehouse format so they sort lexically. The first required column is the
/// primary key.
fn create_table_sql(table_name: &str, schema: &[FieldSchema]) -> String {
    let mut columns: Vec<String> = schema
        .iter()
        .map(|f| {
            let mut column = format!("{} TEXT", quote_ident(f.name));
            if f.is_required() {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect();
    if let Some(key) = schema.first().filter(|f| f.is_required()) {
        columns.push(format!("PRIMARY KEY ({})", quote_ident(key.name)));
    }
    format!("CREATE TABLE {} (\n    {}\n)", quote_ident(table_name), columns.join(",\n    "))
}
