mod bigquery;
mod sqlite;

pub use bigquery::BigQueryWarehouse;
pub use sqlite::SqliteWarehouse;

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{ActionInputs, FieldSchema, JobEvent, JOB_EVENT_SCHEMA};

use crate::config::{Backend, WarehouseConfig};

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn from_inputs(inputs: &ActionInputs) -> Self {
        Self {
            project: inputs.project.clone(),
            dataset: inputs.dataset.clone(),
            table: inputs.table.clone(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A rejection reported by the warehouse for one row of an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub index: usize,
    pub reason: String,
    pub location: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.index, self.reason)?;
        if let Some(ref location) = self.location {
            write!(f, " at {}", location)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Result of the insert step. Never an error: insert problems are reported,
/// not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertReport {
    Inserted(usize),
    RowErrors(Vec<RowError>),
    Failed(String),
}

impl InsertReport {
    pub fn is_clean(&self) -> bool {
        matches!(self, InsertReport::Inserted(_))
    }
}

impl std::fmt::Display for InsertReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertReport::Inserted(n) => write!(f, "inserted {} row(s)", n),
            InsertReport::RowErrors(errors) => {
                write!(f, "{} row error(s)", errors.len())?;
                for error in errors {
                    write!(f, "; {}", error)?;
                }
                Ok(())
            }
            InsertReport::Failed(reason) => write!(f, "insert failed: {}", reason),
        }
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// `Ok(false)` only when the table is known to be absent. Any other
    /// failure (permissions, transport) is an error.
    async fn table_exists(&self, table: &TableRef) -> Result<bool>;

    async fn create_table(&self, table: &TableRef, schema: &[FieldSchema]) -> Result<()>;

    /// Returns per-row rejections; `Err` means the insert call itself failed.
    async fn insert_rows(&self, table: &TableRef, rows: &[JobEvent]) -> Result<Vec<RowError>>;
}

pub fn connect(config: &WarehouseConfig) -> Result<Box<dyn Warehouse>> {
    match config.backend {
        Backend::Bigquery => {
            let warehouse = BigQueryWarehouse::new(config)?;
            Ok(Box::new(warehouse))
        }
        Backend::Sqlite => {
            let warehouse = SqliteWarehouse::open(&config.sqlite_path)
                .with_context(|| format!("Failed to open sqlite database {:?}", config.sqlite_path))?;
            Ok(Box::new(warehouse))
        }
    }
}

pub struct TableWriter<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> TableWriter<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Create the table with the job events schema unless it exists.
    /// Returns whether it was created.
    pub async fn ensure_table(&self, table: &TableRef) -> Result<bool> {
        let exists = self
            .warehouse
            .table_exists(table)
            .await
            .with_context(|| format!("Failed to check whether table {} exists", table))?;
        if exists {
            return Ok(false);
        }

        self.warehouse
            .create_table(table, &JOB_EVENT_SCHEMA)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;
        log::info!("Created table {}", table);
        Ok(true)
    }

    /// Ensure the table, then append `rows`. Table setup failures propagate;
    /// insert failures are logged and returned in the report.
    pub async fn write(&self, table: &TableRef, rows: &[JobEvent]) -> Result<InsertReport> {
        self.ensure_table(table).await?;

        let report = match self.warehouse.insert_rows(table, rows).await {
            Ok(errors) if errors.is_empty() => {
                log::info!("New rows have been added: {} row(s) into {}", rows.len(), table);
                InsertReport::Inserted(rows.len())
            }
            Ok(errors) => {
                for error in &errors {
                    log::error!("Encountered errors while inserting rows into {}: {}", table, error);
                }
                InsertReport::RowErrors(errors)
            }
            Err(e) => {
                log::error!("Encountered errors while inserting rows into {}: {:#}", table, e);
                InsertReport::Failed(format!("{:#}", e))
            }
        };
        Ok(report)
    }
}
