use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use common::{FieldSchema, JobEvent};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::{RowError, TableRef, Warehouse};
use crate::config::WarehouseConfig;

/// BigQuery REST v2 backend.
#[derive(Clone)]
pub struct BigQueryWarehouse {
    api_url: String,
    access_token: Option<String>,
    client: Client,
}

impl std::fmt::Debug for BigQueryWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryWarehouse")
            .field("api_url", &self.api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BigQueryWarehouse {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("bq-notify/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build BigQuery HTTP client")?;

        if config.access_token.is_none() {
            log::warn!("No access token configured, sending unauthenticated requests to {}", config.api_url);
        }

        Ok(Self {
            api_url: config.api_url.clone(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        format!("{}/{}", base, suffix)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.access_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = self
            .authorize(request)
            .send()
            .await
            .context("BigQuery API request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("BigQuery API response read failed")?;
        Ok((status, body))
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let request = self.client.get(self.endpoint(&table_path(table)));
        let (status, body) = self.send(request).await?;

        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => bail!("BigQuery tables.get for {} failed with status {}: {}", table, s, body),
        }
    }

    async fn create_table(&self, table: &TableRef, schema: &[FieldSchema]) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint(&dataset_tables_path(table)))
            .json(&table_resource(table, schema));
        let (status, body) = self.send(request).await?;

        if !status.is_success() {
            bail!("BigQuery tables.insert for {} failed with status {}: {}", table, status, body);
        }
        Ok(())
    }

    async fn insert_rows(&self, table: &TableRef, rows: &[JobEvent]) -> Result<Vec<RowError>> {
        let request = self
            .client
            .post(self.endpoint(&format!("{}/insertAll", table_path(table))))
            .json(&insert_all_body(rows)?);
        let (status, body) = self.send(request).await?;

        if !status.is_success() {
            bail!("BigQuery insertAll for {} failed with status {}: {}", table, status, body);
        }

        let response: Value = serde_json::from_str(&body)
            .map_err(|e| anyhow!("BigQuery insertAll response was malformed JSON: {}", e))?;
        Ok(parse_insert_errors(&response))
    }
}

fn dataset_tables_path(table: &TableRef) -> String {
    format!("projects/{}/datasets/{}/tables", table.project, table.dataset)
}

fn table_path(table: &TableRef) -> String {
    format!("{}/{}", dataset_tables_path(table), table.table)
}

fn table_resource(table: &TableRef, schema: &[FieldSchema]) -> Value {
    json!({
        "tableReference": {
            "projectId": table.project,
            "datasetId": table.dataset,
            "tableId": table.table,
        },
        "schema": { "fields": schema },
    })
}

/// `tabledata.insertAll` body. The job id is used as the insert id so a
/// replayed request is de-duplicated by the service.
fn insert_all_body(rows: &[JobEvent]) -> Result<Value> {
    let rows = rows
        .iter()
        .map(|row| -> Result<Value> {
            Ok(json!({
                "insertId": row.job_id().0,
                "json": serde_json::to_value(row)?,
            }))
        })
        .collect::<Result<Vec<Value>>>()
        .context("Failed to serialize rows for insertAll")?;
    Ok(json!({ "rows": rows }))
}

fn parse_insert_errors(response: &Value) -> Vec<RowError> {
    let mut errors = Vec::new();
    let Some(entries) = response.get("insertErrors").and_then(Value::as_array) else {
        return errors;
    };

    for entry in entries {
        let index = entry.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
        let details = entry
            .get("errors")
            .and_then(Value::as_array)
            .map(|d| d.as_slice())
            .unwrap_or_default();

        if details.is_empty() {
            errors.push(RowError {
                index,
                reason: "unknown".to_string(),
                location: None,
                message: entry.to_string(),
            });
            continue;
        }

        for detail in details {
            let field = |name: &str| {
                detail
                    .get(name)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            errors.push(RowError {
                index,
                reason: field("reason").unwrap_or_else(|| "unknown".to_string()),
                location: field("location"),
                message: field("message").unwrap_or_default(),
            });
        }
    }
    errors
}
