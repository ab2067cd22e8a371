use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{ActionInputs, CiContext, JobEvent, JobId};

/// Build the single-row payload for this invocation.
pub fn build_payload(inputs: &ActionInputs, ci: &CiContext) -> Result<Vec<JobEvent>> {
    build_payload_at(inputs, ci, Utc::now())
}

pub fn build_payload_at(
    inputs: &ActionInputs,
    ci: &CiContext,
    now: DateTime<Utc>,
) -> Result<Vec<JobEvent>> {
    let event = JobEvent::new(JobId::generate(), now, inputs, ci)
        .context("Failed to build job event")?;
    Ok(vec![event])
}

/// JSON array form of the payload, as logged and as sent to the warehouse.
pub fn to_transport(rows: &[JobEvent]) -> Result<String> {
    serde_json::to_string(rows).context("Failed to serialize payload")
}
