use anyhow::Result;
use common::{ActionInputs, CiContext, JobEvent};

use crate::config::BehaviorConfig;
use crate::gate::should_notify;
use crate::payload::{build_payload, to_transport};
use crate::warehouse::{InsertReport, TableRef, TableWriter, Warehouse};

#[derive(Debug)]
pub enum RunOutcome {
    /// Status not in the notify-when list; nothing was contacted.
    Skipped,
    DryRun(Vec<JobEvent>),
    Written(InsertReport),
}

/// Build the event and, when the gate allows it, write it. `connect` is only
/// called when a write is actually attempted.
pub async fn run<F>(
    inputs: &ActionInputs,
    ci: &CiContext,
    behavior: &BehaviorConfig,
    connect: F,
) -> Result<RunOutcome>
where
    F: FnOnce() -> Result<Box<dyn Warehouse>>,
{
    let rows = build_payload(inputs, ci)?;
    for row in &rows {
        log::info!(
            "Job event {} at {}: {} / {}: {}",
            row.job_id(),
            row.formatted_date(),
            row.job_name(),
            row.job_title(),
            row.job_message()
        );
    }

    if !should_notify(&inputs.job_status, &inputs.notify_when) {
        log::info!(
            "Job status '{}' not in notify_when '{}', nothing to record",
            inputs.job_status, inputs.notify_when
        );
        return Ok(RunOutcome::Skipped);
    }

    let table = TableRef::from_inputs(inputs);
    if behavior.dry_run {
        log::info!("Dry run, would insert into {}: {}", table, to_transport(&rows)?);
        return Ok(RunOutcome::DryRun(rows));
    }

    log::debug!("Payload: {}", to_transport(&rows)?);
    let warehouse = connect()?;
    let report = TableWriter::new(warehouse.as_ref()).write(&table, &rows).await?;
    Ok(RunOutcome::Written(report))
}
