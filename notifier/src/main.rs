mod config;
mod gate;
mod payload;
mod runner;
mod warehouse;

use anyhow::bail;
use common::{ActionInputs, CiContext};
use config::{LoggingConfig, Settings};
use runner::RunOutcome;
use warehouse::InsertReport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    setup_logging(&settings.logging)?;
    log::info!("Starting bq-notify...");
    log::debug!("Settings: {:?}", settings);

    let inputs = ActionInputs::from_env()?;
    let ci = CiContext::from_env();
    log::info!(
        "Job {} finished with status {} (repo: {}, ref: {}, commit: {})",
        inputs.job_name,
        inputs.job_status,
        ci.repository.as_deref().unwrap_or("-"),
        ci.git_ref.as_deref().unwrap_or("-"),
        ci.short_sha().unwrap_or("-"),
    );

    let warehouse_config = settings.warehouse.clone();
    let outcome = runner::run(&inputs, &ci, &settings.behavior, || {
        warehouse::connect(&warehouse_config)
    })
    .await?;

    match outcome {
        RunOutcome::Skipped => log::info!("Nothing recorded"),
        RunOutcome::DryRun(rows) => log::info!("Dry run finished, {} row(s) built", rows.len()),
        RunOutcome::Written(InsertReport::Inserted(n)) => log::info!("Recorded {} row(s)", n),
        RunOutcome::Written(report) => {
            if settings.behavior.fail_on_insert_error {
                bail!("Insert did not complete cleanly: {}", report);
            }
            log::warn!("Insert did not complete cleanly ({}), exiting successfully", report);
        }
    }

    Ok(())
}

fn setup_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d][%H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(logging.level_filter()?)
        .chain(std::io::stdout());

    if let Some(ref path) = logging.output {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
