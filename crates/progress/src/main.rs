use anyhow::{Context, Result};
use clap::Parser;
use shared::{Config, ProgressLedger, ProgressRecord};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "progress")]
#[command(about = "Show recent progress records or summarize one run")]
struct Args {
    /// Run ID to summarize
    #[arg(short, long)]
    run_id: Option<String>,

    /// Number of most recent records to show when no run ID is given
    #[arg(short, long, default_value = "50")]
    tail: usize,
}

fn format_record(record: &ProgressRecord) -> String {
    format!(
        "{} | {}:{} | {} | {}",
        record.run_id, record.phase, record.step, record.status, record.message
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let ledger = ProgressLedger::new(&config.output_dir);
    debug!(path = %ledger.path().display(), "reading progress ledger");

    if let Some(run_id) = args.run_id {
        let summary = ledger
            .summarize_run(&run_id)
            .context("Failed to read progress ledger")?;
        let json =
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?;
        println!("{}", json);
        return Ok(());
    }

    let records = ledger
        .tail(args.tail)
        .context("Failed to read progress ledger")?;
    if records.is_empty() {
        println!("No progress records in {}", ledger.path().display());
        return Ok(());
    }
    for record in &records {
        println!("{}", format_record(record));
    }

    Ok(())
}
