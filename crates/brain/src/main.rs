use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use shared::{Config, DiskCache, ExternalBrain};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brain")]
#[command(about = "Send one command to an external assistant program and print its reply")]
struct Args {
    /// Assistant program to run
    #[arg(short, long)]
    path: PathBuf,

    /// Command text sent to the assistant
    #[arg(short, long)]
    command: String,

    /// Context entries as KEY=VALUE
    #[arg(long = "context", value_parser = parse_context_entry)]
    context: Vec<(String, String)>,

    /// Always run the program, ignoring cached replies
    #[arg(long)]
    no_cache: bool,
}

fn parse_context_entry(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

fn context_map(entries: &[(String, String)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut brain = ExternalBrain::new(&args.path);
    if !args.no_cache {
        let config = Config::from_env();
        let output_dir = config.ensure_output_dir()?;
        brain = brain.with_cache(DiskCache::in_output_dir(&output_dir)?);
    }

    debug!(program = %args.path.display(), command = %args.command, "asking brain");
    let reply = brain
        .execute(&args.command, context_map(&args.context))
        .await
        .with_context(|| format!("{} failed", args.path.display()))?;
    println!("{}", reply);
    Ok(())
}
