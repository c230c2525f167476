use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use shared::{
    generate_run_id, publish_with_retry, Config, DiskCache, ExternalBrain, FacebookPublisher,
    InstagramPublisher, Post, ProgressLedger, Publisher, RetryPolicy, Status, WordPressPublisher,
};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const PHASE: &str = "post";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Platform {
    Facebook,
    Instagram,
    Wordpress,
}

impl Platform {
    fn slug(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Wordpress => "wordpress",
        }
    }

    fn publisher(&self, config: &Config) -> Result<Box<dyn Publisher>> {
        let publisher: Box<dyn Publisher> = match self {
            Platform::Facebook => Box::new(FacebookPublisher::new(config.facebook.clone())?),
            Platform::Instagram => Box::new(InstagramPublisher::new(config.instagram.clone())),
            Platform::Wordpress => Box::new(WordPressPublisher::new(config.wordpress.clone())?),
        };
        Ok(publisher)
    }
}

#[derive(Parser)]
#[command(name = "post")]
#[command(about = "Publish a single post to a social platform")]
struct Args {
    #[arg(short, long, value_enum)]
    platform: Platform,

    /// Post text
    #[arg(short, long, conflicts_with = "brain")]
    message: Option<String>,

    /// External assistant program that writes the post text
    #[arg(long, requires = "prompt")]
    brain: Option<PathBuf>,

    /// What the assistant should write about
    #[arg(long, requires = "brain")]
    prompt: Option<String>,

    /// Post title (WordPress)
    #[arg(short, long)]
    title: Option<String>,

    /// Image to attach
    #[arg(short, long)]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let output_dir = config.ensure_output_dir()?;
    let ledger = ProgressLedger::new(&output_dir);

    let run_id = generate_run_id("single_post");
    let platform = args.platform.slug();
    ledger.log(
        &run_id,
        PHASE,
        "start",
        Status::Started,
        format!("Posting to {}", platform),
    )?;

    match run_post(&args, &config, &ledger, &run_id).await {
        Ok(summary) => {
            println!("✅ {}", summary);
            Ok(())
        }
        Err(e) => {
            if let Err(log_err) =
                ledger.log(&run_id, PHASE, "error", Status::Error, format!("{:#}", e))
            {
                warn!(error = %log_err, "failed to record post error");
            }
            Err(e)
        }
    }
}

async fn resolve_message(
    args: &Args,
    config: &Config,
    ledger: &ProgressLedger,
    run_id: &str,
) -> Result<String> {
    if let Some(message) = &args.message {
        return Ok(message.clone());
    }

    let (Some(program), Some(prompt)) = (&args.brain, &args.prompt) else {
        anyhow::bail!("Provide --message, or --brain together with --prompt");
    };

    println!("🤖 Asking {} for post text...", program.display());
    let cache = DiskCache::in_output_dir(&config.output_dir)?;
    let brain = ExternalBrain::new(program).with_cache(cache);
    let text = brain
        .social_post(args.platform.slug(), prompt)
        .await
        .context("External brain failed to write the post")?;
    ledger.log(
        run_id,
        PHASE,
        "brain",
        Status::Success,
        "Generated post text",
    )?;
    Ok(text)
}

async fn run_post(
    args: &Args,
    config: &Config,
    ledger: &ProgressLedger,
    run_id: &str,
) -> Result<String> {
    let message = resolve_message(args, config, ledger, run_id).await?;
    let publisher = args.platform.publisher(config)?;

    let post = Post {
        title: args.title.as_deref().unwrap_or("Post"),
        message: &message,
        image: args.image.as_deref(),
    };

    let receipt = publish_with_retry(publisher.as_ref(), &post, RetryPolicy::default())
        .await
        .with_context(|| format!("Failed to post to {}", publisher.platform()))?;

    let summary = match (args.platform, receipt.id) {
        (Platform::Wordpress, Some(id)) => format!("WordPress post ID {}", id),
        _ => format!("Posted to {}", receipt.platform),
    };
    ledger.log(run_id, PHASE, receipt.platform, Status::Success, summary.clone())?;
    Ok(summary)
}
