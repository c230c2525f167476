use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use serde_json::{Map, Value};
use shared::{
    compose_message, extract_quotes, generate_quote_tiles, generate_run_id, load_ocr_text,
    load_quotes_file, publish_with_retry, score_quotes, Config, FacebookPublisher, Post,
    ProgressLedger, Publisher, RetryPolicy, Status, SvgTileRenderer, WordPressPublisher,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PHASE: &str = "campaign";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    /// Keep quotes in source order
    Default,
    /// Rank quotes by salience score
    Salience,
}

#[derive(Parser)]
#[command(name = "run-campaign")]
#[command(about = "Rank quotes, render quote tiles and optionally post them")]
#[command(group(ArgGroup::new("source").required(true).args(["quotes_file", "ocr_text"])))]
struct Args {
    /// Book title used in captions and hashtags
    #[arg(long)]
    title: Option<String>,

    /// Author shown on tiles and captions
    #[arg(long)]
    author: Option<String>,

    /// Text file with one quote per line
    #[arg(long)]
    quotes_file: Option<PathBuf>,

    /// OCR output text to pull quoted passages from
    #[arg(long)]
    ocr_text: Option<PathBuf>,

    /// Directory for generated tiles (defaults to OUTPUT_DIR)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Only use the first N quotes after ranking
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = Algorithm::Salience)]
    algorithm: Algorithm,

    /// Post each tile to the Facebook page
    #[arg(long)]
    post_facebook: bool,

    /// Publish each tile as a WordPress post
    #[arg(long)]
    post_wordpress: bool,
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

    let run_id = generate_run_id(PHASE);
    match run_campaign(&args, &config, &ledger, &run_id, &output_dir).await {
        Ok(tile_dir) => {
            println!("\n✅ Campaign assets in {}", tile_dir.display());
            println!("Run ID: {}", run_id);
            Ok(())
        }
        Err(e) => {
            eprintln!("Run ID: {}", run_id);
            Err(e)
        }
    }
}

/// Run one campaign, bracketed by `start` and either `done` or `error` records
async fn run_campaign(
    args: &Args,
    config: &Config,
    ledger: &ProgressLedger,
    run_id: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    ledger.log(run_id, PHASE, "start", Status::Started, "Campaign started")?;
    info!(run_id, env = %config.environment, "campaign started");

    let result = campaign_steps(args, config, ledger, run_id, output_dir).await;
    if let Err(e) = &result {
        if let Err(log_err) = ledger.log(run_id, PHASE, "error", Status::Error, format!("{:#}", e))
        {
            warn!(error = %log_err, "failed to record campaign error");
        }
    }
    result
}

fn load_quotes(args: &Args, ledger: &ProgressLedger, run_id: &str) -> Result<Vec<String>> {
    if let Some(path) = &args.ocr_text {
        println!("🔍 Extracting quotes from OCR text...");
        let text = load_ocr_text(path)?;
        let quotes = extract_quotes(&text);
        ledger.log(
            run_id,
            PHASE,
            "ocr",
            Status::Success,
            format!("Extracted {} quotes", quotes.len()),
        )?;
        return Ok(quotes);
    }

    if let Some(path) = &args.quotes_file {
        println!("📚 Loading quotes from {}...", path.display());
        let quotes = load_quotes_file(path)?;
        ledger.log(
            run_id,
            PHASE,
            "load_quotes",
            Status::Success,
            format!("Loaded {} quotes from file", quotes.len()),
        )?;
        return Ok(quotes);
    }

    Ok(Vec::new())
}

async fn campaign_steps(
    args: &Args,
    config: &Config,
    ledger: &ProgressLedger,
    run_id: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let mut quotes = load_quotes(args, ledger, run_id)?;
    if quotes.is_empty() {
        ledger.log(run_id, PHASE, "no_quotes", Status::Error, "No quotes found")?;
        anyhow::bail!("No quotes found. Provide --ocr-text or --quotes-file.");
    }
    println!("✓ Found {} quotes", quotes.len());

    if args.algorithm == Algorithm::Salience {
        println!("\n📈 Ranking quotes by salience...");
        let ranked = score_quotes(&quotes);
        let mut extra = Map::new();
        extra.insert(
            "top_example".to_string(),
            ranked
                .first()
                .map(|top| top.details_json())
                .unwrap_or_else(|| Value::Object(Map::new())),
        );
        for (i, qs) in ranked.iter().take(3).enumerate() {
            info!(rank = i + 1, score = qs.score, quote = %qs.quote, "ranked quote");
        }
        quotes = ranked.into_iter().map(|qs| qs.quote).collect();
        ledger.log_extra(
            run_id,
            PHASE,
            "rank",
            Status::Success,
            "Quotes ranked by salience",
            extra,
        )?;
    }

    if let Some(limit) = args.limit.filter(|l| *l > 0) {
        quotes.truncate(limit);
        ledger.log(
            run_id,
            PHASE,
            "limit",
            Status::Info,
            format!("Limited to {} quotes", quotes.len()),
        )?;
    }

    let title = args.title.as_deref().unwrap_or("");
    let author = args.author.as_deref().unwrap_or("");

    println!("\n🎨 Rendering quote tiles...");
    let tile_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| output_dir.to_path_buf())
        .join("campaign");
    let tiles = generate_quote_tiles(&SvgTileRenderer::default(), &quotes, author, &tile_dir)
        .context("Failed to render quote tiles")?;
    let mut extra = Map::new();
    extra.insert(
        "dir".to_string(),
        Value::from(tile_dir.display().to_string()),
    );
    ledger.log_extra(
        run_id,
        PHASE,
        "tiles",
        Status::Success,
        format!("Generated {} tiles", tiles.len()),
        extra,
    )?;
    println!("✓ Generated {} tiles", tiles.len());

    let facebook = if args.post_facebook {
        Some(FacebookPublisher::new(config.facebook.clone())?)
    } else {
        None
    };
    let wordpress = if args.post_wordpress {
        Some(WordPressPublisher::new(config.wordpress.clone())?)
    } else {
        None
    };

    if facebook.is_some() || wordpress.is_some() {
        println!("\n📣 Publishing...");
    }

    let wp_title = format!("{} — Quote", if title.is_empty() { "Book" } else { title });
    let policy = RetryPolicy::default();

    for (idx, (quote, tile)) in quotes.iter().zip(&tiles).enumerate() {
        let idx = idx + 1;
        let message = compose_message(title, author, quote, &[]);
        let tile_name = tile
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if let Some(publisher) = &facebook {
            let post = Post {
                title,
                message: &message,
                image: Some(tile.as_path()),
            };
            publish(publisher, &post, policy, &tile_name).await?;
            ledger.log(
                run_id,
                PHASE,
                &format!("fb_{}", idx),
                Status::Success,
                format!("Posted {}", tile_name),
            )?;
        }

        if let Some(publisher) = &wordpress {
            let post = Post {
                title: &wp_title,
                message: &message,
                image: Some(tile.as_path()),
            };
            publish(publisher, &post, policy, &tile_name).await?;
            ledger.log(
                run_id,
                PHASE,
                &format!("wp_{}", idx),
                Status::Success,
                format!("Posted {}", tile_name),
            )?;
        }
    }

    ledger.log(run_id, PHASE, "done", Status::Success, "Campaign finished")?;
    Ok(tile_dir)
}

async fn publish(
    publisher: &dyn Publisher,
    post: &Post<'_>,
    policy: RetryPolicy,
    tile_name: &str,
) -> Result<()> {
    let receipt = publish_with_retry(publisher, post, policy)
        .await
        .with_context(|| format!("Failed to post {} to {}", tile_name, publisher.platform()))?;
    println!(
        "  ✓ {} → {}{}",
        tile_name,
        receipt.platform,
        receipt
            .id
            .map(|id| format!(" (id {})", id))
            .unwrap_or_default()
    );
    Ok(())
}
