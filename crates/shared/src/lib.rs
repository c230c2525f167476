// Public modules
pub mod brain;
pub mod cache;
pub mod config;
pub mod extractor;
pub mod io;
pub mod ledger;
pub mod models;
pub mod publish;
pub mod selection;
pub mod tiles;

// Re-export commonly used types
pub use brain::{BrainError, ExternalBrain};
pub use cache::DiskCache;
pub use config::Config;
pub use extractor::extract_quotes;
pub use io::{load_ocr_text, load_quotes_file};
pub use ledger::{generate_run_id, LedgerError, ProgressLedger};
pub use models::{PhaseRecords, ProgressRecord, RunSummary, Status};
pub use publish::{
    publish_with_retry, FacebookPublisher, InstagramPublisher, Post, PublishError,
    PublishReceipt, Publisher, RetryPolicy, WordPressPublisher,
};
pub use selection::{compose_variants, score_quotes, QuoteScore};
pub use tiles::{compose_message, generate_quote_tiles, SvgTileRenderer, TileRenderer};
