use anyhow::Context;
use clap::Parser;
use mog_crawler::app::ports::{EventStore, GenerativeModel, ListingSource, PageCapturer, SheetSink};
use mog_crawler::config::CrawlerConfig;
use mog_crawler::infra::browser::BrowserSession;
use mog_crawler::infra::gemini::GeminiClient;
use mog_crawler::infra::sheets::GoogleSheetsSink;
use mog_crawler::infra::supabase::SupabaseEventStore;
use mog_crawler::logging;
use mog_crawler::pipeline::{
    EventFilter, ModelPolicy, PersistStatus, PersistenceSinks, Pipeline, RunOptions, RunSummary,
    VisionExtractor,
};
use mog_crawler::types::CinemaChain;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mog_crawler")]
#[command(about = "Lotte Cinema goods-event crawler")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML file with crawler and model tunables
    #[arg(long, default_value = "crawler.toml")]
    config: PathBuf,

    /// Crawl and extract but write nothing to the sheet or database
    #[arg(long)]
    dry_run: bool,

    /// Leave screenshots in the screenshot directory after processing
    #[arg(long)]
    keep_screenshots: bool,

    /// Directory for the rotating JSON log
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&cli.log_dir);

    // configuration problems stop the run before any network activity;
    // returning drops the log guard so the error reaches the file
    let config = match CrawlerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration invalid: {}", e);
            eprintln!("❌ {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let settings = &config.settings;
    let credentials = &config.credentials;

    println!("🚀 Starting Lotte Cinema event crawl...");

    let store: Arc<dyn EventStore> = Arc::new(
        SupabaseEventStore::from_credentials(credentials)
            .context("Failed to create Supabase client")?,
    );
    let sheet: Arc<dyn SheetSink> = Arc::new(
        GoogleSheetsSink::from_credentials(credentials)
            .context("Failed to create Google Sheets client")?,
    );
    let model: Arc<dyn GenerativeModel> = Arc::new(
        GeminiClient::new(&credentials.gemini_api_key).context("Failed to create Gemini client")?,
    );

    let browser = Arc::new(
        BrowserSession::launch(&settings.crawler)
            .await
            .context("Failed to launch browser")?,
    );

    let pipeline = Pipeline {
        listing: browser.clone() as Arc<dyn ListingSource>,
        capturer: browser.clone() as Arc<dyn PageCapturer>,
        extractor: VisionExtractor::new(model, ModelPolicy::from(&settings.models)),
        store: store.clone(),
        sinks: PersistenceSinks::new(sheet, store, CinemaChain::Lotte),
        filter: EventFilter::new(settings.crawler.keywords.iter().cloned()),
    };

    let options = RunOptions {
        today: chrono::Local::now().date_naive(),
        item_delay: settings.crawler.item_delay(),
        dry_run: cli.dry_run,
        keep_screenshots: cli.keep_screenshots,
    };
    if options.dry_run {
        info!("Dry run: nothing will be written to the sheet or database");
    }

    let summary = pipeline.run(&options).await;
    drop(pipeline);
    print_summary(&summary, options.dry_run);

    match Arc::try_unwrap(browser) {
        Ok(session) => session.close().await,
        Err(_) => warn!("Browser still referenced at shutdown, leaving it to exit with the process"),
    }

    println!("✨ Crawl finished");
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!("\n📊 Run summary:");
    println!("   Already stored: {}", summary.existing_urls);
    println!("   Discovered: {}", summary.discovered);
    println!(
        "   Filtered out: {} without keyword, {} ended, {} already stored",
        summary.filter.missing_keyword, summary.filter.ended, summary.filter.already_stored
    );
    println!("   Processed: {}", summary.processed);
    println!("   Screenshot failures: {}", summary.capture_failures);
    println!("   Extraction fallbacks: {}", summary.extraction_fallbacks);
    println!("   Model calls: {}", summary.model_calls);
    for (model, count) in &summary.model_usage {
        println!("     {}: {} events", model, count);
    }

    if dry_run {
        println!("   Persistence skipped (dry run)");
        return;
    }
    println!(
        "   Persisted: {} complete, {} sheet only, {} database only, {} failed",
        summary.persisted(PersistStatus::Complete),
        summary.persisted(PersistStatus::SheetOnly),
        summary.persisted(PersistStatus::DatabaseOnly),
        summary.persisted(PersistStatus::Failed)
    );
    if summary.persisted(PersistStatus::Failed) > 0 {
        println!("\n⚠️  Some events were not persisted anywhere, see the log for details");
    }
}
