use crate::config::AppConfig;
use crate::data::{Database, SessionSink};
use crate::report::{dated_export_name, generate_csv, save_report};
use freelytics_scanner::{Assembler, CrawlStats, PageKind, Spider};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub config: AppConfig,
    /// Directory receiving the dated CSV export, if any
    pub output_dir: Option<PathBuf>,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub session_id: String,
    pub stats: CrawlStats,
    pub exported: Option<PathBuf>,
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Execute one crawl session against `db`.
///
/// The session is marked completed or failed before this returns.
pub async fn execute_crawl(
    options: CrawlOptions,
    db: Arc<Database>,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutcome, String> {
    let CrawlOptions {
        config,
        output_dir,
        show_progress_bars,
    } = options;

    config.validate().map_err(|e| e.to_string())?;
    let selectors = config.selectors().map_err(|e| e.to_string())?;
    let start_urls = config.search.start_urls().map_err(|e| e.to_string())?;

    let configuration = serde_json::to_string(&config).ok();
    let session_id = db
        .create_session(&start_urls, configuration.as_deref())
        .map_err(|e| format!("Failed to create crawl session: {}", e))?;
    info!("Crawl session {} started", session_id);

    if let Some(ref callback) = progress_callback {
        callback(format!("Crawling {} search url(s)", start_urls.len()));
    }

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let listing_count = Arc::new(AtomicUsize::new(0));
    let detail_count = Arc::new(AtomicUsize::new(0));

    let mut spider = Spider::new()
        .with_max_pages(config.crawl.max_pages)
        .with_workers(config.crawl.workers)
        .with_timeout(config.crawl.timeout_secs)
        .with_user_agent(config.crawl.user_agent.clone())
        .with_selectors(selectors);

    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let listing_count = listing_count.clone();
        let detail_count = detail_count.clone();
        spider = spider.with_progress_callback(Arc::new(move |kind: PageKind, _url: String| {
            match kind {
                PageKind::Listing => listing_count.fetch_add(1, Ordering::Relaxed),
                PageKind::Detail => detail_count.fetch_add(1, Ordering::Relaxed),
            };
            pb.set_message(format!(
                "Crawling... {} listing pages, {} job pages",
                listing_count.load(Ordering::Relaxed),
                detail_count.load(Ordering::Relaxed)
            ));
        }));
    }

    let sink = Arc::new(SessionSink::new(db.clone(), session_id.clone()));
    let assembler = Arc::new(Assembler::new(sink, config.normalize_rules()));

    let stats = match spider.crawl(&config.search, assembler).await {
        Ok(stats) => stats,
        Err(e) => {
            if let Some(ref pb) = progress_bar {
                pb.finish_and_clear();
            }
            if let Err(db_err) = db.fail_session(&session_id, &e.to_string()) {
                warn!("Failed to mark session {} as failed: {}", session_id, db_err);
            }
            return Err(format!("Crawl failed: {}", e));
        }
    };

    db.complete_session(&session_id, &stats)
        .map_err(|e| format!("Failed to complete crawl session: {}", e))?;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete! {} records stored",
            stats.assembly.emitted
        ));
    }

    let exported = match output_dir {
        Some(dir) => {
            let path = dir.join(dated_export_name(chrono::Local::now().date_naive()));
            let records = db
                .get_records_by_session(&session_id)
                .map_err(|e| format!("Failed to read records: {}", e))?;
            save_report(&generate_csv(&records), &path)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            info!("Exported {} records to {}", records.len(), path.display());
            Some(path)
        }
        None => None,
    };

    Ok(CrawlOutcome {
        session_id,
        stats,
        exported,
    })
}

/// Generate a crawl summary from the outcome
pub fn generate_crawl_summary(outcome: &CrawlOutcome) -> String {
    let stats = &outcome.stats;
    let bar = "━".repeat(52);

    let mut report = String::new();
    report.push_str(&format!("{}\n\n", bar));
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Session: {}\n", outcome.session_id));
    report.push_str(&format!(
        "  Listing pages: {} ({} failed)\n",
        stats.listing_pages, stats.listing_failures
    ));
    report.push_str(&format!(
        "  Job cards: {} ({} malformed)\n",
        stats.stubs, stats.skipped_cards
    ));
    report.push_str(&format!(
        "  Job pages: {} ({} failed)\n",
        stats.detail_pages, stats.detail_failures
    ));
    report.push_str(&format!("  Records stored: {}\n", stats.assembly.emitted));

    let dropped = stats.assembly.unmatched + stats.assembly.incomplete;
    if dropped > 0 || stats.assembly.duplicates > 0 {
        report.push_str(&format!(
            "  Dropped: {} unmatched, {} incomplete, {} duplicates\n",
            stats.assembly.unmatched, stats.assembly.incomplete, stats.assembly.duplicates
        ));
    }

    if let Some(ref path) = outcome.exported {
        report.push_str(&format!("  Exported to: {}\n", path.display()));
    }

    report.push_str(&format!("\n{}\n", bar));
    report
}
