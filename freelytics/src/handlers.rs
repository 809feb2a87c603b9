use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use freelytics_core::config::{AppConfig, CONFIG_FILE_NAME, DATABASE_FILE_NAME, DEFAULT_CONFIG_DIR};
use freelytics_core::crawl::{CrawlOptions, execute_crawl, generate_crawl_summary};
use freelytics_core::data::{Database, SessionInfo};
use freelytics_core::report::{ReportFormat, render_records, save_report};
use freelytics_scanner::parser::parse_page;
use freelytics_scanner::{PageKind, ParsedPage, SelectorConfig, Selectors};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

// Helper functions shared by the handlers

/// Config file to use: the explicit `--config` path or the default location
pub fn resolve_config_path(config_arg: Option<&PathBuf>) -> PathBuf {
    config_arg.cloned().unwrap_or_else(AppConfig::default_path)
}

/// Load and validate the config file.
pub fn load_config(config_arg: Option<&PathBuf>) -> Result<AppConfig> {
    let path = resolve_config_path(config_arg);
    if config_arg.is_none() && !path.exists() {
        bail!(
            "No config file at {}. Run `freelytics init` or pass --config",
            path.display()
        );
    }
    AppConfig::load(&path).with_context(|| format!("Loading {}", path.display()))
}

/// Database file to use.
///
/// `--db` wins, then `storage.database` from the config, then the default
/// location when no config file exists.
pub fn resolve_database_path(
    config_arg: Option<&PathBuf>,
    db_arg: Option<&PathBuf>,
) -> Result<PathBuf> {
    if let Some(db) = db_arg {
        return Ok(db.clone());
    }

    let config_path = resolve_config_path(config_arg);
    if config_arg.is_some() || config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Reading {}", config_path.display()))?;
        let config = AppConfig::parse(&content)?;
        return Ok(config.database_path());
    }

    Ok(default_dir().join(DATABASE_FILE_NAME))
}

fn default_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_DIR).as_ref())
}

/// Open a database that `init` or `crawl` already created.
pub fn open_existing_database(path: &Path) -> Result<Database> {
    if !Database::exists(path) {
        bail!(
            "No database at {}. Run `freelytics init` or `freelytics crawl` first",
            path.display()
        );
    }
    Database::new(path).with_context(|| format!("Opening database {}", path.display()))
}

/// Apply command line overrides on top of the config file values
pub fn apply_crawl_overrides(
    config: &mut AppConfig,
    max_pages: Option<usize>,
    workers: Option<usize>,
) {
    if let Some(max_pages) = max_pages {
        config.crawl.max_pages = max_pages;
    }
    if let Some(workers) = workers {
        config.crawl.workers = workers;
    }
}

/// Parse one saved page and render what was extracted as pretty JSON.
pub fn parse_saved_page(
    kind: PageKind,
    html: &str,
    page_url: &Url,
    selectors: &Selectors,
) -> Result<String> {
    let parsed = parse_page(kind, html, page_url.as_str(), selectors)?;
    let json = match parsed {
        ParsedPage::Listing(page) => serde_json::to_string_pretty(&page)?,
        ParsedPage::Detail(detail) => serde_json::to_string_pretty(&detail)?,
    };
    Ok(json)
}

/// Write the config template and a fresh database into `config_dir`.
///
/// Existing files are replaced.
pub fn create_configuration_assets(config_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("Creating {}", config_dir.display()))?;

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    AppConfig::write_template(&config_path)?;

    let db_path = config_dir.join(DATABASE_FILE_NAME);
    if Database::exists(&db_path) {
        Database::drop(&db_path)
            .with_context(|| format!("Removing existing database {}", db_path.display()))?;
    }
    Database::new(&db_path).with_context(|| format!("Creating database {}", db_path.display()))?;

    Ok((config_path, db_path))
}

/// Where `export --output` writes: a file path as given, or
/// `<dir>/jobs_<session>.<ext>` when the path is an existing directory.
pub fn export_destination(output: &Path, session_id: &str, format: ReportFormat) -> PathBuf {
    if output.is_dir() {
        output.join(format!("jobs_{}.{}", session_id, format.extension()))
    } else {
        output.to_path_buf()
    }
}

/// Session rows, each followed by its stored records per contract type.
pub fn format_session_table(sessions: &[(SessionInfo, Vec<(String, i64)>)]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<36}  {:<19}  {:<9}  {:>7}  {:>9}  {:>10}\n",
        "SESSION", "STARTED", "STATUS", "RECORDS", "UNMATCHED", "INCOMPLETE"
    ));
    for (session, contracts) in sessions {
        let started = chrono::DateTime::<chrono::Utc>::from_timestamp(session.start_time, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| session.start_time.to_string());
        out.push_str(&format!(
            "{:<36}  {:<19}  {:<9}  {:>7}  {:>9}  {:>10}\n",
            session.id,
            started,
            session.status.as_str(),
            session.records,
            session.unmatched,
            session.incomplete
        ));
        if !contracts.is_empty() {
            let counts: Vec<String> = contracts
                .iter()
                .map(|(contract, count)| format!("{} {}", contract, count))
                .collect();
            out.push_str(&format!("    contracts: {}\n", counts.join(", ")));
        }
        if let Some(ref error) = session.error {
            out.push_str(&format!("    error: {}\n", error));
        }
    }
    out
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  FREELYTICS INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir_arg = args
        .get_one::<String>("PATH")
        .ok_or_else(|| anyhow!("missing PATH"))?;
    let force = args.get_flag("force");
    let config_dir = PathBuf::from(shellexpand::tilde(dir_arg).as_ref());
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let db_path = config_dir.join(DATABASE_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let config_exists = config_path.exists();
    let db_exists = Database::exists(&db_path);

    if (config_exists || db_exists) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("An existing installation was found:");
        if config_exists {
            println!(
                "  {} {}",
                "•".yellow(),
                config_path.display().to_string().bright_white()
            );
        }
        if db_exists {
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
        }
        println!();
        println!(
            "{}",
            "This operation will overwrite the config and delete all stored sessions.".yellow()
        );

        let response = print_prompt("Do you want to continue? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
        println!("{} Proceeding with overwrite", "→".yellow().bold());
        println!();
    }

    println!("{} Creating configuration assets...", "→".blue());
    let (config_path, db_path) = create_configuration_assets(&config_dir)?;
    info!("Initialized {}", config_dir.display());

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config: {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    println!(
        "{} Edit the [search] section, then run {}",
        "ℹ".blue(),
        "freelytics crawl".bright_white()
    );
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config_arg = args.get_one::<PathBuf>("config");
    let mut config = load_config(config_arg)?;
    apply_crawl_overrides(
        &mut config,
        args.get_one::<usize>("max-pages").copied(),
        args.get_one::<usize>("workers").copied(),
    );

    let db_path = match args.get_one::<PathBuf>("db") {
        Some(db) => db.clone(),
        None => config.database_path(),
    };
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating {}", parent.display()))?;
    }
    let db = Database::new(&db_path)
        .with_context(|| format!("Opening database {}", db_path.display()))?;
    debug!("Using database {}", db_path.display());

    if !quiet {
        println!("\n🕷️  Crawling job listings");
        println!("Searches: {}", config.search.start_urls()?.len());
        println!("Workers: {}", config.crawl.workers);
        println!("Max pages per search: {}\n", config.crawl.max_pages);
    }

    let options = CrawlOptions {
        config,
        output_dir: args.get_one::<PathBuf>("output-dir").cloned(),
        show_progress_bars: !quiet,
    };

    let outcome = execute_crawl(options, Arc::new(db), None)
        .await
        .map_err(|e| anyhow!(e))?;

    if !quiet {
        println!("\n✓ Crawl complete!\n");
        print!("{}", generate_crawl_summary(&outcome));
    }
    Ok(())
}

pub fn handle_parse(args: &ArgMatches) -> Result<()> {
    let kind = args
        .get_one::<String>("KIND")
        .and_then(|k| PageKind::from_str(k))
        .ok_or_else(|| anyhow!("KIND must be listing or detail"))?;
    let file = args
        .get_one::<PathBuf>("FILE")
        .ok_or_else(|| anyhow!("missing FILE"))?;
    let page_url = args
        .get_one::<Url>("url")
        .ok_or_else(|| anyhow!("missing --url"))?;

    let selectors = match args.get_one::<PathBuf>("config") {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Loading {}", path.display()))?
            .selectors()?,
        None => Selectors::compile(&SelectorConfig::default())?,
    };

    let html =
        fs::read_to_string(file).with_context(|| format!("Reading {}", file.display()))?;
    println!("{}", parse_saved_page(kind, &html, page_url, &selectors)?);
    Ok(())
}

pub fn handle_export(args: &ArgMatches) -> Result<()> {
    let db_path = resolve_database_path(
        args.get_one::<PathBuf>("config"),
        args.get_one::<PathBuf>("db"),
    )?;
    let db = open_existing_database(&db_path)?;

    let session = match args.get_one::<String>("session") {
        Some(id) => db
            .get_session(id)?
            .ok_or_else(|| anyhow!("No session with id {}", id))?,
        None => db
            .latest_completed_session()?
            .ok_or_else(|| anyhow!("No completed crawl session in {}", db_path.display()))?,
    };

    let format_str = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("csv");
    let format = ReportFormat::from_str(format_str)
        .ok_or_else(|| anyhow!("Unsupported export format: {}", format_str))?;

    let records = db.get_records_by_session(&session.id)?;
    let content = render_records(&records, format, Some(&session))?;

    match args.get_one::<PathBuf>("output") {
        Some(output) => {
            let path = export_destination(output, &session.id, format);
            save_report(&content, &path)
                .with_context(|| format!("Writing {}", path.display()))?;
            eprintln!(
                "{} Exported {} records from session {} to {}",
                "✓".green().bold(),
                records.len(),
                session.id,
                path.display()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub fn handle_sessions(args: &ArgMatches) -> Result<()> {
    let db_path = resolve_database_path(
        args.get_one::<PathBuf>("config"),
        args.get_one::<PathBuf>("db"),
    )?;
    let db = open_existing_database(&db_path)?;

    let sessions = db.list_sessions()?;
    if sessions.is_empty() {
        println!("No crawl sessions recorded in {}", db_path.display());
        return Ok(());
    }

    let rows = sessions
        .into_iter()
        .map(|session| -> Result<_> {
            let contracts = db.get_contract_counts(&session.id)?;
            Ok((session, contracts))
        })
        .collect::<Result<Vec<_>>>()?;
    print!("{}", format_session_table(&rows));
    Ok(())
}
