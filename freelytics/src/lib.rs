pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    apply_crawl_overrides, create_configuration_assets, export_destination, format_session_table,
    load_config, open_existing_database, parse_saved_page, resolve_config_path, resolve_database_path,
};

// Re-export crawl functionality from freelytics-core
pub use freelytics_core::crawl::{
    CrawlOptions, CrawlOutcome, CrawlProgressCallback, execute_crawl, generate_crawl_summary,
};
