use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

fn config_arg() -> clap::Arg {
    arg!(-c --"config" <PATH>)
        .required(false)
        .help("Path to the config file (default: ~/.config/freelytics/freelytics.toml)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Database file, overrides storage.database from the config")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("freelytics")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("freelytics")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log per-page detail (same as RUST_LOG=debug)")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default config file and creates the record database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory for the config file and database")
                        .default_value("~/.config/freelytics/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help(
                            "Overwrite an existing config file and database at the specified \
                        location without asking.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl the configured job searches and store every completed record in a \
                new session.",
                )
                .arg(config_arg())
                .arg(db_arg())
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum listing pages per search, overrides crawl.max_pages")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("Concurrent job page fetches, overrides crawl.workers")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-o --"output-dir" <DIR>)
                        .required(false)
                        .help("Also write the records to <DIR>/scraped_jobs_<date>.csv")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("parse")
                .about("Parse a saved listing or job page and print what was extracted as JSON")
                .arg(
                    arg!(<KIND>)
                        .help("Page kind")
                        .value_parser(["listing", "detail"]),
                )
                .arg(
                    arg!(<FILE>)
                        .help("HTML file to parse")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("URL the page was fetched from, used to resolve relative links")
                        .value_parser(clap::value_parser!(Url))
                        .default_value("https://www.free-work.com/fr/tech-it/jobs"),
                )
                .arg(config_arg()),
        )
        .subcommand(
            command!("export")
                .about("Export the records of a crawl session")
                .arg(
                    arg!(-s --"session" <ID>)
                        .required(false)
                        .help("Session to export (default: latest completed session)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Export format: csv, json, jsonl, text")
                        .value_parser(["csv", "json", "jsonl", "text"])
                        .default_value("csv"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save export to file (default: print to stdout)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(config_arg())
                .arg(db_arg()),
        )
        .subcommand(
            command!("sessions")
                .about("List recorded crawl sessions, newest first")
                .arg(config_arg())
                .arg(db_arg()),
        )
}
