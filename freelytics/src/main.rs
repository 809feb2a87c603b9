use clap::ArgMatches;
use commands::command_argument_builder;
use freelytics::handlers::{
    handle_crawl, handle_export, handle_init, handle_parse, handle_sessions,
};
use freelytics_core::print_banner;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_logging(chosen_command.get_flag("verbose"));

    // Banner stays off stdout for commands whose output is data
    let machine_output = matches!(chosen_command.subcommand_name(), Some("parse" | "export"));
    if !quiet && !machine_output {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    if let Err(e) = run(&chosen_command, quiet).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(chosen_command: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("parse", primary_command)) => handle_parse(primary_command),
        Some(("export", primary_command)) => handle_export(primary_command),
        Some(("sessions", primary_command)) => handle_sessions(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
