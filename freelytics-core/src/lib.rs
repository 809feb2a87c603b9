pub mod config;
pub mod crawl;
pub mod data;
pub mod report;

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
   __                 _       _   _
  / _|_ __ ___  ___  | |_   _| |_(_) ___ ___
 | |_| '__/ _ \/ _ \ | | | | | __| |/ __/ __|
 |  _| | |  __/  __/ | | |_| | |_| | (__\__ \
 |_| |_|  \___|\___| |_|\__, |\__|_|\___|___/
                        |___/
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "job listing crawler".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
