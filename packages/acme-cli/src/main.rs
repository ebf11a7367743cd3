use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;
mod params;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Capture(args) => commands::capture::execute(args).await,
        cli::Command::Merge(args) => commands::merge::execute(args),
        cli::Command::Info(args) => commands::info::execute(args),
        cli::Command::Channels(args) => commands::channels::execute(args),
    };

    std::process::exit(exit_code);
}
