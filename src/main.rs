mod app;
mod breakdown;
mod cli;
mod db;
mod error;
mod export;
mod filters;
mod fmt;
mod importer;
mod metrics;
mod models;
mod settings;
mod store;
mod tui;

use clap::Parser;

use cli::{Cli, Commands, ExportCommands, FilterArgs, ReportCommands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => cli::dashboard::run(FilterArgs::default()),
        Some(Commands::Init { data_dir }) => cli::init::run(data_dir),
        Some(Commands::Load { path }) => cli::load::run(&path),
        Some(Commands::Status) => cli::status::run(),
        Some(Commands::Import { file, force }) => cli::import::run(&file, force),
        Some(Commands::Report { command }) => match command {
            ReportCommands::Summary { filter, json } => cli::report::summary(filter, json),
            ReportCommands::Monthly { filter } => cli::report::monthly(filter),
            ReportCommands::Period { filter } => cli::report::period(filter),
            ReportCommands::Customers { filter, limit } => cli::report::customers(filter, limit),
            ReportCommands::Categories { filter } => cli::report::categories(filter),
            ReportCommands::Matrix { filter, top } => cli::report::matrix(filter, top),
            ReportCommands::Diversity { filter } => cli::report::diversity(filter),
            ReportCommands::Expenses { filter } => cli::report::expenses(filter),
            ReportCommands::Daily { filter } => cli::report::daily(filter),
        },
        Some(Commands::Export { command }) => match command {
            ExportCommands::Summary { filter, output } => cli::export::summary(filter, output),
            ExportCommands::Detail { filter, output } => cli::export::detail(filter, output),
        },
        Some(Commands::List { what, file }) => cli::list::run(what, file),
        Some(Commands::History { limit }) => cli::history::run(limit),
        Some(Commands::Clear { yes }) => cli::clear::run(yes),
        Some(Commands::Dashboard { filter }) => cli::dashboard::run(filter),
        Some(Commands::Completions { shell }) => cli::completions(shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
