pub mod clear;
pub mod dashboard;
pub mod export;
pub mod history;
pub mod import;
pub mod init;
pub mod list;
pub mod load;
pub mod report;
pub mod status;

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};

use crate::app::{AppState, Loaded, Query};
use crate::error::Result;
use crate::filters::{date_spec_from_args, DateSpec, Selection};
use crate::settings::{load_settings, shellexpand_path, Settings};

pub(crate) const NO_DATA: &str = "No data matches the selected filters.";

#[derive(Parser)]
#[command(
    name = "margo",
    version,
    about = "Revenue, cost and margin reporting from sales spreadsheets."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up margo: choose a data directory and initialize the database.
    Init {
        /// Path for margo data (default: ~/Documents/margo)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Switch to an existing margo data directory.
    Load {
        /// Path to data directory containing margo.db
        path: String,
    },
    /// Show current database and summary statistics.
    Status,
    /// Import a CSV/XLSX file into the database.
    Import {
        /// Path to CSV or XLSX file to import
        file: String,
        /// Import even if this exact file was imported before
        #[arg(long)]
        force: bool,
    },
    /// Print reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export filtered data to CSV.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// List the customers or categories available for filtering.
    List {
        what: ListKind,
        /// Analyse this CSV/XLSX file instead of the database
        #[arg(long)]
        file: Option<String>,
    },
    /// Show the upload history.
    History {
        /// Maximum number of entries
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Delete all stored transactions and upload history.
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Interactive dashboard with KPIs, monthly trend and top customers.
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Totals and margins.
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print the full metrics result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Month-by-month totals and margins.
    Monthly {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Current vs previous period with growth rates.
    Period {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Per-customer performance.
    Customers {
        #[command(flatten)]
        filter: FilterArgs,
        /// Number of customers to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Per-category performance and revenue share.
    Categories {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Customer x category revenue for the top customers.
    Matrix {
        #[command(flatten)]
        filter: FilterArgs,
        /// Number of top customers by revenue
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// How many categories each customer buys from.
    Diversity {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// COGS, commission and program costs as a share of revenue.
    Expenses {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Day-by-day revenue and net profit.
    Daily {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export the metric summary (metric,value,unit).
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file path (default: <data_dir>/exports/summary-YYYYMMDD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Export the filtered transactions.
    Detail {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file path (default: <data_dir>/exports/detail-YYYYMMDD.csv)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ListKind {
    Customers,
    Categories,
}

/// Filters shared by every report, export and the dashboard.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Month filter: YYYY-MM
    #[arg(long)]
    pub month: Option<String>,
    /// Year filter: YYYY
    #[arg(long)]
    pub year: Option<i32>,
    /// Start date: YYYY-MM-DD
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Only the last N days up to the latest transaction (e.g. 7, 30, 90)
    #[arg(long)]
    pub last: Option<u32>,
    /// Category to include (repeatable; default: all)
    #[arg(long = "category")]
    pub categories: Vec<String>,
    /// Customer to include (repeatable; default: all)
    #[arg(long = "customer")]
    pub customers: Vec<String>,
    /// Analyse this CSV/XLSX file without storing it
    #[arg(long)]
    pub file: Option<String>,
}

impl FilterArgs {
    pub fn date_spec(&self) -> Result<DateSpec> {
        date_spec_from_args(
            self.month.as_deref(),
            self.year,
            self.from_date.as_deref(),
            self.to_date.as_deref(),
            self.last,
        )
    }

    pub fn query(&self) -> Result<Query> {
        Ok(Query {
            dates: self.date_spec()?,
            categories: Selection::from_values(&self.categories),
            customers: Selection::from_values(&self.customers),
        })
    }

    pub fn upload_path(&self) -> Option<PathBuf> {
        self.file.as_deref().map(|f| PathBuf::from(shellexpand_path(f)))
    }

    pub fn app_state(&self, settings: &Settings) -> Result<AppState> {
        Ok(AppState::new(settings, self.upload_path(), self.query()?))
    }
}

/// Everything a report handler needs once rows are loaded.
pub(crate) struct Context {
    pub settings: Settings,
    pub state: AppState,
    pub loaded: Loaded,
}

/// Load rows for `args`. Prints the empty-data notice and returns `None`
/// when nothing matches.
pub(crate) fn load_context(args: &FilterArgs) -> Result<Option<Context>> {
    let settings = load_settings();
    let state = args.app_state(&settings)?;
    let loaded = state.load_rows()?;
    if loaded.rows.is_empty() {
        println!("{NO_DATA}");
        return Ok(None);
    }
    Ok(Some(Context {
        settings,
        state,
        loaded,
    }))
}

pub fn completions(shell: clap_complete::Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "margo", &mut std::io::stdout());
    Ok(())
}
