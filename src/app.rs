use std::path::PathBuf;

use crate::db;
use crate::error::Result;
use crate::filters::{DateRange, DateSpec, Filter, Selection};
use crate::importer::normalize_file;
use crate::metrics::PeriodSplit;
use crate::models::Transaction;
use crate::settings::Settings;
use crate::store::{self, Lookup};

/// Where rows come from for one command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// The persistent store at this database path.
    Database(PathBuf),
    /// A CSV/XLSX file analysed in memory and never persisted.
    Upload(PathBuf),
}

/// User-selected filters before the data's date span is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub dates: DateSpec,
    pub categories: Selection,
    pub customers: Selection,
}

impl Query {
    pub fn resolve(&self, max_date: Option<chrono::NaiveDate>) -> Filter {
        Filter {
            date_range: self.dates.resolve(max_date),
            categories: self.categories.clone(),
            customers: self.customers.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub source: DataSource,
    pub query: Query,
    pub split: PeriodSplit,
}

/// Rows after filtering, plus what was applied and the span of the unfiltered data.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub rows: Vec<Transaction>,
    pub filter: Filter,
    pub data_range: Option<DateRange>,
}

/// Values offered for the category and customer filters.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub customers: Lookup<Vec<String>>,
    pub categories: Lookup<Vec<String>>,
    pub date_range: Lookup<Option<DateRange>>,
}

impl FilterOptions {
    fn in_memory(rows: &[Transaction], reason: String) -> Self {
        Self {
            customers: Lookup::FromFallback {
                value: store::distinct_in_memory(rows.iter().map(|r| &r.customer_name)),
                reason: reason.clone(),
            },
            categories: Lookup::FromFallback {
                value: store::distinct_in_memory(rows.iter().map(|r| &r.category)),
                reason: reason.clone(),
            },
            date_range: Lookup::FromFallback {
                value: store::rows_date_range(rows),
                reason,
            },
        }
    }
}

impl AppState {
    /// Database mode unless `upload` names a file to analyse without storing it.
    pub fn new(settings: &Settings, upload: Option<PathBuf>, query: Query) -> Self {
        let source = match upload {
            Some(path) => DataSource::Upload(path),
            None => DataSource::Database(settings.db_path()),
        };
        Self {
            source,
            query,
            split: settings.period_split,
        }
    }

    pub fn load_rows(&self) -> Result<Loaded> {
        match &self.source {
            DataSource::Database(db_path) => {
                let conn = db::open_initialized(db_path)?;
                let data_range = store::date_range(&conn)?;
                let filter = self.query.resolve(data_range.map(|r| r.end()));
                let rows = store::load_transactions(&conn, &filter)?;
                Ok(Loaded {
                    rows,
                    filter,
                    data_range,
                })
            }
            DataSource::Upload(path) => {
                let normalized = normalize_file(path)?;
                let data_range = store::rows_date_range(&normalized.rows);
                let filter = self.query.resolve(data_range.map(|r| r.end()));
                let rows = filter.apply(&normalized.rows);
                Ok(Loaded {
                    rows,
                    filter,
                    data_range,
                })
            }
        }
    }

    /// Filter choices, read from the store when possible and from `rows` otherwise.
    pub fn filter_options(&self, rows: &[Transaction]) -> FilterOptions {
        match &self.source {
            DataSource::Database(db_path) => match db::get_connection(db_path) {
                Ok(conn) => FilterOptions {
                    customers: store::customers_or_fallback(&conn, rows),
                    categories: store::categories_or_fallback(&conn, rows),
                    date_range: store::date_range_or_fallback(&conn, rows),
                },
                Err(e) => {
                    log::warn!("cannot open {}: {e}", db_path.display());
                    FilterOptions::in_memory(rows, e.to_string())
                }
            },
            DataSource::Upload(_) => FilterOptions::in_memory(rows, "upload-only mode".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CSV: &str = "Date,Revenue,COGS,Sales Commission,Sales Program,Customer Name,Category\n\
        2024-01-01,100,50,0,0,Acme,Software\n\
        2024-02-15,200,50,0,0,Beta,Hardware\n\
        2024-03-31,300,50,0,0,Acme,Hardware\n";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            data_dir: dir.to_string_lossy().to_string(),
            ..Settings::default()
        }
    }

    fn upload_file(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("upload.csv");
        std::fs::write(&path, CSV).unwrap();
        path
    }

    #[test]
    fn test_upload_mode_filters_in_memory_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let query = Query {
            categories: Selection::from_values(&["Hardware".to_string()]),
            ..Query::default()
        };
        let state = AppState::new(&settings, Some(upload_file(dir.path())), query);
        let loaded = state.load_rows().unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.data_range.unwrap().start(), date("2024-01-01"));
        assert!(!settings.db_path().exists());
    }

    #[test]
    fn test_last_days_resolves_against_latest_date() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let query = Query {
            dates: DateSpec::LastDays(45),
            ..Query::default()
        };
        let state = AppState::new(&settings, Some(upload_file(dir.path())), query);
        let loaded = state.load_rows().unwrap();
        assert_eq!(loaded.filter.date_range.unwrap().start(), date("2024-02-15"));
        assert_eq!(loaded.rows.len(), 2);
    }

    #[test]
    fn test_database_mode_reads_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let mut conn = db::open_initialized(&settings.db_path()).unwrap();
        store::import_file(&mut conn, &upload_file(dir.path()), false).unwrap();
        drop(conn);

        let query = Query {
            customers: Selection::from_values(&["Acme".to_string()]),
            ..Query::default()
        };
        let state = AppState::new(&settings, None, query);
        assert_eq!(state.source, DataSource::Database(settings.db_path()));
        let loaded = state.load_rows().unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert!(loaded.rows.iter().all(|r| r.customer_name == "Acme"));

        let options = state.filter_options(&loaded.rows);
        assert_eq!(options.customers.fallback_reason(), None);
        assert_eq!(options.customers.into_value(), vec!["Acme", "Beta"]);
    }

    #[test]
    fn test_empty_database_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(&settings_in(dir.path()), None, Query::default());
        let loaded = state.load_rows().unwrap();
        assert!(loaded.rows.is_empty());
        assert!(loaded.data_range.is_none());
    }

    #[test]
    fn test_filter_options_fall_back_without_schema() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            source: DataSource::Database(dir.path().join("missing.db")),
            query: Query::default(),
            split: PeriodSplit::default(),
        };
        let rows = vec![Transaction {
            date: date("2024-01-01"),
            revenue: 1.0,
            cogs: 0.0,
            sales_commission: 0.0,
            sales_program: 0.0,
            customer_name: "Solo".into(),
            category: "General".into(),
        }];
        let options = state.filter_options(&rows);
        assert!(options.customers.fallback_reason().is_some());
        assert_eq!(options.customers.into_value(), vec!["Solo"]);
        assert!(options.date_range.fallback_reason().is_some());
    }
}
