use thiserror::Error;

#[derive(Error, Debug)]
pub enum MargoError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Unsupported file format: {0} (use .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("No valid rows left after parsing dates and amounts")]
    NoValidRows,

    #[error("File already imported: {0} (use --force to import it again)")]
    DuplicateFile(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MargoError>;
