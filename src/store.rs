use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{MargoError, Result};
use crate::filters::{DateRange, Filter, Selection};
use crate::importer::{compute_checksum, normalize_file};
use crate::models::{Transaction, UploadLog, UploadStatus};

/// Where a batch of rows came from, recorded in the upload history.
#[derive(Debug, Clone, Default)]
pub struct UploadSource {
    pub filename: String,
    pub file_size: Option<i64>,
    pub checksum: Option<String>,
}

impl UploadSource {
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(file_path)?;
        Ok(Self {
            filename: file_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            file_size: i64::try_from(meta.len()).ok(),
            checksum: Some(compute_checksum(file_path)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

fn log_upload(
    conn: &Connection,
    source: &UploadSource,
    records_count: usize,
    status: UploadStatus,
    error_message: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO uploads (filename, records_count, file_size, status, error_message, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            source.filename,
            records_count as i64,
            source.file_size,
            status.as_str(),
            error_message,
            source.checksum,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_rows(conn: &Connection, rows: &[Transaction], upload_id: Option<i64>) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO transactions
         (date, revenue, cogs, sales_commission, sales_program, customer_name, category, upload_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.date.format("%Y-%m-%d").to_string(),
            row.revenue,
            row.cogs,
            row.sales_commission,
            row.sales_program,
            row.customer_name,
            row.category,
            upload_id,
        ])?;
    }
    Ok(())
}

/// Insert `rows` atomically. With a `source`, an upload entry is logged as
/// well: `success` alongside the rows, or `error` after the insert was
/// rolled back. The original error is still returned in that case.
pub fn save_transactions(
    conn: &mut Connection,
    rows: &[Transaction],
    source: Option<&UploadSource>,
) -> Result<usize> {
    let attempt = (|| -> Result<()> {
        let tx = conn.transaction()?;
        let upload_id = match source {
            Some(src) => Some(log_upload(&tx, src, rows.len(), UploadStatus::Success, None)?),
            None => None,
        };
        insert_rows(&tx, rows, upload_id)?;
        tx.commit()?;
        Ok(())
    })();

    match attempt {
        Ok(()) => {
            log::info!("saved {} transactions", rows.len());
            Ok(rows.len())
        }
        Err(e) => {
            if let Some(src) = source {
                if let Err(log_err) =
                    log_upload(conn, src, 0, UploadStatus::Error, Some(&e.to_string()))
                {
                    log::warn!("could not record failed upload of {}: {log_err}", src.filename);
                }
            }
            Err(e)
        }
    }
}

#[derive(Debug)]
pub struct ImportResult {
    pub imported: usize,
    pub dropped_invalid_date: usize,
    pub dropped_no_amounts: usize,
}

/// Normalize `file_path` and persist its rows. A file whose checksum matches
/// a previous successful upload is refused unless `force` is set.
pub fn import_file(conn: &mut Connection, file_path: &Path, force: bool) -> Result<ImportResult> {
    let source = UploadSource::from_path(file_path)?;

    if !force {
        let mut stmt =
            conn.prepare("SELECT 1 FROM uploads WHERE checksum = ?1 AND status = 'success'")?;
        if stmt.exists([&source.checksum])? {
            return Err(MargoError::DuplicateFile(source.filename));
        }
    }

    let normalized = match normalize_file(file_path) {
        Ok(n) => n,
        Err(e) => {
            log_upload(conn, &source, 0, UploadStatus::Error, Some(&e.to_string()))?;
            return Err(e);
        }
    };

    let imported = save_transactions(conn, &normalized.rows, Some(&source))?;
    Ok(ImportResult {
        imported,
        dropped_invalid_date: normalized.dropped_invalid_date,
        dropped_no_amounts: normalized.dropped_no_amounts,
    })
}

/// Delete every transaction and upload entry. Returns the number of transactions removed.
pub fn clear_all(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    let deleted = tx.execute("DELETE FROM transactions", [])?;
    tx.execute("DELETE FROM uploads", [])?;
    tx.commit()?;
    log::info!("cleared {deleted} transactions");
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn parse_stored_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| MargoError::InvalidDate(format!("stored date {raw}")))
}

fn push_selection(clauses: &mut Vec<String>, params: &mut Vec<String>, column: &str, sel: &Selection) {
    let Some(values) = sel.values() else { return };
    if values.is_empty() {
        clauses.push("0".to_string());
        return;
    }
    let mut placeholders = Vec::with_capacity(values.len());
    for v in values {
        params.push(v.clone());
        placeholders.push(format!("?{}", params.len()));
    }
    clauses.push(format!("{column} IN ({})", placeholders.join(", ")));
}

/// Rows matching `filter`, sorted by date. The filter is evaluated by SQLite.
pub fn load_transactions(conn: &Connection, filter: &Filter) -> Result<Vec<Transaction>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(range) = filter.date_range {
        params.push(range.start().format("%Y-%m-%d").to_string());
        params.push(range.end().format("%Y-%m-%d").to_string());
        clauses.push(format!("date >= ?{} AND date <= ?{}", params.len() - 1, params.len()));
    }
    push_selection(&mut clauses, &mut params, "category", &filter.categories);
    push_selection(&mut clauses, &mut params, "customer_name", &filter.customers);

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT date, revenue, cogs, sales_commission, sales_program, customer_name, category
         FROM transactions{where_clause} ORDER BY date, id"
    );

    let param_values: Vec<&dyn rusqlite::types::ToSql> =
        params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(param_values.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(date, revenue, cogs, sales_commission, sales_program, customer_name, category)| {
            Ok(Transaction {
                date: parse_stored_date(&date)?,
                revenue,
                cogs,
                sales_commission,
                sales_program,
                customer_name,
                category,
            })
        })
        .collect()
}

fn distinct_column(conn: &Connection, column: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT {column} FROM transactions ORDER BY {column}"
    ))?;
    let values = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(values)
}

pub fn available_customers(conn: &Connection) -> Result<Vec<String>> {
    distinct_column(conn, "customer_name")
}

pub fn available_categories(conn: &Connection) -> Result<Vec<String>> {
    distinct_column(conn, "category")
}

/// Earliest and latest stored dates, or `None` when the table is empty.
pub fn date_range(conn: &Connection) -> Result<Option<DateRange>> {
    let (min, max): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(date), MAX(date) FROM transactions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    match (min, max) {
        (Some(min), Some(max)) => Ok(Some(DateRange::new(
            parse_stored_date(&min)?,
            parse_stored_date(&max)?,
        )?)),
        _ => Ok(None),
    }
}

/// Most recent uploads first.
pub fn upload_history(conn: &Connection, limit: usize) -> Result<Vec<UploadLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, records_count, file_size, status, error_message, checksum, uploaded_at
         FROM uploads ORDER BY uploaded_at DESC, id DESC LIMIT ?1",
    )?;
    let logs = stmt
        .query_map([limit as i64], |row| {
            Ok(UploadLog {
                id: row.get(0)?,
                filename: row.get(1)?,
                records_count: row.get(2)?,
                file_size: row.get(3)?,
                status: UploadStatus::parse(&row.get::<_, String>(4)?),
                error_message: row.get(5)?,
                checksum: row.get(6)?,
                uploaded_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(logs)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub records: i64,
    pub customers: i64,
    pub categories: i64,
    pub uploads: i64,
    pub date_range: Option<DateRange>,
}

pub fn stats(conn: &Connection) -> Result<StoreStats> {
    let (records, customers, categories): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT customer_name), COUNT(DISTINCT category) FROM transactions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let uploads: i64 = conn.query_row(
        "SELECT COUNT(*) FROM uploads WHERE status = 'success'",
        [],
        |row| row.get(0),
    )?;
    Ok(StoreStats {
        records,
        customers,
        categories,
        uploads,
        date_range: date_range(conn)?,
    })
}

// ---------------------------------------------------------------------------
// Two-tier lookup
// ---------------------------------------------------------------------------

/// A value read from the database, or recomputed from in-memory rows because
/// the database could not be queried.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    FromStorage(T),
    FromFallback { value: T, reason: String },
}

impl<T> Lookup<T> {
    pub fn into_value(self) -> T {
        match self {
            Self::FromStorage(v) | Self::FromFallback { value: v, .. } => v,
        }
    }

    /// Why storage was bypassed, if it was.
    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Self::FromStorage(_) => None,
            Self::FromFallback { reason, .. } => Some(reason),
        }
    }
}

fn lookup_or<T>(what: &str, stored: Result<T>, fallback: impl FnOnce() -> T) -> Lookup<T> {
    match stored {
        Ok(v) => Lookup::FromStorage(v),
        Err(e) => {
            log::warn!("{what}: database unavailable, using loaded rows ({e})");
            Lookup::FromFallback {
                value: fallback(),
                reason: e.to_string(),
            }
        }
    }
}

pub(crate) fn distinct_in_memory<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values.cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

pub fn customers_or_fallback(conn: &Connection, rows: &[Transaction]) -> Lookup<Vec<String>> {
    lookup_or("customers", available_customers(conn), || {
        distinct_in_memory(rows.iter().map(|r| &r.customer_name))
    })
}

pub fn categories_or_fallback(conn: &Connection, rows: &[Transaction]) -> Lookup<Vec<String>> {
    lookup_or("categories", available_categories(conn), || {
        distinct_in_memory(rows.iter().map(|r| &r.category))
    })
}

pub fn date_range_or_fallback(conn: &Connection, rows: &[Transaction]) -> Lookup<Option<DateRange>> {
    lookup_or("date range", date_range(conn), || rows_date_range(rows))
}

/// Min/max date of in-memory rows.
pub fn rows_date_range(rows: &[Transaction]) -> Option<DateRange> {
    let min = rows.iter().map(|r| r.date).min()?;
    let max = rows.iter().map(|r| r.date).max()?;
    DateRange::new(min, max).ok()
}
