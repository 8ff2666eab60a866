use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::{MargoError, Result};
use crate::models::{Transaction, DEFAULT_CATEGORY, DEFAULT_CUSTOMER};

// ---------------------------------------------------------------------------
// Cells and field parsers
// ---------------------------------------------------------------------------

/// A raw spreadsheet cell before type coercion. CSV only ever yields
/// `Text` and `Empty`; workbooks also yield `Number` (including date serials).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(raw.to_string())
        }
    }

    fn text(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) if n.fract() == 0.0 => format!("{n:.0}"),
            Self::Number(n) => n.to_string(),
            Self::Empty => String::new(),
        }
    }
}

/// Parse a money string. Strips thousands separators, `$`, and quotes;
/// `(x)` is read as `-x`. Returns `None` for blank or non-numeric input.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::TimeDelta::try_days(serial.trunc() as i64)?)
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => parse_date(s),
        Cell::Empty => None,
    }
}

fn cell_amount(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) | Cell::Empty => None,
        Cell::Text(s) => parse_amount(s),
    }
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Lowercase and drop spaces, underscores and dashes: "Sales Commission" -> "salescommission".
fn header_key(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

// (canonical name, accepted header keys)
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("date", &["date", "transactiondate"]),
    ("revenue", &["revenue", "sales"]),
    ("cogs", &["cogs", "costofgoodssold"]),
    ("sales_commission", &["salescommission", "commission"]),
    ("sales_program", &["salesprogram", "program"]),
    ("customer_name", &["customername", "customer"]),
];

const CATEGORY_KEYS: &[&str] = &["category"];

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnMap {
    date: usize,
    revenue: usize,
    cogs: usize,
    sales_commission: usize,
    sales_program: usize,
    customer_name: usize,
    category: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
        let find = |accepted: &[&str]| keys.iter().position(|k| accepted.contains(&k.as_str()));

        let mut found = Vec::with_capacity(REQUIRED_COLUMNS.len());
        let mut missing = Vec::new();
        for (name, accepted) in REQUIRED_COLUMNS {
            match find(*accepted) {
                Some(idx) => found.push(idx),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(MargoError::MissingColumns(missing));
        }
        Ok(Self {
            date: found[0],
            revenue: found[1],
            cogs: found[2],
            sales_commission: found[3],
            sales_program: found[4],
            customer_name: found[5],
            category: find(CATEGORY_KEYS),
        })
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

static EMPTY_CELL: Cell = Cell::Empty;

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Valid rows sorted by date.
    pub rows: Vec<Transaction>,
    pub dropped_invalid_date: usize,
    pub dropped_no_amounts: usize,
}

/// Coerce raw records into transactions: drop rows without a usable date or
/// without any parseable amount, zero-fill the remaining blanks, and apply
/// the customer/category defaults.
pub fn normalize_records<I>(headers: &[String], records: I) -> Result<Normalized>
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    let map = ColumnMap::from_headers(headers)?;
    let mut out = Normalized::default();

    for (line, record) in records.into_iter().enumerate() {
        let cell = |idx: usize| record.get(idx).unwrap_or(&EMPTY_CELL);

        let Some(date) = cell_date(cell(map.date)) else {
            log::debug!("row {}: dropping, unparseable date {:?}", line + 1, cell(map.date));
            out.dropped_invalid_date += 1;
            continue;
        };

        let amounts = [
            cell_amount(cell(map.revenue)),
            cell_amount(cell(map.cogs)),
            cell_amount(cell(map.sales_commission)),
            cell_amount(cell(map.sales_program)),
        ];
        if amounts.iter().all(Option::is_none) {
            log::debug!("row {}: dropping, no numeric amounts", line + 1);
            out.dropped_no_amounts += 1;
            continue;
        }
        let [revenue, cogs, sales_commission, sales_program] = amounts.map(|a| a.unwrap_or(0.0));
        if [revenue, cogs, sales_commission, sales_program].iter().any(|v| *v < 0.0) {
            log::warn!("row {}: negative amount on {date}", line + 1);
        }

        let customer_name = cell(map.customer_name).text();
        let category = map.category.map(|idx| cell(idx).text()).unwrap_or_default();

        out.rows.push(Transaction {
            date,
            revenue,
            cogs,
            sales_commission,
            sales_program,
            customer_name: if customer_name.is_empty() {
                DEFAULT_CUSTOMER.to_string()
            } else {
                customer_name
            },
            category: if category.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category
            },
        });
    }

    if out.rows.is_empty() {
        return Err(MargoError::NoValidRows);
    }
    out.rows.sort_by_key(|r| r.date);
    Ok(out)
}

pub fn normalize_csv_reader<R: std::io::Read>(reader: R) -> Result<Normalized> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        records.push(record.iter().map(Cell::from_text).collect());
    }
    normalize_records(&headers, records)
}

#[cfg(feature = "xlsx")]
fn normalize_workbook(file_path: &Path) -> Result<Normalized> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| MargoError::Workbook(format!("failed to open {}: {e}", file_path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MargoError::Workbook("workbook has no sheets".into()))?
        .map_err(|e| MargoError::Workbook(e.to_string()))?;

    let to_cell = |data: &Data| match data {
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(MargoError::NoValidRows)?
        .iter()
        .map(|d| to_cell(d).text())
        .collect();
    let records: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(to_cell).collect()).collect();
    normalize_records(&headers, records)
}

#[cfg(not(feature = "xlsx"))]
fn normalize_workbook(file_path: &Path) -> Result<Normalized> {
    Err(MargoError::UnsupportedFormat(format!(
        "{} (built without the 'xlsx' feature)",
        file_path.display()
    )))
}

/// Parse an uploaded CSV or Excel file into validated transactions.
pub fn normalize_file(file_path: &Path) -> Result<Normalized> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let normalized = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(file_path)?;
            normalize_csv_reader(std::io::BufReader::new(file))?
        }
        "xlsx" | "xls" | "xlsm" | "ods" => normalize_workbook(file_path)?,
        _ => {
            return Err(MargoError::UnsupportedFormat(
                file_path.display().to_string(),
            ))
        }
    };
    log::info!(
        "{}: {} rows, {} dropped (date), {} dropped (amounts)",
        file_path.display(),
        normalized.rows.len(),
        normalized.dropped_invalid_date,
        normalized.dropped_no_amounts
    );
    Ok(normalized)
}
