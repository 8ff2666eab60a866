use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{MargoError, Result};
use crate::metrics::{SummaryLine, Unit};
use crate::models::Transaction;

pub const SUMMARY_HEADER: [&str; 3] = ["metric", "value", "unit"];
pub const DETAIL_HEADER: [&str; 7] = [
    "date",
    "revenue",
    "cogs",
    "sales_commission",
    "sales_program",
    "customer_name",
    "category",
];

pub fn write_summary_csv<W: Write>(writer: W, lines: &[SummaryLine]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SUMMARY_HEADER)?;
    for line in lines {
        wtr.write_record([
            line.metric.as_str(),
            line.value.to_string().as_str(),
            line.unit.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse a file written by [`write_summary_csv`].
pub fn read_summary_csv<R: Read>(reader: R) -> Result<Vec<SummaryLine>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers != SUMMARY_HEADER {
        return Err(MargoError::Other(format!(
            "unexpected summary header: {}",
            headers.join(",")
        )));
    }

    let mut lines = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let bad = |what: &str| MargoError::Other(format!("summary row {}: invalid {what}", i + 1));
        let metric = record.get(0).ok_or_else(|| bad("metric"))?.to_string();
        let value: f64 = record
            .get(1)
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| bad("value"))?;
        let unit = record
            .get(2)
            .and_then(Unit::parse)
            .ok_or_else(|| bad("unit"))?;
        lines.push(SummaryLine { metric, value, unit });
    }
    Ok(lines)
}

/// Write rows in the column layout the importer reads back.
pub fn write_detail_csv<W: Write>(writer: W, rows: &[Transaction]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DETAIL_HEADER)?;
    for row in rows {
        wtr.write_record([
            row.date.format("%Y-%m-%d").to_string(),
            row.revenue.to_string(),
            row.cogs.to_string(),
            row.sales_commission.to_string(),
            row.sales_program.to_string(),
            row.customer_name.clone(),
            row.category.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// `<data_dir>/exports/<name>-YYYYMMDD.csv`
pub fn default_path(data_dir: &Path, name: &str) -> PathBuf {
    let date = chrono::Local::now().format("%Y%m%d").to_string();
    data_dir.join("exports").join(format!("{name}-{date}.csv"))
}

/// Create `path` (and its parent directory) and hand a buffered writer to `write`.
pub fn write_to_path<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(std::io::BufWriter<std::fs::File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write(std::io::BufWriter::new(file))
}
