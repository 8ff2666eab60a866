use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::open_initialized;
use crate::error::Result;
use crate::fmt::{format_bytes, number};
use crate::models::UploadStatus;
use crate::settings::load_settings;
use crate::store::upload_history;

pub fn run(limit: usize) -> Result<()> {
    let conn = open_initialized(&load_settings().db_path())?;
    let logs = upload_history(&conn, limit)?;

    if logs.is_empty() {
        println!("No uploads yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Records", "Size", "Status", "Uploaded", "Error"]);
    for log in &logs {
        let status = match log.status {
            UploadStatus::Success => log.status.as_str().green().to_string(),
            UploadStatus::Error => log.status.as_str().red().to_string(),
        };
        table.add_row(vec![
            Cell::new(log.id),
            Cell::new(&log.filename),
            Cell::new(number(log.records_count)),
            Cell::new(
                log.file_size
                    .and_then(|s| u64::try_from(s).ok())
                    .map(format_bytes)
                    .unwrap_or_default(),
            ),
            Cell::new(status),
            Cell::new(&log.uploaded_at),
            Cell::new(log.error_message.as_deref().unwrap_or("")),
        ]);
    }
    println!("Upload History\n{table}");
    Ok(())
}
