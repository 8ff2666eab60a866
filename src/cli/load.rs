use std::path::PathBuf;

use crate::db::get_connection;
use crate::error::{MargoError, Result};
use crate::fmt::number;
use crate::settings::{load_settings, save_settings, shellexpand_path, DB_FILE};
use crate::store;

pub fn run(path: &str) -> Result<()> {
    let data_dir = PathBuf::from(shellexpand_path(path));
    let db_path = data_dir.join(DB_FILE);
    if !db_path.is_file() {
        return Err(MargoError::Settings(format!(
            "{} has no {DB_FILE}; run `margo init --data-dir {}` first",
            data_dir.display(),
            data_dir.display()
        )));
    }

    // Refuse a file that is not a margo database before switching to it.
    let stats = store::stats(&get_connection(&db_path)?)?;

    let mut settings = load_settings();
    settings.data_dir = data_dir.to_string_lossy().to_string();
    save_settings(&settings)?;

    let span = match stats.date_range {
        Some(r) => format!("{} to {}", r.start(), r.end()),
        None => "no data yet".to_string(),
    };
    println!(
        "Using {}: {} transactions from {} customers ({span})",
        data_dir.display(),
        number(stats.records),
        number(stats.customers)
    );
    Ok(())
}
