use std::path::PathBuf;

use crate::db::open_initialized;
use crate::error::{MargoError, Result};
use crate::settings::{load_settings, shellexpand_path};
use crate::store::import_file;

pub fn run(file: &str, force: bool) -> Result<()> {
    let file_path = PathBuf::from(shellexpand_path(file));
    let mut conn = open_initialized(&load_settings().db_path())?;

    let result = match import_file(&mut conn, &file_path, force) {
        Ok(r) => r,
        Err(MargoError::DuplicateFile(name)) => {
            println!("{name} has already been imported (duplicate checksum). Use --force to import it again.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("{} imported", result.imported);
    let dropped = result.dropped_invalid_date + result.dropped_no_amounts;
    if dropped > 0 {
        println!(
            "{dropped} rows skipped ({} invalid dates, {} without amounts)",
            result.dropped_invalid_date, result.dropped_no_amounts
        );
    }
    Ok(())
}
