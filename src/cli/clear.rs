use crate::db::open_initialized;
use crate::error::{MargoError, Result};
use crate::settings::load_settings;
use crate::store::clear_all;

pub fn run(yes: bool) -> Result<()> {
    if !yes {
        return Err(MargoError::Other(
            "This deletes every stored transaction and upload record. Re-run with --yes to confirm."
                .to_string(),
        ));
    }
    let mut conn = open_initialized(&load_settings().db_path())?;
    let deleted = clear_all(&mut conn)?;
    println!("Deleted {deleted} transactions.");
    Ok(())
}
