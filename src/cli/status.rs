use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::{format_bytes, number};
use crate::settings::load_settings;
use crate::store;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Currency:   {}", settings.currency_symbol);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `margo init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    let stats = store::stats(&conn)?;

    println!();
    println!("Transactions:  {}", number(stats.records));
    println!("Customers:     {}", number(stats.customers));
    println!("Categories:    {}", number(stats.categories));
    println!("Uploads:       {}", number(stats.uploads));
    match stats.date_range {
        Some(range) => println!("Date range:    {} to {}", range.start(), range.end()),
        None => println!("Date range:    (no data)"),
    }
    Ok(())
}
