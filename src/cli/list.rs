use crate::app::{AppState, Query};
use crate::cli::ListKind;
use crate::error::Result;
use crate::settings::{load_settings, shellexpand_path};

pub fn run(what: ListKind, file: Option<String>) -> Result<()> {
    let settings = load_settings();
    let upload = file.map(|f| shellexpand_path(&f).into());
    let state = AppState::new(&settings, upload, Query::default());
    let loaded = state.load_rows()?;
    let options = state.filter_options(&loaded.rows);

    let lookup = match what {
        ListKind::Customers => options.customers,
        ListKind::Categories => options.categories,
    };
    if let Some(reason) = lookup.fallback_reason() {
        eprintln!("({reason}: values taken from the loaded rows)");
    }
    let values = lookup.into_value();
    if values.is_empty() {
        println!("No data loaded.");
        return Ok(());
    }
    for v in values {
        println!("{v}");
    }
    Ok(())
}
