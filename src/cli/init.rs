use std::io::IsTerminal;
use std::path::PathBuf;

use crate::db::open_initialized;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, Settings, DB_FILE};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    let defaults = Settings::default();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if settings.data_dir == defaults.data_dir && std::io::stdin().is_terminal() {
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(resolved.join("exports"))?;
    open_initialized(&resolved.join(DB_FILE))?;

    println!("Initialized margo at {}", resolved.display());
    Ok(())
}
