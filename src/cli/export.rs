use std::path::PathBuf;

use crate::cli::{load_context, FilterArgs};
use crate::error::Result;
use crate::export::{default_path, write_detail_csv, write_summary_csv, write_to_path};
use crate::metrics::{compute_metrics_with, summary_report};
use crate::settings::shellexpand_path;

fn output_path(output: Option<String>, data_dir: &str, name: &str) -> PathBuf {
    output
        .map(|o| PathBuf::from(shellexpand_path(&o)))
        .unwrap_or_else(|| default_path(&PathBuf::from(data_dir), name))
}

pub fn summary(args: FilterArgs, output: Option<String>) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let metrics = compute_metrics_with(&ctx.loaded.rows, &ctx.state.split);
    let lines = summary_report(&metrics);
    let path = output_path(output, &ctx.settings.data_dir, "summary");
    write_to_path(&path, |w| write_summary_csv(w, &lines))?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn detail(args: FilterArgs, output: Option<String>) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let path = output_path(output, &ctx.settings.data_dir, "detail");
    write_to_path(&path, |w| write_detail_csv(w, &ctx.loaded.rows))?;
    println!("Wrote {} ({} rows)", path.display(), ctx.loaded.rows.len());
    Ok(())
}
