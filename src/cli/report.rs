use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::breakdown;
use crate::cli::{load_context, Context, FilterArgs};
use crate::error::{MargoError, Result};
use crate::filters::Filter;
use crate::fmt::{growth, number, percent};
use crate::metrics::{compute_metrics_with, summary_report, PeriodField, PeriodSnapshot, Unit};
use crate::settings::Settings;

fn right(text: impl ToString) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn signed_money(settings: &Settings, val: f64) -> String {
    if val < 0.0 {
        settings.money(val).red().to_string()
    } else {
        settings.money(val).green().to_string()
    }
}

/// One-line description of the applied filter.
pub(crate) fn describe_filter(filter: &Filter, rows: usize) -> String {
    let dates = match filter.date_range {
        Some(r) => format!("{} to {}", r.start(), r.end()),
        None => "all dates".to_string(),
    };
    let set = |sel: &crate::filters::Selection, what: &str| match sel.values() {
        None => format!("all {what}"),
        Some(v) => format!("{} {what}", v.len()),
    };
    format!(
        "{dates} | {} | {} | {} rows",
        set(&filter.categories, "categories"),
        set(&filter.customers, "customers"),
        number(rows as i64)
    )
}

fn print_title(title: &str, ctx: &Context) {
    println!("{}", title.bold());
    println!("{}", describe_filter(&ctx.loaded.filter, ctx.loaded.rows.len()).dimmed());
}

// ---------------------------------------------------------------------------
// Summary, monthly, period
// ---------------------------------------------------------------------------

pub fn summary(args: FilterArgs, json: bool) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let metrics = compute_metrics_with(&ctx.loaded.rows, &ctx.state.split);

    if json {
        let out = serde_json::to_string_pretty(&metrics)
            .map_err(|e| MargoError::Other(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    for line in summary_report(&metrics) {
        let value = match line.unit {
            Unit::Currency => ctx.settings.money(line.value),
            Unit::Percent => percent(line.value),
        };
        let label = if line.metric == "Net Profit" {
            Cell::new(line.metric.bold())
        } else {
            Cell::new(&line.metric)
        };
        table.add_row(vec![label, right(value)]);
    }
    print_title("Summary", &ctx);
    println!("{table}");
    Ok(())
}

pub fn monthly(args: FilterArgs) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let metrics = compute_metrics_with(&ctx.loaded.rows, &ctx.state.split);
    let s = &ctx.settings;

    let mut table = Table::new();
    table.set_header(vec![
        "Month", "Revenue", "COGS", "Gross Profit", "Commission", "Program", "Net Profit", "Gross %",
        "Net %",
    ]);
    for entry in &metrics.monthly {
        let t = &entry.totals;
        table.add_row(vec![
            Cell::new(entry.month),
            right(s.money(t.revenue)),
            right(s.money(t.cogs)),
            right(s.money(t.gross_profit)),
            right(s.money(t.sales_commission)),
            right(s.money(t.sales_program)),
            right(signed_money(s, t.net_profit)),
            right(percent(entry.margins.gross_margin)),
            right(percent(entry.margins.net_margin)),
        ]);
    }
    print_title("Monthly Trend", &ctx);
    println!("{table}");
    Ok(())
}

const PERIOD_FIELDS: [(&str, PeriodField); 6] = [
    ("Revenue", PeriodField::Revenue),
    ("COGS", PeriodField::Cogs),
    ("Commission", PeriodField::SalesCommission),
    ("Program", PeriodField::SalesProgram),
    ("Gross Profit", PeriodField::GrossProfit),
    ("Net Profit", PeriodField::NetProfit),
];

pub fn period(args: FilterArgs) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let metrics = compute_metrics_with(&ctx.loaded.rows, &ctx.state.split);
    let pc = &metrics.period_comparison;
    let s = &ctx.settings;

    let side = |snap: &Option<PeriodSnapshot>, field: PeriodField| match snap {
        Some(snap) => s.money(snap.get(field)),
        None => "-".to_string(),
    };

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Previous", "Current", "Growth"]);
    for (label, field) in PERIOD_FIELDS {
        let g = match pc.growth(field) {
            Some(g) if g < 0.0 => growth(g).red().to_string(),
            Some(g) => growth(g).green().to_string(),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(label),
            right(side(&pc.previous, field)),
            right(side(&pc.current, field)),
            right(g),
        ]);
    }

    print_title("Period Comparison", &ctx);
    if let Some(b) = pc.boundary {
        println!(
            "Current period starts after {} ({} day offset over a {} day span)",
            b.split_date, b.offset_days, b.total_days
        );
    }
    println!("{table}");
    if pc.previous.is_none() || pc.current.is_none() {
        println!("{}", "Not enough history on both sides of the split to compute growth.".dimmed());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Customers and categories
// ---------------------------------------------------------------------------

pub fn customers(args: FilterArgs, limit: usize) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let s = &ctx.settings;
    let customers = breakdown::customer_metrics(&ctx.loaded.rows);

    print_title("Customers", &ctx);
    if let Some(top) = breakdown::top_customers(&customers) {
        println!(
            "Highest revenue:   {} ({})",
            top.highest_revenue.customer_name,
            s.money(top.highest_revenue.totals.revenue)
        );
        println!(
            "Most profitable:   {} ({})",
            top.most_profitable.customer_name,
            s.money(top.most_profitable.totals.net_profit)
        );
        println!(
            "Most transactions: {} ({})",
            top.most_transactions.customer_name,
            number(top.most_transactions.transactions as i64)
        );
        println!(
            "Best margin:       {} ({})",
            top.best_margin.customer_name,
            percent(top.best_margin.net_margin)
        );
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Customer", "Revenue", "Txns", "Avg Revenue", "Net Profit", "Net %", "First", "Last", "Days",
    ]);
    for c in customers.iter().take(limit) {
        table.add_row(vec![
            Cell::new(&c.customer_name),
            right(s.money(c.totals.revenue)),
            right(number(c.transactions as i64)),
            right(s.money(c.avg_revenue)),
            right(signed_money(s, c.totals.net_profit)),
            right(percent(c.net_margin)),
            Cell::new(c.first_date),
            Cell::new(c.last_date),
            right(c.days_active),
        ]);
    }
    println!("{table}");
    if customers.len() > limit {
        println!("{}", format!("{} more not shown (use --limit)", customers.len() - limit).dimmed());
    }
    Ok(())
}

pub fn categories(args: FilterArgs) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let s = &ctx.settings;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Revenue", "COGS", "Net Profit", "Net %", "Share"]);
    for c in breakdown::category_summary(&ctx.loaded.rows) {
        table.add_row(vec![
            Cell::new(&c.category),
            right(s.money(c.totals.revenue)),
            right(s.money(c.totals.cogs)),
            right(signed_money(s, c.totals.net_profit)),
            right(percent(c.net_margin)),
            right(format!("{:.1}%", c.revenue_share)),
        ]);
    }
    print_title("Categories", &ctx);
    println!("{table}");
    Ok(())
}

pub fn matrix(args: FilterArgs, top: usize) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let s = &ctx.settings;

    let mut table = Table::new();
    table.set_header(vec!["Customer", "Category", "Revenue", "Net Profit", "Net %"]);
    let mut last_customer: Option<String> = None;
    for cell in breakdown::customer_category_matrix(&ctx.loaded.rows, top) {
        let name = if last_customer.as_deref() == Some(cell.customer_name.as_str()) {
            String::new()
        } else {
            cell.customer_name.clone()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(&cell.category),
            right(s.money(cell.revenue)),
            right(signed_money(s, cell.net_profit)),
            right(percent(cell.net_margin)),
        ]);
        last_customer = Some(cell.customer_name);
    }
    print_title(&format!("Customer x Category (top {top} customers)"), &ctx);
    println!("{table}");
    Ok(())
}

pub fn diversity(args: FilterArgs) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let s = &ctx.settings;
    let d = breakdown::diversification(&ctx.loaded.rows);

    print_title("Category Diversification", &ctx);
    println!("Avg categories per customer: {:.1}", d.avg_categories);
    if let Some(m) = &d.most_diversified {
        println!("Most diversified:            {} ({} categories)", m.customer_name, m.categories);
    }
    println!(
        "Single-category customers:   {} ({:.1}% of total)",
        d.single_category_customers, d.single_category_pct
    );
    println!(
        "Revenue from multi-category: {} ({:.1}%)",
        s.money(d.multi_category_revenue),
        d.multi_category_revenue_pct
    );

    let mut table = Table::new();
    table.set_header(vec!["Customer", "Categories", "Revenue"]);
    for c in d.customers.iter().take(20) {
        table.add_row(vec![
            Cell::new(&c.customer_name),
            right(c.categories),
            right(s.money(c.revenue)),
        ]);
    }
    println!("{table}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Expenses and daily
// ---------------------------------------------------------------------------

pub fn expenses(args: FilterArgs) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let s = &ctx.settings;
    let totals = compute_metrics_with(&ctx.loaded.rows, &ctx.state.split).totals;

    let mut table = Table::new();
    table.set_header(vec!["Expense", "Amount", "% of Revenue"]);
    let lines = breakdown::expense_breakdown(&totals);
    for line in &lines {
        table.add_row(vec![
            Cell::new(line.label),
            right(s.money(line.amount)),
            right(percent(line.pct_of_revenue)),
        ]);
    }
    let total: f64 = lines.iter().map(|l| l.amount).sum();
    table.add_row(vec![
        Cell::new("Total".bold()),
        right(s.money(total)),
        right(percent(crate::metrics::ratio_pct(total, totals.revenue))),
    ]);
    print_title("Expense Breakdown", &ctx);
    println!("Revenue: {}", s.money(totals.revenue));
    println!("{table}");
    Ok(())
}

pub fn daily(args: FilterArgs) -> Result<()> {
    let Some(ctx) = load_context(&args)? else {
        return Ok(());
    };
    let s = &ctx.settings;

    let mut table = Table::new();
    table.set_header(vec!["Date", "Revenue", "COGS", "Net Profit"]);
    for day in breakdown::daily_series(&ctx.loaded.rows) {
        table.add_row(vec![
            Cell::new(day.date),
            right(s.money(day.revenue)),
            right(s.money(day.cogs)),
            right(signed_money(s, day.net_profit)),
        ]);
    }
    print_title("Daily Trend", &ctx);
    println!("{table}");
    Ok(())
}
