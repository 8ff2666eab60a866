//! Customer, category and day level analyses layered on top of the metrics
//! engine. All functions are pure and share its zero-division policy.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics::{ratio_pct, MoneySums, Totals};
use crate::models::Transaction;

fn by_revenue_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMetrics {
    pub customer_name: String,
    pub totals: Totals,
    pub transactions: usize,
    pub avg_revenue: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub days_active: i64,
    pub net_margin: f64,
}

struct CustomerAcc {
    sums: MoneySums,
    count: usize,
    first: NaiveDate,
    last: NaiveDate,
}

/// Per-customer totals, sorted by revenue descending then name.
pub fn customer_metrics(rows: &[Transaction]) -> Vec<CustomerMetrics> {
    let mut groups: BTreeMap<&str, CustomerAcc> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(row.customer_name.as_str()).or_insert_with(|| CustomerAcc {
            sums: MoneySums::default(),
            count: 0,
            first: row.date,
            last: row.date,
        });
        acc.sums.add(row);
        acc.count += 1;
        acc.first = acc.first.min(row.date);
        acc.last = acc.last.max(row.date);
    }

    let mut out: Vec<CustomerMetrics> = groups
        .into_iter()
        .map(|(name, acc)| {
            let totals = acc.sums.totals();
            CustomerMetrics {
                customer_name: name.to_string(),
                avg_revenue: totals.revenue / acc.count as f64,
                net_margin: totals.margins().net_margin,
                totals,
                transactions: acc.count,
                first_date: acc.first,
                last_date: acc.last,
                days_active: (acc.last - acc.first).num_days() + 1,
            }
        })
        .collect();
    // stable sort keeps the name order from the map for equal revenue
    out.sort_by(|a, b| by_revenue_desc(a.totals.revenue, b.totals.revenue));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopCustomers<'a> {
    pub highest_revenue: &'a CustomerMetrics,
    pub most_profitable: &'a CustomerMetrics,
    pub most_transactions: &'a CustomerMetrics,
    pub best_margin: &'a CustomerMetrics,
}

/// Leaders among `customers`. Ties go to the earlier entry.
pub fn top_customers(customers: &[CustomerMetrics]) -> Option<TopCustomers<'_>> {
    let (first, rest) = customers.split_first()?;
    let mut top = TopCustomers {
        highest_revenue: first,
        most_profitable: first,
        most_transactions: first,
        best_margin: first,
    };
    for c in rest {
        if c.totals.revenue > top.highest_revenue.totals.revenue {
            top.highest_revenue = c;
        }
        if c.totals.net_profit > top.most_profitable.totals.net_profit {
            top.most_profitable = c;
        }
        if c.transactions > top.most_transactions.transactions {
            top.most_transactions = c;
        }
        if c.net_margin > top.best_margin.net_margin {
            top.best_margin = c;
        }
    }
    Some(top)
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub totals: Totals,
    pub net_margin: f64,
    /// Share of overall revenue, in percent.
    pub revenue_share: f64,
}

pub fn category_summary(rows: &[Transaction]) -> Vec<CategorySummary> {
    let mut groups: BTreeMap<&str, MoneySums> = BTreeMap::new();
    for row in rows {
        groups.entry(row.category.as_str()).or_default().add(row);
    }
    let total_revenue: f64 = groups.values().map(|s| s.revenue).sum();

    let mut out: Vec<CategorySummary> = groups
        .into_iter()
        .map(|(category, sums)| {
            let totals = sums.totals();
            CategorySummary {
                category: category.to_string(),
                net_margin: totals.margins().net_margin,
                revenue_share: ratio_pct(totals.revenue, total_revenue),
                totals,
            }
        })
        .collect();
    out.sort_by(|a, b| by_revenue_desc(a.totals.revenue, b.totals.revenue));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixCell {
    pub customer_name: String,
    pub category: String,
    pub revenue: f64,
    pub net_profit: f64,
    pub net_margin: f64,
}

/// Customer x category cells for the `top_n` customers by revenue, ordered
/// by customer rank then category name.
pub fn customer_category_matrix(rows: &[Transaction], top_n: usize) -> Vec<MatrixCell> {
    let ranked: Vec<String> = customer_metrics(rows)
        .into_iter()
        .take(top_n)
        .map(|c| c.customer_name)
        .collect();
    let rank: HashMap<&str, usize> = ranked
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut cells: BTreeMap<(usize, &str), MoneySums> = BTreeMap::new();
    for row in rows {
        if let Some(&r) = rank.get(row.customer_name.as_str()) {
            cells.entry((r, row.category.as_str())).or_default().add(row);
        }
    }

    cells
        .into_iter()
        .map(|((r, category), sums)| {
            let totals = sums.totals();
            MatrixCell {
                customer_name: ranked[r].clone(),
                category: category.to_string(),
                revenue: totals.revenue,
                net_profit: totals.net_profit,
                net_margin: totals.margins().net_margin,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Diversification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSpread {
    pub customer_name: String,
    pub categories: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diversification {
    /// Sorted by revenue descending.
    pub customers: Vec<CustomerSpread>,
    pub avg_categories: f64,
    /// Customer buying from the most categories; the higher-revenue one on ties.
    pub most_diversified: Option<CustomerSpread>,
    pub single_category_customers: usize,
    pub single_category_pct: f64,
    pub multi_category_revenue: f64,
    pub multi_category_revenue_pct: f64,
}

pub fn diversification(rows: &[Transaction]) -> Diversification {
    let mut groups: BTreeMap<&str, (BTreeSet<&str>, f64)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.customer_name.as_str()).or_default();
        entry.0.insert(row.category.as_str());
        entry.1 += row.revenue;
    }

    let mut customers: Vec<CustomerSpread> = groups
        .into_iter()
        .map(|(name, (cats, revenue))| CustomerSpread {
            customer_name: name.to_string(),
            categories: cats.len(),
            revenue,
        })
        .collect();
    customers.sort_by(|a, b| by_revenue_desc(a.revenue, b.revenue));

    let total_customers = customers.len();
    let total_revenue: f64 = customers.iter().map(|c| c.revenue).sum();
    let category_sum: usize = customers.iter().map(|c| c.categories).sum();
    let single = customers.iter().filter(|c| c.categories == 1).count();
    let multi_revenue: f64 = customers
        .iter()
        .filter(|c| c.categories > 1)
        .map(|c| c.revenue)
        .sum();

    let mut most_diversified: Option<&CustomerSpread> = None;
    for c in &customers {
        if most_diversified.map_or(true, |m| c.categories > m.categories) {
            most_diversified = Some(c);
        }
    }

    Diversification {
        avg_categories: if total_customers == 0 {
            0.0
        } else {
            category_sum as f64 / total_customers as f64
        },
        most_diversified: most_diversified.cloned(),
        single_category_customers: single,
        single_category_pct: ratio_pct(single as f64, total_customers as f64),
        multi_category_revenue: multi_revenue,
        multi_category_revenue_pct: ratio_pct(multi_revenue, total_revenue),
        customers,
    }
}

// ---------------------------------------------------------------------------
// Expenses and daily trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseLine {
    pub label: &'static str,
    pub amount: f64,
    /// Percent of revenue.
    pub pct_of_revenue: f64,
}

pub fn expense_breakdown(totals: &Totals) -> Vec<ExpenseLine> {
    [
        ("COGS", totals.cogs),
        ("Sales Commission", totals.sales_commission),
        ("Sales Program", totals.sales_program),
    ]
    .into_iter()
    .map(|(label, amount)| ExpenseLine {
        label,
        amount,
        pct_of_revenue: ratio_pct(amount, totals.revenue),
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub revenue: f64,
    pub cogs: f64,
    pub net_profit: f64,
}

/// One entry per date present in `rows`, ascending.
pub fn daily_series(rows: &[Transaction]) -> Vec<DailyEntry> {
    let mut groups: BTreeMap<NaiveDate, MoneySums> = BTreeMap::new();
    for row in rows {
        groups.entry(row.date).or_default().add(row);
    }
    groups
        .into_iter()
        .map(|(date, sums)| {
            let totals = sums.totals();
            DailyEntry {
                date,
                revenue: totals.revenue,
                cogs: totals.cogs,
                net_profit: totals.net_profit,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;

    fn row(d: &str, revenue: f64, cogs: f64, customer: &str, category: &str) -> Transaction {
        Transaction {
            date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
            revenue,
            cogs,
            sales_commission: 0.0,
            sales_program: 0.0,
            customer_name: customer.into(),
            category: category.into(),
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            row("2024-01-01", 100.0, 50.0, "Acme", "Software"),
            row("2024-01-10", 300.0, 100.0, "Acme", "Hardware"),
            row("2024-01-05", 500.0, 450.0, "Beta", "Hardware"),
            row("2024-01-05", 50.0, 0.0, "Gamma", "Services"),
            row("2024-01-06", 50.0, 0.0, "Gamma", "Services"),
        ]
    }

    #[test]
    fn test_customer_metrics() {
        let customers = customer_metrics(&sample());
        let names: Vec<&str> = customers.iter().map(|c| c.customer_name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Acme", "Gamma"]);

        let acme = &customers[1];
        assert_eq!(acme.transactions, 2);
        assert_eq!(acme.avg_revenue, 200.0);
        assert_eq!(acme.days_active, 10);
        assert_eq!(acme.totals.net_profit, 250.0);
        assert_eq!(acme.net_margin, 62.5);
        assert_eq!(customers[0].days_active, 1);
    }

    #[test]
    fn test_customer_metrics_ties_sorted_by_name() {
        let rows = vec![
            row("2024-01-01", 10.0, 0.0, "Zulu", "A"),
            row("2024-01-01", 10.0, 0.0, "Alpha", "A"),
        ];
        let names: Vec<String> = customer_metrics(&rows).into_iter().map(|c| c.customer_name).collect();
        assert_eq!(names, vec!["Alpha", "Zulu"]);
    }

    #[test]
    fn test_top_customers() {
        let customers = customer_metrics(&sample());
        let top = top_customers(&customers).unwrap();
        assert_eq!(top.highest_revenue.customer_name, "Beta");
        assert_eq!(top.most_profitable.customer_name, "Acme");
        assert_eq!(top.most_transactions.customer_name, "Acme");
        assert_eq!(top.best_margin.customer_name, "Gamma");
        assert!(top_customers(&[]).is_none());
    }

    #[test]
    fn test_category_summary_shares() {
        let cats = category_summary(&sample());
        assert_eq!(cats[0].category, "Hardware");
        assert_eq!(cats[0].totals.revenue, 800.0);
        assert_eq!(cats[0].revenue_share, 80.0);
        let share_sum: f64 = cats.iter().map(|c| c.revenue_share).sum();
        assert!((share_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix_limited_to_top_customers() {
        let cells = customer_category_matrix(&sample(), 2);
        let keys: Vec<(&str, &str)> = cells
            .iter()
            .map(|c| (c.customer_name.as_str(), c.category.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("Beta", "Hardware"), ("Acme", "Hardware"), ("Acme", "Software")]
        );
        assert_eq!(cells[1].net_profit, 200.0);
    }

    #[test]
    fn test_diversification() {
        let d = diversification(&sample());
        assert_eq!(d.customers.len(), 3);
        assert!((d.avg_categories - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(d.most_diversified.as_ref().unwrap().customer_name, "Acme");
        assert_eq!(d.single_category_customers, 2);
        assert_eq!(d.multi_category_revenue, 400.0);
        assert_eq!(d.multi_category_revenue_pct, 40.0);
    }

    #[test]
    fn test_diversification_empty() {
        let d = diversification(&[]);
        assert_eq!(d.avg_categories, 0.0);
        assert!(d.most_diversified.is_none());
        assert_eq!(d.single_category_pct, 0.0);
    }

    #[test]
    fn test_expense_breakdown_zero_revenue() {
        let lines = expense_breakdown(&compute_metrics(&[row("2024-01-01", 0.0, 10.0, "A", "B")]).totals);
        assert_eq!(lines[0].amount, 10.0);
        assert!(lines.iter().all(|l| l.pct_of_revenue == 0.0));
    }

    #[test]
    fn test_daily_series() {
        let days = daily_series(&sample());
        assert_eq!(days.len(), 4);
        assert_eq!(days[1].revenue, 550.0);
        assert_eq!(days[1].net_profit, 100.0);
        assert!(days.windows(2).all(|w| w[0].date < w[1].date));
    }
}
