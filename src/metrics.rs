//! Totals, margins, monthly trend and period comparison over a set of
//! transactions.
//!
//! Everything here is a pure function of its inputs. Callers re-run
//! [`compute_metrics`] whenever the row set or the filter changes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Transaction;

/// `part / whole * 100`, or `0.0` when `whole` is zero or the result is not finite.
pub fn ratio_pct(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let pct = part / whole * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Period-over-period growth in percent. A missing or zero previous value
/// yields `0.0`.
pub fn growth_rate(current: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if prev != 0.0 => ratio_pct(current - prev, prev),
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Sums and totals
// ---------------------------------------------------------------------------

/// Running sums of the four stored money fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoneySums {
    pub revenue: f64,
    pub cogs: f64,
    pub sales_commission: f64,
    pub sales_program: f64,
}

impl MoneySums {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut sums = Self::default();
        for row in rows {
            sums.add(row);
        }
        sums
    }

    pub fn add(&mut self, row: &Transaction) {
        self.revenue += row.revenue;
        self.cogs += row.cogs;
        self.sales_commission += row.sales_commission;
        self.sales_program += row.sales_program;
    }

    /// Combine partial sums computed over disjoint row partitions.
    pub fn merge(self, other: Self) -> Self {
        Self {
            revenue: self.revenue + other.revenue,
            cogs: self.cogs + other.cogs,
            sales_commission: self.sales_commission + other.sales_commission,
            sales_program: self.sales_program + other.sales_program,
        }
    }

    pub fn totals(&self) -> Totals {
        let gross_profit = self.revenue - self.cogs;
        Totals {
            revenue: self.revenue,
            cogs: self.cogs,
            sales_commission: self.sales_commission,
            sales_program: self.sales_program,
            gross_profit,
            // revenue - cogs - commission - program, evaluated left to right
            net_profit: gross_profit - self.sales_commission - self.sales_program,
            total_expenses: self.sales_commission + self.sales_program,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub revenue: f64,
    pub cogs: f64,
    pub sales_commission: f64,
    pub sales_program: f64,
    pub gross_profit: f64,
    pub net_profit: f64,
    pub total_expenses: f64,
}

/// Profit as a percent of revenue. Zero unless revenue is positive, so a
/// net-negative revenue (returns exceeding sales) never flips the sign.
pub fn margin_pct(profit: f64, revenue: f64) -> f64 {
    if revenue > 0.0 {
        ratio_pct(profit, revenue)
    } else {
        0.0
    }
}

impl Totals {
    pub fn margins(&self) -> Margins {
        Margins {
            gross_margin: margin_pct(self.gross_profit, self.revenue),
            net_margin: margin_pct(self.net_profit, self.revenue),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Margins {
    pub gross_margin: f64,
    pub net_margin: f64,
}

// ---------------------------------------------------------------------------
// Monthly series
// ---------------------------------------------------------------------------

/// Calendar month used to group rows, ordered by year then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Three-letter month label, e.g. "Jan".
    pub fn short_label(&self) -> &'static str {
        match self.month {
            1 => "Jan",
            2 => "Feb",
            3 => "Mar",
            4 => "Apr",
            5 => "May",
            6 => "Jun",
            7 => "Jul",
            8 => "Aug",
            9 => "Sep",
            10 => "Oct",
            11 => "Nov",
            12 => "Dec",
            _ => "???",
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyEntry {
    pub month: MonthKey,
    pub totals: Totals,
    pub margins: Margins,
}

/// One entry per month present in `rows`, ascending. Empty months are not filled in.
pub fn monthly_series(rows: &[Transaction]) -> Vec<MonthlyEntry> {
    let mut groups: BTreeMap<MonthKey, MoneySums> = BTreeMap::new();
    for row in rows {
        groups.entry(MonthKey::of(row.date)).or_default().add(row);
    }
    groups
        .into_iter()
        .map(|(month, sums)| {
            let totals = sums.totals();
            MonthlyEntry {
                month,
                totals,
                margins: totals.margins(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Period comparison
// ---------------------------------------------------------------------------

/// Thresholds deciding where the "current" period starts. The defaults are
/// empirical and kept for compatibility with existing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodSplit {
    /// Spans up to this many days are halved.
    pub short_window_days: i64,
    /// Spans up to this many days use `medium_offset_days`.
    pub medium_window_days: i64,
    pub medium_offset_days: i64,
    /// Offset for anything longer than `medium_window_days`.
    pub long_offset_days: i64,
}

impl Default for PeriodSplit {
    fn default() -> Self {
        Self {
            short_window_days: 7,
            medium_window_days: 60,
            medium_offset_days: 30,
            long_offset_days: 90,
        }
    }
}

impl PeriodSplit {
    /// Offsets and windows must not be negative.
    pub fn is_valid(&self) -> bool {
        [
            self.short_window_days,
            self.medium_window_days,
            self.medium_offset_days,
            self.long_offset_days,
        ]
        .iter()
        .all(|v| *v >= 0)
    }

    /// Days between the latest date and the split date, never negative.
    pub fn offset_for(&self, total_days: i64) -> i64 {
        let offset = if total_days <= self.short_window_days {
            total_days / 2
        } else if total_days <= self.medium_window_days {
            self.medium_offset_days
        } else {
            self.long_offset_days
        };
        offset.max(0)
    }
}

/// Sums for one side of a period comparison. Margins are left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodSnapshot {
    pub revenue: f64,
    pub cogs: f64,
    pub sales_commission: f64,
    pub sales_program: f64,
    pub gross_profit: f64,
    pub net_profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodField {
    Revenue,
    Cogs,
    SalesCommission,
    SalesProgram,
    GrossProfit,
    NetProfit,
}

impl PeriodSnapshot {
    fn from_rows<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> Option<Self> {
        let mut sums = MoneySums::default();
        let mut count = 0usize;
        for row in rows {
            sums.add(row);
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let totals = sums.totals();
        Some(Self {
            revenue: totals.revenue,
            cogs: totals.cogs,
            sales_commission: totals.sales_commission,
            sales_program: totals.sales_program,
            gross_profit: totals.gross_profit,
            net_profit: totals.net_profit,
        })
    }

    pub fn get(&self, field: PeriodField) -> f64 {
        match field {
            PeriodField::Revenue => self.revenue,
            PeriodField::Cogs => self.cogs,
            PeriodField::SalesCommission => self.sales_commission,
            PeriodField::SalesProgram => self.sales_program,
            PeriodField::GrossProfit => self.gross_profit,
            PeriodField::NetProfit => self.net_profit,
        }
    }
}

/// Where the row set was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodBoundary {
    pub total_days: i64,
    pub offset_days: i64,
    /// Last day of the previous period; the current period starts the day after.
    pub split_date: NaiveDate,
}

/// `None` on either side means that side had no rows, which is not the same
/// as a side whose sums are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub current: Option<PeriodSnapshot>,
    pub previous: Option<PeriodSnapshot>,
    pub boundary: Option<PeriodBoundary>,
}

impl PeriodComparison {
    /// Growth of one field from previous to current, when both sides exist.
    pub fn growth(&self, field: PeriodField) -> Option<f64> {
        match (&self.current, &self.previous) {
            (Some(cur), Some(prev)) => Some(growth_rate(cur.get(field), Some(prev.get(field)))),
            _ => None,
        }
    }
}

pub fn period_comparison(rows: &[Transaction], split: &PeriodSplit) -> PeriodComparison {
    let (Some(min_date), Some(max_date)) = (
        rows.iter().map(|r| r.date).min(),
        rows.iter().map(|r| r.date).max(),
    ) else {
        return PeriodComparison::default();
    };

    let total_days = (max_date - min_date).num_days();
    let offset_days = split.offset_for(total_days);
    // offsets beyond the calendar saturate, putting every row in the current period
    let split_date = u64::try_from(offset_days)
        .ok()
        .and_then(|days| max_date.checked_sub_days(Days::new(days)))
        .unwrap_or(NaiveDate::MIN);

    PeriodComparison {
        current: PeriodSnapshot::from_rows(rows.iter().filter(|r| r.date > split_date)),
        previous: PeriodSnapshot::from_rows(rows.iter().filter(|r| r.date <= split_date)),
        boundary: Some(PeriodBoundary {
            total_days,
            offset_days,
            split_date,
        }),
    }
}

// ---------------------------------------------------------------------------
// Metrics result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsResult {
    pub totals: Totals,
    pub margins: Margins,
    pub monthly: Vec<MonthlyEntry>,
    pub period_comparison: PeriodComparison,
}

pub fn compute_metrics(rows: &[Transaction]) -> MetricsResult {
    compute_metrics_with(rows, &PeriodSplit::default())
}

pub fn compute_metrics_with(rows: &[Transaction], split: &PeriodSplit) -> MetricsResult {
    if rows.is_empty() {
        return MetricsResult::default();
    }
    let totals = MoneySums::from_rows(rows).totals();
    MetricsResult {
        totals,
        margins: totals.margins(),
        monthly: monthly_series(rows),
        period_comparison: period_comparison(rows, split),
    }
}

// ---------------------------------------------------------------------------
// Summary report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Currency,
    Percent,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Percent => "percent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "currency" => Some(Self::Currency),
            "percent" => Some(Self::Percent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub metric: String,
    pub value: f64,
    pub unit: Unit,
}

pub const SUMMARY_METRICS: [&str; 8] = [
    "Revenue",
    "COGS",
    "Commission",
    "Program",
    "Gross Profit",
    "Net Profit",
    "Gross Margin",
    "Net Margin",
];

/// Flatten totals and margins into the fixed export order.
pub fn summary_report(metrics: &MetricsResult) -> Vec<SummaryLine> {
    let t = &metrics.totals;
    let m = &metrics.margins;
    let values = [
        (t.revenue, Unit::Currency),
        (t.cogs, Unit::Currency),
        (t.sales_commission, Unit::Currency),
        (t.sales_program, Unit::Currency),
        (t.gross_profit, Unit::Currency),
        (t.net_profit, Unit::Currency),
        (m.gross_margin, Unit::Percent),
        (m.net_margin, Unit::Percent),
    ];
    SUMMARY_METRICS
        .iter()
        .zip(values)
        .map(|(name, (value, unit))| SummaryLine {
            metric: name.to_string(),
            value,
            unit,
        })
        .collect()
}
