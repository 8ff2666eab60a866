use std::collections::BTreeSet;

use chrono::{Days, Months, NaiveDate};

use crate::error::{MargoError, Result};
use crate::models::Transaction;

/// Which values of a text column to keep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    /// An empty list selects everything.
    pub fn from_values(values: &[String]) -> Self {
        if values.is_empty() {
            Self::All
        } else {
            Self::Only(values.iter().cloned().collect())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(value),
        }
    }

    pub fn values(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::All => None,
            Self::Only(set) => Some(set),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(MargoError::InvalidDate(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// `max_date - days ..= max_date`, starting no earlier than the first representable date.
    pub fn last_days(max_date: NaiveDate, days: u32) -> Self {
        let start = max_date
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: max_date }
    }

    /// The last 30 days when the data spans more than that, otherwise everything.
    pub fn default_window(min_date: NaiveDate, max_date: NaiveDate) -> Self {
        if (max_date - min_date).num_days() > 30 {
            Self::last_days(max_date, 30)
        } else {
            Self {
                start: min_date.min(max_date),
                end: max_date,
            }
        }
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        let invalid = || MargoError::InvalidDate(format!("{year:04}-{month:02}"));
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .ok_or_else(invalid)?;
        Ok(Self { start, end })
    }

    pub fn year(year: i32) -> Result<Self> {
        let invalid = || MargoError::InvalidDate(year.to_string());
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
        Ok(Self { start, end })
    }
}

/// How the user asked to restrict dates, before the data's last date is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateSpec {
    #[default]
    All,
    Range(DateRange),
    /// Relative to the most recent transaction date.
    LastDays(u32),
}

impl DateSpec {
    pub fn resolve(&self, max_date: Option<NaiveDate>) -> Option<DateRange> {
        match self {
            Self::All => None,
            Self::Range(range) => Some(*range),
            Self::LastDays(days) => max_date.map(|max| DateRange::last_days(max, *days)),
        }
    }
}

fn parse_iso(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| MargoError::InvalidDate(format!("{raw} (expected YYYY-MM-DD)")))
}

/// Build a [`DateSpec`] from the `--month`, `--year`, `--from`/`--to` and
/// `--last` command-line options, in that order of precedence after from/to.
pub fn date_spec_from_args(
    month: Option<&str>,
    year: Option<i32>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    last: Option<u32>,
) -> Result<DateSpec> {
    match (from_date, to_date) {
        (Some(from), Some(to)) => {
            return Ok(DateSpec::Range(DateRange::new(parse_iso(from)?, parse_iso(to)?)?));
        }
        (Some(_), None) => {
            return Err(MargoError::Other(
                "--from requires --to (both date boundaries must be specified)".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(MargoError::Other(
                "--to requires --from (both date boundaries must be specified)".to_string(),
            ));
        }
        (None, None) => {}
    }
    if let Some(m) = month {
        let invalid = || MargoError::InvalidDate(format!("{m} (expected YYYY-MM)"));
        let (y, mm) = m.split_once('-').ok_or_else(invalid)?;
        let y: i32 = y.parse().map_err(|_| invalid())?;
        let mm: u32 = mm.parse().map_err(|_| invalid())?;
        return Ok(DateSpec::Range(DateRange::month(y, mm)?));
    }
    if let Some(y) = year {
        return Ok(DateSpec::Range(DateRange::year(y)?));
    }
    if let Some(days) = last {
        return Ok(DateSpec::LastDays(days));
    }
    Ok(DateSpec::All)
}

/// Resolved filter: an optional inclusive date range plus category and customer selections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub date_range: Option<DateRange>,
    pub categories: Selection,
    pub customers: Selection,
}

impl Filter {
    pub fn matches(&self, row: &Transaction) -> bool {
        self.date_range.map_or(true, |r| r.contains(row.date))
            && self.categories.matches(&row.category)
            && self.customers.matches(&row.customer_name)
    }

    pub fn apply(&self, rows: &[Transaction]) -> Vec<Transaction> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_CATEGORY;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(d: &str, customer: &str, category: &str) -> Transaction {
        Transaction {
            date: date(d),
            revenue: 100.0,
            cogs: 50.0,
            sales_commission: 0.0,
            sales_program: 0.0,
            customer_name: customer.into(),
            category: category.into(),
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            row("2024-01-01", "Acme", "Software"),
            row("2024-01-15", "Beta", "Hardware"),
            row("2024-01-31", "Acme", DEFAULT_CATEGORY),
            row("2024-02-01", "Gamma", "Software"),
        ]
    }

    #[test]
    fn test_default_filter_keeps_everything() {
        assert_eq!(Filter::default().apply(&sample()).len(), 4);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = Filter {
            date_range: Some(DateRange::new(date("2024-01-01"), date("2024-01-31")).unwrap()),
            ..Filter::default()
        };
        let kept = filter.apply(&sample());
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|r| r.date.format("%m").to_string() == "01"));
    }

    #[test]
    fn test_category_and_customer_selection() {
        let filter = Filter {
            date_range: None,
            categories: Selection::from_values(&["Software".to_string()]),
            customers: Selection::from_values(&["Acme".to_string(), "Gamma".to_string()]),
        };
        let kept = filter.apply(&sample());
        let customers: Vec<&str> = kept.iter().map(|r| r.customer_name.as_str()).collect();
        assert_eq!(customers, vec!["Acme", "Gamma"]);
    }

    #[test]
    fn test_empty_selection_means_all() {
        assert_eq!(Selection::from_values(&[]), Selection::All);
        assert!(Selection::All.matches("anything"));
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(date("2024-02-01"), date("2024-01-01")).is_err());
    }

    #[test]
    fn test_month_and_year_ranges() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb.start(), date("2024-02-01"));
        assert_eq!(feb.end(), date("2024-02-29"));
        let dec = DateRange::month(2023, 12).unwrap();
        assert_eq!(dec.end(), date("2023-12-31"));
        assert!(DateRange::month(2024, 13).is_err());
        let y = DateRange::year(2025).unwrap();
        assert_eq!((y.start(), y.end()), (date("2025-01-01"), date("2025-12-31")));
    }

    #[test]
    fn test_last_days_and_default_window() {
        let r = DateRange::last_days(date("2024-03-31"), 7);
        assert_eq!(r.start(), date("2024-03-24"));
        let short = DateRange::default_window(date("2024-03-10"), date("2024-03-31"));
        assert_eq!(short.start(), date("2024-03-10"));
        let long = DateRange::default_window(date("2024-01-01"), date("2024-03-31"));
        assert_eq!(long.start(), date("2024-03-01"));
    }

    #[test]
    fn test_last_days_beyond_calendar_clamps() {
        let spec = date_spec_from_args(None, None, None, None, Some(4_000_000_000)).unwrap();
        let r = spec.resolve(Some(date("2024-01-01"))).unwrap();
        assert_eq!(r.start(), NaiveDate::MIN);
        assert_eq!(r.end(), date("2024-01-01"));
        assert!(r.contains(date("1900-01-01")));
    }

    #[test]
    fn test_date_spec_resolve() {
        assert_eq!(DateSpec::All.resolve(Some(date("2024-01-01"))), None);
        assert_eq!(DateSpec::LastDays(30).resolve(None), None);
        let r = DateSpec::LastDays(30).resolve(Some(date("2024-03-31"))).unwrap();
        assert_eq!(r.start(), date("2024-03-01"));
    }

    #[test]
    fn test_date_spec_from_args() {
        let spec = date_spec_from_args(None, None, Some("2024-01-01"), Some("2024-01-31"), None).unwrap();
        assert!(matches!(spec, DateSpec::Range(r) if r.end() == date("2024-01-31")));
        let spec = date_spec_from_args(Some("2024-02"), None, None, None, None).unwrap();
        assert!(matches!(spec, DateSpec::Range(r) if r.start() == date("2024-02-01")));
        let spec = date_spec_from_args(None, Some(2023), None, None, None).unwrap();
        assert!(matches!(spec, DateSpec::Range(r) if r.end() == date("2023-12-31")));
        assert_eq!(date_spec_from_args(None, None, None, None, Some(7)).unwrap(), DateSpec::LastDays(7));
        assert_eq!(date_spec_from_args(None, None, None, None, None).unwrap(), DateSpec::All);
    }

    #[test]
    fn test_date_spec_rejects_half_open_range() {
        let msg = date_spec_from_args(None, None, Some("2024-01-01"), None, None)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("--from requires --to"), "got: {msg}");
        let msg = date_spec_from_args(None, None, None, Some("2024-01-01"), None)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("--to requires --from"), "got: {msg}");
    }

    #[test]
    fn test_date_spec_rejects_bad_month() {
        assert!(date_spec_from_args(Some("2024"), None, None, None, None).is_err());
        assert!(date_spec_from_args(Some("2024-xx"), None, None, None, None).is_err());
    }
}
