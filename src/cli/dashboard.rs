use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use crate::app::{AppState, DataSource, Query};
use crate::breakdown::{customer_metrics, CustomerMetrics};
use crate::cli::{FilterArgs, NO_DATA};
use crate::error::Result;
use crate::filters::{DateRange, DateSpec, Filter};
use crate::fmt::{number, percent};
use crate::metrics::{compute_metrics_with, MetricsResult, PeriodField, PeriodSplit};
use crate::models::Transaction;
use crate::settings::{load_settings, Settings};
use crate::tui::{
    format_compact, growth_span, money_span, run_view, y_axis_ticks, View, ViewAction, BOLD,
    FOOTER_STYLE, HEADER_STYLE,
};

const TOP_CUSTOMERS: usize = 8;
/// Months shown in the bar chart; older months scroll off the left.
const CHART_MONTHS: usize = 12;

/// Date window selected with the number keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Default,
    LastDays(u32),
    All,
    Custom(DateRange),
}

struct Snapshot {
    range: Option<DateRange>,
    rows: usize,
    metrics: MetricsResult,
    customers: Vec<CustomerMetrics>,
}

pub struct Dashboard {
    settings: Settings,
    split: PeriodSplit,
    source_label: String,
    /// Rows matching the category/customer filter, any date.
    rows: Vec<Transaction>,
    data_range: Option<DateRange>,
    window: Window,
    snapshot: Snapshot,
}

impl Dashboard {
    fn new(
        settings: Settings,
        split: PeriodSplit,
        source_label: String,
        rows: Vec<Transaction>,
        data_range: Option<DateRange>,
        window: Window,
    ) -> Self {
        let mut dash = Self {
            settings,
            split,
            source_label,
            rows,
            data_range,
            window,
            snapshot: Snapshot {
                range: None,
                rows: 0,
                metrics: MetricsResult::default(),
                customers: Vec::new(),
            },
        };
        dash.recompute();
        dash
    }

    fn resolve_window(&self) -> Option<DateRange> {
        let max = self.data_range.map(|r| r.end());
        match self.window {
            Window::All => None,
            Window::Custom(r) => Some(r),
            Window::LastDays(n) => DateSpec::LastDays(n).resolve(max),
            Window::Default => self
                .data_range
                .map(|r| DateRange::default_window(r.start(), r.end())),
        }
    }

    fn recompute(&mut self) {
        let range = self.resolve_window();
        let filter = Filter {
            date_range: range,
            ..Filter::default()
        };
        let rows = filter.apply(&self.rows);
        self.snapshot = Snapshot {
            range,
            rows: rows.len(),
            metrics: compute_metrics_with(&rows, &self.split),
            customers: customer_metrics(&rows),
        };
    }

    fn set_window(&mut self, window: Window) {
        if self.window != window {
            self.window = window;
            self.recompute();
        }
    }

    fn window_label(&self) -> String {
        let range = match self.snapshot.range {
            Some(r) => format!("{} to {}", r.start(), r.end()),
            None => "all dates".to_string(),
        };
        match self.window {
            Window::LastDays(n) => format!("Last {n} days ({range})"),
            _ => range,
        }
    }

    fn kpi_line(&self, label: &str, value: f64, field: Option<PeriodField>) -> Line<'static> {
        let mut spans = vec![
            Span::raw(format!(" {label:<15}")),
            money_span(value, &self.settings),
        ];
        if let Some(field) = field {
            spans.push(Span::raw("  "));
            spans.push(growth_span(self.snapshot.metrics.period_comparison.growth(field)));
        }
        Line::from(spans)
    }

    fn draw_kpis(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);
        let m = &self.snapshot.metrics;
        let t = &m.totals;

        let left_lines = vec![
            self.kpi_line("Revenue", t.revenue, Some(PeriodField::Revenue)),
            self.kpi_line("COGS", t.cogs, Some(PeriodField::Cogs)),
            self.kpi_line("Gross Profit", t.gross_profit, Some(PeriodField::GrossProfit)),
            self.kpi_line("Net Profit", t.net_profit, Some(PeriodField::NetProfit)),
            Line::from(format!(" {:<15}{}", "Transactions", number(self.snapshot.rows as i64))),
        ];
        frame.render_widget(Paragraph::new(left_lines), left);

        let split_line = match m.period_comparison.boundary {
            Some(b) => format!(" {:<15}after {}", "Current period", b.split_date),
            None => format!(" {:<15}-", "Current period"),
        };
        let right_lines = vec![
            Line::from(format!(" {:<15}{}", "Gross Margin", percent(m.margins.gross_margin))),
            Line::from(format!(" {:<15}{}", "Net Margin", percent(m.margins.net_margin))),
            self.kpi_line("Commission", t.sales_commission, Some(PeriodField::SalesCommission)),
            self.kpi_line("Program", t.sales_program, Some(PeriodField::SalesProgram)),
            Line::from(Span::styled(split_line, FOOTER_STYLE)),
        ];
        frame.render_widget(Paragraph::new(right_lines), right);
    }

    fn draw_chart(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let monthly = &self.snapshot.metrics.monthly;
        if monthly.is_empty() {
            return;
        }
        let shown = &monthly[monthly.len().saturating_sub(CHART_MONTHS)..];
        let max_val = shown
            .iter()
            .flat_map(|e| [e.totals.revenue, e.totals.net_profit])
            .fold(0.0_f64, f64::max);
        let (top_tick, mid_tick) = y_axis_ticks(max_val);
        let symbol = &self.settings.currency_symbol;
        let top_label = format_compact(top_tick, symbol);
        let mid_label = format_compact(mid_tick, symbol);
        let y_label_width = top_label.len().max(mid_label.len()) as u16 + 1;

        let [y_axis_area, bar_area] =
            Layout::horizontal([Constraint::Length(y_label_width), Constraint::Fill(1)]).areas(area);

        let inner_height = bar_area.height.saturating_sub(2);
        let mid_row = inner_height / 2;
        let mut y_lines: Vec<Line> = vec![Line::from("")];
        for row in 0..inner_height {
            let label = if row == 0 {
                top_label.as_str()
            } else if row == mid_row {
                mid_label.as_str()
            } else {
                ""
            };
            y_lines.push(Line::from(Span::styled(
                format!("{:>width$}", label, width = y_label_width as usize),
                FOOTER_STYLE,
            )));
        }
        frame.render_widget(Paragraph::new(y_lines), y_axis_area);

        let revenue_style = Style::default().fg(Color::Rgb(80, 160, 255));
        let profit_style = Style::default().fg(Color::Rgb(80, 220, 100));
        let loss_style = Style::default().fg(Color::Red);
        let to_bar = |v: f64| v.max(0.0).round() as u64;

        let groups: Vec<BarGroup> = shown
            .iter()
            .map(|e| {
                let net = e.totals.net_profit;
                let bars = vec![
                    Bar::default()
                        .value(to_bar(e.totals.revenue))
                        .text_value(String::new())
                        .style(revenue_style),
                    Bar::default()
                        .value(to_bar(net))
                        .text_value(String::new())
                        .style(if net < 0.0 { loss_style } else { profit_style }),
                ];
                BarGroup::default()
                    .label(Line::from(e.month.short_label()))
                    .bars(&bars)
            })
            .collect();

        let block = Block::default()
            .title("Monthly Revenue / Net Profit")
            .title_style(BOLD)
            .borders(Borders::NONE);
        let mut chart = BarChart::default()
            .block(block)
            .bar_width(2)
            .bar_gap(0)
            .group_gap(1)
            .max(to_bar(top_tick));
        for group in &groups {
            chart = chart.data(group.clone());
        }
        frame.render_widget(chart, bar_area);
    }

    fn draw_customers(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let top: Vec<&CustomerMetrics> = self.snapshot.customers.iter().take(TOP_CUSTOMERS).collect();
        let name_width = top.iter().map(|c| c.customer_name.len()).max().unwrap_or(10);
        let mut lines = vec![Line::from(Span::styled(" Top Customers", BOLD))];
        for c in top {
            lines.push(Line::from(vec![
                Span::raw(format!(" {:<width$}  ", c.customer_name, width = name_width)),
                money_span(c.totals.revenue, &self.settings),
                Span::styled(format!("  {}", percent(c.net_margin)), FOOTER_STYLE),
            ]));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}

impl View for Dashboard {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep1, kpi_area, sep2, charts_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(5),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(format!(
                " margo | {} | {}",
                self.source_label,
                self.window_label()
            ))
            .style(HEADER_STYLE),
            header_area,
        );

        let sep_line = "━".repeat(area.width as usize);
        let sep_widget = Paragraph::new(sep_line.as_str()).style(border_style);
        frame.render_widget(sep_widget.clone(), sep1);
        frame.render_widget(sep_widget, sep2);

        if self.snapshot.rows == 0 {
            frame.render_widget(Paragraph::new(format!(" {NO_DATA}")), kpi_area);
        } else {
            self.draw_kpis(frame, kpi_area);
            let [chart_left, chart_right] =
                Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .areas(charts_area);
            self.draw_chart(frame, chart_left);
            self.draw_customers(frame, chart_right);
        }

        frame.render_widget(
            Paragraph::new(" 1=7 days  2=30 days  3=90 days  a=all  d=default  q=quit")
                .style(FOOTER_STYLE),
            hints_area,
        );
    }

    fn handle_key(&mut self, code: KeyCode) -> ViewAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Close,
            KeyCode::Char('1') => self.set_window(Window::LastDays(7)),
            KeyCode::Char('2') => self.set_window(Window::LastDays(30)),
            KeyCode::Char('3') => self.set_window(Window::LastDays(90)),
            KeyCode::Char('a') => self.set_window(Window::All),
            KeyCode::Char('d') => self.set_window(Window::Default),
            _ => {}
        }
        ViewAction::Continue
    }
}

fn initial_window(dates: DateSpec) -> Window {
    match dates {
        DateSpec::All => Window::Default,
        DateSpec::LastDays(n) => Window::LastDays(n),
        DateSpec::Range(r) => Window::Custom(r),
    }
}

pub fn run(args: FilterArgs) -> Result<()> {
    let settings = load_settings();
    let query = args.query()?;
    // Load every date once so the window keys can re-filter in memory.
    let state = AppState::new(
        &settings,
        args.upload_path(),
        Query {
            dates: DateSpec::All,
            ..query.clone()
        },
    );
    let loaded = state.load_rows()?;
    if loaded.rows.is_empty() {
        println!("{NO_DATA}");
        return Ok(());
    }

    let source_label = match &state.source {
        DataSource::Database(_) => "database".to_string(),
        DataSource::Upload(path) => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string()),
    };
    let window = initial_window(query.dates);
    let mut dash = Dashboard::new(
        settings,
        state.split,
        source_label,
        loaded.rows,
        loaded.data_range,
        window,
    );
    run_view(&mut dash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(d: &str, revenue: f64, customer: &str) -> Transaction {
        Transaction {
            date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
            revenue,
            cogs: revenue / 4.0,
            sales_commission: 0.0,
            sales_program: 0.0,
            customer_name: customer.into(),
            category: "General".into(),
        }
    }

    fn dashboard(window: Window) -> Dashboard {
        let rows = vec![
            row("2024-01-01", 100.0, "Acme"),
            row("2024-02-20", 200.0, "Beta"),
            row("2024-03-25", 300.0, "Acme"),
            row("2024-03-31", 400.0, "Gamma"),
        ];
        let data_range = crate::store::rows_date_range(&rows);
        Dashboard::new(
            Settings::default(),
            PeriodSplit::default(),
            "test".into(),
            rows,
            data_range,
            window,
        )
    }

    #[test]
    fn test_default_window_is_last_30_days() {
        let dash = dashboard(Window::Default);
        assert_eq!(dash.snapshot.rows, 2);
        assert_eq!(dash.snapshot.metrics.totals.revenue, 700.0);
        assert_eq!(dash.snapshot.customers[0].customer_name, "Gamma");
    }

    #[test]
    fn test_window_keys_refilter() {
        let mut dash = dashboard(Window::Default);
        assert!(matches!(dash.handle_key(KeyCode::Char('a')), ViewAction::Continue));
        assert_eq!(dash.snapshot.rows, 4);
        assert_eq!(dash.snapshot.metrics.monthly.len(), 3);

        dash.handle_key(KeyCode::Char('1'));
        assert_eq!(dash.snapshot.rows, 2);
        assert!(dash.window_label().starts_with("Last 7 days"));

        dash.handle_key(KeyCode::Char('3'));
        assert_eq!(dash.snapshot.rows, 4);
        assert!(matches!(dash.handle_key(KeyCode::Char('q')), ViewAction::Close));
    }

    #[test]
    fn test_custom_range_from_args() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        )
        .unwrap();
        let window = initial_window(DateSpec::Range(range));
        let dash = dashboard(window);
        assert_eq!(dash.snapshot.rows, 1);
        assert_eq!(dash.window_label(), "2024-02-01 to 2024-02-29");
    }
}
