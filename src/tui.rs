use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::Frame;

use crate::error::Result;
use crate::settings::Settings;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const AMOUNT_POS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const AMOUNT_NEG_STYLE: Style = Style::new().fg(Color::Red);

pub const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);

/// Format an amount in the configured currency, green when non-negative and red otherwise.
pub fn money_span(amount: f64, settings: &Settings) -> Span<'static> {
    let style = if amount < 0.0 {
        AMOUNT_NEG_STYLE
    } else {
        AMOUNT_POS_STYLE
    };
    Span::styled(settings.money(amount), style)
}

/// Signed growth percentage, or a dim dash when there is nothing to compare against.
pub fn growth_span(growth: Option<f64>) -> Span<'static> {
    match growth {
        Some(g) if g < 0.0 => Span::styled(crate::fmt::growth(g), AMOUNT_NEG_STYLE),
        Some(g) => Span::styled(crate::fmt::growth(g), AMOUNT_POS_STYLE),
        None => Span::styled("n/a", FOOTER_STYLE),
    }
}

/// Round top and middle y-axis ticks (1, 2.5, 5 per decade) at or above `max_val`.
pub fn y_axis_ticks(max_val: f64) -> (f64, f64) {
    if !max_val.is_finite() || max_val <= 0.0 {
        return (1.0, 0.5);
    }
    let mut decade = 10f64.powi(max_val.log10().floor() as i32);
    let top = loop {
        if let Some(step) = [1.0, 2.5, 5.0, 10.0]
            .iter()
            .map(|m| m * decade)
            .find(|s| *s >= max_val)
        {
            break step;
        }
        decade *= 10.0;
    };
    (top, top / 2.0)
}

/// Compact axis label: `Rp1.5M`, `Rp250k`, `Rp2B`.
pub fn format_compact(val: f64, symbol: &str) -> String {
    let (scaled, suffix) = if val >= 1e9 {
        (val / 1e9, "B")
    } else if val >= 1e6 {
        (val / 1e6, "M")
    } else if val >= 1e3 {
        (val / 1e3, "k")
    } else {
        (val, "")
    };
    if scaled == scaled.floor() {
        format!("{symbol}{}{suffix}", scaled as u64)
    } else {
        format!("{symbol}{scaled:.1}{suffix}")
    }
}

// ---------------------------------------------------------------------------
// View loop
// ---------------------------------------------------------------------------

pub enum ViewAction {
    Continue,
    Close,
}

pub trait View {
    fn draw(&mut self, frame: &mut Frame);
    fn handle_key(&mut self, code: KeyCode) -> ViewAction;
}

/// Run an interactive ratatui view until it closes or Ctrl+C is pressed.
/// The terminal is restored on every exit path, including panics.
pub fn run_view(view: &mut dyn View) -> Result<()> {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| view.draw(frame)) {
            break Err(e.into());
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break Ok(());
                }
                match view.handle_key(key.code) {
                    ViewAction::Close => break Ok(()),
                    ViewAction::Continue => {}
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_y_axis_ticks() {
        assert_eq!(y_axis_ticks(900.0), (1000.0, 500.0));
        assert_eq!(y_axis_ticks(1000.0), (1000.0, 500.0));
        assert_eq!(y_axis_ticks(1200.0), (2500.0, 1250.0));
        assert_eq!(y_axis_ticks(7_300_000.0), (10_000_000.0, 5_000_000.0));
        assert_eq!(y_axis_ticks(0.0), (1.0, 0.5));
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(250_000.0, "Rp"), "Rp250k");
        assert_eq!(format_compact(1_500_000.0, "Rp"), "Rp1.5M");
        assert_eq!(format_compact(2_000_000_000.0, "$"), "$2B");
        assert_eq!(format_compact(500.0, "$"), "$500");
    }

    #[test]
    fn test_growth_span_content() {
        assert_eq!(growth_span(Some(12.5)).content, "+12.5%");
        assert_eq!(growth_span(Some(-3.0)).content, "-3.0%");
        assert_eq!(growth_span(None).content, "n/a");
    }

    #[test]
    fn test_money_span_uses_settings() {
        let settings = Settings {
            currency_symbol: "$".into(),
            currency_decimals: 2,
            ..Settings::default()
        };
        let span = money_span(-12.5, &settings);
        assert_eq!(span.content, "-$ 12.50");
        assert_eq!(span.style, AMOUNT_NEG_STYLE);
    }
}
