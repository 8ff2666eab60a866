/// Insert thousands separators into a string of ASCII digits.
fn group_thousands(digits: &str) -> String {
    let mut with_commas = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Format an amount with a currency symbol and thousands separators:
/// `money(1234.5, "Rp", 0)` -> `Rp 1,235`, `money(-5.0, "$", 2)` -> `-$ 5.00`.
pub fn money(val: f64, symbol: &str, decimals: usize) -> String {
    let negative = val < 0.0;
    let fixed = format!("{:.*}", decimals, val.abs());
    let (int_part, dec_part) = match fixed.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::new();
    if negative && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    if !symbol.is_empty() {
        out.push_str(symbol);
        out.push(' ');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(d) = dec_part {
        out.push('.');
        out.push_str(d);
    }
    out
}

pub fn percent(val: f64) -> String {
    format!("{val:.2}%")
}

/// Signed growth label, e.g. `+12.5%`, `-3.0%`, `0.0%`.
pub fn growth(val: f64) -> String {
    if val > 0.0 {
        format!("+{val:.1}%")
    } else {
        format!("{val:.1}%")
    }
}

pub fn number(val: i64) -> String {
    let digits = group_thousands(&val.unsigned_abs().to_string());
    if val < 0 {
        format!("-{digits}")
    } else {
        digits
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
