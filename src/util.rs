// Utility helpers for header cleaning, lenient numeric parsing and number
// formatting.
//
// The sales exports are hand-maintained spreadsheets: headers carry embedded
// newlines and amounts carry thousands separators or stray text. Everything
// that smooths that over lives here so the rest of the code sees clean,
// typed values.
use num_format::{Locale, ToFormattedString};

/// Collapse a raw CSV header into its canonical name.
///
/// Newlines become spaces, runs of whitespace collapse to one space and the
/// result is trimmed, so `"2024\nUnits "` becomes `"2024 Units"`.
pub fn clean_header(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a signed number, forgiving thousands separators and padding.
///
/// Returns `None` for blanks, text and non-finite values.
pub fn parse_f64_lenient(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', "");
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Units and monetary amounts: unparseable or negative input coerces to 0.
pub fn coerce_amount(s: &str) -> f64 {
    match parse_f64_lenient(s) {
        Some(v) if v >= 0.0 => v,
        _ => 0.0,
    }
}

/// Signed figures (forecast CAGR, shares): unparseable input coerces to 0.
pub fn coerce_signed(s: &str) -> f64 {
    parse_f64_lenient(s).unwrap_or(0.0)
}

/// Accepts `2019` as well as the float form `2019.0` spreadsheets emit.
pub fn parse_year(s: &str) -> Option<i32> {
    let v = parse_f64_lenient(s)?;
    if v.fract() != 0.0 || v < i32::MIN as f64 || v > i32::MAX as f64 {
        return None;
    }
    Some(v as i32)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators, e.g. `1,234.50`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// Whole-number rendering of an amount, truncating like an integer cast.
pub fn format_whole(n: f64) -> String {
    format_number(n.trunc(), 0)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Join three per-year figures with ` / `.
pub fn join_years<F>(values: &[f64], fmt: F) -> String
where
    F: Fn(f64) -> String,
{
    values.iter().map(|v| fmt(*v)).collect::<Vec<_>>().join(" / ")
}
