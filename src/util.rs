// Parsing and display helpers.
//
// Store values arrive as loose text, so everything that turns them into
// numbers, dates or labels lives here and the rest of the crate can stay
// typed.
use chrono::{DateTime, Local, NaiveDate};
use num_format::{Locale, ToFormattedString};

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Parse a loosely formatted value into a finite `f64`.
///
/// - Trims whitespace.
/// - Returns `None` for empty input, anything `f64::from_str` rejects, and
///   for `NaN`/infinity (Rust happily parses the strings "NaN" and "inf").
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i32>().ok()
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // `YYYY-MM-DD`, optionally followed by a time part we ignore.
    let s = s?.trim();
    let day_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

/// `Some` only for present, non-empty text.
pub fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Spanish month name for a raw month value; "Mes N" when out of range.
pub fn month_name(raw: &str) -> String {
    match parse_i32_safe(Some(raw)) {
        Some(n @ 1..=12) => MONTH_NAMES[(n - 1) as usize].to_string(),
        Some(n) => format!("Mes {}", n),
        None => format!("Mes {}", raw.trim()),
    }
}

/// Calendar date in the `d/m/yyyy` form used throughout the report.
pub fn format_day(date: NaiveDate) -> String {
    date.format("%-d/%-m/%Y").to_string()
}

/// Display a record's raw date; text that is not a date is shown as-is.
pub fn display_date(raw: &str) -> String {
    match parse_date_safe(Some(raw)) {
        Some(d) => format_day(d),
        None => raw.to_string(),
    }
}

pub fn format_clock(now: &DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

pub fn average(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus thousands separators (e.g. `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_f64_rejects_garbage_and_non_finite() {
        assert_eq!(parse_f64_safe(Some(" 12.5 ")), Some(12.5));
        assert_eq!(parse_f64_safe(Some("abc")), None);
        assert_eq!(parse_f64_safe(Some("NaN")), None);
        assert_eq!(parse_f64_safe(Some("inf")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_name("7"), "Julio");
        assert_eq!(month_name("1"), "Enero");
        assert_eq!(month_name("12"), "Diciembre");
        assert!(month_name("13").contains("13"));
        assert_eq!(month_name("0"), "Mes 0");
        assert_eq!(month_name("julio"), "Mes julio");
    }

    #[test]
    fn dates_display_in_day_month_year() {
        assert_eq!(display_date("2024-07-05"), "5/7/2024");
        assert_eq!(display_date("2024-07-05T10:00:00+00:00"), "5/7/2024");
        assert_eq!(display_date("ayer"), "ayer");
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(0.0, 2), "0.00");
        assert_eq!(format_number(-3.5, 1), "-3.5");
        assert_eq!(format_int(9855), "9,855");
    }

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[1.0, 2.0, 3.0]), 2.0);
    }
}
