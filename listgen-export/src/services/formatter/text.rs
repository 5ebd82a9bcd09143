//! Cell value helpers shared by retailer templates

use chrono::{Duration, Months, NaiveDate};

use super::TemplateError;

/// First `max` characters (not bytes)
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Keep ASCII letters, digits and whitespace
pub fn strip_special(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Join the non-blank parts with single spaces
pub fn join_words(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Price with two decimals, optionally with thousands separators
pub fn format_price(value: f64, thousands: bool) -> Result<String, TemplateError> {
    if !value.is_finite() {
        return Err(TemplateError::InvalidPrice(value.to_string()));
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let whole = if thousands {
        let digits: Vec<char> = whole.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (idx, digit) in digits.iter().enumerate() {
            if idx > 0 && (digits.len() - idx) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(*digit);
        }
        grouped
    } else {
        whole.to_string()
    };

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    Ok(format!("{}{}.{}", sign, whole, cents))
}

/// Expected delivery: one calendar month ahead, day clamped to month end
pub fn delivery_date(from: NaiveDate) -> NaiveDate {
    from.checked_add_months(Months::new(1))
        .unwrap_or(from + Duration::days(30))
}
