//! Display formatting helpers for prices, counts, durations and timestamps.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::{Display, Write};

pub const DEFAULT_CURRENCY: &str = "¥";

/// Format a price with a currency symbol, e.g. `¥19.90`.
pub fn format_price(price: f64, currency: &str, decimals: usize) -> String {
    format!("{}{:.*}", currency, decimals, price)
}

/// Format an integer with a thousands separator, e.g. `1,234,567`.
pub fn format_number(number: i64, separator: &str) -> String {
    let digits = number.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(separator);
        }
        grouped.push(ch);
    }

    if number < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format a ratio (`0.0..=1.0`) as a percentage, e.g. `0.256` → `25.6%`.
pub fn format_percentage(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

/// Human-readable duration: `45s`, `2m 5s`, `1h 23m`.
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        return format!("{:.0}s", seconds);
    }

    let total = seconds as u64;
    let (minutes, secs) = (total / 60, total % 60);
    if minutes < 60 {
        return format!("{}m {}s", minutes, secs);
    }

    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp with a strftime pattern. Invalid patterns fall back to
/// [`DEFAULT_DATETIME_FORMAT`].
pub fn format_datetime<Tz>(dt: &DateTime<Tz>, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    if write!(out, "{}", dt.format(pattern)).is_ok() {
        return out;
    }

    tracing::warn!("Invalid datetime pattern {:?}, using default", pattern);
    out.clear();
    // The default pattern contains only valid specifiers
    let _ = write!(out, "{}", dt.format(DEFAULT_DATETIME_FORMAT));
    out
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Relative description of `dt` as seen from `now`, e.g. `3 hours ago`.
pub fn format_relative_time_from(dt: DateTime<Local>, now: DateTime<Local>) -> String {
    let delta = now - dt;
    let days = delta.num_days();

    if days > 365 {
        plural(days / 365, "year")
    } else if days > 30 {
        plural(days / 30, "month")
    } else if days > 0 {
        plural(days, "day")
    } else if delta.num_hours() > 0 {
        plural(delta.num_hours(), "hour")
    } else if delta.num_minutes() > 0 {
        plural(delta.num_minutes(), "minute")
    } else {
        "just now".to_string()
    }
}

pub fn format_relative_time(dt: DateTime<Local>) -> String {
    format_relative_time_from(dt, Local::now())
}

/// Binary-scaled file size with two decimals, e.g. `1.50 MB`.
pub fn format_file_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = size_bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

/// Truncate to at most `max_chars` characters, ending with `suffix` when cut.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(suffix.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(suffix);
    truncated
}

/// Join items, collapsing the tail into `and N more` past `max_items`.
pub fn format_list<T: Display>(items: &[T], separator: &str, max_items: Option<usize>) -> String {
    let join = |items: &[T]| {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(separator)
    };

    match max_items {
        Some(max) if max > 0 && items.len() > max => {
            let remaining = items.len() - max;
            format!("{}{}and {} more", join(&items[..max]), separator, remaining)
        }
        _ => join(items),
    }
}

pub fn format_boolean<'a>(value: bool, true_text: &'a str, false_text: &'a str) -> &'a str {
    if value { true_text } else { false_text }
}

/// Group an 11-digit CN mobile number as `138 1234 5678`; other input is returned unchanged.
pub fn format_phone_number(phone: &str, region: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();

    if region == "CN" && digits.len() == 11 {
        format!("{} {} {}", &digits[..3], &digits[3..7], &digits[7..])
    } else {
        phone.to_string()
    }
}

pub fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_price() {
        assert_eq!(format_price(19.9, DEFAULT_CURRENCY, 2), "¥19.90");
        assert_eq!(format_price(5.0, "$", 0), "$5");
    }

    #[test]
    fn test_number() {
        assert_eq!(format_number(0, ","), "0");
        assert_eq!(format_number(999, ","), "999");
        assert_eq!(format_number(1000, ","), "1,000");
        assert_eq!(format_number(1234567, " "), "1 234 567");
        assert_eq!(format_number(-1234, ","), "-1,234");
    }

    #[test]
    fn test_percentage_and_duration() {
        assert_eq!(format_percentage(0.256, 1), "25.6%");
        assert_eq!(format_percentage(1.0, 0), "100%");

        assert_eq!(format_duration(45.0), "45s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(5000.0), "1h 23m");
    }

    #[test]
    fn test_relative_time() {
        let now = Local::now();
        assert_eq!(format_relative_time_from(now, now), "just now");
        assert_eq!(
            format_relative_time_from(now - Duration::minutes(1), now),
            "1 minute ago"
        );
        assert_eq!(
            format_relative_time_from(now - Duration::hours(3), now),
            "3 hours ago"
        );
        assert_eq!(
            format_relative_time_from(now - Duration::days(2), now),
            "2 days ago"
        );
        assert_eq!(
            format_relative_time_from(now - Duration::days(65), now),
            "2 months ago"
        );
        assert_eq!(
            format_relative_time_from(now - Duration::days(800), now),
            "2 years ago"
        );
    }

    #[test]
    fn test_file_size() {
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_text("short", 10, "..."), "short");
        assert_eq!(truncate_text("a long product title", 10, "..."), "a long ...");
        assert_eq!(truncate_text("京东商城自营旗舰店", 5, "…"), "京东商城…");
    }

    #[test]
    fn test_list() {
        let items = ["a", "b", "c", "d"];
        assert_eq!(format_list(&items, ", ", None), "a, b, c, d");
        assert_eq!(format_list(&items, ", ", Some(2)), "a, b, and 2 more");
        assert_eq!(format_list(&items, ", ", Some(4)), "a, b, c, d");
    }

    #[test]
    fn test_misc() {
        assert_eq!(format_boolean(true, "Yes", "No"), "Yes");
        assert_eq!(format_phone_number("138-1234-5678", "CN"), "138 1234 5678");
        assert_eq!(format_phone_number("12345", "CN"), "12345");
        assert_eq!(capitalize_words("hello  wORLD"), "Hello World");

        let dt = Local.with_ymd_and_hms(2024, 3, 5, 8, 9, 10).unwrap();
        assert_eq!(format_datetime(&dt, "%Y-%m-%d %H:%M:%S"), "2024-03-05 08:09:10");
    }

    #[test]
    fn test_format_datetime_invalid_pattern() {
        let dt = Local.with_ymd_and_hms(2024, 3, 5, 8, 9, 10).unwrap();
        assert_eq!(format_datetime(&dt, "%Q"), "2024-03-05 08:09:10");
        assert_eq!(format_datetime(&dt, "%Y %"), "2024-03-05 08:09:10");
        assert_eq!(format_datetime(&dt, "%d.%m"), "05.03");
    }
}
