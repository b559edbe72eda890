//! Input validators used by the settings dialog and collection setup.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("Invalid email regex")
});

/// A scheme followed by `://` and a non-empty host
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^/?#\s]+([/?#]\S*)?$").expect("Invalid URL regex")
});

/// Mainland China mobile number
static CN_PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[3-9]\d{9}$").expect("Invalid phone regex"));

static FILENAME_INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("Invalid filename regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_url(url: &str) -> bool {
    URL_PATTERN.is_match(url)
}

/// Only the `CN` region is recognised; other regions never validate.
pub fn is_valid_phone(phone: &str, region: &str) -> bool {
    match region {
        "CN" => CN_PHONE_PATTERN.is_match(phone),
        _ => false,
    }
}

pub fn is_valid_port(port: i64) -> bool {
    (1..=65535).contains(&port)
}

/// True when `value` has non-whitespace content.
pub fn is_non_empty_string(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Inclusive range check.
pub fn is_in_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    min <= value && value <= max
}

/// Check a string's length in characters against optional inclusive bounds.
pub fn validate_string_length(value: &str, min: Option<usize>, max: Option<usize>) -> bool {
    let length = value.chars().count();
    min.is_none_or(|min| length >= min) && max.is_none_or(|max| length <= max)
}

/// Product identifiers are non-empty runs of ASCII digits.
pub fn is_valid_product_id(product_id: &str) -> bool {
    !product_id.is_empty() && product_id.bytes().all(|b| b.is_ascii_digit())
}

/// A price must parse as a finite, strictly positive number.
pub fn is_valid_price(price: &str) -> bool {
    price
        .trim()
        .parse::<f64>()
        .is_ok_and(|value| value.is_finite() && value > 0.0)
}

/// Replace characters that are invalid in Windows or Unix filenames
///
/// Leading and trailing whitespace and dots are stripped; an empty result
/// becomes `"unnamed"`.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced = FILENAME_INVALID_CHARS.replace_all(filename, "_");
    let sanitized = replaced.trim().trim_matches('.');

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized.to_string()
    }
}

/// True when every key in `required` is present in the JSON object.
pub fn has_required_keys(
    data: &serde_json::Map<String, serde_json::Value>,
    required: &[&str],
) -> bool {
    required.iter().all(|key| data.contains_key(*key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("buyer@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.cn"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("user@host"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_url() {
        assert!(is_valid_url("https://item.jd.com/100012043978.html"));
        assert!(is_valid_url("http://localhost:8080"));
        assert!(!is_valid_url("item.jd.com/1.html"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("not a url"));
    }

    #[test]
    fn test_phone() {
        assert!(is_valid_phone("13812345678", "CN"));
        assert!(!is_valid_phone("12812345678", "CN"));
        assert!(!is_valid_phone("1381234567", "CN"));
        assert!(!is_valid_phone("13812345678", "US"));
    }

    #[test]
    fn test_port_and_range() {
        assert!(is_valid_port(1));
        assert!(is_valid_port(65535));
        assert!(!is_valid_port(0));
        assert!(!is_valid_port(65536));

        assert!(is_in_range(5, 1, 10));
        assert!(is_in_range(1.0, 1.0, 1.0));
        assert!(!is_in_range(10.5, 1.0, 10.0));
    }

    #[test]
    fn test_strings() {
        assert!(is_non_empty_string("x"));
        assert!(!is_non_empty_string("   \t"));

        assert!(validate_string_length("京东", Some(2), Some(2)));
        assert!(!validate_string_length("abc", Some(4), None));
        assert!(!validate_string_length("abc", None, Some(2)));
        assert!(validate_string_length("", None, None));
    }

    #[test]
    fn test_product_id_and_price() {
        assert!(is_valid_product_id("100012043978"));
        assert!(!is_valid_product_id("10001a"));
        assert!(!is_valid_product_id(""));

        assert!(is_valid_price("19.90"));
        assert!(!is_valid_price("0"));
        assert!(!is_valid_price("-3"));
        assert!(!is_valid_price("free"));
        assert!(!is_valid_price("inf"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report: 1/2?.csv"), "report_ 1_2_.csv");
        assert_eq!(sanitize_filename("  ..hidden.. "), "hidden");
        assert_eq!(sanitize_filename("..."), "unnamed");
        assert_eq!(sanitize_filename(""), "unnamed");
    }

    #[test]
    fn test_required_keys() {
        let data = serde_json::json!({"id": 1, "name": "Phone"});
        let map = data.as_object().unwrap();
        assert!(has_required_keys(map, &["id", "name"]));
        assert!(!has_required_keys(map, &["id", "price"]));
    }
}
