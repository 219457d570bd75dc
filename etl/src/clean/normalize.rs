//! Field normalizers.
//!
//! Each normalizer maps one cell to its canonical form and returns `Null`
//! when the input cannot be normalized. [`Normalizers`] bundles one of each
//! so callers can swap individual rules.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::Value;

/// A single-cell normalization rule.
pub type Normalize = fn(&Value) -> Value;

/// Category assigned when the source leaves it blank.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

const PHONE_PREFIX: &str = "+91";
const PHONE_DIGITS: usize = 10;

static NON_DIGIT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\D").ok());

/// Month-first forms are tried before day-first ones.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y%m%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// The normalizers applied by the cleaning stage.
#[derive(Debug, Clone, Copy)]
pub struct Normalizers {
    pub phone: Normalize,
    pub category: Normalize,
    pub date: Normalize,
    pub email: Normalize,
}

impl Default for Normalizers {
    fn default() -> Self {
        Self {
            phone,
            category,
            date,
            email,
        }
    }
}

/// `+91-XXXXXXXXXX` when the value holds exactly ten digits.
pub fn phone(value: &Value) -> Value {
    let raw = match value {
        Value::Text(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        _ => return Value::Null,
    };
    let Some(non_digit) = NON_DIGIT.as_ref() else {
        return Value::Null;
    };
    let digits = non_digit.replace_all(&raw, "");
    if digits.len() == PHONE_DIGITS {
        Value::Text(format!("{}-{}", PHONE_PREFIX, digits))
    } else {
        Value::Null
    }
}

/// Trimmed, first letter upper-cased, rest lower-cased.
pub fn category(value: &Value) -> Value {
    let trimmed = match value {
        Value::Text(s) => s.trim(),
        Value::Null => return Value::Text(UNKNOWN_CATEGORY.to_string()),
        other => return other.clone(),
    };
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(&chars.as_str().to_lowercase());
            Value::Text(out)
        }
        None => Value::Text(UNKNOWN_CATEGORY.to_string()),
    }
}

/// Parse the common date layouts found in the extracts.
pub fn date(value: &Value) -> Value {
    let s = match value {
        Value::Date(d) => return Value::Date(*d),
        Value::Text(s) => s.trim(),
        _ => return Value::Null,
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .map(Value::Date)
        .unwrap_or(Value::Null)
}

pub fn email(value: &Value) -> Value {
    match value {
        Value::Text(s) => Value::text(s.trim().to_lowercase()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap())
    }

    #[test]
    fn test_phone_formats() {
        assert_eq!(phone(&"98765-43210".into()), Value::from("+91-9876543210"));
        assert_eq!(phone(&"(987) 654 3210".into()), Value::from("+91-9876543210"));
        assert_eq!(phone(&Value::Int(9876543210)), Value::from("+91-9876543210"));
        assert_eq!(phone(&"+91 98765 43210".into()), Value::Null);
        assert_eq!(phone(&"12345".into()), Value::Null);
        assert_eq!(phone(&Value::Null), Value::Null);
    }

    #[test]
    fn test_category() {
        assert_eq!(category(&"  eLECTRONICS ".into()), Value::from("Electronics"));
        assert_eq!(category(&"home & garden".into()), Value::from("Home & garden"));
        assert_eq!(category(&Value::Null), Value::from("Unknown"));
    }

    #[test]
    fn test_date_layouts() {
        assert_eq!(date(&"2024-01-15".into()), d(2024, 1, 15));
        assert_eq!(date(&"15/01/2024".into()), d(2024, 1, 15));
        assert_eq!(date(&"01/15/2024".into()), d(2024, 1, 15));
        assert_eq!(date(&"01-15-2024".into()), d(2024, 1, 15));
        assert_eq!(date(&"Jan 15, 2024".into()), d(2024, 1, 15));
        assert_eq!(date(&"2024-01-15 10:30:00".into()), d(2024, 1, 15));
        assert_eq!(date(&"not a date".into()), Value::Null);
        assert_eq!(date(&Value::Null), Value::Null);
    }

    #[test]
    fn test_email() {
        assert_eq!(email(&" Rahul@Gmail.COM ".into()), Value::from("rahul@gmail.com"));
        assert_eq!(email(&"   ".into()), Value::Null);
    }

    #[test]
    fn test_normalizers_are_swappable() {
        fn keep(v: &Value) -> Value {
            v.clone()
        }
        let n = Normalizers {
            phone: keep,
            ..Normalizers::default()
        };
        assert_eq!((n.phone)(&"123".into()), Value::from("123"));
        assert_eq!((n.email)(&"A@B.C".into()), Value::from("a@b.c"));
    }
}
