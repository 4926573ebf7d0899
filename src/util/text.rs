use std::str::FromStr;

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;

/// 數字欄位中常見、轉型前需要移除的字元
const NUMBER_ESCAPE_CHAR: &[char] = &['元', '%', ',', ' ', '"', '\n'];

/// 證交所用來表示「沒有資料」的字串
const EMPTY_MARKERS: &[&str] = &["", "-", "--", "---", "X0.00"];

/// Parses a decimal value from a given string.
///
/// Thousands separators and the characters in `NUMBER_ESCAPE_CHAR` are removed
/// before parsing; `escape_chars` adds more characters to strip.
///
/// # Example
///
/// ```
/// let s = "1,234.56";
/// let decimal_value = parse_decimal(s, None).unwrap();
/// ```
pub fn parse_decimal(s: &str, escape_chars: Option<Vec<char>>) -> Result<Decimal> {
    let cleaned = clean_escape_chars(s, escape_chars);
    Decimal::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

/// 寬鬆轉型：無法轉成數字的欄位（例如 `--`）回傳 `None`
pub fn coerce_decimal(s: &str) -> Option<Decimal> {
    if EMPTY_MARKERS.contains(&s.trim()) {
        return None;
    }

    parse_decimal(s, None).ok()
}

/// Removes the default number escape characters and any extra ones from a string.
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    s.chars().filter(|c| !combined.contains(c)).collect()
}
