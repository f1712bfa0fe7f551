//! Small utility helpers used across modules.

use chrono::{DateTime, Utc};

/// Round a non-negative ratio to the nearest whole percent (halves round up).
/// Returns 0 when the denominator is zero.
pub fn round_percent(numerator: u64, denominator: u64) -> u32 {
  if denominator == 0 { return 0; }
  (100.0 * numerator as f64 / denominator as f64).round() as u32
}

/// Calendar day key used for daily metric documents (`YYYY-MM-DD`, UTC).
pub fn day_key(at: DateTime<Utc>) -> String {
  at.format("%Y-%m-%d").to_string()
}

/// True if `s` looks like a `YYYY-MM-DD` day key.
pub fn is_day_key(s: &str) -> bool {
  chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() && s.len() == 10
}

/// Join a collection path and a document id.
pub fn doc_path(collection: &str, id: &str) -> String {
  format!("{}/{}", collection, id)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { return s.to_string(); }
  let mut cut = max;
  while !s.is_char_boundary(cut) { cut -= 1; }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn percent_rounds_halves_up() {
    assert_eq!(round_percent(1, 8), 13); // 12.5
    assert_eq!(round_percent(25, 30), 83);
    assert_eq!(round_percent(0, 0), 0);
  }

  #[test]
  fn day_key_is_utc_date() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
    assert_eq!(day_key(at), "2024-03-09");
    assert!(is_day_key("2024-03-09"));
    assert!(!is_day_key("2024-3-9"));
    assert!(!is_day_key("yesterday"));
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ñandú eléctrico";
    let t = trunc_for_log(s, 2);
    assert!(t.starts_with('ñ'));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
