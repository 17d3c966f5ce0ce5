use crate::marketplace::Currency;

/// Format a monetary amount with the currency symbol and thousands
/// separators, e.g. `$1,234.50`.
pub fn format_amount(amount: f64, currency: &Currency) -> String {
  format!("{}{}", currency.symbol, group_thousands(amount, 2))
}

/// Compact representation for chart axis labels: `1.2k`, `3.4M`.
pub fn format_compact(amount: f64) -> String {
  let magnitude = amount.abs();
  if magnitude >= 1_000_000.0 {
    format!("{:.1}M", amount / 1_000_000.0)
  } else if magnitude >= 1_000.0 {
    format!("{:.1}k", amount / 1_000.0)
  } else {
    format!("{:.0}", amount)
  }
}

/// Signed percentage delta with an arrow, e.g. `▲ 12.5%`.
pub fn format_delta(delta: f64) -> String {
  if delta >= 0.0 {
    format!("▲ {:.1}%", delta)
  } else {
    format!("▼ {:.1}%", delta.abs())
  }
}

/// Truncate a string to a maximum number of characters, adding "..." if
/// truncated. Counts chars, not bytes, so multibyte names never split.
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

fn group_thousands(amount: f64, decimals: usize) -> String {
  let negative = amount < 0.0;
  let formatted = format!("{:.*}", decimals, amount.abs());
  let (integer, fraction) = match formatted.split_once('.') {
    Some((i, f)) => (i, Some(f)),
    None => (formatted.as_str(), None),
  };

  let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
  for (i, c) in integer.chars().enumerate() {
    if i > 0 && (integer.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }

  let mut output = String::new();
  if negative {
    output.push('-');
  }
  output.push_str(&grouped);
  if let Some(fraction) = fraction {
    output.push('.');
    output.push_str(fraction);
  }
  output
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_amount_groups_thousands() {
    let usd = Currency::default();
    assert_eq!(format_amount(1234.5, &usd), "$1,234.50");
    assert_eq!(format_amount(1_234_567.0, &usd), "$1,234,567.00");
  }

  #[test]
  fn test_format_amount_small() {
    let usd = Currency::default();
    assert_eq!(format_amount(0.0, &usd), "$0.00");
    assert_eq!(format_amount(42.0, &usd), "$42.00");
  }

  #[test]
  fn test_format_amount_negative() {
    let usd = Currency::default();
    assert_eq!(format_amount(-1234.5, &usd), "$-1,234.50");
  }

  #[test]
  fn test_format_compact() {
    assert_eq!(format_compact(950.0), "950");
    assert_eq!(format_compact(1_200.0), "1.2k");
    assert_eq!(format_compact(3_400_000.0), "3.4M");
  }

  #[test]
  fn test_format_delta() {
    assert_eq!(format_delta(12.5), "▲ 12.5%");
    assert_eq!(format_delta(-3.2), "▼ 3.2%");
    assert_eq!(format_delta(0.0), "▲ 0.0%");
  }

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte_names() {
    // Accented names from the backend must not split inside a character.
    let name = "é".repeat(20);
    assert_eq!(truncate(&name, 30), name);
    assert_eq!(truncate(&name, 10), format!("{}...", "é".repeat(7)));
    assert_eq!(truncate("Müller & Söhne GmbH", 10), "Müller ...");
  }
}
