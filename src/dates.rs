//! Date-filter arithmetic for the dashboard.
//!
//! Filters are spelled `this_month`, `previous_quarter`, `next_year`, ... or
//! `custom`. A filter selection is tracked as a signed offset per period
//! type: 0 is the current period, -1 the previous one, and so on.

use chrono::{Datelike, Months, NaiveDate};

use crate::controller::{OptionPath, OptionsTree};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period type `{0}`")]
pub struct PeriodParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodType {
  Month,
  Quarter,
  Year,
}

impl PeriodType {
  pub const ALL: [PeriodType; 3] = [PeriodType::Month, PeriodType::Quarter, PeriodType::Year];

  pub fn as_str(&self) -> &'static str {
    match self {
      PeriodType::Month => "month",
      PeriodType::Quarter => "quarter",
      PeriodType::Year => "year",
    }
  }

  /// Parse a period type from option data. A fiscal year is computed exactly
  /// like a year period.
  pub fn parse(raw: &str) -> Result<Self, PeriodParseError> {
    match raw {
      "month" => Ok(PeriodType::Month),
      "quarter" => Ok(PeriodType::Quarter),
      "year" | "fiscalyear" => Ok(PeriodType::Year),
      other => Err(PeriodParseError(other.to_string())),
    }
  }
}

/// Signed period offsets, one per period type. Only the filter the user last
/// touched is non-zero in practice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilters {
  month: i32,
  quarter: i32,
  year: i32,
}

impl DateFilters {
  pub fn get(&self, period: PeriodType) -> i32 {
    match period {
      PeriodType::Month => self.month,
      PeriodType::Quarter => self.quarter,
      PeriodType::Year => self.year,
    }
  }

  pub fn set(&mut self, period: PeriodType, offset: i32) {
    match period {
      PeriodType::Month => self.month = offset,
      PeriodType::Quarter => self.quarter = offset,
      PeriodType::Year => self.year = offset,
    }
  }

  pub fn shift(&mut self, period: PeriodType, delta: i32) -> i32 {
    let shifted = self.get(period) + delta;
    self.set(period, shifted);
    shifted
  }
}

/// Filter name for a period at a given offset: `previous_month`,
/// `this_month` or `next_month` depending on the sign.
pub fn filter_for_offset(period: PeriodType, offset: i32) -> String {
  let specifier = match offset.cmp(&0) {
    std::cmp::Ordering::Greater => "next",
    std::cmp::Ordering::Equal => "this",
    std::cmp::Ordering::Less => "previous",
  };
  format!("{}_{}", specifier, period.as_str())
}

/// Rebuild the offset table from loaded options.
///
/// The active period comes from `date.period_type`; its offset is
/// `date.period` when present, otherwise inferred from the filter's
/// `this`/`previous`/`next` specifier.
pub fn init_filters(options: &OptionsTree) -> DateFilters {
  let mut filters = DateFilters::default();

  let filter = options
    .get_str(&date_path("filter"))
    .unwrap_or("custom");
  let specifier = filter.split('_').next().unwrap_or("this");

  let period = options
    .get_str(&date_path("period_type"))
    .and_then(|raw| PeriodType::parse(raw).ok());

  if let Some(period) = period {
    let offset = options
      .get(&date_path("period"))
      .and_then(serde_json::Value::as_i64)
      .map(|n| n as i32)
      .unwrap_or(match specifier {
        "previous" => -1,
        "next" => 1,
        _ => 0,
      });
    filters.set(period, offset);
  }

  filters
}

/// Inclusive date bounds of the period `offset` steps away from the one
/// containing `today`.
pub fn period_bounds(period: PeriodType, offset: i32, today: NaiveDate) -> (NaiveDate, NaiveDate) {
  match period {
    PeriodType::Month => {
      let shifted = shift_months(today, offset);
      month_bounds(shifted.year(), shifted.month())
    }
    PeriodType::Quarter => {
      let shifted = shift_months(today, offset * 3);
      let start_month = quarter_start_month(shifted.month());
      let (from, _) = month_bounds(shifted.year(), start_month);
      let (_, to) = month_bounds(shifted.year(), start_month + 2);
      (from, to)
    }
    PeriodType::Year => {
      let year = today.year() + offset;
      (
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today),
        NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today),
      )
    }
  }
}

/// Human label for the selected period: "March 2026", "Jan - Mar 2026",
/// "2026".
pub fn display_period(period: PeriodType, offset: i32, today: NaiveDate) -> String {
  let (from, to) = period_bounds(period, offset, today);
  match period {
    PeriodType::Month => to.format("%B %Y").to_string(),
    PeriodType::Quarter => format!("{} - {}", from.format("%b"), to.format("%b %Y")),
    PeriodType::Year => to.format("%Y").to_string(),
  }
}

pub fn date_path(leaf: &str) -> OptionPath {
  OptionPath::of(["date", leaf])
}

fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
  if months >= 0 {
    date
      .checked_add_months(Months::new(months as u32))
      .unwrap_or(date)
  } else {
    date
      .checked_sub_months(Months::new(months.unsigned_abs()))
      .unwrap_or(date)
  }
}

fn month_bounds(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
  let (next_year, next_month) = if month == 12 {
    (year + 1, 1)
  } else {
    (year, month + 1)
  };
  let from = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
  let to = NaiveDate::from_ymd_opt(next_year, next_month, 1)
    .map(|d| d.pred_opt().unwrap_or(d))
    .unwrap_or(from);
  (from, to)
}

fn quarter_start_month(month: u32) -> u32 {
  ((month - 1) / 3) * 3 + 1
}
