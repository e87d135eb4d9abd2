//! # Price Loader
//!
//! $$
//! P_{t,i} = P_{t-1,i}\quad\text{when } P_{t,i} \text{ is missing}
//! $$
//!
//! Reads adjusted close prices from a `Date,<SYMBOL>,...` CSV file.

use std::io;
use std::path::Path;

use chrono::Months;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use ndarray::Array2;
use tracing::debug;
use tracing::info;

use crate::error::KellyError;
use crate::error::Result;
use crate::kelly::PriceSeries;

const DATE_COLUMN: &str = "Date";

fn parse_date(field: &str) -> Result<NaiveDate> {
  // "2024-01-05 00:00:00" and "2024-01-05T00:00:00" keep only the day.
  let day = field
    .trim()
    .split([' ', 'T'])
    .next()
    .unwrap_or_default();
  NaiveDate::parse_from_str(day, "%Y-%m-%d")
    .map_err(|e| KellyError::Data(format!("invalid date `{field}`: {e}")))
}

fn parse_price(field: &str, symbol: &str, date: NaiveDate) -> Result<Option<f64>> {
  let field = field.trim();
  if field.is_empty() {
    return Ok(None);
  }
  let value: f64 = field
    .parse()
    .map_err(|_| KellyError::Data(format!("invalid price `{field}` for {symbol} on {date}")))?;
  if !value.is_finite() {
    return Err(KellyError::Data(format!(
      "non-finite price `{field}` for {symbol} on {date}"
    )));
  }
  Ok(Some(value))
}

/// Load prices from a CSV file; see [`from_reader`].
pub fn read_csv(path: impl AsRef<Path>, symbols: &[String]) -> Result<PriceSeries> {
  let path = path.as_ref();
  let file = std::fs::File::open(path)?;
  let series = from_reader(file, symbols)?;
  info!(
    path = %path.display(),
    rows = series.len(),
    assets = series.symbols().len(),
    "loaded price data"
  );
  Ok(series)
}

/// Parse a price table.
///
/// When `symbols` is empty every non-date column is kept in file order,
/// otherwise exactly `symbols` sorted alphabetically. Rows are sorted by date,
/// gaps are forward-filled and leading rows that still have gaps are dropped.
pub fn from_reader<R: io::Read>(reader: R, symbols: &[String]) -> Result<PriceSeries> {
  let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
  let headers = rdr.headers()?.clone();

  let date_idx = headers
    .iter()
    .position(|h| h == DATE_COLUMN)
    .ok_or_else(|| KellyError::Data(format!("price data has no `{DATE_COLUMN}` column")))?;

  let selected: Vec<String> = if symbols.is_empty() {
    headers
      .iter()
      .enumerate()
      .filter(|(i, _)| *i != date_idx)
      .map(|(_, h)| h.to_string())
      .collect()
  } else {
    let mut s = symbols.to_vec();
    s.sort();
    s.dedup();
    s
  };
  let columns = selected
    .iter()
    .map(|s| {
      headers
        .iter()
        .position(|h| h == s)
        .ok_or_else(|| KellyError::Data(format!("price data has no column for `{s}`")))
    })
    .collect::<Result<Vec<usize>>>()?;

  let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
  for record in rdr.records() {
    let record = record?;
    let date = parse_date(record.get(date_idx).unwrap_or_default())?;
    let values = columns
      .iter()
      .zip(&selected)
      .map(|(&c, s)| parse_price(record.get(c).unwrap_or_default(), s, date))
      .collect::<Result<Vec<_>>>()?;
    rows.push((date, values));
  }

  rows.sort_by_key(|(d, _)| *d);
  if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
    return Err(KellyError::Data(format!("duplicate date {}", w[0].0)));
  }

  let mut filled = 0usize;
  let mut last: Vec<Option<f64>> = vec![None; selected.len()];
  for (_, values) in rows.iter_mut() {
    for (v, prev) in values.iter_mut().zip(last.iter_mut()) {
      match v {
        Some(_) => *prev = *v,
        None if prev.is_some() => {
          *v = *prev;
          filled += 1;
        }
        None => {}
      }
    }
  }

  let first_complete = rows
    .iter()
    .position(|(_, v)| v.iter().all(Option::is_some))
    .ok_or_else(|| KellyError::Data("no row has a price for every asset".into()))?;
  let rows = &rows[first_complete..];

  debug!(
    forward_filled = filled,
    dropped_leading = first_complete,
    "cleaned price table"
  );

  let dates = rows.iter().map(|(d, _)| *d).collect();
  let table = Array2::from_shape_fn((rows.len(), selected.len()), |(t, j)| {
    rows[t].1[j].unwrap_or(f64::NAN)
  });

  PriceSeries::new(dates, selected, table)
}

/// Keep the rows dated within `years` of the latest price.
pub fn trim_lookback(prices: &PriceSeries, years: u32) -> Result<PriceSeries> {
  let Some(&latest) = prices.dates().last() else {
    return Ok(prices.clone());
  };
  let start = latest
    .checked_sub_months(Months::new(years.saturating_mul(12)))
    .unwrap_or(NaiveDate::MIN);

  let first = prices.dates().partition_point(|d| *d < start);
  if first == 0 {
    return Ok(prices.clone());
  }

  debug!(%start, dropped = first, "trimmed price history to lookback window");
  PriceSeries::new(
    prices.dates()[first..].to_vec(),
    prices.symbols().to_vec(),
    prices.prices().slice(ndarray::s![first.., ..]).to_owned(),
  )
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use tempfile::tempdir;

  use super::*;

  fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
  }

  #[test]
  fn reads_sorts_and_selects() {
    let csv = "\
Date,SPY,BTC-USD,AAPL
2024-01-03,470.0,42000,184.0
2024-01-02 00:00:00,472.6,44000,185.6
2024-01-04,468.0,44100,181.9
";
    let symbols = vec!["SPY".to_string(), "AAPL".to_string()];
    let p = from_reader(csv.as_bytes(), &symbols).unwrap();

    assert_eq!(p.symbols(), &["AAPL".to_string(), "SPY".to_string()]);
    assert_eq!(p.dates(), &[day(1, 2), day(1, 3), day(1, 4)]);
    assert_eq!(p.prices()[[0, 0]], 185.6);
    assert_eq!(p.prices()[[2, 1]], 468.0);
  }

  #[test]
  fn empty_selection_keeps_file_order() {
    let csv = "Date,B,A\n2024-01-02,1,2\n2024-01-03,1.5,2.5\n";
    let p = from_reader(csv.as_bytes(), &[]).unwrap();
    assert_eq!(p.symbols(), &["B".to_string(), "A".to_string()]);
  }

  #[test]
  fn gaps_are_forward_filled_and_leading_gaps_dropped() {
    let csv = "\
Date,A,B
2024-01-01,,10
2024-01-02,5,11
2024-01-03,,12
2024-01-04,6,
";
    let p = from_reader(csv.as_bytes(), &[]).unwrap();

    assert_eq!(p.dates(), &[day(1, 2), day(1, 3), day(1, 4)]);
    assert_eq!(p.prices()[[1, 0]], 5.0);
    assert_eq!(p.prices()[[2, 1]], 12.0);
  }

  #[test]
  fn duplicate_dates_are_rejected() {
    let csv = "Date,A\n2024-01-02,1\n2024-01-02,2\n";
    let err = from_reader(csv.as_bytes(), &[]).unwrap_err();
    assert!(err.to_string().contains("duplicate date"));
  }

  #[test]
  fn missing_symbol_column_is_rejected() {
    let csv = "Date,A\n2024-01-02,1\n";
    let err = from_reader(csv.as_bytes(), &["QQQ".to_string()]).unwrap_err();
    assert!(matches!(err, KellyError::Data(m) if m.contains("QQQ")));
  }

  #[test]
  fn garbage_price_is_rejected() {
    let csv = "Date,A\n2024-01-02,abc\n";
    assert!(matches!(
      from_reader(csv.as_bytes(), &[]),
      Err(KellyError::Data(_))
    ));
  }

  #[test]
  fn non_finite_price_is_rejected() {
    let csv = "\
Date,A,B
2024-01-02,1.0,2.0
2024-01-03,inf,2.1
2024-01-04,1.3,2.3
";
    match from_reader(csv.as_bytes(), &[]) {
      Err(KellyError::Data(m)) => {
        assert!(m.contains("non-finite"), "{m}");
        assert!(m.contains("A on 2024-01-03"), "{m}");
      }
      other => panic!("expected data error, got {other:?}"),
    }

    let csv = "Date,A\n2024-01-02,1.0\n2024-01-03,NaN\n";
    assert!(matches!(
      from_reader(csv.as_bytes(), &[]),
      Err(KellyError::Data(_))
    ));
  }

  #[test]
  fn reads_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prices.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "Date,A").unwrap();
    writeln!(f, "2024-01-02,1.0").unwrap();
    writeln!(f, "2024-01-03,1.1").unwrap();
    drop(f);

    let p = read_csv(&path, &[]).unwrap();
    assert_eq!(p.len(), 2);
    assert!(matches!(
      read_csv(dir.path().join("missing.csv"), &[]),
      Err(KellyError::Io(_))
    ));
  }

  #[test]
  fn lookback_keeps_recent_rows() {
    let dates = vec![
      NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
      NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
      NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    ];
    let p = PriceSeries::new(dates, vec!["A".into()], ndarray::array![[1.0], [2.0], [3.0]]).unwrap();

    let trimmed = trim_lookback(&p, 3).unwrap();
    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed.prices()[[0, 0]], 2.0);
    assert_eq!(trim_lookback(&p, 10).unwrap().len(), 3);
  }
}
