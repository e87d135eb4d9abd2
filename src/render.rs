//! Console tables for the `kelly` binary.

use kelly_rs::KellyReport;
use kelly_rs::kelly::Allocation;
use kelly_rs::kelly::CorrelationMatrix;
use kelly_rs::kelly::ExpectedReturns;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;

const RULE_WIDTH: usize = 100;

fn rule() -> String {
  "*".repeat(RULE_WIDTH)
}

fn titled(titles: &[&str]) -> Table {
  let mut table = Table::new();
  table.set_titles(Row::new(titles.iter().map(|t| Cell::new(t)).collect()));
  table
}

pub fn expected_returns_table(title: &str, returns: &ExpectedReturns) -> String {
  let mut table = titled(&["Symbol", title]);
  for (symbol, m) in returns.iter() {
    table.add_row(Row::new(vec![
      Cell::new(symbol),
      Cell::new(&format!("{m:.4}")),
    ]));
  }
  table.to_string()
}

pub fn correlation_table(corr: &CorrelationMatrix) -> String {
  let mut titles = vec![""];
  titles.extend(corr.symbols().iter().map(String::as_str));
  let mut table = titled(&titles);

  for (i, symbol) in corr.symbols().iter().enumerate() {
    let mut cells = vec![Cell::new(symbol)];
    cells.extend(
      corr
        .matrix()
        .row(i)
        .iter()
        .map(|rho| Cell::new(&format!("{rho:.2}"))),
    );
    table.add_row(Row::new(cells));
  }
  table.to_string()
}

pub fn allocation_table(title: &str, allocation: &Allocation) -> String {
  let mut table = titled(&["Symbol", "Weight", "Capital Allocation"]);
  for p in &allocation.positions {
    table.add_row(Row::new(vec![
      Cell::new(&p.symbol),
      Cell::new(&format!("{:.2}", p.weight)),
      Cell::new(&format!("{:.2}", p.amount)),
    ]));
  }
  format!("{title}\n{table}Cash: {:.0}\n{}", allocation.cash, rule())
}

pub fn report(report: &KellyReport) -> String {
  let d = &report.diagnostics;
  let mut diagnostics = format!(
    "Condition number of annualized covariance matrix is: {:.2} (min eigenvalue {:e})",
    d.condition_number, d.min_eigenvalue
  );
  if let Some(s) = d.shrinkage {
    diagnostics.push_str(&format!("\nLedoit-Wolf shrinkage intensity: {s:.4}"));
  }

  [
    diagnostics,
    rule(),
    expected_returns_table("Annualized Excess Returns", &report.expected_returns),
    rule(),
    "Estimated Correlation Matrix of Annualized Excess Returns (rounded to 2 decimal places)"
      .to_string(),
    correlation_table(&report.correlation),
    rule(),
    allocation_table(
      "Unconstrained Kelly Weights (no constraints on shorting or leverage)",
      &report.unconstrained_allocation,
    ),
    allocation_table(
      "Allocation With Full Kelly Weights",
      &report.kelly_allocation,
    ),
    allocation_table(
      &format!(
        "Allocation With Partial Kelly Fraction: {}",
        report.kelly_fraction
      ),
      &report.partial_kelly_allocation,
    ),
  ]
  .join("\n")
}

pub fn implied(returns: &ExpectedReturns) -> String {
  format!(
    "{}\n{}",
    rule(),
    expected_returns_table("implied_return_rate", returns)
  )
}
