// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HEADERS: [&str; 4] = ["Item", "Quantity", "Unit Cost", "Total Cost"];

/// Headers plus rows; every row always has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTable")]
pub struct FinancialTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Wire form before rows are fitted to the headers.
#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

impl From<RawTable> for FinancialTable {
    fn from(raw: RawTable) -> Self {
        Self::from_parts(raw.headers, raw.rows)
    }
}

impl FinancialTable {
    pub fn new<H, S>(headers: H) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_default_headers() -> Self {
        Self::new(DEFAULT_HEADERS)
    }

    /// Builds a table, padding or truncating each row to the header width.
    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Reads the `[[headers..], [row..], ..]` wire grid.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut records = grid.into_iter();
        let Some(headers) = records.next() else {
            return Self::default();
        };
        Self::from_parts(headers, records.collect())
    }

    pub fn to_grid(&self) -> Vec<Vec<String>> {
        if self.headers.is_empty() && self.rows.is_empty() {
            return Vec::new();
        }
        std::iter::once(self.headers.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }

    /// Parses CSV text; the first non-blank record becomes the header row.
    pub fn from_csv(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("parse CSV record {}", index + 1))?;
            let cells: Vec<String> = record.iter().map(str::to_owned).collect();
            if cells.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            records.push(cells);
        }
        if records.is_empty() {
            bail!("CSV contains no data -- paste a header row and at least one row");
        }
        Ok(Self::from_grid(records))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn add_row(&mut self) -> usize {
        self.rows.push(vec![String::new(); self.headers.len()]);
        self.rows.len() - 1
    }

    pub fn push_row<I, S>(&mut self, cells: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.headers.is_empty() {
            bail!("table has no columns -- add a header before adding rows");
        }
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    pub fn remove_row(&mut self, index: usize) -> Result<Vec<String>> {
        if index >= self.rows.len() {
            bail!(
                "row {} does not exist -- table has {} rows",
                index + 1,
                self.rows.len()
            );
        }
        Ok(self.rows.remove(index))
    }

    pub fn add_column(&mut self, name: Option<&str>) -> usize {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("Column {}", self.headers.len() + 1),
        };
        self.headers.push(name);
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn remove_column(&mut self, index: usize) -> Result<String> {
        if index >= self.headers.len() {
            bail!(
                "column {} does not exist -- table has {} columns",
                index + 1,
                self.headers.len()
            );
        }
        for row in &mut self.rows {
            row.remove(index);
        }
        let removed = self.headers.remove(index);
        if self.headers.is_empty() {
            self.rows.clear();
        }
        Ok(removed)
    }

    pub fn rename_header(&mut self, index: usize, name: &str) -> Result<()> {
        let Some(header) = self.headers.get_mut(index) else {
            bail!("column {} does not exist", index + 1);
        };
        *header = name.to_owned();
        Ok(())
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: &str) -> Result<()> {
        let Some(cells) = self.rows.get_mut(row) else {
            bail!("row {} does not exist", row + 1);
        };
        let Some(cell) = cells.get_mut(column) else {
            bail!("column {} does not exist", column + 1);
        };
        *cell = value.to_owned();
        Ok(())
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
    }

    /// Sum of the last column, formatted in rupees. A trailing total row is
    /// not counted twice.
    pub fn total_amount(&self) -> String {
        format_rupees(self.total_value())
    }

    pub fn total_value(&self) -> f64 {
        let Some(last) = self.headers.len().checked_sub(1) else {
            return 0.0;
        };
        let body = if self.has_total_row() {
            &self.rows[..self.rows.len() - 1]
        } else {
            &self.rows[..]
        };
        body.iter()
            .filter_map(|row| row.get(last))
            .filter_map(|cell| parse_amount(cell))
            .sum()
    }

    pub fn has_total_row(&self) -> bool {
        self.rows
            .last()
            .and_then(|row| row.first())
            .is_some_and(|cell| cell.trim().to_lowercase().starts_with("total"))
    }
}

/// Numeric value of a money-ish cell; currency marks and separators ignored.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
        .collect();
    // "Rs. 1,200" leaves a stray leading dot
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// `₹12,34,567` style grouping; fractions rounded to the nearest rupee.
pub fn format_rupees(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let grouped = group_indian(&digits);
    if negative {
        format!("-₹{grouped}")
    } else {
        format!("₹{grouped}")
    }
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_owned();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

#[cfg(test)]
mod tests {
    use super::{FinancialTable, format_rupees, parse_amount};

    fn sample() -> FinancialTable {
        let mut table = FinancialTable::new(["Item", "Qty", "Cost"]);
        table
            .push_row(["Chess sets", "10", "5000"])
            .expect("push first row");
        table
            .push_row(["Trophies", "3", "₹1,500"])
            .expect("push second row");
        table
    }

    #[test]
    fn decoded_rows_are_fitted_to_headers() -> anyhow::Result<()> {
        let table: FinancialTable = serde_json::from_str(
            r#"{"headers": ["Item", "Cost"], "rows": [["Chess sets"], ["Clocks", "900", "extra"]]}"#,
        )?;
        assert_eq!(
            table.rows(),
            [
                vec!["Chess sets".to_owned(), String::new()],
                vec!["Clocks".to_owned(), "900".to_owned()],
            ]
        );
        assert_eq!(serde_json::from_str::<FinancialTable>("{}")?, FinancialTable::default());
        Ok(())
    }

    #[test]
    fn add_column_pads_rows_then_remove_row_keeps_width() {
        let mut table = sample();
        let index = table.add_column(None);
        assert_eq!(table.headers()[index], "Column 4");
        table.remove_row(0).expect("remove first row");
        assert!(table.rows().iter().all(|row| row.len() == table.headers().len()));
    }

    #[test]
    fn remove_column_shrinks_rows() {
        let mut table = sample();
        assert_eq!(table.remove_column(1).expect("remove qty"), "Qty");
        assert_eq!(table.rows()[0], vec!["Chess sets", "5000"]);
        assert!(table.remove_column(7).is_err());
    }

    #[test]
    fn grid_import_pads_and_truncates() {
        let table = FinancialTable::from_grid(vec![
            vec!["A".into(), "B".into()],
            vec!["1".into()],
            vec!["1".into(), "2".into(), "3".into()],
        ]);
        assert_eq!(table.rows()[0], vec!["1", ""]);
        assert_eq!(table.rows()[1], vec!["1", "2"]);
        assert_eq!(table.to_grid().len(), 3);
        assert!(FinancialTable::from_grid(Vec::new()).to_grid().is_empty());
    }

    #[test]
    fn csv_import_skips_blank_lines_and_honors_quotes() {
        let table = FinancialTable::from_csv(
            "Item,Qty,Cost\n\n\"Sets, wooden\",10,\"5,000\"\n,,\n",
        )
        .expect("parse csv");
        assert_eq!(table.headers(), ["Item", "Qty", "Cost"]);
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.cell(0, 0), Some("Sets, wooden"));
        assert_eq!(table.total_amount(), "₹5,000");
        assert!(FinancialTable::from_csv("\n  \n").is_err());
    }

    #[test]
    fn total_uses_last_column_with_indian_grouping() {
        let mut table = sample();
        assert_eq!(table.total_amount(), "₹6,500");
        table.push_row(["Venue", "1", "4,93,500"]).expect("push");
        assert_eq!(table.total_amount(), "₹5,00,000");
        table.push_row(["Misc", "1", "n/a"]).expect("push");
        assert_eq!(table.total_amount(), "₹5,00,000");
        assert_eq!(FinancialTable::default().total_amount(), "₹0");
    }

    #[test]
    fn amount_parsing_and_formatting() {
        assert_eq!(parse_amount("Rs. 1,200"), Some(1200.0));
        assert_eq!(parse_amount("--"), None);
        assert_eq!(format_rupees(999.0), "₹999");
        assert_eq!(format_rupees(1_234_567.4), "₹12,34,567");
        assert_eq!(format_rupees(-2500.0), "-₹2,500");
    }

    #[test]
    fn total_row_detection() {
        let mut table = sample();
        assert!(!table.has_total_row());
        table.push_row(["Total", "", "6500"]).expect("push");
        assert!(table.has_total_row());
        assert_eq!(table.total_amount(), "₹6,500");
    }

    #[test]
    fn set_cell_and_rename_reject_out_of_range() {
        let mut table = sample();
        table.set_cell(1, 2, "2000").expect("set cell");
        assert_eq!(table.cell(1, 2), Some("2000"));
        assert!(table.set_cell(5, 0, "x").is_err());
        assert!(table.rename_header(9, "x").is_err());
        table.rename_header(0, "Particulars").expect("rename");
        assert_eq!(table.headers()[0], "Particulars");
    }
}
