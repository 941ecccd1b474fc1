//! Filterable-grid projection for rectangular row data.
//!
//! Row 0 of the input holds the column labels; the remaining rows are data.
//! The projection feeds an opaque grid: here, a plain-text printer with
//! per-column substring filtering and pagination.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::error::TableError;

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// One grid column. The accessor mirrors the header label; duplicate
/// labels produce duplicate columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub header: String,
    pub accessor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableProjection {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

/// Map each header label to a column, preserving order.
pub fn derive_columns(header_row: &[String]) -> Vec<Column> {
    header_row
        .iter()
        .map(|label| Column {
            header: label.clone(),
            accessor: label.clone(),
        })
        .collect()
}

/// All rows except row 0, deep-copied so the caller's data is never aliased
/// or mutated.
pub fn derive_rows(all_rows: &[Vec<String>]) -> Vec<Vec<String>> {
    all_rows.iter().skip(1).cloned().collect()
}

impl TableProjection {
    pub fn new(data: &[Vec<String>]) -> Result<Self, TableError> {
        let header = data.first().ok_or(TableError::MissingHeader)?;
        Ok(Self {
            columns: derive_columns(header),
            rows: derive_rows(data),
        })
    }

    /// Keep only rows whose value in `column` contains `needle` (the grid
    /// widget's built-in substring filter). An unknown column matches
    /// nothing. With duplicate labels, the first matching column wins.
    pub fn filtered(&self, column: &str, needle: &str) -> TableProjection {
        let index = self.columns.iter().position(|c| c.accessor == column);
        let rows = match index {
            Some(i) => self
                .rows
                .iter()
                .filter(|row| row.get(i).is_some_and(|v| v.contains(needle)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        TableProjection {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// The rows of the zero-based `page`, empty past the end.
    pub fn page(&self, page: usize, page_size: usize) -> &[Vec<String>] {
        let start = page.saturating_mul(page_size);
        if start >= self.rows.len() {
            return &[];
        }
        let end = (start + page_size).min(self.rows.len());
        &self.rows[start..end]
    }

    /// Render one page as aligned text columns.
    pub fn render_page(&self, page: usize, page_size: usize) -> String {
        let rows = self.page(page, page_size);

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.header.len()).collect();
        for row in rows {
            for (i, field) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(field.len());
                }
            }
        }

        let mut out = String::new();
        for (i, col) in self.columns.iter().enumerate() {
            out.push_str(&format!("{:<width$}  ", col.header, width = widths[i]));
        }
        out.push('\n');
        for row in rows {
            for (i, field) in row.iter().enumerate() {
                let width = widths.get(i).copied().unwrap_or(0);
                out.push_str(&format!("{:<width$}  ", field, width = width));
            }
            out.push('\n');
        }
        out
    }
}

/// CLI entry point — loads a JSON array-of-arrays file and prints the grid.
pub fn run_table(
    config: &Config,
    path: &Path,
    filters: &[(String, String)],
    page: usize,
    page_size: Option<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read table file: {}", path.display()))?;
    let raw: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(&content).with_context(|| "Failed to parse table file as JSON rows")?;

    let data: Vec<Vec<String>> = raw
        .iter()
        .map(|row| row.iter().map(value_to_cell).collect())
        .collect();

    let mut projection = TableProjection::new(&data)?;
    for (column, needle) in filters {
        projection = projection.filtered(column, needle);
    }

    let page_size = page_size.unwrap_or(config.table.page_size);
    if page_size == 0 {
        anyhow::bail!("page size must be >= 1");
    }
    let total_pages = projection.rows.len().div_ceil(page_size);

    print!("{}", projection.render_page(page, page_size));
    println!();
    println!(
        "page {}/{} ({} rows)",
        page + 1,
        total_pages.max(1),
        projection.rows.len()
    );

    Ok(())
}

fn value_to_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<Vec<String>> {
        vec![
            vec!["Name".into(), "OU".into()],
            vec!["Alpha".into(), "Kenya".into()],
            vec!["Beta".into(), "Uganda".into()],
            vec!["Gamma".into(), "Kenya".into()],
        ]
    }

    #[test]
    fn test_columns_preserve_order_and_duplicates() {
        let headers = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        let columns = derive_columns(&headers);
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].header, "A");
        assert_eq!(columns[1].accessor, "B");
        assert_eq!(columns[2].header, "A");
    }

    #[test]
    fn test_rows_exclude_exactly_header_row() {
        let input = data();
        let rows = derive_rows(&input);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "Alpha");
        // Input untouched.
        assert_eq!(input.len(), 4);
        assert_eq!(input[0][0], "Name");
    }

    #[test]
    fn test_rows_are_deep_copies() {
        let input = data();
        let mut rows = derive_rows(&input);
        rows[0][0] = "Mutated".into();
        assert_eq!(input[1][0], "Alpha");
    }

    #[test]
    fn test_empty_input_is_invalid() {
        assert_eq!(
            TableProjection::new(&[]).unwrap_err(),
            TableError::MissingHeader
        );
    }

    #[test]
    fn test_header_only_input_yields_no_rows() {
        let projection = TableProjection::new(&data()[..1]).unwrap();
        assert_eq!(projection.columns.len(), 2);
        assert!(projection.rows.is_empty());
    }

    #[test]
    fn test_substring_filter() {
        let projection = TableProjection::new(&data()).unwrap();
        let filtered = projection.filtered("OU", "Ken");
        assert_eq!(filtered.rows.len(), 2);
        let filtered = projection.filtered("OU", "nowhere");
        assert!(filtered.rows.is_empty());
        let filtered = projection.filtered("NoSuchColumn", "x");
        assert!(filtered.rows.is_empty());
    }

    #[test]
    fn test_pagination_bounds() {
        let projection = TableProjection::new(&data()).unwrap();
        assert_eq!(projection.page(0, 2).len(), 2);
        assert_eq!(projection.page(1, 2).len(), 1);
        assert!(projection.page(2, 2).is_empty());
        assert!(projection.page(100, DEFAULT_PAGE_SIZE).is_empty());
    }

    #[test]
    fn test_render_page_aligns_headers() {
        let projection = TableProjection::new(&data()).unwrap();
        let text = projection.render_page(0, DEFAULT_PAGE_SIZE);
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Name"));
        assert!(text.contains("Alpha"));
        assert!(text.contains("Uganda"));
    }
}
