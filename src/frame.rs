//! Flat tabular assembly of grid columns, one frame per year.

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f32>>,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub year: u16,
    columns: Vec<Column>,
}

impl Frame {
    /// Combines the variable columns for one year. Every column must cover
    /// the same grid, so unequal lengths mean the year's data is incomplete
    /// and the frame is rejected.
    pub fn assemble(year: u16, columns: Vec<Column>) -> Result<Self> {
        let Some(first) = columns.first() else {
            bail!("no columns to assemble for year {}", year);
        };

        let rows = first.values.len();
        for column in &columns[1..] {
            if column.values.len() != rows {
                bail!(
                    "incomplete data for year {}: column `{}` has {} rows, expected {}",
                    year,
                    column.name,
                    column.values.len(),
                    rows
                );
            }
        }

        Ok(Frame { year, columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Renders the first `n` rows as an aligned text table.
    pub fn head(&self, n: usize) -> String {
        let rows = self.num_rows().min(n);
        let width = 12;

        let mut out = String::new();
        out.push_str(&format!("{:>width$}", "year", width = width));
        for column in &self.columns {
            out.push_str(&format!("{:>width$}", column.name, width = width));
        }
        out.push('\n');

        for row in 0..rows {
            out.push_str(&format!("{:>width$}", self.year, width = width));
            for column in &self.columns {
                match column.values[row] {
                    Some(value) => out.push_str(&format!("{:>width$.4}", value, width = width)),
                    None => out.push_str(&format!("{:>width$}", "-", width = width)),
                }
            }
            out.push('\n');
        }

        out
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;

    fn columns_fixture() -> Vec<Column> {
        vec![
            Column {
                name: "DVS".to_string(),
                values: vec![Some(0.1), None, Some(0.3)],
            },
            Column {
                name: "TAGP".to_string(),
                values: vec![Some(120.0), Some(130.0), Some(140.0)],
            },
        ]
    }

    #[test]
    fn should_assemble_equal_length_columns() {
        let frame = Frame::assemble(2019, columns_fixture()).unwrap();

        assert_eq!(frame.year, 2019);
        assert_eq!(frame.num_rows(), 3);
        assert_eq!(frame.column("DVS").unwrap().values[2], Some(0.3));
        assert!(frame.column("TWSO").is_none());
    }

    #[test]
    fn should_reject_unequal_columns() {
        let mut columns = columns_fixture();
        columns[1].values.pop();

        let err = Frame::assemble(2019, columns).unwrap_err();

        assert!(err.to_string().contains("incomplete data for year 2019"));
        assert!(err.to_string().contains("TAGP"));
    }

    #[test]
    fn should_reject_empty_frame() {
        assert!(Frame::assemble(2019, vec![]).is_err());
    }

    #[test]
    fn should_render_head_with_missing_values() {
        let frame = Frame::assemble(2019, columns_fixture()).unwrap();
        let head = frame.head(2);

        let lines: Vec<&str> = head.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("DVS"));
        assert!(lines[0].contains("TAGP"));
        assert!(lines[1].contains("2019"));
        assert!(lines[1].contains("0.1000"));
        assert!(lines[2].contains('-'));
    }

    #[test]
    fn should_cap_head_at_available_rows() {
        let frame = Frame::assemble(2019, columns_fixture()).unwrap();

        assert_eq!(frame.head(100).lines().count(), 4);
    }
}
