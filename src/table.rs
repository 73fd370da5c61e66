//! Minimal column-table row source
//!
//! The histogram builder never reads files itself; it consumes any tabular
//! structure exposing named numeric columns through [`RowSource`].
//! [`ColumnTable`] is the bundled implementation for callers that already
//! hold their coordinates in memory.

use crate::{HatsError, Result};

/// A tabular source of rows with named floating-point columns.
pub trait RowSource {
    /// Number of rows in the table.
    fn num_rows(&self) -> usize;

    /// The named column, or `None` if the table has no such column.
    fn column(&self, name: &str) -> Option<&[f64]>;
}

/// In-memory column-oriented table. All columns share one row count.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    columns: Vec<(String, Vec<f64>)>,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, consuming and returning the table (builder style).
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.add_column(name, values)?;
        Ok(self)
    }

    /// Add a column. Fails if the name is taken or the length disagrees
    /// with the columns already present.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|(n, _)| *n == name) {
            return Err(HatsError::Validation(format!("duplicate column name: {name}")));
        }
        if let Some((_, first)) = self.columns.first() {
            if first.len() != values.len() {
                return Err(HatsError::Validation(format!(
                    "column {name} has {} rows, expected {}",
                    values.len(),
                    first.len()
                )));
            }
        }
        self.columns.push((name, values));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }
}

impl RowSource for ColumnTable {
    fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }
}
