use crate::core::{Row, Value};

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<Value> {
        self.rows.first().and_then(|row| row.first()).cloned()
    }

    /// First column of every row.
    pub fn scalars(&self) -> Vec<Value> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .cloned()
            .collect()
    }
}
