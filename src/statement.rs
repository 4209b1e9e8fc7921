use crate::core::{Row, Value};

/// Structured statements executed by the storage engine.
///
/// The gateway does not speak SQL text; repositories build these directly.
/// Inserts and updates return the affected rows, so generated keys come back
/// without a second round trip.
#[derive(Debug, Clone)]
pub enum Statement {
    Insert {
        table: String,
        rows: Vec<Row>,
    },
    Update {
        table: String,
        key: Value,
        assignments: Vec<(String, Value)>,
    },
    SelectByKey {
        table: String,
        key: Value,
    },
    SelectAll {
        table: String,
        order_by: Option<String>,
    },
    Count {
        table: String,
    },
}

impl Statement {
    pub fn insert(table: impl Into<String>, rows: Vec<Row>) -> Self {
        Self::Insert {
            table: table.into(),
            rows,
        }
    }

    pub fn update(
        table: impl Into<String>,
        key: Value,
        assignments: Vec<(String, Value)>,
    ) -> Self {
        Self::Update {
            table: table.into(),
            key,
            assignments,
        }
    }

    pub fn select_by_key(table: impl Into<String>, key: Value) -> Self {
        Self::SelectByKey {
            table: table.into(),
            key,
        }
    }

    pub fn select_all(table: impl Into<String>, order_by: Option<&str>) -> Self {
        Self::SelectAll {
            table: table.into(),
            order_by: order_by.map(str::to_string),
        }
    }

    pub fn count(table: impl Into<String>) -> Self {
        Self::Count {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::SelectByKey { table, .. }
            | Self::SelectAll { table, .. }
            | Self::Count { table } => table,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Update { .. })
    }
}
