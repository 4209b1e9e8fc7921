use crate::core::{DbError, Result, Row, TableSchema, Value};

/// A typed record mapped to one table of the backing store.
///
/// The first schema column is the primary key; the engine generates it when
/// a row is inserted with the key left NULL. The gateway does not interpret
/// relationships between entities.
pub trait Entity: Sized + Send + Sync + 'static {
    type Key: Clone + Into<Value> + Send + Sync;

    fn table() -> &'static str;
    fn schema() -> TableSchema;
    fn from_row(row: &Row) -> Result<Self>;
}

/// Explicit field-map input for create/update.
///
/// Validated against the entity schema at the boundary: unknown fields are
/// rejected instead of being silently dropped.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: Vec<(String, Value)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an earlier value for the same column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((column, value)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn check_known(&self, schema: &TableSchema) -> Result<()> {
        for (name, _) in &self.fields {
            if schema.column_index(name).is_none() {
                return Err(DbError::UnknownColumn(
                    name.clone(),
                    schema.name().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Builds a full row in schema column order; absent columns become NULL
    /// (the key column is then generated by the engine).
    pub(crate) fn into_row(self, schema: &TableSchema) -> Result<Row> {
        self.check_known(schema)?;
        let row = schema
            .columns()
            .iter()
            .map(|column| {
                self.fields
                    .iter()
                    .find(|(name, _)| *name == column.name)
                    .map(|(_, value)| value.clone())
                    .unwrap_or(Value::Null)
            })
            .collect();
        Ok(row)
    }

    /// Column assignments for an update statement.
    pub(crate) fn into_assignments(self, schema: &TableSchema) -> Result<Vec<(String, Value)>> {
        self.check_known(schema)?;
        Ok(self.fields)
    }
}
