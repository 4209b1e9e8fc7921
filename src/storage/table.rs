use crate::core::{DbError, Result, Row, TableSchema, Value};
use im::OrdMap;

/// One table of the store. Rows are keyed by the primary key value in an
/// ordered persistent map, so cloning a table is cheap structural sharing;
/// a transaction's staged view is exactly such a clone.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: OrdMap<Value, Row>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: OrdMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inserts a fully resolved row (key already generated).
    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.schema.validate_row(&row)?;
        let key = row[0].clone();
        if key.is_null() {
            return Err(DbError::ConstraintViolation(format!(
                "column '{}' of table '{}' requires a key value",
                self.schema.key_column().name,
                self.schema.name()
            )));
        }
        if self.rows.contains_key(&key) {
            return Err(DbError::ConstraintViolation(format!(
                "duplicate key {} in table '{}'",
                key,
                self.schema.name()
            )));
        }
        self.rows.insert(key, row);
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Applies column assignments to the row at `key`; returns the updated
    /// row, or `None` when the key is absent. The primary key itself cannot
    /// be reassigned.
    pub fn update(&mut self, key: &Value, assignments: &[(String, Value)]) -> Result<Option<Row>> {
        let Some(mut row) = self.rows.get(key).cloned() else {
            return Ok(None);
        };
        for (column, value) in assignments {
            let index = self.schema.column_index(column).ok_or_else(|| {
                DbError::UnknownColumn(column.clone(), self.schema.name().to_string())
            })?;
            if index == 0 {
                return Err(DbError::ConstraintViolation(format!(
                    "primary key of table '{}' cannot be reassigned",
                    self.schema.name()
                )));
            }
            self.schema.columns()[index].validate(value)?;
            row[index] = value.clone();
        }
        self.rows.insert(key.clone(), row.clone());
        Ok(Some(row))
    }

    /// All rows, in key order by default or ordered by the named column.
    pub fn scan(&self, order_by: Option<&str>) -> Result<Vec<Row>> {
        let mut rows: Vec<Row> = self.rows.values().cloned().collect();
        if let Some(column) = order_by {
            let index = self.schema.column_index(column).ok_or_else(|| {
                DbError::UnknownColumn(column.to_string(), self.schema.name().to_string())
            })?;
            rows.sort_by(|a, b| a[index].cmp(&b[index]));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn users_table() -> Table {
        Table::new(TableSchema::new(
            "users",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("first_name", DataType::Text).not_null(),
                Column::new("last_name", DataType::Text).not_null(),
            ],
        ))
    }

    fn user_row(id: i64, first: &str, last: &str) -> Row {
        vec![Value::Integer(id), first.into(), last.into()]
    }

    #[test]
    fn insert_and_get() {
        let mut table = users_table();
        table.insert(user_row(1, "John", "Snow")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(&Value::Integer(1)).unwrap()[1],
            Value::Text("John".into())
        );
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut table = users_table();
        table.insert(user_row(1, "John", "Snow")).unwrap();
        let err = table.insert(user_row(1, "Jon", "Targaryen")).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }

    #[test]
    fn update_unknown_column_is_rejected() {
        let mut table = users_table();
        table.insert(user_row(1, "John", "Snow")).unwrap();
        let err = table
            .update(&Value::Integer(1), &[("age".to_string(), Value::Integer(30))])
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownColumn(..)));
    }

    #[test]
    fn update_missing_row_returns_none() {
        let mut table = users_table();
        let updated = table
            .update(&Value::Integer(7), &[("first_name".to_string(), "A".into())])
            .unwrap();
        assert!(updated.is_none());
    }

    #[test]
    fn scan_orders_by_requested_column() {
        let mut table = users_table();
        table.insert(user_row(1, "Tirion", "Lannister")).unwrap();
        table.insert(user_row(2, "John", "Snow")).unwrap();
        let rows = table.scan(Some("first_name")).unwrap();
        assert_eq!(rows[0][1], Value::Text("John".into()));
        assert_eq!(rows[1][1], Value::Text("Tirion".into()));
    }
}
