use super::Table;
use crate::core::{DbError, Result, TableSchema, Value};
use crate::result::QueryResult;
use crate::statement::Statement;
use im::HashMap as ImHashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;

/// Snapshot-friendly map of all tables of one endpoint.
pub type TableMap = ImHashMap<String, Table>;

/// The shared table store behind one engine.
///
/// Tables live in a persistent map so a transaction can stage against an
/// O(1) snapshot and publish the touched tables back under one write lock,
/// which keeps commits atomic from the point of view of other tasks.
/// Key sequences are shared between direct and staged inserts, so generated
/// keys stay unique even when the staging transaction later rolls back.
pub struct InMemoryStorage {
    tables: RwLock<TableMap>,
    sequences: StdRwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(TableMap::new()),
            sequences: StdRwLock::new(HashMap::new()),
        }
    }

    /// Creates the table and its key sequence when absent; idempotent.
    pub async fn ensure_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.contains_key(schema.name()) {
            let name = schema.name().to_string();
            self.sequences
                .write()?
                .insert(name.clone(), Arc::new(AtomicI64::new(1)));
            tables.insert(name, Table::new(schema));
        }
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    /// Current view of all tables; cheap, used as a transaction's staging
    /// base.
    pub async fn snapshot(&self) -> TableMap {
        self.tables.read().await.clone()
    }

    /// Replaces the touched tables with their staged versions. All swaps
    /// happen under one write lock, so other tasks observe either none or
    /// all of the transaction's effects.
    pub async fn publish(
        &self,
        overlay: &TableMap,
        touched: impl IntoIterator<Item = String>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        for name in touched {
            let table = overlay
                .get(&name)
                .ok_or_else(|| DbError::TableNotFound(name.clone()))?;
            tables.insert(name, table.clone());
        }
        Ok(())
    }

    /// Next generated primary key for `table`.
    pub fn next_key(&self, table: &str) -> Result<Value> {
        let sequences = self.sequences.read()?;
        let sequence = sequences
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        Ok(Value::Integer(sequence.fetch_add(1, Ordering::SeqCst)))
    }

    /// Executes a statement against the shared tables (autocommit path).
    pub async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        if statement.is_write() {
            let mut tables = self.tables.write().await;
            execute_statement(&mut tables, statement, self)
        } else {
            // reads run against a snapshot; the clone is O(1)
            let mut tables = self.tables.read().await.clone();
            execute_statement(&mut tables, statement, self)
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies one statement to a table map, shared by the autocommit path and
/// the staged overlay of an open transaction.
pub(crate) fn execute_statement(
    tables: &mut TableMap,
    statement: &Statement,
    storage: &InMemoryStorage,
) -> Result<QueryResult> {
    match statement {
        Statement::Insert { table, rows } => {
            let table = tables
                .get_mut(table.as_str())
                .ok_or_else(|| DbError::TableNotFound(table.clone()))?;
            let columns = table.schema().column_names();
            let mut inserted = Vec::with_capacity(rows.len());
            for row in rows {
                let mut row = row.clone();
                if row.first().is_some_and(Value::is_null) {
                    row[0] = storage.next_key(table.schema().name())?;
                }
                table.insert(row.clone())?;
                inserted.push(row);
            }
            Ok(QueryResult::new(columns, inserted))
        }
        Statement::Update {
            table,
            key,
            assignments,
        } => {
            let table = tables
                .get_mut(table.as_str())
                .ok_or_else(|| DbError::TableNotFound(table.clone()))?;
            let columns = table.schema().column_names();
            let rows = match table.update(key, assignments)? {
                Some(row) => vec![row],
                None => Vec::new(),
            };
            Ok(QueryResult::new(columns, rows))
        }
        Statement::SelectByKey { table, key } => {
            let table = tables
                .get(table.as_str())
                .ok_or_else(|| DbError::TableNotFound(table.clone()))?;
            let rows = match table.get(key) {
                Some(row) => vec![row.clone()],
                None => Vec::new(),
            };
            Ok(QueryResult::new(table.schema().column_names(), rows))
        }
        Statement::SelectAll { table, order_by } => {
            let table = tables
                .get(table.as_str())
                .ok_or_else(|| DbError::TableNotFound(table.clone()))?;
            let rows = table.scan(order_by.as_deref())?;
            Ok(QueryResult::new(table.schema().column_names(), rows))
        }
        Statement::Count { table } => {
            let table = tables
                .get(table.as_str())
                .ok_or_else(|| DbError::TableNotFound(table.clone()))?;
            Ok(QueryResult::new(
                vec!["count".to_string()],
                vec![vec![Value::Integer(table.len() as i64)]],
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Row};

    fn users_schema() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("first_name", DataType::Text).not_null(),
                Column::new("last_name", DataType::Text).not_null(),
            ],
        )
    }

    fn unsaved_user(first: &str, last: &str) -> Row {
        vec![Value::Null, first.into(), last.into()]
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let storage = InMemoryStorage::new();
        storage.ensure_table(users_schema()).await.unwrap();
        storage.ensure_table(users_schema()).await.unwrap();
        assert!(storage.table_exists("users").await);
    }

    #[tokio::test]
    async fn insert_generates_distinct_keys() {
        let storage = InMemoryStorage::new();
        storage.ensure_table(users_schema()).await.unwrap();

        let result = storage
            .execute(&Statement::insert(
                "users",
                vec![unsaved_user("John", "Snow"), unsaved_user("Tirion", "Lannister")],
            ))
            .await
            .unwrap();

        assert_eq!(result.row_count(), 2);
        assert_ne!(result.rows[0][0], result.rows[1][0]);
    }

    #[tokio::test]
    async fn count_reflects_inserts() {
        let storage = InMemoryStorage::new();
        storage.ensure_table(users_schema()).await.unwrap();
        storage
            .execute(&Statement::insert("users", vec![unsaved_user("A", "B")]))
            .await
            .unwrap();

        let result = storage.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(result.scalar(), Some(Value::Integer(1)));
    }

    #[tokio::test]
    async fn unknown_table_fails() {
        let storage = InMemoryStorage::new();
        let err = storage
            .execute(&Statement::count("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn published_overlay_is_visible_atomically() {
        let storage = InMemoryStorage::new();
        storage.ensure_table(users_schema()).await.unwrap();

        let mut overlay = storage.snapshot().await;
        execute_statement(
            &mut overlay,
            &Statement::insert("users", vec![unsaved_user("John", "Snow")]),
            &storage,
        )
        .unwrap();

        // staged row is not visible before publish
        let before = storage.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(before.scalar(), Some(Value::Integer(0)));

        storage
            .publish(&overlay, ["users".to_string()])
            .await
            .unwrap();
        let after = storage.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(after.scalar(), Some(Value::Integer(1)));
    }
}
