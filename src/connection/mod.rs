pub mod config;
pub mod pool;

use crate::core::{DbError, Result};
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::storage::memory::execute_statement;
use crate::storage::{InMemoryStorage, TableMap};
use std::collections::HashSet;
use std::sync::Arc;

/// One checked-out handle onto the shared store.
///
/// Outside a transaction every statement applies directly (autocommit).
/// `begin` snapshots the table map; statements then run against that staged
/// overlay until `commit` publishes the touched tables or `rollback`
/// discards them.
pub struct Connection {
    id: u64,
    storage: Arc<InMemoryStorage>,
    state: ConnectionState,
    overlay: Option<TableMap>,
    touched: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

impl Connection {
    pub(crate) fn new(id: u64, storage: Arc<InMemoryStorage>) -> Self {
        Self {
            id,
            storage,
            state: ConnectionState::Active,
            overlay: None,
            touched: HashSet::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }

    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    pub async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        if self.state == ConnectionState::Closed {
            return Err(DbError::ConnectionClosed);
        }
        match self.overlay.as_mut() {
            Some(overlay) => {
                if statement.is_write() {
                    self.touched.insert(statement.table().to_string());
                }
                execute_statement(overlay, statement, &self.storage)
            }
            None => self.storage.execute(statement).await,
        }
    }

    pub async fn begin(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Closed => Err(DbError::ConnectionClosed),
            ConnectionState::InTransaction => Err(DbError::TransactionAlreadyActive),
            ConnectionState::Active => {
                self.overlay = Some(self.storage.snapshot().await);
                self.touched.clear();
                self.state = ConnectionState::InTransaction;
                Ok(())
            }
        }
    }

    pub async fn commit(&mut self) -> Result<()> {
        let Some(overlay) = self.overlay.take() else {
            return Err(DbError::NoActiveTransaction);
        };
        let touched: Vec<String> = self.touched.drain().collect();
        self.storage.publish(&overlay, touched).await?;
        self.state = ConnectionState::Active;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(DbError::NoActiveTransaction);
        }
        self.overlay = None;
        self.touched.clear();
        self.state = ConnectionState::Active;
        Ok(())
    }

    /// Dropping the overlay discards any staged changes.
    pub fn close(&mut self) {
        self.overlay = None;
        self.touched.clear();
        self.state = ConnectionState::Closed;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, TableSchema, Value};

    async fn test_storage() -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .ensure_table(TableSchema::new(
                "users",
                vec![
                    Column::new("id", DataType::Integer),
                    Column::new("first_name", DataType::Text).not_null(),
                    Column::new("last_name", DataType::Text).not_null(),
                ],
            ))
            .await
            .unwrap();
        storage
    }

    fn insert_user(first: &str, last: &str) -> Statement {
        Statement::insert("users", vec![vec![Value::Null, first.into(), last.into()]])
    }

    #[tokio::test]
    async fn transaction_lifecycle() {
        let mut conn = Connection::new(1, test_storage().await);

        conn.begin().await.unwrap();
        assert!(conn.is_in_transaction());
        conn.commit().await.unwrap();
        assert!(!conn.is_in_transaction());
    }

    #[tokio::test]
    async fn begin_twice_is_rejected() {
        let mut conn = Connection::new(1, test_storage().await);
        conn.begin().await.unwrap();
        assert!(matches!(
            conn.begin().await,
            Err(DbError::TransactionAlreadyActive)
        ));
    }

    #[tokio::test]
    async fn commit_without_begin_is_rejected() {
        let mut conn = Connection::new(1, test_storage().await);
        assert!(matches!(
            conn.commit().await,
            Err(DbError::NoActiveTransaction)
        ));
        assert!(matches!(conn.rollback(), Err(DbError::NoActiveTransaction)));
    }

    #[tokio::test]
    async fn second_commit_is_rejected() {
        let mut conn = Connection::new(1, test_storage().await);
        conn.begin().await.unwrap();
        conn.commit().await.unwrap();
        assert!(matches!(
            conn.commit().await,
            Err(DbError::NoActiveTransaction)
        ));
    }

    #[tokio::test]
    async fn execute_after_close_fails() {
        let storage = test_storage().await;
        let mut conn = Connection::new(1, storage);
        conn.close();
        assert!(!conn.is_active());
        assert!(matches!(
            conn.execute(&Statement::count("users")).await,
            Err(DbError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let storage = test_storage().await;
        let mut writer = Connection::new(1, storage.clone());
        let mut reader = Connection::new(2, storage);

        writer.begin().await.unwrap();
        writer.execute(&insert_user("John", "Snow")).await.unwrap();

        let before = reader.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(before.scalar(), Some(Value::Integer(0)));

        writer.commit().await.unwrap();
        let after = reader.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(after.scalar(), Some(Value::Integer(1)));
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let storage = test_storage().await;
        let mut conn = Connection::new(1, storage);

        conn.begin().await.unwrap();
        conn.execute(&insert_user("John", "Snow")).await.unwrap();
        // visible to the transaction itself
        let inside = conn.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(inside.scalar(), Some(Value::Integer(1)));

        conn.rollback().unwrap();
        let after = conn.execute(&Statement::count("users")).await.unwrap();
        assert_eq!(after.scalar(), Some(Value::Integer(0)));
    }
}
