use crate::core::{DbError, Result, Value};
use crate::database::Database;
use crate::entity::{Entity, FieldMap};
use crate::statement::Statement;
use std::marker::PhantomData;

/// Generic CRUD over one entity type.
///
/// Every call goes through the gateway's ambient session, so a repository is
/// constructed fresh wherever it is needed and never holds a session of its
/// own.
pub struct Repository<E: Entity> {
    db: Database,
    _entity: PhantomData<E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub async fn create(&self, values: FieldMap) -> Result<E> {
        let schema = E::schema();
        let row = values.into_row(&schema)?;
        let result = self
            .db
            .execute(&Statement::insert(E::table(), vec![row]))
            .await?;
        let row = result
            .rows
            .first()
            .ok_or_else(|| DbError::ExecutionError("insert returned no row".into()))?;
        E::from_row(row)
    }

    pub async fn update(&self, key: &E::Key, values: FieldMap) -> Result<E> {
        let schema = E::schema();
        let assignments = values.into_assignments(&schema)?;
        let key_value: Value = key.clone().into();
        let result = self
            .db
            .execute(&Statement::update(E::table(), key_value.clone(), assignments))
            .await?;
        match result.rows.first() {
            Some(row) => E::from_row(row),
            None => Err(DbError::RowNotFound(
                key_value.to_string(),
                E::table().to_string(),
            )),
        }
    }

    pub async fn get_by_key(&self, key: &E::Key) -> Result<Option<E>> {
        self.db.get_by_key::<E>(key).await
    }

    /// All rows, in key order or ordered by the named column.
    pub async fn list(&self, order_by: Option<&str>) -> Result<Vec<E>> {
        let result = self
            .db
            .execute(&Statement::select_all(E::table(), order_by))
            .await?;
        result.rows.iter().map(E::from_row).collect()
    }

    /// Inserts all rows through one statement; results come back in input
    /// order, each with its generated key.
    pub async fn bulk_create(&self, values: Vec<FieldMap>) -> Result<Vec<E>> {
        let schema = E::schema();
        let rows = values
            .into_iter()
            .map(|fields| fields.into_row(&schema))
            .collect::<Result<Vec<_>>>()?;
        let result = self
            .db
            .execute(&Statement::insert(E::table(), rows))
            .await?;
        result.rows.iter().map(E::from_row).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        self.db
            .scalar(&Statement::count(E::table()))
            .await?
            .and_then(|value| value.as_i64())
            .ok_or_else(|| DbError::ExecutionError("count returned no value".into()))
    }
}
