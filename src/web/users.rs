use super::WebError;
use crate::core::{Column, DataType, DbError, Result, Row, TableSchema};
use crate::database::Database;
use crate::entity::{Entity, FieldMap};
use crate::repository::Repository;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

/// Demo entity: one row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Entity for User {
    type Key = i64;

    fn table() -> &'static str {
        "users"
    }

    fn schema() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("first_name", DataType::Text).not_null(),
                Column::new("last_name", DataType::Text).not_null(),
            ],
        )
    }

    fn from_row(row: &Row) -> Result<User> {
        let decode = || -> Option<User> {
            Some(User {
                id: row.first()?.as_i64()?,
                first_name: row.get(1)?.as_str()?.to_string(),
                last_name: row.get(2)?.as_str()?.to_string(),
            })
        };
        decode().ok_or_else(|| {
            DbError::TypeMismatch(format!("row does not match the users schema: {:?}", row))
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
}

impl CreateUser {
    fn to_fields(&self) -> FieldMap {
        FieldMap::new()
            .set("first_name", self.first_name.clone())
            .set("last_name", self.last_name.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UpdateUser {
    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        if let Some(first_name) = &self.first_name {
            fields = fields.set("first_name", first_name.clone());
        }
        if let Some(last_name) = &self.last_name {
            fields = fields.set("last_name", last_name.clone());
        }
        fields
    }
}

pub fn routes() -> Router<Database> {
    Router::new()
        .route("/users", get(list_users))
        .route("/user", post(create_user))
        .route("/user-raise", post(create_user_raise))
        .route("/user/:user_id", get(get_user).patch(update_user))
        .route("/users/bulk", get(bulk_create_example))
}

async fn list_users(State(db): State<Database>) -> Result<Json<Vec<User>>, WebError> {
    let users = db
        .session(|| async {
            let repo = Repository::<User>::new(db.clone());
            Ok::<_, WebError>(repo.list(Some("first_name")).await?)
        })
        .await?;
    Ok(Json(users))
}

async fn create_user(
    State(db): State<Database>,
    Json(input): Json<CreateUser>,
) -> Result<Json<User>, WebError> {
    let user = db
        .session(|| async {
            let repo = Repository::<User>::new(db.clone());
            let user = repo.create(input.to_fields()).await?;
            tracing::info!(user = user.id, "user created");
            Ok::<_, WebError>(user)
        })
        .await?;
    Ok(Json(user))
}

/// Demonstrates the rollback guarantee: the insert succeeds, the handler
/// then fails, and the transaction discards the persisted row.
async fn create_user_raise(
    State(db): State<Database>,
    Json(input): Json<CreateUser>,
) -> Result<Json<User>, WebError> {
    let user = db
        .transaction(|| async {
            let repo = Repository::<User>::new(db.clone());
            let user = repo.create(input.to_fields()).await?;
            tracing::info!(user = user.id, "user created, about to fail");
            Err::<User, WebError>(WebError::Database(DbError::ExecutionError(
                "create-user-raise always fails".into(),
            )))
        })
        .await?;
    Ok(Json(user))
}

async fn get_user(
    State(db): State<Database>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, WebError> {
    let user = db
        .session(|| async {
            let repo = Repository::<User>::new(db.clone());
            Ok::<_, WebError>(repo.get_by_key(&user_id).await?)
        })
        .await?;
    match user {
        Some(user) => Ok(Json(user)),
        None => Err(WebError::NotFound(format!("user {} not found", user_id))),
    }
}

async fn update_user(
    State(db): State<Database>,
    Path(user_id): Path<i64>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>, WebError> {
    let user = db
        .session(|| async {
            let repo = Repository::<User>::new(db.clone());
            Ok::<_, WebError>(repo.update(&user_id, input.to_fields()).await?)
        })
        .await?;
    Ok(Json(user))
}

/// Bulk-creates the two fixture users and returns them, as the original
/// example endpoint did.
async fn bulk_create_example(State(db): State<Database>) -> Result<Json<Vec<User>>, WebError> {
    let users = db
        .session(|| async {
            let repo = Repository::<User>::new(db.clone());
            let values = vec![
                FieldMap::new()
                    .set("first_name", "John")
                    .set("last_name", "Snow"),
                FieldMap::new()
                    .set("first_name", "Tirion")
                    .set("last_name", "Lannister"),
            ];
            Ok::<_, WebError>(repo.bulk_create(values).await?)
        })
        .await?;
    Ok(Json(users))
}
