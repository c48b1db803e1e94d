//! Thin wrapper around `Surreal<Any>`: connect, sign in, select namespace and
//! database, then run the schema generator. Grounded in the teacher's
//! `storage::db::SurrealDbClient` (connect/signin/use_ns/use_db,
//! `#[cfg(test)] SurrealDbClient::memory` backed by `mem://`).

use std::ops::Deref;

use serde::{de::DeserializeOwned, Serialize};
use surrealdb::engine::any::{connect, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

use crate::error::AppError;

#[derive(Clone)]
pub struct SurrealDbClient {
    client: Surreal<Any>,
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, AppError> {
        let client = connect(address).await?;
        client.signin(Root { username, password }).await?;
        client.use_ns(namespace).use_db(database).await?;
        Ok(Self { client })
    }

    /// Runs the schema generator against this connection. Called once at
    /// startup by both the `server` and `worker` binaries.
    pub async fn apply_migrations(&self, embedding_dimension: usize) -> Result<(), AppError> {
        crate::schema::apply(self, embedding_dimension).await
    }

    pub async fn query_raw(&self, sql: &str) -> Result<(), AppError> {
        self.client.query(sql).await?;
        Ok(())
    }

    pub async fn store<T>(&self, table: &str, item: &T) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let created: Option<T> = self.client.create(table).content(item).await?;
        created.ok_or_else(|| AppError::InternalError(format!("insert into {table} returned no record")))
    }

    pub async fn get<T>(&self, table: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let record: Option<T> = self.client.select((table, id)).await?;
        Ok(record)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, AppError> {
        let client = connect("mem://").await?;
        client.use_ns(namespace).use_db(database).await?;
        Ok(Self { client })
    }
}
