pub mod entity;
pub mod sql;

use std::future::Future;

use sqlx::sqlite::SqliteArguments;
use sqlx::Arguments;
use tracing::debug;

pub use entity::{describe, identity_field_name, Description, Entity, FieldDef, FieldValue, Value};

use crate::{config::StoreConfig, db::DbPool, error::StoreError};
use sql::Statement;

#[derive(Clone)]
pub struct Store {
    pool: DbPool,
    config: StoreConfig,
}

impl Store {
    pub fn new(pool: DbPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub async fn create<E: Entity>(&self, record: &E) -> Result<i64, StoreError> {
        let stmt = sql::insert(&describe(&self.config, record)?);
        debug!(sql = %stmt.sql, "create");
        let Statement { sql, params } = stmt;
        // Drain the statement; an unfinished INSERT .. RETURNING stays uncommitted.
        let ids = self
            .bounded(
                "create",
                sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(params))
                    .fetch_all(&self.pool),
            )
            .await?;
        ids.into_iter()
            .next()
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn load<E: Entity>(
        &self,
        template: &E,
        conditions: &[&'static str],
    ) -> Result<Vec<E>, StoreError> {
        let stmt = sql::select(&describe(&self.config, template)?, conditions)?;
        debug!(sql = %stmt.sql, "load");
        let Statement { sql, params } = stmt;
        self.bounded(
            "load",
            sqlx::query_as_with::<_, E, _>(&sql, arguments(params)).fetch_all(&self.pool),
        )
        .await
    }

    /// Rewrites every non-identity column of the matching rows. Condition
    /// fields are rewritten too, so they must already hold their final values.
    pub async fn update<E: Entity>(
        &self,
        record: &E,
        conditions: &[&'static str],
    ) -> Result<(), StoreError> {
        let stmt = sql::update(&describe(&self.config, record)?, conditions)?;
        debug!(sql = %stmt.sql, "update");
        let Statement { sql, params } = stmt;
        self.bounded(
            "update",
            sqlx::query_with(&sql, arguments(params)).execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    pub async fn delete<E: Entity>(
        &self,
        record: &E,
        conditions: &[&'static str],
    ) -> Result<(), StoreError> {
        let stmt = sql::delete(&describe(&self.config, record)?, conditions)?;
        debug!(sql = %stmt.sql, "delete");
        let Statement { sql, params } = stmt;
        self.bounded(
            "delete",
            sqlx::query_with(&sql, arguments(params)).execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Single conditional update that moves `field` forward to the record's
    /// value. Returns `false` when no matching row held a smaller value.
    pub async fn advance<E: Entity>(
        &self,
        record: &E,
        field: &'static str,
        conditions: &[&'static str],
    ) -> Result<bool, StoreError> {
        let stmt = sql::advance(&describe(&self.config, record)?, field, conditions)?;
        debug!(sql = %stmt.sql, "advance");
        let Statement { sql, params } = stmt;
        let result = self
            .bounded(
                "advance",
                sqlx::query_with(&sql, arguments(params)).execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout { operation }),
        }
    }
}

fn arguments<'q>(params: Vec<Value>) -> SqliteArguments<'q> {
    let mut args = SqliteArguments::default();
    for value in params {
        match value {
            Value::Null => args.add(Option::<i64>::None),
            Value::Integer(v) => args.add(v),
            Value::Float(v) => args.add(v),
            Value::Text(v) => args.add(v),
            Value::Bool(v) => args.add(v),
            Value::Timestamp(v) => args.add(v),
        }
    }
    args
}
