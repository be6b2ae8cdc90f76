use crate::{
    config::HiveConfig,
    error::{HiveError, HiveResult},
};
use diesel::{
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
    sql_types,
    PgConnection,
    RunQueryDsl,
};
use std::{env::var, time::Duration};

pub mod account;
pub mod block;
pub mod community;
pub mod feed_cache;
pub mod flag;
pub mod follow;
pub mod member;
pub mod reblog;
pub mod payment;
pub mod post;
pub mod post_tag;
pub mod posts_cache;
pub mod selector;
pub mod state;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct HiveContext {
    pub db_pool: DbPool,
    pub conf: HiveConfig,
}

impl HiveContext {
    pub fn init(config: HiveConfig, ignore_env: bool) -> HiveResult<Self> {
        let database_url = config.database.connection_url();
        let database_url = if ignore_env {
            database_url
        } else {
            var("DATABASE_URL").unwrap_or(database_url)
        };
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let db_pool = Pool::builder()
            .max_size(config.database.pool_size)
            .connection_timeout(Duration::from_secs(config.database.connection_timeout))
            .connection_customizer(Box::new(ReadOnlySession))
            .build(manager)?;

        Ok(HiveContext {
            db_pool,
            conf: config,
        })
    }
}

/// Marks every pooled session read-only at the database level. The schema is
/// populated by a separate ingestion process; this layer must never write.
#[derive(Copy, Clone, Debug)]
struct ReadOnlySession;

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for ReadOnlySession {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Mutation entry points exist only so that callers expecting them fail
/// deterministically, before any connection is acquired. The query types
/// expose no write operations at all.
pub trait ReadOnly {
    fn delete() -> HiveResult<usize> {
        Err(HiveError::ReadOnlyViolation)
    }

    fn delete_all() -> HiveResult<usize> {
        Err(HiveError::ReadOnlyViolation)
    }

    fn update_all() -> HiveResult<usize> {
        Err(HiveError::ReadOnlyViolation)
    }
}

diesel::define_sql_function!(fn char_length(x: sql_types::Text) -> sql_types::Integer);

/// Direction for explicit order-by filters. Result-set order is only
/// guaranteed within a single query that applies one of these.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{account::Account, block::Block, follow::Follow, post::Post};

    #[test]
    fn every_mutation_attempt_is_rejected() {
        assert!(matches!(Post::delete(), Err(HiveError::ReadOnlyViolation)));
        assert!(matches!(
            Post::delete_all(),
            Err(HiveError::ReadOnlyViolation)
        ));
        assert!(matches!(
            Post::update_all(),
            Err(HiveError::ReadOnlyViolation)
        ));
        assert!(matches!(
            Account::update_all(),
            Err(HiveError::ReadOnlyViolation)
        ));
        assert!(matches!(Block::delete(), Err(HiveError::ReadOnlyViolation)));
        assert!(matches!(
            Follow::delete_all(),
            Err(HiveError::ReadOnlyViolation)
        ));
    }
}
