use crate::{
    common::{account::Account, follow::FeedCache, newtypes::{AccountId, PostId}, post::Post},
    error::HiveResult,
    impls::{HiveContext, ReadOnly},
    schema::{account, feed_cache, post},
};
use diesel::{
    dsl::count_star,
    pg::Pg,
    ExpressionMethods,
    QueryDsl,
    RunQueryDsl,
};
use std::ops::DerefMut;

#[derive(Clone, Debug, Default)]
pub struct FeedCacheQuery {
    post: Option<PostId>,
    account: Option<AccountId>,
}

impl FeedCacheQuery {
    pub fn post(mut self, post: PostId) -> Self {
        self.post = Some(post);
        self
    }

    pub fn account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    fn apply<ST>(
        &self,
        mut query: feed_cache::BoxedQuery<'static, Pg, ST>,
    ) -> feed_cache::BoxedQuery<'static, Pg, ST> {
        if let Some(post) = self.post {
            query = query.filter(feed_cache::post_id.eq(post));
        }
        if let Some(account) = self.account {
            query = query.filter(feed_cache::account_id.eq(account));
        }
        query
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<FeedCache>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(feed_cache::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(feed_cache::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }
}

impl ReadOnly for FeedCache {}

impl FeedCache {
    pub fn post(&self, context: &HiveContext) -> HiveResult<Post> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .find(self.post_id)
            .get_result(conn.deref_mut())?)
    }

    pub fn account(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .find(self.account_id)
            .get_result(conn.deref_mut())?)
    }
}
