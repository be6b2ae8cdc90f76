use crate::{
    common::{
        account::Account,
        community::Member,
        follow::{FollowState, Reblog},
        newtypes::AccountId,
        post::Post,
    },
    error::HiveResult,
    impls::{
        payment::PaymentQuery,
        post::PostQuery,
        posts_cache::PostsCacheQuery,
        HiveContext,
        ReadOnly,
    },
    schema::{account, follow, member, post, reblog},
};
use diesel::{
    dsl::sql,
    pg::Pg,
    sql_types,
    ExpressionMethods,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
    TextExpressionMethods,
};
use std::ops::{DerefMut, RangeInclusive};

/// Inclusive root-post count range for [`AccountQuery::root_posts_count`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountRange {
    pub min: i64,
    pub max: i64,
}

impl From<i64> for CountRange {
    fn from(count: i64) -> Self {
        CountRange {
            min: count,
            max: count,
        }
    }
}

impl From<RangeInclusive<i64>> for CountRange {
    fn from(range: RangeInclusive<i64>) -> Self {
        CountRange {
            min: *range.start(),
            max: *range.end(),
        }
    }
}

/// Composable account filters. Filter state accumulates immutably and only
/// compiles to SQL at materialization.
#[derive(Clone, Debug, Default)]
pub struct AccountQuery {
    names: Option<Vec<String>>,
    name_like: Option<String>,
    root_posts_count: Option<(CountRange, bool)>,
    followed_by: Option<(AccountId, FollowState)>,
}

impl AccountQuery {
    pub fn name(mut self, name: &str) -> Self {
        self.names = Some(vec![name.to_string()]);
        self
    }

    pub fn names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn name_like(mut self, pattern: &str) -> Self {
        self.name_like = Some(pattern.to_string());
        self
    }

    /// Accounts that have posted exactly this many root posts (or a count
    /// within the given range).
    pub fn root_posts_count(mut self, count: impl Into<CountRange>, invert: bool) -> Self {
        self.root_posts_count = Some((count.into(), invert));
        self
    }

    /// Accounts on the receiving end of `account`'s follows or mutes. Kept as
    /// a deferred filter so it can embed as a subquery.
    pub fn followed_by(mut self, account: AccountId, state: FollowState) -> Self {
        self.followed_by = Some((account, state));
        self
    }

    fn apply<ST>(
        &self,
        mut query: account::BoxedQuery<'static, Pg, ST>,
    ) -> account::BoxedQuery<'static, Pg, ST> {
        if let Some(names) = &self.names {
            query = query.filter(account::name.eq_any(names.clone()));
        }
        if let Some(pattern) = &self.name_like {
            query = query.filter(account::name.like(pattern.clone()));
        }
        if let Some((range, invert)) = &self.root_posts_count {
            query = query.filter(
                sql::<sql_types::Bool>(
                    "(SELECT COUNT(hive_posts.id) FROM hive_posts \
                     WHERE hive_posts.author = hive_accounts.name \
                     AND hive_posts.depth = 0 \
                     AND hive_posts.parent_id IS NULL) ",
                )
                .sql(if *invert { "NOT BETWEEN " } else { "BETWEEN " })
                .bind::<sql_types::BigInt, _>(range.min)
                .sql(" AND ")
                .bind::<sql_types::BigInt, _>(range.max),
            );
        }
        if let Some((follower, state)) = &self.followed_by {
            query = query.filter(
                account::id.eq_any(
                    follow::table
                        .filter(follow::follower.eq(*follower))
                        .filter(follow::state.eq(state.to_i16()))
                        .select(follow::following),
                ),
            );
        }
        query
    }

    pub(crate) fn names_subquery(&self) -> account::BoxedQuery<'static, Pg, sql_types::Text> {
        self.apply(account::table.select(account::name).into_boxed())
    }

    pub(crate) fn ids_subquery(&self) -> account::BoxedQuery<'static, Pg, sql_types::Integer> {
        self.apply(account::table.select(account::id).into_boxed())
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(account::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn first(&self, context: &HiveContext) -> HiveResult<Option<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(account::table.into_boxed())
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(account::table.select(diesel::dsl::count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }
}

impl ReadOnly for Account {}

impl Account {
    pub fn find_by_name(name: &str, context: &HiveContext) -> HiveResult<Option<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(account::name.eq(name))
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn read(id: AccountId, context: &HiveContext) -> HiveResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table.find(id).get_result(conn.deref_mut())?)
    }

    /// This account's posts, as a further-filterable query.
    pub fn posts(&self) -> PostQuery {
        PostQuery::default().author(&self.name)
    }

    pub fn reblogs(&self, context: &HiveContext) -> HiveResult<Vec<Reblog>> {
        let mut conn = context.db_pool.get()?;
        Ok(reblog::table
            .filter(reblog::account.eq(self.name.clone()))
            .load(conn.deref_mut())?)
    }

    pub fn reblogged_posts(&self, context: &HiveContext) -> HiveResult<Vec<Post>> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .filter(
                post::id.eq_any(
                    reblog::table
                        .filter(reblog::account.eq(self.name.clone()))
                        .select(reblog::post_id),
                ),
            )
            .load(conn.deref_mut())?)
    }

    /// Accounts this account is following, as a deferred query.
    pub fn following_query(&self) -> AccountQuery {
        AccountQuery::default().followed_by(self.id, FollowState::Follow)
    }

    /// Accounts this account is muting, as a deferred query.
    pub fn muting_query(&self) -> AccountQuery {
        AccountQuery::default().followed_by(self.id, FollowState::Mute)
    }

    pub fn following(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        self.following_query().load(context)
    }

    pub fn muting(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        self.muting_query().load(context)
    }

    pub fn followers(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        self.inverse_follows(FollowState::Follow, context)
    }

    pub fn muters(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        self.inverse_follows(FollowState::Mute, context)
    }

    fn inverse_follows(
        &self,
        state: FollowState,
        context: &HiveContext,
    ) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::id.eq_any(
                    follow::table
                        .filter(follow::following.eq(self.id))
                        .filter(follow::state.eq(state.to_i16()))
                        .select(follow::follower),
                ),
            )
            .load(conn.deref_mut())?)
    }

    /// Promotion payments sent by this account, further filterable.
    pub fn payments(&self) -> PaymentQuery {
        PaymentQuery::default()
            .from_account(self.id)
            .to_null()
            .token("SBD", false)
    }

    pub fn promoted_posts(&self, context: &HiveContext) -> HiveResult<Vec<Post>> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .filter(post::id.eq_any(self.payments().post_ids_subquery()))
            .load(conn.deref_mut())?)
    }

    pub fn promoted_authors(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::name.eq_any(
                    post::table
                        .filter(post::id.eq_any(self.payments().post_ids_subquery()))
                        .select(post::author)
                        .distinct(),
                ),
            )
            .load(conn.deref_mut())?)
    }

    pub fn memberships(&self, context: &HiveContext) -> HiveResult<Vec<Member>> {
        let mut conn = context.db_pool.get()?;
        Ok(member::table
            .filter(member::account.eq(self.name.clone()))
            .load(conn.deref_mut())?)
    }

    /// Root posts placed into this account's own feed by the ingestion
    /// process.
    pub fn feed_posts(&self, context: &HiveContext) -> HiveResult<Vec<Post>> {
        use crate::schema::feed_cache;
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .filter(
                post::id.eq_any(
                    feed_cache::table
                        .filter(feed_cache::account_id.eq(self.id))
                        .select(feed_cache::post_id),
                ),
            )
            .load(conn.deref_mut())?)
    }

    /// All content created or reblogged by accounts this account follows.
    pub fn feed(&self) -> PostQuery {
        PostQuery::default().feed(self.following_query(), false)
    }

    /// Feed as recorded in the denormalized feed-cache table.
    pub fn feed_cache(&self) -> PostQuery {
        PostQuery::default().feed_cache(self.following_query(), false)
    }

    /// All content created or reblogged by accounts this account mutes.
    pub fn ignored_feed(&self) -> PostQuery {
        PostQuery::default().feed(self.muting_query(), false)
    }

    pub fn ignored_feed_cache(&self) -> PostQuery {
        PostQuery::default().feed_cache(self.muting_query(), false)
    }

    /// All comments replying to this account's content.
    pub fn replies(&self) -> PostQuery {
        PostQuery::default().replies().parent_author(self.name.as_str())
    }

    pub fn posts_cache(&self) -> PostsCacheQuery {
        PostsCacheQuery::default().author(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    #[test]
    fn root_posts_count_renders_correlated_subquery() {
        let query = AccountQuery::default()
            .root_posts_count(1, false)
            .names_subquery();
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("SELECT COUNT(hive_posts.id) FROM hive_posts"));
        assert!(sql.contains("BETWEEN"));
        assert!(!sql.contains("NOT BETWEEN"));
    }

    #[test]
    fn root_posts_count_inverts_to_not_between() {
        let query = AccountQuery::default()
            .root_posts_count(1..=5, true)
            .names_subquery();
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("NOT BETWEEN"));
    }

    #[test]
    fn posts_cache_scopes_to_the_account_by_author_name() {
        let account = Account {
            id: AccountId(1),
            name: "ned".to_string(),
        };
        let query = account.posts_cache().post_ids_subquery();
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("\"hive_posts_cache\".\"author\" = $1"));
    }

    #[test]
    fn followed_by_embeds_follow_subquery() {
        let query = AccountQuery::default()
            .followed_by(AccountId(7), FollowState::Follow)
            .names_subquery();
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("hive_follows"));
        assert!(sql.contains("\"hive_accounts\".\"name\""));
    }
}
