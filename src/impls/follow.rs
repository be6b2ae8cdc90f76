use crate::{
    common::{
        account::Account,
        follow::{Follow, FollowState},
        newtypes::AccountId,
    },
    error::HiveResult,
    impls::{HiveContext, ReadOnly},
    schema::{account, follow},
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
pub struct FollowQuery {
    follower: Option<AccountId>,
    following: Option<AccountId>,
    state: Option<(FollowState, bool)>,
}

impl FollowQuery {
    pub fn follower(mut self, follower: AccountId) -> Self {
        self.follower = Some(follower);
        self
    }

    pub fn following(mut self, following: AccountId) -> Self {
        self.following = Some(following);
        self
    }

    pub fn state(mut self, state: FollowState, invert: bool) -> Self {
        self.state = Some((state, invert));
        self
    }

    fn apply<ST>(
        &self,
        mut query: follow::BoxedQuery<'static, Pg, ST>,
    ) -> follow::BoxedQuery<'static, Pg, ST> {
        if let Some(follower) = self.follower {
            query = query.filter(follow::follower.eq(follower));
        }
        if let Some(following) = self.following {
            query = query.filter(follow::following.eq(following));
        }
        if let Some((state, invert)) = self.state {
            query = if invert {
                query.filter(follow::state.ne(state.to_i16()))
            } else {
                query.filter(follow::state.eq(state.to_i16()))
            };
        }
        query
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<Follow>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(follow::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(follow::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }
}

impl ReadOnly for Follow {}

impl Follow {
    pub fn follower_account(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .find(self.follower)
            .get_result(conn.deref_mut())?)
    }

    pub fn following_account(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .find(self.following)
            .get_result(conn.deref_mut())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    fn sql_of(query: &FollowQuery) -> String {
        debug_query::<Pg, _>(&query.apply(follow::table.into_boxed())).to_string()
    }

    #[test]
    fn state_inverts_to_inequality() {
        let sql = sql_of(&FollowQuery::default().state(FollowState::Mute, true));
        assert!(sql.contains("\"hive_follows\".\"state\" != $1"));
    }

    #[test]
    fn follower_and_following_compose() {
        let sql = sql_of(
            &FollowQuery::default()
                .follower(AccountId(1))
                .following(AccountId(2)),
        );
        assert!(sql.contains("\"hive_follows\".\"follower\" = $1"));
        assert!(sql.contains("\"hive_follows\".\"following\" = $2"));
    }
}
