use crate::{
    common::{account::Account, community::{Community, Member}},
    error::HiveResult,
    impls::{HiveContext, ReadOnly},
    schema::{account, community, member},
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
pub struct MemberQuery {
    community: Option<String>,
    account: Option<String>,
    admin: Option<bool>,
    moderator: Option<bool>,
    approved: Option<bool>,
    muted: Option<bool>,
}

impl MemberQuery {
    pub fn community(mut self, community: &str) -> Self {
        self.community = Some(community.to_string());
        self
    }

    pub fn account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    pub fn admin(mut self, admin: bool) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn moderator(mut self, moderator: bool) -> Self {
        self.moderator = Some(moderator);
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = Some(muted);
        self
    }

    fn apply<ST>(
        &self,
        mut query: member::BoxedQuery<'static, Pg, ST>,
    ) -> member::BoxedQuery<'static, Pg, ST> {
        if let Some(community) = &self.community {
            query = query.filter(member::community.eq(community.clone()));
        }
        if let Some(account) = &self.account {
            query = query.filter(member::account.eq(account.clone()));
        }
        if let Some(admin) = self.admin {
            query = query.filter(member::is_admin.eq(admin));
        }
        if let Some(moderator) = self.moderator {
            query = query.filter(member::is_mod.eq(moderator));
        }
        if let Some(approved) = self.approved {
            query = query.filter(member::is_approved.eq(approved));
        }
        if let Some(muted) = self.muted {
            query = query.filter(member::is_muted.eq(muted));
        }
        query
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<Member>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(member::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(member::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }
}

impl ReadOnly for Member {}

impl Member {
    pub fn community_record(&self, context: &HiveContext) -> HiveResult<Community> {
        let mut conn = context.db_pool.get()?;
        Ok(community::table
            .find(self.community.clone())
            .get_result(conn.deref_mut())?)
    }

    pub fn account_record(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(account::name.eq(self.account.clone()))
            .first(conn.deref_mut())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    #[test]
    fn role_flags_compose() {
        let query = MemberQuery::default()
            .community("hive-123")
            .moderator(true)
            .muted(false);
        let sql =
            debug_query::<Pg, _>(&query.apply(member::table.into_boxed())).to_string();
        assert!(sql.contains("\"hive_members\".\"community\" = $1"));
        assert!(sql.contains("\"hive_members\".\"is_mod\" = $2"));
        assert!(sql.contains("\"hive_members\".\"is_muted\" = $3"));
    }
}
