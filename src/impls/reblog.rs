use crate::{
    common::{account::Account, follow::Reblog, post::Post},
    error::HiveResult,
    impls::{HiveContext, ReadOnly},
    schema::{account, post},
};
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use std::ops::DerefMut;

impl ReadOnly for Reblog {}

impl Reblog {
    pub fn account_record(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(account::name.eq(self.account.clone()))
            .first(conn.deref_mut())?)
    }

    pub fn post(&self, context: &HiveContext) -> HiveResult<Post> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .find(self.post_id)
            .get_result(conn.deref_mut())?)
    }
}
