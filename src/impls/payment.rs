use crate::{
    common::{
        account::Account,
        block::Block,
        newtypes::{AccountId, BlockNum, PostId},
        payment::{Payment, NULL_ACCOUNT},
        post::Post,
    },
    error::HiveResult,
    impls::{HiveContext, ReadOnly},
    schema::{account, block, payment, post},
};
use bigdecimal::BigDecimal;
use diesel::{
    dsl::{count_star, sql},
    pg::Pg,
    query_builder::QueryFragment,
    query_dsl::methods::LoadQuery,
    sql_types,
    ExpressionMethods,
    PgConnection,
    QueryDsl,
    RunQueryDsl,
};
use std::ops::DerefMut;

/// Grouping key for [`PaymentQuery::top_amount`].
#[derive(Clone, Copy, Debug)]
pub enum AmountGroup {
    Post,
    Token,
}

impl AmountGroup {
    fn key_sql(self) -> &'static str {
        match self {
            AmountGroup::Post => "CAST(hive_payments.post_id AS TEXT)",
            AmountGroup::Token => "hive_payments.token",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PaymentQuery {
    from_account: Option<AccountId>,
    to_null: bool,
    token: Option<(String, bool)>,
    post: Option<(PostId, bool)>,
    block: Option<BlockNum>,
}

impl PaymentQuery {
    pub fn from_account(mut self, from_account: AccountId) -> Self {
        self.from_account = Some(from_account);
        self
    }

    /// Payments burned to the null account. Promotion payments always are.
    pub fn to_null(mut self) -> Self {
        self.to_null = true;
        self
    }

    pub fn token(mut self, token: &str, invert: bool) -> Self {
        self.token = Some((token.to_string(), invert));
        self
    }

    pub fn post(mut self, post: PostId, invert: bool) -> Self {
        self.post = Some((post, invert));
        self
    }

    pub fn block(mut self, block: BlockNum) -> Self {
        self.block = Some(block);
        self
    }

    fn apply<ST>(
        &self,
        mut query: payment::BoxedQuery<'static, Pg, ST>,
    ) -> payment::BoxedQuery<'static, Pg, ST> {
        if let Some(from_account) = self.from_account {
            query = query.filter(payment::from_account.eq(from_account));
        }
        if self.to_null {
            query = query.filter(
                payment::to_account.eq_any(
                    account::table
                        .filter(account::name.eq(NULL_ACCOUNT))
                        .select(account::id),
                ),
            );
        }
        if let Some((token, invert)) = &self.token {
            query = if *invert {
                query.filter(payment::token.ne(token.clone()))
            } else {
                query.filter(payment::token.eq(token.clone()))
            };
        }
        if let Some((post, invert)) = self.post {
            query = if invert {
                query.filter(payment::post_id.ne(post))
            } else {
                query.filter(payment::post_id.eq(post))
            };
        }
        if let Some(block) = self.block {
            query = query.filter(payment::block_num.eq(block));
        }
        query
    }

    pub(crate) fn post_ids_subquery(
        &self,
    ) -> payment::BoxedQuery<'static, Pg, sql_types::Integer> {
        self.apply(payment::table.select(payment::post_id).into_boxed())
    }

    fn ids_subquery(&self) -> payment::BoxedQuery<'static, Pg, sql_types::Integer> {
        self.apply(payment::table.select(payment::id).into_boxed())
    }

    pub(crate) fn block_nums_subquery(
        &self,
    ) -> payment::BoxedQuery<'static, Pg, sql_types::Integer> {
        self.apply(payment::table.select(payment::block_num).into_boxed())
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<Payment>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(payment::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(payment::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }

    fn top_amount_query(
        &self,
        group: AmountGroup,
        limit: i64,
    ) -> impl LoadQuery<'static, PgConnection, (String, Option<BigDecimal>)>
           + QueryFragment<Pg> {
        // Aggregation happens outside the composable filter path; the
        // filters come back in as an id subquery.
        let key = group.key_sql();
        payment::table
            .filter(payment::id.eq_any(self.ids_subquery()))
            .group_by(sql::<sql_types::Text>(key))
            .select((
                sql::<sql_types::Text>(key),
                sql::<sql_types::Nullable<sql_types::Numeric>>(
                    "SUM(hive_payments.amount)",
                ),
            ))
            .order(
                sql::<sql_types::Nullable<sql_types::Numeric>>(
                    "SUM(hive_payments.amount)",
                )
                .desc(),
            )
            .limit(limit)
    }

    /// Group keys ranked by total paid amount under the current filters,
    /// largest first.
    pub fn top_amount(
        &self,
        group: AmountGroup,
        limit: i64,
        context: &HiveContext,
    ) -> HiveResult<Vec<(String, BigDecimal)>> {
        let mut conn = context.db_pool.get()?;
        let rows: Vec<(String, Option<BigDecimal>)> =
            self.top_amount_query(group, limit).load(conn.deref_mut())?;
        Ok(rows
            .into_iter()
            .map(|(key, total)| (key, total.unwrap_or_else(|| BigDecimal::from(0))))
            .collect())
    }
}

impl ReadOnly for Payment {}

impl Payment {
    pub fn sender(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .find(self.from_account)
            .get_result(conn.deref_mut())?)
    }

    pub fn recipient(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .find(self.to_account)
            .get_result(conn.deref_mut())?)
    }

    pub fn post(&self, context: &HiveContext) -> HiveResult<Post> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .find(self.post_id)
            .get_result(conn.deref_mut())?)
    }

    pub fn block(&self, context: &HiveContext) -> HiveResult<Block> {
        let mut conn = context.db_pool.get()?;
        Ok(block::table
            .find(self.block_num)
            .get_result(conn.deref_mut())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    fn sql_of(query: &PaymentQuery) -> String {
        debug_query::<Pg, _>(&query.apply(payment::table.into_boxed())).to_string()
    }

    #[test]
    fn to_null_resolves_the_null_account_by_name() {
        let sql = sql_of(&PaymentQuery::default().to_null());
        assert!(sql.contains("\"hive_accounts\".\"name\" = $1"));
        assert!(sql.contains("\"hive_payments\".\"to_account\" = ANY"));
    }

    #[test]
    fn token_inverts_to_inequality() {
        let sql = sql_of(&PaymentQuery::default().token("SBD", true));
        assert!(sql.contains("\"hive_payments\".\"token\" != $1"));
    }

    #[test]
    fn top_amount_groups_by_the_requested_key() {
        let query = PaymentQuery::default().to_null();
        let by_post =
            debug_query::<Pg, _>(&query.top_amount_query(AmountGroup::Post, 10))
                .to_string();
        assert!(by_post.contains("GROUP BY CAST(hive_payments.post_id AS TEXT)"));
        assert!(by_post.contains("SUM(hive_payments.amount) DESC"));
        let by_token =
            debug_query::<Pg, _>(&query.top_amount_query(AmountGroup::Token, 10))
                .to_string();
        assert!(by_token.contains("GROUP BY hive_payments.token"));
    }
}
