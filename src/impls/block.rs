use crate::{
    common::{account::Account, block::Block, newtypes::BlockNum, payment::Payment, post::Post},
    error::HiveResult,
    impls::{payment::PaymentQuery, HiveContext, ReadOnly},
    schema::{account, block, payment, post},
};
use diesel::{
    dsl::{count_star, sql},
    expression::SqlLiteral,
    pg::Pg,
    sql_types,
    ExpressionMethods,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
};
use std::ops::DerefMut;

/// Seconds elapsed between a block and its predecessor, in wall-clock terms.
/// Bounds are inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockInterval {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl BlockInterval {
    pub fn exactly(seconds: f64) -> Self {
        BlockInterval {
            min: Some(seconds),
            max: Some(seconds),
        }
    }

    pub fn at_least(seconds: f64) -> Self {
        BlockInterval {
            min: Some(seconds),
            max: None,
        }
    }

    pub fn at_most(seconds: f64) -> Self {
        BlockInterval {
            min: None,
            max: Some(seconds),
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        BlockInterval {
            min: Some(min),
            max: Some(max),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlockQuery {
    with_promoted_posts: bool,
    interval: Option<BlockInterval>,
}

impl BlockQuery {
    /// Blocks carrying at least one promotion payment.
    pub fn with_promoted_posts(mut self) -> Self {
        self.with_promoted_posts = true;
        self
    }

    /// Blocks whose distance to their predecessor falls inside the interval.
    /// Blocks without a stored predecessor never match.
    pub fn interval(mut self, interval: BlockInterval) -> Self {
        self.interval = Some(interval);
        self
    }

    fn apply<ST>(
        &self,
        mut query: block::BoxedQuery<'static, Pg, ST>,
    ) -> block::BoxedQuery<'static, Pg, ST> {
        if self.with_promoted_posts {
            query = query.filter(
                block::num.eq_any(
                    PaymentQuery::default()
                        .to_null()
                        .block_nums_subquery(),
                ),
            );
        }
        if let Some(interval) = &self.interval {
            query = match (interval.min, interval.max) {
                (Some(min), Some(max)) if min == max => {
                    query.filter(interval_seconds().eq(min))
                }
                (Some(min), Some(max)) => query.filter(interval_seconds().between(min, max)),
                (Some(min), None) => query.filter(interval_seconds().ge(min)),
                (None, Some(max)) => query.filter(interval_seconds().le(max)),
                (None, None) => query,
            };
        }
        query
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<Block>> {
        let mut conn = context.db_pool.get()?;
        Ok(self.apply(block::table.into_boxed()).load(conn.deref_mut())?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(block::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }
}

/// Linkage is by hash, so reorg leftovers with a dangling `prev` simply
/// resolve to NULL and drop out of interval comparisons.
fn interval_seconds() -> SqlLiteral<sql_types::Double> {
    sql::<sql_types::Double>(
        "EXTRACT(EPOCH FROM (hive_blocks.created_at - \
         (SELECT prev.created_at FROM hive_blocks AS prev \
          WHERE prev.hash = hive_blocks.prev)))",
    )
}

impl ReadOnly for Block {}

impl Block {
    pub fn read(num: BlockNum, context: &HiveContext) -> HiveResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(block::table.find(num).get_result(conn.deref_mut())?)
    }

    /// The block this one names as predecessor, followed by hash rather than
    /// number.
    pub fn previous(&self, context: &HiveContext) -> HiveResult<Option<Self>> {
        let Some(prev) = &self.prev else {
            return Ok(None);
        };
        let mut conn = context.db_pool.get()?;
        Ok(block::table
            .filter(block::hash.eq(prev.clone()))
            .first(conn.deref_mut())
            .optional()?)
    }

    /// The block naming this one as predecessor.
    pub fn next(&self, context: &HiveContext) -> HiveResult<Option<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(block::table
            .filter(block::prev.eq(self.hash.clone()))
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn payments(&self, context: &HiveContext) -> HiveResult<Vec<Payment>> {
        let mut conn = context.db_pool.get()?;
        Ok(payment::table
            .filter(payment::block_num.eq(self.num))
            .load(conn.deref_mut())?)
    }

    /// Posts promoted by payments in this block.
    pub fn promoted_posts(&self, context: &HiveContext) -> HiveResult<Vec<Post>> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .filter(
                post::id.eq_any(
                    PaymentQuery::default()
                        .to_null()
                        .block(self.num)
                        .post_ids_subquery(),
                ),
            )
            .load(conn.deref_mut())?)
    }

    /// Accounts that paid for promotions in this block.
    pub fn post_promoters(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::id.eq_any(
                    payment::table
                        .filter(payment::block_num.eq(self.num))
                        .select(payment::from_account),
                ),
            )
            .load(conn.deref_mut())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    fn sql_of(query: &BlockQuery) -> String {
        debug_query::<Pg, _>(&query.apply(block::table.into_boxed())).to_string()
    }

    #[test]
    fn interval_compares_epoch_distance_to_the_predecessor() {
        let sql = sql_of(&BlockQuery::default().interval(BlockInterval::exactly(3.0)));
        assert!(sql.contains("EXTRACT(EPOCH FROM (hive_blocks.created_at"));
        assert!(sql.contains("prev.hash = hive_blocks.prev"));
        assert!(sql.contains("= $1"));
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        let both = sql_of(&BlockQuery::default().interval(BlockInterval::between(2.5, 3.5)));
        assert!(both.contains("BETWEEN"));
        let lower = sql_of(&BlockQuery::default().interval(BlockInterval::at_least(3.0)));
        assert!(lower.contains(">= $1"));
        let upper = sql_of(&BlockQuery::default().interval(BlockInterval::at_most(3.0)));
        assert!(upper.contains("<= $1"));
    }

    #[test]
    fn promoted_posts_go_through_null_account_payments() {
        let sql = sql_of(&BlockQuery::default().with_promoted_posts());
        assert!(sql.contains("\"hive_payments\""));
        assert!(sql.contains("\"hive_accounts\".\"name\" = $1"));
    }
}
