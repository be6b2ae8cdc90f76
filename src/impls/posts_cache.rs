use crate::{
    common::{newtypes::PostId, post::{Post, PostsCache}},
    error::HiveResult,
    impls::{char_length, HiveContext, ReadOnly},
    schema::{post, posts_cache},
};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{
    dsl::{count_star, not, sql},
    pg::Pg,
    query_builder::QueryFragment,
    query_dsl::methods::LoadQuery,
    sql_types,
    BoolExpressionMethods,
    BoxableExpression,
    ExpressionMethods,
    OptionalExtension,
    PgConnection,
    QueryDsl,
    RunQueryDsl,
    TextExpressionMethods,
};
use std::ops::DerefMut;

/// Mention filter over cached post bodies. `all` requires every `@name`
/// token to appear; `any` requires at least one. Names are given without the
/// leading `@`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MentionFilter {
    pub all: Vec<String>,
    pub any: Vec<String>,
}

impl MentionFilter {
    pub fn all(names: Vec<String>) -> Self {
        MentionFilter {
            all: names,
            any: Vec::new(),
        }
    }

    pub fn any(names: Vec<String>) -> Self {
        MentionFilter {
            all: Vec::new(),
            any: names,
        }
    }
}

impl From<Vec<String>> for MentionFilter {
    fn from(names: Vec<String>) -> Self {
        MentionFilter::any(names)
    }
}

/// Grouping key for payout leaderboards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayoutGroup {
    Category,
    Author,
}

impl PayoutGroup {
    fn key_sql(self) -> &'static str {
        match self {
            PayoutGroup::Category => "hive_posts_cache.category",
            PayoutGroup::Author => "hive_posts_cache.author",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PostsCacheQuery {
    post: Option<PostId>,
    author: Option<String>,
    paidout: Option<bool>,
    nsfw: Option<bool>,
    declined: Option<bool>,
    full_power: Option<bool>,
    hidden: Option<bool>,
    grayed: Option<bool>,
    after: Option<(NaiveDateTime, bool)>,
    before: Option<(NaiveDateTime, bool)>,
    updated_after: Option<(NaiveDateTime, bool)>,
    updated_before: Option<(NaiveDateTime, bool)>,
    payout_after: Option<(NaiveDateTime, bool)>,
    payout_before: Option<(NaiveDateTime, bool)>,
    payout_zero: Option<bool>,
    app: Option<(String, Option<String>, bool)>,
    format: Option<(String, bool)>,
    mentioned: Option<(MentionFilter, bool)>,
}

impl PostsCacheQuery {
    pub fn post(mut self, post: PostId) -> Self {
        self.post = Some(post);
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn paidout(mut self, paidout: bool) -> Self {
        self.paidout = Some(paidout);
        self
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = Some(nsfw);
        self
    }

    pub fn declined(mut self, declined: bool) -> Self {
        self.declined = Some(declined);
        self
    }

    pub fn full_power(mut self, full_power: bool) -> Self {
        self.full_power = Some(full_power);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn grayed(mut self, grayed: bool) -> Self {
        self.grayed = Some(grayed);
        self
    }

    pub fn after(mut self, after: NaiveDateTime, invert: bool) -> Self {
        self.after = Some((after, invert));
        self
    }

    pub fn before(mut self, before: NaiveDateTime, invert: bool) -> Self {
        self.before = Some((before, invert));
        self
    }

    pub fn updated_after(mut self, after: NaiveDateTime, invert: bool) -> Self {
        self.updated_after = Some((after, invert));
        self
    }

    pub fn updated_before(mut self, before: NaiveDateTime, invert: bool) -> Self {
        self.updated_before = Some((before, invert));
        self
    }

    pub fn payout_after(mut self, after: NaiveDateTime, invert: bool) -> Self {
        self.payout_after = Some((after, invert));
        self
    }

    pub fn payout_before(mut self, before: NaiveDateTime, invert: bool) -> Self {
        self.payout_before = Some((before, invert));
        self
    }

    /// Rows whose payout equals exactly 0.0, or differs from it when
    /// `payout_zero` is false.
    pub fn payout_zero(mut self, payout_zero: bool) -> Self {
        self.payout_zero = Some(payout_zero);
        self
    }

    /// Rows published with the given app, matched as a `"name/version"`
    /// prefix against the json metadata. Any version matches when `version`
    /// is omitted.
    pub fn app(mut self, app: &str, version: Option<&str>, invert: bool) -> Self {
        self.app = Some((app.to_string(), version.map(|v| v.to_string()), invert));
        self
    }

    pub fn format(mut self, format: &str, invert: bool) -> Self {
        self.format = Some((format.to_string(), invert));
        self
    }

    pub fn mentioned(mut self, names: impl Into<MentionFilter>, invert: bool) -> Self {
        self.mentioned = Some((names.into(), invert));
        self
    }

    fn apply<ST>(
        &self,
        mut query: posts_cache::BoxedQuery<'static, Pg, ST>,
    ) -> posts_cache::BoxedQuery<'static, Pg, ST> {
        if let Some(post) = self.post {
            query = query.filter(posts_cache::post_id.eq(post));
        }
        if let Some(author) = &self.author {
            query = query.filter(posts_cache::author.eq(author.clone()));
        }
        if let Some(paidout) = self.paidout {
            query = query.filter(posts_cache::is_paidout.eq(paidout));
        }
        if let Some(nsfw) = self.nsfw {
            query = query.filter(posts_cache::is_nsfw.eq(nsfw));
        }
        if let Some(declined) = self.declined {
            query = query.filter(posts_cache::is_declined.eq(declined));
        }
        if let Some(full_power) = self.full_power {
            query = query.filter(posts_cache::is_full_power.eq(full_power));
        }
        if let Some(hidden) = self.hidden {
            query = query.filter(posts_cache::is_hidden.eq(hidden));
        }
        if let Some(grayed) = self.grayed {
            query = query.filter(posts_cache::is_grayed.eq(grayed));
        }
        if let Some((after, invert)) = &self.after {
            query = if *invert {
                query.filter(not(posts_cache::created_at.gt(*after)))
            } else {
                query.filter(posts_cache::created_at.gt(*after))
            };
        }
        if let Some((before, invert)) = &self.before {
            query = if *invert {
                query.filter(not(posts_cache::created_at.lt(*before)))
            } else {
                query.filter(posts_cache::created_at.lt(*before))
            };
        }
        if let Some((after, invert)) = &self.updated_after {
            query = if *invert {
                query.filter(not(posts_cache::updated_at.gt(*after)))
            } else {
                query.filter(posts_cache::updated_at.gt(*after))
            };
        }
        if let Some((before, invert)) = &self.updated_before {
            query = if *invert {
                query.filter(not(posts_cache::updated_at.lt(*before)))
            } else {
                query.filter(posts_cache::updated_at.lt(*before))
            };
        }
        if let Some((after, invert)) = &self.payout_after {
            query = if *invert {
                query.filter(not(posts_cache::payout_at.gt(*after)))
            } else {
                query.filter(posts_cache::payout_at.gt(*after))
            };
        }
        if let Some((before, invert)) = &self.payout_before {
            query = if *invert {
                query.filter(not(posts_cache::payout_at.lt(*before)))
            } else {
                query.filter(posts_cache::payout_at.lt(*before))
            };
        }
        if let Some(payout_zero) = self.payout_zero {
            query = if payout_zero {
                query.filter(posts_cache::payout.eq(BigDecimal::from(0)))
            } else {
                query.filter(posts_cache::payout.ne(BigDecimal::from(0)))
            };
        }
        if let Some((app, version, invert)) = &self.app {
            let pattern = format!("{}/{}%", app, version.as_deref().unwrap_or_default());
            let field = sql::<sql_types::Text>("hive_posts_cache.json::json->>'app'");
            query = if *invert {
                query.filter(field.not_like(pattern))
            } else {
                query.filter(field.like(pattern))
            };
        }
        if let Some((format, invert)) = &self.format {
            let field = sql::<sql_types::Text>("hive_posts_cache.json::json->>'format'");
            query = if *invert {
                query.filter(field.ne(format.clone()))
            } else {
                query.filter(field.eq(format.clone()))
            };
        }
        if let Some((names, invert)) = &self.mentioned {
            if *invert {
                let matching = Self::mention_conditions(
                    names,
                    posts_cache::table.select(posts_cache::post_id).into_boxed(),
                );
                query = query.filter(posts_cache::post_id.ne_all(matching));
            } else {
                query = Self::mention_conditions(names, query);
            }
        }
        query
    }

    fn mention_conditions<ST>(
        names: &MentionFilter,
        mut query: posts_cache::BoxedQuery<'static, Pg, ST>,
    ) -> posts_cache::BoxedQuery<'static, Pg, ST> {
        if !names.all.is_empty() {
            // A body mentioning all names is at least as long as the names
            // plus one @ each. The length check lets the planner discard
            // short bodies before running the LIKE chain.
            query = query.filter(char_length(posts_cache::body).ge(mention_min_length_all(names)));
            for name in &names.all {
                query = query.filter(posts_cache::body.like(format!("%@{name}%")));
            }
        }
        let mut any = names.any.iter();
        if let Some(first) = any.next() {
            query = query.filter(char_length(posts_cache::body).ge(mention_min_length_any(names)));
            let mut condition: Box<
                dyn BoxableExpression<posts_cache::table, Pg, SqlType = sql_types::Bool>,
            > = Box::new(posts_cache::body.like(format!("%@{first}%")));
            for name in any {
                condition = Box::new(condition.or(posts_cache::body.like(format!("%@{name}%"))));
            }
            query = query.filter(condition);
        }
        query
    }

    pub(crate) fn post_ids_subquery(
        &self,
    ) -> posts_cache::BoxedQuery<'static, Pg, sql_types::Integer> {
        self.apply(posts_cache::table.select(posts_cache::post_id).into_boxed())
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<PostsCache>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(posts_cache::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn first(&self, context: &HiveContext) -> HiveResult<Option<PostsCache>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(posts_cache::table.into_boxed())
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(posts_cache::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }

    fn top_payout_query(
        &self,
        group: PayoutGroup,
        limit: i64,
    ) -> impl LoadQuery<'static, PgConnection, (String, Option<BigDecimal>)>
           + QueryFragment<Pg> {
        let filtered = self
            .clone()
            .payout_zero(false)
            .declined(false)
            .post_ids_subquery();
        let key = group.key_sql();
        posts_cache::table
            .filter(posts_cache::post_id.eq_any(filtered))
            .group_by(sql::<sql_types::Text>(key))
            .select((
                sql::<sql_types::Text>(key),
                sql::<sql_types::Nullable<sql_types::Numeric>>(
                    "SUM(hive_posts_cache.payout)",
                ),
            ))
            .order(
                sql::<sql_types::Nullable<sql_types::Numeric>>(
                    "SUM(hive_posts_cache.payout)",
                )
                .desc(),
            )
            .limit(limit)
    }

    /// Highest summed payouts per category or author under the current
    /// filters, excluding zero and declined payouts. Returns
    /// `(key, total payout)` pairs, largest first.
    pub fn top_payout(
        &self,
        group: PayoutGroup,
        limit: i64,
        context: &HiveContext,
    ) -> HiveResult<Vec<(String, BigDecimal)>> {
        let mut conn = context.db_pool.get()?;
        let rows: Vec<(String, Option<BigDecimal>)> =
            self.top_payout_query(group, limit).load(conn.deref_mut())?;
        Ok(rows
            .into_iter()
            .map(|(key, total)| (key, total.unwrap_or_else(|| BigDecimal::from(0))))
            .collect())
    }
}

fn mention_min_length_all(names: &MentionFilter) -> i32 {
    names.all.iter().map(|name| name.len() as i32).sum::<i32>() + names.all.len() as i32
}

fn mention_min_length_any(names: &MentionFilter) -> i32 {
    names.any.iter().map(|name| name.len() as i32).max().unwrap_or(0) + 1
}

impl ReadOnly for PostsCache {}

impl PostsCache {
    pub fn post(&self, context: &HiveContext) -> HiveResult<Post> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .find(self.post_id)
            .get_result(conn.deref_mut())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;
    use pretty_assertions::assert_eq;

    fn sql_of(query: &PostsCacheQuery) -> String {
        debug_query::<Pg, _>(&query.apply(posts_cache::table.into_boxed())).to_string()
    }

    #[test]
    fn mentioned_all_prefilters_on_total_length() {
        // "@alice" + "@bo" can't fit in fewer than 9 characters.
        let filter = MentionFilter::all(vec!["alice".to_string(), "bo".to_string()]);
        assert_eq!(mention_min_length_all(&filter), 9);
        let sql = sql_of(&PostsCacheQuery::default().mentioned(filter, false));
        assert!(sql.contains("char_length"));
        assert_eq!(sql.matches("LIKE").count(), 2);
        assert!(!sql.contains(" OR "));
    }

    #[test]
    fn mentioned_any_prefilters_on_longest_name() {
        let filter = MentionFilter::any(vec!["bo".to_string(), "alice".to_string()]);
        assert_eq!(mention_min_length_any(&filter), 6);
        let sql = sql_of(&PostsCacheQuery::default().mentioned(filter, false));
        assert!(sql.contains(" OR "));
        assert_eq!(sql.matches("LIKE").count(), 2);
    }

    #[test]
    fn mentioned_inverts_to_the_complement() {
        let filter = MentionFilter::any(vec!["alice".to_string()]);
        let sql = sql_of(&PostsCacheQuery::default().mentioned(filter, true));
        assert!(sql.contains("!= ALL"));
    }

    #[test]
    fn app_matches_a_version_prefix_in_json_metadata() {
        let sql = sql_of(&PostsCacheQuery::default().app("steemit", Some("0.1"), false));
        assert!(sql.contains("json::json->>'app'"));
        assert!(sql.contains("LIKE"));

        let inverted = sql_of(&PostsCacheQuery::default().app("steemit", None, true));
        assert!(inverted.contains("NOT LIKE"));
    }

    #[test]
    fn format_compares_json_metadata_exactly() {
        let sql = sql_of(&PostsCacheQuery::default().format("markdown", false));
        assert!(sql.contains("json::json->>'format'"));
        assert!(sql.contains("="));
    }

    #[test]
    fn top_payout_groups_by_the_requested_key() {
        let query = PostsCacheQuery::default();
        let by_category =
            debug_query::<Pg, _>(&query.top_payout_query(PayoutGroup::Category, 10))
                .to_string();
        assert!(by_category.contains("GROUP BY hive_posts_cache.category"));
        assert!(by_category.contains("SUM(hive_posts_cache.payout) DESC"));
        let by_author =
            debug_query::<Pg, _>(&query.top_payout_query(PayoutGroup::Author, 10))
                .to_string();
        assert!(by_author.contains("GROUP BY hive_posts_cache.author"));
    }

    #[test]
    fn payout_zero_compares_against_exact_zero() {
        let zero = sql_of(&PostsCacheQuery::default().payout_zero(true));
        assert!(zero.contains("\"hive_posts_cache\".\"payout\" = $1"));
        let nonzero = sql_of(&PostsCacheQuery::default().payout_zero(false));
        assert!(nonzero.contains("\"hive_posts_cache\".\"payout\" != $1"));
    }
}
