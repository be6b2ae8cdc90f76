use crate::{
    common::{newtypes::PostId, post::{Post, PostTag}},
    error::HiveResult,
    impls::{HiveContext, ReadOnly},
    schema::{post, post_tag},
};
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

/// Grouping key for [`PostTagQuery::top_count`].
#[derive(Clone, Copy, Debug)]
pub enum CountGroup {
    Tag,
    Post,
}

impl CountGroup {
    fn key_sql(self) -> &'static str {
        match self {
            CountGroup::Tag => "hive_post_tags.tag",
            CountGroup::Post => "CAST(hive_post_tags.post_id AS TEXT)",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PostTagQuery {
    tags: Option<Vec<String>>,
    post: Option<PostId>,
}

impl PostTagQuery {
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags = Some(vec![tag.to_string()]);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn post(mut self, post: PostId) -> Self {
        self.post = Some(post);
        self
    }

    fn apply<ST>(
        &self,
        mut query: post_tag::BoxedQuery<'static, Pg, ST>,
    ) -> post_tag::BoxedQuery<'static, Pg, ST> {
        if let Some(tags) = &self.tags {
            query = query.filter(post_tag::tag.eq_any(tags.clone()));
        }
        if let Some(post) = self.post {
            query = query.filter(post_tag::post_id.eq(post));
        }
        query
    }

    fn ids_subquery(&self) -> post_tag::BoxedQuery<'static, Pg, sql_types::Integer> {
        self.apply(post_tag::table.select(post_tag::post_id).into_boxed())
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<PostTag>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(post_tag::table.into_boxed())
            .load(conn.deref_mut())?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(post_tag::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }

    fn top_count_query(
        &self,
        group: CountGroup,
        limit: i64,
    ) -> impl LoadQuery<'static, PgConnection, (String, i64)> + QueryFragment<Pg> {
        let key = group.key_sql();
        post_tag::table
            .filter(post_tag::post_id.eq_any(self.ids_subquery()))
            .group_by(sql::<sql_types::Text>(key))
            .select((sql::<sql_types::Text>(key), count_star()))
            .order(sql::<sql_types::BigInt>("COUNT(*)").desc())
            .limit(limit)
    }

    /// Group keys ranked by how many rows carry them, most used first.
    pub fn top_count(
        &self,
        group: CountGroup,
        limit: i64,
        context: &HiveContext,
    ) -> HiveResult<Vec<(String, i64)>> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .top_count_query(group, limit)
            .load(conn.deref_mut())?)
    }
}

impl ReadOnly for PostTag {}

impl PostTag {
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

    #[test]
    fn top_count_groups_by_the_requested_key() {
        let query = PostTagQuery::default().tag("steem");
        let by_tag = debug_query::<Pg, _>(&query.top_count_query(CountGroup::Tag, 5))
            .to_string();
        assert!(by_tag.contains("GROUP BY hive_post_tags.tag"));
        assert!(by_tag.contains("COUNT(*) DESC"));
        let by_post =
            debug_query::<Pg, _>(&query.top_count_query(CountGroup::Post, 5))
                .to_string();
        assert!(by_post.contains("GROUP BY CAST(hive_post_tags.post_id AS TEXT)"));
    }
}
