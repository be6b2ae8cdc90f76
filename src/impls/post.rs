use crate::{
    common::{
        account::Account,
        community::{Community, Member},
        follow::{FeedCache, Flag, Reblog},
        newtypes::PostId,
        payment::Payment,
        post::{Post, PostTag, PostsCache, MAX_HARD_DEPTH, MAX_SOFT_DEPTH},
    },
    error::{HiveError, HiveResult},
    impls::{
        posts_cache::{MentionFilter, PostsCacheQuery},
        selector::{AccountSelector, ResolvedNames},
        Direction,
        HiveContext,
        ReadOnly,
    },
    schema::{account, community, feed_cache, flag, member, payment, post, post_tag, posts_cache, reblog},
};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{
    debug_query,
    dsl::{count_star, not, sql},
    pg::Pg,
    sql_types,
    BoolExpressionMethods,
    ExpressionMethods,
    NullableExpressionMethods,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
};
use log::debug;
use std::{
    collections::HashSet,
    ops::{DerefMut, RangeInclusive},
};

/// Inclusive depth range. A scalar `0` means "root posts" and additionally
/// requires a null parent; any other value or range requires a non-null
/// parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthRange {
    pub min: i32,
    pub max: i32,
}

impl DepthRange {
    fn is_root(&self) -> bool {
        self.min == 0 && self.max == 0
    }
}

impl From<i32> for DepthRange {
    fn from(depth: i32) -> Self {
        DepthRange {
            min: depth,
            max: depth,
        }
    }
}

impl From<RangeInclusive<i32>> for DepthRange {
    fn from(range: RangeInclusive<i32>) -> Self {
        DepthRange {
            min: *range.start(),
            max: *range.end(),
        }
    }
}

/// Tag membership filter. `all` requires the post to carry every listed tag
/// (one containment subquery per tag); `any` requires at least one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub all: Vec<String>,
    pub any: Vec<String>,
}

impl TagFilter {
    pub fn all(tags: Vec<String>) -> Self {
        TagFilter {
            all: tags,
            any: Vec::new(),
        }
    }

    pub fn any(tags: Vec<String>) -> Self {
        TagFilter {
            all: Vec::new(),
            any: tags,
        }
    }
}

/// A bare list is treated as `any`.
impl From<Vec<String>> for TagFilter {
    fn from(tags: Vec<String>) -> Self {
        TagFilter::any(tags)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOrder {
    Payout,
    Children,
    AuthorRep,
    TotalVotes,
    UpVotes,
    Promoted,
    CreatedAt,
    PayoutAt,
    UpdatedAt,
    Rshares,
}

impl CacheOrder {
    fn column(self) -> &'static str {
        match self {
            CacheOrder::Payout => "payout",
            CacheOrder::Children => "children",
            CacheOrder::AuthorRep => "author_rep",
            CacheOrder::TotalVotes => "total_votes",
            CacheOrder::UpVotes => "up_votes",
            CacheOrder::Promoted => "promoted",
            CacheOrder::CreatedAt => "created_at",
            CacheOrder::PayoutAt => "payout_at",
            CacheOrder::UpdatedAt => "updated_at",
            CacheOrder::Rshares => "rshares",
        }
    }
}

/// Composable post filters. Every method returns a new builder value; nothing
/// touches the database until `load`, `first` or `count`. Filters targeting
/// disjoint columns commute.
#[derive(Clone, Debug, Default)]
pub struct PostQuery {
    author: Option<String>,
    community: Option<String>,
    category: Option<String>,
    depth: Option<(DepthRange, bool)>,
    parent_author: Option<AccountSelector>,
    parent_permlink: Option<String>,
    deleted: Option<bool>,
    pinned: Option<bool>,
    muted: Option<bool>,
    valid: Option<bool>,
    promoted: Option<bool>,
    reblogged: Option<bool>,
    rebloggers: Option<Vec<String>>,
    tagged: Option<(TagFilter, bool)>,
    mentioned: Option<(MentionFilter, bool)>,
    feed: Option<(AccountSelector, bool)>,
    feed_cache: Option<(AccountSelector, bool)>,
    after: Option<(NaiveDateTime, bool)>,
    before: Option<(NaiveDateTime, bool)>,
    updated_after: Option<(NaiveDateTime, bool)>,
    updated_before: Option<(NaiveDateTime, bool)>,
    payout_after: Option<(NaiveDateTime, bool)>,
    payout_before: Option<(NaiveDateTime, bool)>,
    payout_zero: Option<bool>,
    app: Option<(String, Option<String>, bool)>,
    format: Option<(String, bool)>,
    order: Option<(CacheOrder, Direction)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl PostQuery {
    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn community(mut self, community: &str) -> Self {
        self.community = Some(community.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn depth(mut self, depth: impl Into<DepthRange>, invert: bool) -> Self {
        self.depth = Some((depth.into(), invert));
        self
    }

    /// Posts with depth 0 and no parent.
    pub fn root_posts(self) -> Self {
        self.depth(0, false)
    }

    /// Posts with depth 1..=255 and a non-null parent.
    pub fn replies(self) -> Self {
        self.depth(1..=MAX_SOFT_DEPTH, false)
    }

    /// Restrict replies to those whose parent was written by the given
    /// account(s).
    pub fn parent_author(mut self, parent_author: impl Into<AccountSelector>) -> Self {
        self.parent_author = Some(parent_author.into());
        self
    }

    pub fn parent_permlink(mut self, parent_permlink: &str) -> Self {
        self.parent_permlink = Some(parent_permlink.to_string());
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = Some(pinned);
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = Some(muted);
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = Some(valid);
        self
    }

    /// Posts whose promoted amount differs from exactly 0.0 (or equals it,
    /// when `promoted` is false).
    pub fn promoted(mut self, promoted: bool) -> Self {
        self.promoted = Some(promoted);
        self
    }

    pub fn reblogged(mut self, reblogged: bool) -> Self {
        self.reblogged = Some(reblogged);
        self
    }

    pub fn rebloggers(mut self, rebloggers: Vec<String>) -> Self {
        self.rebloggers = Some(rebloggers);
        self
    }

    pub fn tagged(mut self, tags: impl Into<TagFilter>, invert: bool) -> Self {
        self.tagged = Some((tags.into(), invert));
        self
    }

    /// Posts whose cached body mentions the given `@name` tokens.
    pub fn mentioned(mut self, names: MentionFilter, invert: bool) -> Self {
        self.mentioned = Some((names, invert));
        self
    }

    /// Root posts authored by or reblogged by any of the given accounts, as a
    /// single set.
    pub fn feed(mut self, account: impl Into<AccountSelector>, invert: bool) -> Self {
        self.feed = Some((account.into(), invert));
        self
    }

    /// Root posts recorded in the feed-cache table for any of the given
    /// accounts.
    pub fn feed_cache(mut self, account: impl Into<AccountSelector>, invert: bool) -> Self {
        self.feed_cache = Some((account.into(), invert));
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

    pub fn payout_zero(mut self, payout_zero: bool) -> Self {
        self.payout_zero = Some(payout_zero);
        self
    }

    /// Posts published with the given app, matching `"name/version"` as a
    /// prefix. Any version matches when `version` is omitted.
    pub fn app(mut self, app: &str, version: Option<&str>, invert: bool) -> Self {
        self.app = Some((app.to_string(), version.map(|v| v.to_string()), invert));
        self
    }

    pub fn format(mut self, format: &str, invert: bool) -> Self {
        self.format = Some((format.to_string(), invert));
        self
    }

    /// Order by a posts-cache column. Ties are returned in an unspecified
    /// order.
    pub fn order_by_cache(
        mut self,
        field: Option<CacheOrder>,
        direction: Direction,
    ) -> HiveResult<Self> {
        let field = field.ok_or(HiveError::MissingRequiredArgument {
            name: "order field",
        })?;
        self.order = Some((field, direction));
        Ok(self)
    }

    pub fn order_by_payout(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::Payout, direction));
        self
    }

    pub fn order_by_children(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::Children, direction));
        self
    }

    pub fn order_by_author_rep(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::AuthorRep, direction));
        self
    }

    pub fn order_by_total_votes(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::TotalVotes, direction));
        self
    }

    pub fn order_by_up_votes(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::UpVotes, direction));
        self
    }

    pub fn order_by_promoted(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::Promoted, direction));
        self
    }

    pub fn order_by_created_at(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::CreatedAt, direction));
        self
    }

    pub fn order_by_payout_at(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::PayoutAt, direction));
        self
    }

    pub fn order_by_updated_at(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::UpdatedAt, direction));
        self
    }

    pub fn order_by_rshares(mut self, direction: Direction) -> Self {
        self.order = Some((CacheOrder::Rshares, direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn apply<ST>(
        &self,
        mut query: post::BoxedQuery<'static, Pg, ST>,
    ) -> post::BoxedQuery<'static, Pg, ST> {
        if let Some(author) = &self.author {
            query = query.filter(post::author.eq(author.clone()));
        }
        if let Some(name) = &self.community {
            query = query.filter(post::community.eq(name.clone()));
        }
        if let Some(category) = &self.category {
            query = query.filter(post::category.eq(category.clone()));
        }
        if let Some((range, invert)) = &self.depth {
            query = match (range.is_root(), invert) {
                (true, false) => query
                    .filter(post::depth.eq(0))
                    .filter(post::parent_id.is_null()),
                (true, true) => query.filter(
                    post::id.ne_all(
                        post::table
                            .filter(post::depth.eq(0).and(post::parent_id.is_null()))
                            .select(post::id)
                            .into_boxed(),
                    ),
                ),
                (false, false) => query
                    .filter(post::depth.between(range.min, range.max))
                    .filter(post::parent_id.is_not_null()),
                (false, true) => query.filter(
                    post::id.ne_all(
                        post::table
                            .filter(
                                post::depth
                                    .between(range.min, range.max)
                                    .and(post::parent_id.is_not_null()),
                            )
                            .select(post::id)
                            .into_boxed(),
                    ),
                ),
            };
        }
        if self.parent_author.is_some() || self.parent_permlink.is_some() {
            let mut parents = post::table.select(post::id.nullable()).into_boxed();
            if let Some(selector) = &self.parent_author {
                parents = match selector.resolve() {
                    ResolvedNames::Names(names) => {
                        parents.filter(post::author.eq_any(names))
                    }
                    ResolvedNames::Subquery(accounts) => {
                        parents.filter(post::author.eq_any(accounts.names_subquery()))
                    }
                };
            }
            if let Some(permlink) = &self.parent_permlink {
                parents = parents.filter(post::permlink.eq(permlink.clone()));
            }
            query = query.filter(post::parent_id.eq_any(parents));
        }
        if let Some(deleted) = self.deleted {
            query = query.filter(post::is_deleted.eq(deleted));
        }
        if let Some(pinned) = self.pinned {
            query = query.filter(post::is_pinned.eq(pinned));
        }
        if let Some(muted) = self.muted {
            query = query.filter(post::is_muted.eq(muted));
        }
        if let Some(valid) = self.valid {
            query = query.filter(post::is_valid.eq(valid));
        }
        if let Some(promoted) = self.promoted {
            query = if promoted {
                query.filter(post::promoted.ne(BigDecimal::from(0)))
            } else {
                query.filter(post::promoted.eq(BigDecimal::from(0)))
            };
        }
        if let Some(reblogged) = self.reblogged {
            query = if reblogged {
                query.filter(post::id.eq_any(reblog::table.select(reblog::post_id)))
            } else {
                query.filter(post::id.ne_all(reblog::table.select(reblog::post_id)))
            };
        }
        if let Some(rebloggers) = &self.rebloggers {
            query = query.filter(
                post::id.eq_any(
                    reblog::table
                        .filter(reblog::account.eq_any(rebloggers.clone()))
                        .select(reblog::post_id),
                ),
            );
        }
        if let Some((tags, invert)) = &self.tagged {
            if *invert {
                let mut matching = post::table.select(post::id).into_boxed();
                matching = Self::tag_conditions(tags, matching);
                query = query.filter(post::id.ne_all(matching));
            } else {
                query = Self::tag_conditions(tags, query);
            }
        }
        if let Some((names, invert)) = &self.mentioned {
            let cache = PostsCacheQuery::default().mentioned(names.clone(), *invert);
            query = query.filter(post::id.eq_any(cache.post_ids_subquery()));
        }
        if let Some((selector, invert)) = &self.feed {
            query = query
                .filter(post::depth.eq(0))
                .filter(post::parent_id.is_null());
            let matching = match selector.resolve() {
                ResolvedNames::Names(names) => post::table
                    .filter(
                        post::author.eq_any(names.clone()).or(post::id.eq_any(
                            reblog::table
                                .filter(reblog::account.eq_any(names))
                                .select(reblog::post_id),
                        )),
                    )
                    .select(post::id)
                    .into_boxed(),
                ResolvedNames::Subquery(accounts) => post::table
                    .filter(
                        post::author
                            .eq_any(accounts.names_subquery())
                            .or(post::id.eq_any(
                                reblog::table
                                    .filter(reblog::account.eq_any(accounts.names_subquery()))
                                    .select(reblog::post_id),
                            )),
                    )
                    .select(post::id)
                    .into_boxed(),
            };
            query = if *invert {
                query.filter(post::id.ne_all(matching))
            } else {
                query.filter(post::id.eq_any(matching))
            };
        }
        if let Some((selector, invert)) = &self.feed_cache {
            query = query
                .filter(post::depth.eq(0))
                .filter(post::parent_id.is_null());
            let matching = match selector.resolve() {
                ResolvedNames::Names(names) => feed_cache::table
                    .filter(
                        feed_cache::account_id.eq_any(
                            account::table
                                .filter(account::name.eq_any(names))
                                .select(account::id),
                        ),
                    )
                    .select(feed_cache::post_id)
                    .into_boxed(),
                ResolvedNames::Subquery(accounts) => feed_cache::table
                    .filter(feed_cache::account_id.eq_any(accounts.ids_subquery()))
                    .select(feed_cache::post_id)
                    .into_boxed(),
            };
            query = if *invert {
                query.filter(post::id.ne_all(matching))
            } else {
                query.filter(post::id.eq_any(matching))
            };
        }
        if let Some((after, invert)) = &self.after {
            query = if *invert {
                query.filter(not(post::created_at.gt(*after)))
            } else {
                query.filter(post::created_at.gt(*after))
            };
        }
        if let Some((before, invert)) = &self.before {
            query = if *invert {
                query.filter(not(post::created_at.lt(*before)))
            } else {
                query.filter(post::created_at.lt(*before))
            };
        }
        let mut cache = PostsCacheQuery::default();
        let mut use_cache = false;
        if let Some((after, invert)) = &self.updated_after {
            cache = cache.updated_after(*after, *invert);
            use_cache = true;
        }
        if let Some((before, invert)) = &self.updated_before {
            cache = cache.updated_before(*before, *invert);
            use_cache = true;
        }
        if let Some((after, invert)) = &self.payout_after {
            cache = cache.payout_after(*after, *invert);
            use_cache = true;
        }
        if let Some((before, invert)) = &self.payout_before {
            cache = cache.payout_before(*before, *invert);
            use_cache = true;
        }
        if let Some(payout_zero) = self.payout_zero {
            cache = cache.payout_zero(payout_zero);
            use_cache = true;
        }
        if let Some((app, version, invert)) = &self.app {
            cache = cache.app(app, version.as_deref(), *invert);
            use_cache = true;
        }
        if let Some((format, invert)) = &self.format {
            cache = cache.format(format, *invert);
            use_cache = true;
        }
        if use_cache {
            query = query.filter(post::id.eq_any(cache.post_ids_subquery()));
        }
        query
    }

    fn tag_conditions<ST>(
        tags: &TagFilter,
        mut query: post::BoxedQuery<'static, Pg, ST>,
    ) -> post::BoxedQuery<'static, Pg, ST> {
        // One containment subquery per "all" tag, ANDed, never a single join.
        for tag in &tags.all {
            query = query.filter(
                post::id.eq_any(
                    post_tag::table
                        .filter(post_tag::tag.eq(tag.clone()))
                        .select(post_tag::post_id),
                ),
            );
        }
        if !tags.any.is_empty() {
            query = query.filter(
                post::id.eq_any(
                    post_tag::table
                        .filter(post_tag::tag.eq_any(tags.any.clone()))
                        .select(post_tag::post_id),
                ),
            );
        }
        query
    }

    fn compile(&self) -> post::BoxedQuery<'static, Pg> {
        let mut query = self.apply(post::table.into_boxed());
        if let Some((order, direction)) = &self.order {
            let direction = match direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            query = query.order(sql::<sql_types::Text>(&format!(
                "(SELECT hive_posts_cache.{} FROM hive_posts_cache \
                 WHERE hive_posts_cache.post_id = hive_posts.id) {}",
                order.column(),
                direction
            )));
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        query
    }

    pub fn load(&self, context: &HiveContext) -> HiveResult<Vec<Post>> {
        let query = self.compile();
        debug!("loading posts: {}", debug_query::<Pg, _>(&query));
        let mut conn = context.db_pool.get()?;
        Ok(query.load(conn.deref_mut())?)
    }

    pub fn first(&self, context: &HiveContext) -> HiveResult<Option<Post>> {
        let mut conn = context.db_pool.get()?;
        Ok(self.compile().first(conn.deref_mut()).optional()?)
    }

    pub fn count(&self, context: &HiveContext) -> HiveResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(self
            .apply(post::table.select(count_star()).into_boxed())
            .get_result(conn.deref_mut())?)
    }
}

impl ReadOnly for Post {}

impl Post {
    pub fn read(id: PostId, context: &HiveContext) -> HiveResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table.find(id).get_result(conn.deref_mut())?)
    }

    /// Finds a post by slug (or even URL), e.g. `"@steemit/firstpost"`.
    pub fn find_by_slug(slug: &str, context: &HiveContext) -> HiveResult<Option<Self>> {
        let (author, permlink) = parse_slug(slug);
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .filter(post::author.eq(author))
            .filter(post::permlink.eq(permlink))
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn parent(&self, context: &HiveContext) -> HiveResult<Option<Self>> {
        let Some(parent_id) = self.parent_id else {
            return Ok(None);
        };
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .find(parent_id)
            .first(conn.deref_mut())
            .optional()?)
    }

    /// Direct replies to this post.
    pub fn children(&self, context: &HiveContext) -> HiveResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(post::table
            .filter(post::parent_id.eq(self.id))
            .filter(post::depth.between(1, MAX_SOFT_DEPTH))
            .load(conn.deref_mut())?)
    }

    pub fn author_account(&self, context: &HiveContext) -> HiveResult<Account> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(account::name.eq(self.author.clone()))
            .first(conn.deref_mut())?)
    }

    /// Accounts following this post's author.
    pub fn followers(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        self.author_account(context)?.followers(context)
    }

    pub fn community_record(&self, context: &HiveContext) -> HiveResult<Option<Community>> {
        let Some(name) = &self.community else {
            return Ok(None);
        };
        let mut conn = context.db_pool.get()?;
        Ok(community::table
            .find(name.clone())
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn community_members(&self, context: &HiveContext) -> HiveResult<Vec<Member>> {
        let Some(name) = &self.community else {
            return Ok(Vec::new());
        };
        let mut conn = context.db_pool.get()?;
        Ok(member::table
            .filter(member::community.eq(name.clone()))
            .load(conn.deref_mut())?)
    }

    pub fn cache(&self, context: &HiveContext) -> HiveResult<Option<PostsCache>> {
        let mut conn = context.db_pool.get()?;
        Ok(posts_cache::table
            .find(self.id)
            .first(conn.deref_mut())
            .optional()?)
    }

    pub fn flags(&self, context: &HiveContext) -> HiveResult<Vec<Flag>> {
        let mut conn = context.db_pool.get()?;
        Ok(flag::table
            .filter(flag::post_id.eq(self.id))
            .load(conn.deref_mut())?)
    }

    /// Accounts that flagged this post.
    pub fn flaggers(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::name.eq_any(
                    flag::table
                        .filter(flag::post_id.eq(self.id))
                        .select(flag::account),
                ),
            )
            .load(conn.deref_mut())?)
    }

    pub fn reblogs(&self, context: &HiveContext) -> HiveResult<Vec<Reblog>> {
        let mut conn = context.db_pool.get()?;
        Ok(reblog::table
            .filter(reblog::post_id.eq(self.id))
            .load(conn.deref_mut())?)
    }

    /// Accounts that reblogged this post.
    pub fn rebloggers(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::name.eq_any(
                    reblog::table
                        .filter(reblog::post_id.eq(self.id))
                        .select(reblog::account),
                ),
            )
            .load(conn.deref_mut())?)
    }

    pub fn post_tags(&self, context: &HiveContext) -> HiveResult<Vec<PostTag>> {
        let mut conn = context.db_pool.get()?;
        Ok(post_tag::table
            .filter(post_tag::post_id.eq(self.id))
            .load(conn.deref_mut())?)
    }

    /// All tags related to this post.
    pub fn tags(&self, context: &HiveContext) -> HiveResult<Vec<String>> {
        let mut conn = context.db_pool.get()?;
        Ok(post_tag::table
            .filter(post_tag::post_id.eq(self.id))
            .select(post_tag::tag)
            .load(conn.deref_mut())?)
    }

    pub fn payments(&self, context: &HiveContext) -> HiveResult<Vec<Payment>> {
        let mut conn = context.db_pool.get()?;
        Ok(payment::table
            .filter(payment::post_id.eq(self.id))
            .load(conn.deref_mut())?)
    }

    /// Accounts that promoted this post.
    pub fn promoters(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::id.eq_any(
                    payment::table
                        .filter(payment::post_id.eq(self.id))
                        .select(payment::from_account),
                ),
            )
            .load(conn.deref_mut())?)
    }

    pub fn feed_cache(&self, context: &HiveContext) -> HiveResult<Vec<FeedCache>> {
        let mut conn = context.db_pool.get()?;
        Ok(feed_cache::table
            .filter(feed_cache::post_id.eq(self.id))
            .load(conn.deref_mut())?)
    }

    /// Accounts whose feed contains this post.
    pub fn feed_accounts(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::id.eq_any(
                    feed_cache::table
                        .filter(feed_cache::post_id.eq(self.id))
                        .select(feed_cache::account_id),
                ),
            )
            .load(conn.deref_mut())?)
    }

    /// The entire discussion related to this post: the post itself plus every
    /// descendant reply, at any depth, within the same community and
    /// category.
    pub fn discussion(&self, context: &HiveContext) -> HiveResult<Vec<Self>> {
        let closure = self.discussion_ids(context)?;
        let mut conn = context.db_pool.get()?;
        let query = partition_filter(
            post::table.into_boxed().filter(post::is_deleted.eq(false)),
            self.community.as_deref(),
            &self.category,
        );
        Ok(query
            .filter(post::id.ge(self.id))
            .filter(post::id.eq_any(closure.into_iter().collect::<Vec<_>>()))
            .order(post::id.asc())
            .load(conn.deref_mut())?)
    }

    /// Frontier expansion over direct children. Each round is an independent
    /// read; rounds are bounded by the hard depth limit.
    fn discussion_ids(&self, context: &HiveContext) -> HiveResult<HashSet<PostId>> {
        let mut visited = HashSet::from([self.id]);
        let mut frontier = vec![self.id];
        let mut rounds = 0;
        while !frontier.is_empty() && rounds < MAX_HARD_DEPTH {
            rounds += 1;
            let mut conn = context.db_pool.get()?;
            let query = partition_filter(
                post::table
                    .into_boxed()
                    .filter(post::is_deleted.eq(false))
                    .filter(post::depth.between(1, MAX_SOFT_DEPTH)),
                self.community.as_deref(),
                &self.category,
            );
            let found: Vec<PostId> = query
                .filter(
                    post::parent_id
                        .eq_any(frontier.iter().map(|id| Some(*id)).collect::<Vec<_>>()),
                )
                .select(post::id)
                .load(conn.deref_mut())?;
            frontier = merge_round(&mut visited, found);
            debug!(
                "discussion round {rounds} for {}: {} new posts",
                self.id,
                frontier.len()
            );
        }
        Ok(visited)
    }
}

/// Restrict a query to the same community/category partition as a post. A
/// null community partitions with other null communities.
fn partition_filter<'a, ST>(
    query: post::BoxedQuery<'a, Pg, ST>,
    community: Option<&str>,
    category: &str,
) -> post::BoxedQuery<'a, Pg, ST> {
    let query = match community {
        Some(name) => query.filter(post::community.eq(name.to_string())),
        None => query.filter(post::community.is_null()),
    };
    query.filter(post::category.eq(category.to_string()))
}

/// New ids from this round's fetch; already-visited ids are dropped so the
/// closure only ever grows and the loop terminates.
fn merge_round(visited: &mut HashSet<PostId>, found: Vec<PostId>) -> Vec<PostId> {
    found.into_iter().filter(|id| visited.insert(*id)).collect()
}

fn parse_slug(slug: &str) -> (String, String) {
    let tail = slug.rsplit('@').next().unwrap_or_default();
    let mut parts = tail.splitn(2, '/');
    let author = parts.next().unwrap_or_default();
    let permlink = parts.next().unwrap_or_default();
    (author.to_string(), permlink.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sql_of(query: &PostQuery) -> String {
        debug_query::<Pg, _>(&query.compile()).to_string()
    }

    #[test]
    fn slug_parsing_handles_plain_and_url_forms() {
        assert_eq!(
            parse_slug("@steemit/firstpost"),
            ("steemit".to_string(), "firstpost".to_string())
        );
        assert_eq!(
            parse_slug("https://steemit.com/@steemit/firstpost"),
            ("steemit".to_string(), "firstpost".to_string())
        );
        assert_eq!(
            parse_slug("@alice/a/nested/permlink"),
            ("alice".to_string(), "a/nested/permlink".to_string())
        );
    }

    #[test]
    fn depth_zero_requires_null_parent() {
        let sql = sql_of(&PostQuery::default().root_posts());
        assert!(sql.contains("\"hive_posts\".\"depth\" = $1"));
        assert!(sql.contains("\"hive_posts\".\"parent_id\" IS NULL"));
        assert!(!sql.contains("!= ALL"));
    }

    #[test]
    fn nonzero_depth_requires_parent() {
        let sql = sql_of(&PostQuery::default().replies());
        assert!(sql.contains("BETWEEN"));
        assert!(sql.contains("\"hive_posts\".\"parent_id\" IS NOT NULL"));
    }

    #[test]
    fn depth_inverts_to_complement_within_posts() {
        let sql = sql_of(&PostQuery::default().depth(0, true));
        assert!(sql.contains("!= ALL"));
        assert!(sql.contains("\"hive_posts\".\"parent_id\" IS NULL"));
    }

    #[test]
    fn tagged_all_produces_one_subquery_per_tag() {
        let tags = TagFilter::all(vec!["steem".to_string(), "video".to_string()]);
        let sql = sql_of(&PostQuery::default().tagged(tags, false));
        assert_eq!(sql.matches("\"hive_post_tags\"").count(), 2);
    }

    #[test]
    fn tagged_bare_list_means_any() {
        let sql = sql_of(&PostQuery::default().tagged(
            vec!["steem".to_string(), "video".to_string()],
            false,
        ));
        assert_eq!(sql.matches("\"hive_post_tags\"").count(), 1);
        assert!(sql.contains("= ANY"));
    }

    #[test]
    fn tagged_inverts_to_the_complement() {
        let tags = TagFilter::any(vec!["steem".to_string()]);
        let sql = sql_of(&PostQuery::default().tagged(tags, true));
        assert!(sql.contains("!= ALL"));
    }

    #[test]
    fn feed_is_a_single_set_over_two_join_paths() {
        let sql = sql_of(&PostQuery::default().feed("alice", false));
        assert!(sql.contains(" OR "));
        assert!(sql.contains("\"hive_reblogs\""));
        // feed is always root-posts-only
        assert!(sql.contains("\"hive_posts\".\"parent_id\" IS NULL"));
    }

    #[test]
    fn feed_cache_matches_feed_membership_not_authorship() {
        let sql = sql_of(&PostQuery::default().feed_cache("alice", false));
        assert!(sql.contains("\"hive_feed_cache\""));
        assert!(sql.contains("\"hive_accounts\""));
        assert!(sql.contains("\"hive_posts\".\"parent_id\" IS NULL"));
    }

    #[test]
    fn feed_inverts_within_root_posts() {
        let sql = sql_of(&PostQuery::default().feed("alice", true));
        assert!(sql.contains("!= ALL"));
        assert!(sql.contains("\"hive_posts\".\"parent_id\" IS NULL"));
    }

    #[test]
    fn date_filters_are_strict_and_invert_to_the_closed_complement() {
        let when = NaiveDateTime::default();
        let strict = sql_of(&PostQuery::default().after(when, false));
        assert!(strict.contains("\"hive_posts\".\"created_at\" > $1"));
        let complement = sql_of(&PostQuery::default().after(when, true));
        assert!(complement.contains("NOT ((\"hive_posts\".\"created_at\" > $1))"));
    }

    #[test]
    fn promoted_compares_against_exact_zero() {
        let on = sql_of(&PostQuery::default().promoted(true));
        assert!(on.contains("\"hive_posts\".\"promoted\" != $1"));
        let off = sql_of(&PostQuery::default().promoted(false));
        assert!(off.contains("\"hive_posts\".\"promoted\" = $1"));
    }

    #[test]
    fn order_requires_a_field() {
        let result = PostQuery::default().order_by_cache(None, Direction::Asc);
        assert!(matches!(
            result,
            Err(HiveError::MissingRequiredArgument { name: "order field" })
        ));
    }

    #[test]
    fn order_by_payout_uses_the_cache_table() {
        let sql = sql_of(&PostQuery::default().order_by_payout(Direction::Desc));
        assert!(sql.contains("(SELECT hive_posts_cache.payout"));
        assert!(sql.contains("DESC"));
    }

    #[test]
    fn disjoint_filters_commute() {
        let a = sql_of(
            &PostQuery::default()
                .author("alice")
                .community("steemit")
                .valid(true),
        );
        // Same filters, different chaining order, same compiled predicates.
        let b = sql_of(
            &PostQuery::default()
                .valid(true)
                .community("steemit")
                .author("alice"),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn merge_round_deduplicates_and_terminates() {
        let mut visited = HashSet::from([PostId(1)]);
        let fresh = merge_round(&mut visited, vec![PostId(1), PostId(2), PostId(2), PostId(3)]);
        assert_eq!(fresh, vec![PostId(2), PostId(3)]);
        // A round that only re-finds known ids yields an empty frontier.
        assert!(merge_round(&mut visited, vec![PostId(2), PostId(3)]).is_empty());
    }
}
