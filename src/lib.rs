//! Read-only data access for a hivemind database: a relational view of
//! blockchain-derived social content kept current by a separate ingestion
//! process. Queries compose as value-type builders and hit the database only
//! when materialized.
//!
//! ```no_run
//! use hive_db::{HiveConfig, HiveContext, PostQuery};
//!
//! # fn main() -> hive_db::HiveResult<()> {
//! let context = HiveContext::init(HiveConfig::read()?, false)?;
//! let posts = PostQuery::default()
//!     .root_posts()
//!     .tagged(vec!["photography".to_string()], false)
//!     .limit(20)
//!     .load(&context)?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod impls;
pub mod schema;

pub use crate::{
    common::{
        account::Account,
        block::Block,
        community::{Community, Member},
        follow::{FeedCache, Flag, Follow, FollowState, Reblog},
        newtypes::{AccountId, BlockNum, PaymentId, PostId},
        payment::Payment,
        post::{Post, PostTag, PostsCache},
        state::{DynamicGlobalProperties, State, StateValue},
    },
    config::HiveConfig,
    error::{HiveError, HiveResult},
    impls::{
        account::AccountQuery,
        block::{BlockInterval, BlockQuery},
        feed_cache::FeedCacheQuery,
        follow::FollowQuery,
        member::MemberQuery,
        payment::{AmountGroup, PaymentQuery},
        post::{CacheOrder, DepthRange, PostQuery, TagFilter},
        post_tag::{CountGroup, PostTagQuery},
        posts_cache::{MentionFilter, PayoutGroup, PostsCacheQuery},
        selector::AccountSelector,
        state::StateField,
        Direction,
        HiveContext,
        ReadOnly,
    },
};
