use super::newtypes::PostId;
use crate::schema::{post, post_tag, posts_cache};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// Blockchain limit on reply depth.
pub const MAX_HARD_DEPTH: i32 = 65535;
/// Witness limit on reply depth.
pub const MAX_SOFT_DEPTH: i32 = 255;

/// A post or comment. Root posts have depth 0 and no parent; replies have
/// depth > 0 and a non-null parent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = post, check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: PostId,
    pub parent_id: Option<PostId>,
    pub author: String,
    pub permlink: String,
    pub community: Option<String>,
    pub category: String,
    pub depth: i32,
    pub created_at: NaiveDateTime,
    pub is_deleted: bool,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub is_valid: bool,
    pub promoted: BigDecimal,
}

impl Post {
    /// The unique string containing the author and permlink, useful as a
    /// restful param id.
    pub fn slug(&self) -> String {
        format!("@{}/{}", self.author, self.permlink)
    }
}

/// Denormalized per-post data maintained by the ingestion process. A payout
/// of exactly 0.0 means "unpaid", which is distinct from a missing row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = posts_cache, primary_key(post_id), check_for_backend(diesel::pg::Pg))]
pub struct PostsCache {
    pub post_id: PostId,
    pub author: String,
    pub permlink: String,
    pub category: String,
    pub payout: BigDecimal,
    pub children: i32,
    pub author_rep: f64,
    pub total_votes: i32,
    pub up_votes: i32,
    pub rshares: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub payout_at: NaiveDateTime,
    pub body: String,
    pub json: String,
    pub is_paidout: bool,
    pub is_nsfw: bool,
    pub is_declined: bool,
    pub is_full_power: bool,
    pub is_hidden: bool,
    pub is_grayed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = post_tag, primary_key(post_id, tag), check_for_backend(diesel::pg::Pg))]
pub struct PostTag {
    pub post_id: PostId,
    pub tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_post() -> Post {
        Post {
            id: PostId(1),
            parent_id: None,
            author: "steemit".to_string(),
            permlink: "firstpost".to_string(),
            community: None,
            category: "meta".to_string(),
            depth: 0,
            created_at: NaiveDateTime::default(),
            is_deleted: false,
            is_pinned: false,
            is_muted: false,
            is_valid: true,
            promoted: BigDecimal::from(0),
        }
    }

    #[test]
    fn slug_concatenates_author_and_permlink() {
        assert_eq!(sample_post().slug(), "@steemit/firstpost");
    }
}
