use super::newtypes::{AccountId, PostId};
use crate::schema::{feed_cache, flag, follow, reblog};
use chrono::NaiveDateTime;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// Follow state as stored on chain. Rows with any other numeric state match
/// no named scope.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FollowState {
    Reset,
    Follow,
    Mute,
}

impl FollowState {
    pub fn to_i16(self) -> i16 {
        match self {
            FollowState::Reset => 0,
            FollowState::Follow => 1,
            FollowState::Mute => 2,
        }
    }

    pub fn from_i16(state: i16) -> Option<Self> {
        match state {
            0 => Some(FollowState::Reset),
            1 => Some(FollowState::Follow),
            2 => Some(FollowState::Mute),
            _ => None,
        }
    }
}

/// A follow, mute, or follow/mute reset between two accounts. At most one row
/// exists per (follower, following) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = follow, primary_key(follower, following), check_for_backend(diesel::pg::Pg))]
pub struct Follow {
    pub follower: AccountId,
    pub following: AccountId,
    pub state: i16,
    pub created_at: NaiveDateTime,
}

impl Follow {
    pub fn state(&self) -> Option<FollowState> {
        FollowState::from_i16(self.state)
    }
}

/// An account's re-share of a post.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = reblog, primary_key(account, post_id), check_for_backend(diesel::pg::Pg))]
pub struct Reblog {
    pub account: String,
    pub post_id: PostId,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = flag, primary_key(account, post_id), check_for_backend(diesel::pg::Pg))]
pub struct Flag {
    pub account: String,
    pub post_id: PostId,
    pub created_at: NaiveDateTime,
}

/// Denotes "post appears in account's feed".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = feed_cache, primary_key(post_id, account_id), check_for_backend(diesel::pg::Pg))]
pub struct FeedCache {
    pub post_id: PostId,
    pub account_id: AccountId,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_named_values_only() {
        for state in [FollowState::Reset, FollowState::Follow, FollowState::Mute] {
            assert_eq!(FollowState::from_i16(state.to_i16()), Some(state));
        }
        assert_eq!(FollowState::from_i16(3), None);
        assert_eq!(FollowState::from_i16(-1), None);
    }
}
