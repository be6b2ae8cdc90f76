use super::newtypes::BlockNum;
use crate::schema::block;
use chrono::NaiveDateTime;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// A block, chained to its predecessor by hash linkage: the previous block is
/// the one whose `hash` equals this block's `prev`, never `num - 1`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = block, primary_key(num), check_for_backend(diesel::pg::Pg))]
pub struct Block {
    pub num: BlockNum,
    pub hash: String,
    pub prev: Option<String>,
    pub created_at: NaiveDateTime,
}
