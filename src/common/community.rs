use crate::schema::{community, member};
use chrono::NaiveDateTime;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = community, primary_key(name), check_for_backend(diesel::pg::Pg))]
pub struct Community {
    pub name: String,
    pub title: String,
    pub about: String,
    pub description: String,
    pub settings: String,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = member, primary_key(community, account), check_for_backend(diesel::pg::Pg))]
pub struct Member {
    pub community: String,
    pub account: String,
    pub is_admin: bool,
    pub is_mod: bool,
    pub is_approved: bool,
    pub is_muted: bool,
}
