use super::newtypes::AccountId;
use crate::schema::account;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// A blockchain account, keyed by its unique name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = account, check_for_backend(diesel::pg::Pg))]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}
