use super::newtypes::{AccountId, BlockNum, PaymentId, PostId};
use crate::schema::payment;
use bigdecimal::BigDecimal;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// The account promotion payments are burned to.
pub const NULL_ACCOUNT: &str = "null";

/// A transfer to the `null` account that promotes a post. The ingestion
/// process only records payments targeting the sentinel account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payment, check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub id: PaymentId,
    pub block_num: BlockNum,
    pub tx_idx: i16,
    pub post_id: PostId,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: BigDecimal,
    pub token: String,
}
