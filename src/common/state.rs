use super::newtypes::BlockNum;
use crate::schema::state;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The latest row of chain state written by the ingestion process.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = state, primary_key(block_num), check_for_backend(diesel::pg::Pg))]
pub struct State {
    pub block_num: BlockNum,
    pub db_version: i32,
    pub steem_per_mvest: BigDecimal,
    pub usd_per_steem: BigDecimal,
    pub sbd_per_steem: BigDecimal,
    pub dgpo: String,
}

/// A value extracted from the state row. Dynamic global property values keep
/// their raw JSON shape unless they are nested objects, timestamp-looking
/// strings, or purely numeric strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum StateValue {
    Integer(i64),
    Decimal(BigDecimal),
    Timestamp(NaiveDateTime),
    Text(String),
    Record(BTreeMap<String, StateValue>),
    Raw(serde_json::Value),
}

/// The parsed dynamic global properties blob.
pub type DynamicGlobalProperties = BTreeMap<String, StateValue>;
