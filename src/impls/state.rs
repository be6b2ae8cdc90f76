use crate::{
    common::{
        newtypes::BlockNum,
        state::{DynamicGlobalProperties, State, StateValue},
    },
    error::{HiveError, HiveResult},
    impls::{HiveContext, ReadOnly},
    schema::state,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime};
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use regex::Regex;
use serde_json::Value;
use std::{ops::DerefMut, str::FromStr, sync::LazyLock};

// Strings the chain emits as ISO-8601 timestamps, with optional fractional
// seconds and offset.
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-?(?:[1-9][0-9]*)?[0-9]{4})-(1[0-2]|0[1-9])-(3[0-1]|0[1-9]|[1-2][0-9])T(2[0-3]|[0-1][0-9]):([0-5][0-9]):([0-5][0-9])(\.[0-9]+)?(Z|[+-](?:2[0-3]|[0-1][0-9]):[0-5][0-9])?$",
    )
    .expect("hardcoded regex")
});

// Only strings that are integers in their entirety coerce to numbers.
static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("hardcoded regex"));

/// The typed state columns, addressable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateField {
    BlockNum,
    DbVersion,
    SteemPerMvest,
    UsdPerSteem,
    SbdPerSteem,
    Dgpo,
}

impl FromStr for StateField {
    type Err = HiveError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "block_num" => Ok(StateField::BlockNum),
            "db_version" => Ok(StateField::DbVersion),
            "steem_per_mvest" => Ok(StateField::SteemPerMvest),
            "usd_per_steem" => Ok(StateField::UsdPerSteem),
            "sbd_per_steem" => Ok(StateField::SbdPerSteem),
            "dgpo" => Ok(StateField::Dgpo),
            other => Err(HiveError::UnknownAccessor {
                name: other.to_string(),
            }),
        }
    }
}

impl ReadOnly for State {}

impl State {
    /// The latest state row. There is normally exactly one, but ordering by
    /// block number keeps this deterministic either way.
    pub fn read(context: &HiveContext) -> HiveResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(state::table
            .order(state::block_num.desc())
            .first(conn.deref_mut())?)
    }

    pub fn block_num(context: &HiveContext) -> HiveResult<BlockNum> {
        Ok(Self::read(context)?.block_num)
    }

    pub fn db_version(context: &HiveContext) -> HiveResult<i32> {
        Ok(Self::read(context)?.db_version)
    }

    pub fn steem_per_mvest(context: &HiveContext) -> HiveResult<BigDecimal> {
        Ok(Self::read(context)?.steem_per_mvest)
    }

    pub fn usd_per_steem(context: &HiveContext) -> HiveResult<BigDecimal> {
        Ok(Self::read(context)?.usd_per_steem)
    }

    pub fn sbd_per_steem(context: &HiveContext) -> HiveResult<BigDecimal> {
        Ok(Self::read(context)?.sbd_per_steem)
    }

    pub fn dgpo(context: &HiveContext) -> HiveResult<DynamicGlobalProperties> {
        Self::read(context)?.parse_dgpo()
    }

    /// Fetches a state column by name, e.g. for callers dispatching on
    /// strings coming over a wire.
    pub fn fetch(name: &str, context: &HiveContext) -> HiveResult<StateValue> {
        let field = name.parse::<StateField>()?;
        Self::read(context)?.field_value(field)
    }

    fn field_value(self, field: StateField) -> HiveResult<StateValue> {
        Ok(match field {
            StateField::BlockNum => StateValue::Integer(i64::from(self.block_num.0)),
            StateField::DbVersion => StateValue::Integer(i64::from(self.db_version)),
            StateField::SteemPerMvest => StateValue::Decimal(self.steem_per_mvest),
            StateField::UsdPerSteem => StateValue::Decimal(self.usd_per_steem),
            StateField::SbdPerSteem => StateValue::Decimal(self.sbd_per_steem),
            StateField::Dgpo => StateValue::Record(self.parse_dgpo()?),
        })
    }

    /// Parses the dynamic global properties blob. Top-level strings that look
    /// like timestamps or integers are coerced; nested objects become records
    /// whose leaves stay raw JSON.
    pub fn parse_dgpo(&self) -> HiveResult<DynamicGlobalProperties> {
        let raw: serde_json::Map<String, Value> = serde_json::from_str(&self.dgpo)?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| (key, convert_value(value)))
            .collect())
    }
}

fn convert_value(value: Value) -> StateValue {
    match value {
        Value::Object(map) => StateValue::Record(
            map.into_iter()
                .map(|(key, value)| (key, StateValue::Raw(value)))
                .collect(),
        ),
        Value::String(text) => convert_string(text),
        other => StateValue::Raw(other),
    }
}

fn convert_string(text: String) -> StateValue {
    if TIMESTAMP_RE.is_match(&text) {
        return parse_timestamp(&text)
            .map(StateValue::Timestamp)
            .unwrap_or(StateValue::Text(text));
    }
    if INTEGER_RE.is_match(&text) {
        // Out-of-range digit strings stay text rather than wrapping.
        return text
            .parse::<i64>()
            .map(StateValue::Integer)
            .unwrap_or(StateValue::Text(text));
    }
    StateValue::Text(text)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sample_state(dgpo: &str) -> State {
        State {
            block_num: BlockNum(20_000_000),
            db_version: 10,
            steem_per_mvest: BigDecimal::from(490),
            usd_per_steem: BigDecimal::from(1),
            sbd_per_steem: BigDecimal::from(1),
            dgpo: dgpo.to_string(),
        }
    }

    #[test]
    fn decimal_columns_come_back_as_decimals() {
        let state = sample_state("{}");
        let value = state.field_value(StateField::SteemPerMvest).unwrap();
        assert_eq!(value, StateValue::Decimal(BigDecimal::from(490)));
    }

    #[test]
    fn unknown_accessors_are_rejected_by_name() {
        let result = "sbd_per_steem".parse::<StateField>();
        assert!(matches!(result, Ok(StateField::SbdPerSteem)));
        let result = "drop_table".parse::<StateField>();
        assert!(matches!(
            result,
            Err(HiveError::UnknownAccessor { name }) if name == "drop_table"
        ));
    }

    #[test]
    fn dgpo_timestamps_are_coerced() {
        let state = sample_state(r#"{"time":"2018-03-16T17:37:03"}"#);
        let dgpo = state.parse_dgpo().unwrap();
        let expected = NaiveDate::from_ymd_opt(2018, 3, 16)
            .unwrap()
            .and_hms_opt(17, 37, 3)
            .unwrap();
        assert_eq!(dgpo["time"], StateValue::Timestamp(expected));
    }

    #[test]
    fn dgpo_offset_timestamps_normalize_to_utc() {
        let state = sample_state(r#"{"time":"2018-03-16T17:37:03+01:00"}"#);
        let dgpo = state.parse_dgpo().unwrap();
        let expected = NaiveDate::from_ymd_opt(2018, 3, 16)
            .unwrap()
            .and_hms_opt(16, 37, 3)
            .unwrap();
        assert_eq!(dgpo["time"], StateValue::Timestamp(expected));
    }

    #[test]
    fn dgpo_integer_strings_are_coerced_only_when_fully_numeric() {
        let state = sample_state(
            r#"{"head_block_number":"20000000","supply":"271010521.897 STEEM","negative":"-42"}"#,
        );
        let dgpo = state.parse_dgpo().unwrap();
        assert_eq!(dgpo["head_block_number"], StateValue::Integer(20_000_000));
        assert_eq!(dgpo["negative"], StateValue::Integer(-42));
        assert_eq!(
            dgpo["supply"],
            StateValue::Text("271010521.897 STEEM".to_string())
        );
    }

    #[test]
    fn dgpo_overlong_integers_stay_text() {
        let state = sample_state(r#"{"big":"99999999999999999999999999"}"#);
        let dgpo = state.parse_dgpo().unwrap();
        assert_eq!(
            dgpo["big"],
            StateValue::Text("99999999999999999999999999".to_string())
        );
    }

    #[test]
    fn dgpo_nested_objects_become_records_with_raw_leaves() {
        let state = sample_state(r#"{"virtual_supply":{"amount":"123","nai":"@@000000021"}}"#);
        let dgpo = state.parse_dgpo().unwrap();
        let StateValue::Record(record) = &dgpo["virtual_supply"] else {
            panic!("expected a record");
        };
        assert_eq!(
            record["amount"],
            StateValue::Raw(Value::String("123".to_string()))
        );
    }

    #[test]
    fn dgpo_non_string_scalars_stay_raw() {
        let state = sample_state(r#"{"maximum_block_size":65536,"participating":true}"#);
        let dgpo = state.parse_dgpo().unwrap();
        assert_eq!(
            dgpo["maximum_block_size"],
            StateValue::Raw(Value::from(65536))
        );
        assert_eq!(dgpo["participating"], StateValue::Raw(Value::Bool(true)));
    }

    #[test]
    fn malformed_dgpo_surfaces_as_an_error() {
        let state = sample_state("not json");
        assert!(matches!(state.parse_dgpo(), Err(HiveError::Json(_))));
    }
}
