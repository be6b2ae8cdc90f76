use crate::{
    common::{account::Account, community::{Community, Member}},
    error::HiveResult,
    impls::{member::MemberQuery, post::PostQuery, HiveContext, ReadOnly},
    schema::{account, community, member},
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use serde_json::Value;
use std::ops::DerefMut;

impl ReadOnly for Community {}

impl Community {
    pub fn find_by_name(name: &str, context: &HiveContext) -> HiveResult<Option<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(community::table
            .find(name.to_string())
            .first::<Community>(conn.deref_mut())
            .optional()?)
    }

    /// All posts published under this community.
    pub fn posts(&self) -> PostQuery {
        PostQuery::default().community(&self.name)
    }

    pub fn members(&self, context: &HiveContext) -> HiveResult<Vec<Member>> {
        MemberQuery::default().community(&self.name).load(context)
    }

    /// Accounts holding a membership, through the member rows.
    pub fn accounts(&self, context: &HiveContext) -> HiveResult<Vec<Account>> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(
                account::name.eq_any(
                    member::table
                        .filter(member::community.eq(self.name.clone()))
                        .select(member::account),
                ),
            )
            .load(conn.deref_mut())?)
    }

    /// Settings are stored as raw json text.
    pub fn parsed_settings(&self) -> HiveResult<Value> {
        Ok(serde_json::from_str(&self.settings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn sample_community() -> Community {
        Community {
            name: "hive-123".to_string(),
            title: "Test".to_string(),
            about: String::new(),
            description: String::new(),
            settings: r#"{"lang":"en"}"#.to_string(),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn settings_parse_as_json() {
        let community = sample_community();
        let settings = community.parsed_settings().unwrap();
        assert_eq!(settings["lang"], "en");
    }

    #[test]
    fn malformed_settings_surface_as_errors() {
        let mut community = sample_community();
        community.settings = "not json".to_string();
        assert!(community.parsed_settings().is_err());
    }
}
