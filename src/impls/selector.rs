use crate::{
    common::account::Account,
    error::{HiveError, HiveResult},
    impls::account::AccountQuery,
};

/// Polymorphic account argument accepted by feed and follow related filters.
/// A [`AccountSelector::Query`] variant stays deferred: it is embedded as a
/// nested subquery rather than materialized into memory.
#[derive(Clone, Debug)]
pub enum AccountSelector {
    Literal(String),
    LiteralSet(Vec<String>),
    EntityRef(Account),
    Query(AccountQuery),
}

/// A selector reduced to the two shapes the query compiler handles: an
/// in-memory name list or a deferred subquery.
#[derive(Clone, Debug)]
pub(crate) enum ResolvedNames {
    Names(Vec<String>),
    Subquery(AccountQuery),
}

impl AccountSelector {
    pub(crate) fn resolve(&self) -> ResolvedNames {
        match self {
            AccountSelector::Literal(name) => ResolvedNames::Names(vec![name.clone()]),
            AccountSelector::LiteralSet(names) => ResolvedNames::Names(names.clone()),
            AccountSelector::EntityRef(account) => {
                ResolvedNames::Names(vec![account.name.clone()])
            }
            AccountSelector::Query(query) => ResolvedNames::Subquery(query.clone()),
        }
    }
}

impl From<&str> for AccountSelector {
    fn from(name: &str) -> Self {
        AccountSelector::Literal(name.to_string())
    }
}

impl From<String> for AccountSelector {
    fn from(name: String) -> Self {
        AccountSelector::Literal(name)
    }
}

impl From<Vec<String>> for AccountSelector {
    fn from(names: Vec<String>) -> Self {
        AccountSelector::LiteralSet(names)
    }
}

impl From<&[&str]> for AccountSelector {
    fn from(names: &[&str]) -> Self {
        AccountSelector::LiteralSet(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<&Account> for AccountSelector {
    fn from(account: &Account) -> Self {
        AccountSelector::EntityRef(account.clone())
    }
}

impl From<Account> for AccountSelector {
    fn from(account: Account) -> Self {
        AccountSelector::EntityRef(account)
    }
}

impl From<AccountQuery> for AccountSelector {
    fn from(query: AccountQuery) -> Self {
        AccountSelector::Query(query)
    }
}

/// Untyped entry point for callers holding JSON, e.g. a presentation layer.
/// Anything that is not a string or an array of strings is a programming
/// error.
impl TryFrom<serde_json::Value> for AccountSelector {
    type Error = HiveError;

    fn try_from(value: serde_json::Value) -> HiveResult<Self> {
        use serde_json::Value;
        match value {
            Value::String(name) => Ok(AccountSelector::Literal(name)),
            Value::Array(values) => {
                let names = values
                    .into_iter()
                    .map(|v| match v {
                        Value::String(name) => Ok(name),
                        other => Err(HiveError::InvalidSelectorType {
                            received: json_type_name(&other).to_string(),
                        }),
                    })
                    .collect::<HiveResult<Vec<_>>>()?;
                Ok(AccountSelector::LiteralSet(names))
            }
            other => Err(HiveError::InvalidSelectorType {
                received: json_type_name(&other).to_string(),
            }),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::newtypes::AccountId;
    use serde_json::json;

    #[test]
    fn typed_inputs_coerce() {
        assert!(matches!(
            AccountSelector::from("alice"),
            AccountSelector::Literal(name) if name == "alice"
        ));
        assert!(matches!(
            AccountSelector::from(vec!["alice".to_string(), "bob".to_string()]),
            AccountSelector::LiteralSet(names) if names.len() == 2
        ));
        let account = Account {
            id: AccountId(1),
            name: "alice".to_string(),
        };
        match AccountSelector::from(&account).resolve() {
            ResolvedNames::Names(names) => assert_eq!(names, vec!["alice".to_string()]),
            ResolvedNames::Subquery(_) => panic!("expected literal names"),
        }
    }

    #[test]
    fn json_strings_and_arrays_coerce() {
        assert!(AccountSelector::try_from(json!("alice")).is_ok());
        assert!(AccountSelector::try_from(json!(["alice", "bob"])).is_ok());
    }

    #[test]
    fn unrecognized_json_shapes_fail_with_type_name() {
        for (value, expected) in [
            (json!(null), "null"),
            (json!(42), "number"),
            (json!({"name": "alice"}), "object"),
            (json!(true), "boolean"),
        ] {
            match AccountSelector::try_from(value) {
                Err(HiveError::InvalidSelectorType { received }) => {
                    assert_eq!(received, expected)
                }
                other => panic!("expected InvalidSelectorType, got {other:?}"),
            }
        }
    }

    #[test]
    fn arrays_must_contain_only_strings() {
        assert!(matches!(
            AccountSelector::try_from(json!(["alice", 7])),
            Err(HiveError::InvalidSelectorType { received }) if received == "number"
        ));
    }
}
