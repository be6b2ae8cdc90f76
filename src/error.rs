use thiserror::Error;

pub type HiveResult<T> = Result<T, HiveError>;

/// Errors surfaced by the query layer. Storage errors (connection loss,
/// statement timeout) propagate to the caller unchanged; nothing is retried
/// here and no partial results are returned.
#[derive(Debug, Error)]
pub enum HiveError {
    /// The layer is read-only. The underlying database is shared with the
    /// ingestion process, which must never be contended with from here.
    #[error("record is read-only")]
    ReadOnlyViolation,
    #[error("don't know what to do with: {received}")]
    InvalidSelectorType { received: String },
    #[error("{name} must be specified")]
    MissingRequiredArgument { name: &'static str },
    #[error("no such accessor: {name}")]
    UnknownAccessor { name: String },
    #[error(transparent)]
    Connection(#[from] diesel::r2d2::PoolError),
    #[error(transparent)]
    Query(#[from] diesel::result::Error),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_identify_the_failure() {
        assert_eq!(HiveError::ReadOnlyViolation.to_string(), "record is read-only");
        assert_eq!(
            HiveError::InvalidSelectorType {
                received: "number".to_string()
            }
            .to_string(),
            "don't know what to do with: number"
        );
        assert_eq!(
            HiveError::MissingRequiredArgument { name: "order field" }.to_string(),
            "order field must be specified"
        );
        assert_eq!(
            HiveError::UnknownAccessor {
                name: "nope".to_string()
            }
            .to_string(),
            "no such accessor: nope"
        );
    }
}
