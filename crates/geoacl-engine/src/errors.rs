use geoacl_authz::AuthzError;
use geoacl_store::StoreError;
use thiserror::Error;

/// Failures surfaced by authorization queries.
///
/// `Clone` so one failed shared cache computation can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("rule store failure: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Evaluation(#[from] AuthzError),
}

pub type AuthorizationResult<T> = Result<T, AuthorizationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_source_message() {
        let err: AuthorizationError = StoreError::Unexpected("disk gone".into()).into();
        assert_eq!(
            err.to_string(),
            "rule store failure: unexpected store failure: disk gone"
        );

        let err: AuthorizationError = AuthzError::Geometry("no engine".into()).into();
        assert_eq!(err.to_string(), "geometry operation failed: no engine");
    }
}
