use thiserror::Error;

use crate::errors::Error;

/// Classification of sqlx failures that store code can branch on.
///
/// This type never leaves the `db` module: each store translates it into a domain
/// [`Error`] with [`DbError::into_domain`] before returning.
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation on {constraint:?}")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation on {constraint:?}")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Check constraint violation
    #[error("Check constraint violation on {constraint:?}")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    DbError::UniqueViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

impl DbError {
    /// Translate into the domain error a caller of `operation` should see.
    ///
    /// `not_found` is returned for missing rows, and `on_unique` decides which unique
    /// constraints carry domain meaning (returning `None` falls through to `Internal`).
    pub fn into_domain(self, operation: &str, not_found: Error, on_unique: impl FnOnce(Option<&str>) -> Option<Error>) -> Error {
        match self {
            DbError::NotFound => not_found,
            DbError::UniqueViolation { ref constraint, .. } => match on_unique(constraint.as_deref()) {
                Some(err) => err,
                None => Error::internal(operation, &self),
            },
            other => Error::internal(operation, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_translates_to_given_kind() {
        let err = DbError::NotFound.into_domain("look up session", Error::SessionNotFound, |_| None);
        assert!(matches!(err, Error::SessionNotFound));
    }

    #[test]
    fn test_unique_violation_translation() {
        let violation = || DbError::UniqueViolation {
            constraint: Some("users_email_unique".to_string()),
            table: Some("users".to_string()),
            message: "duplicate key".to_string(),
        };

        let err = violation().into_domain("save user", Error::UserNotFound, |c| {
            (c == Some("users_email_unique")).then_some(Error::AlreadyExists)
        });
        assert!(matches!(err, Error::AlreadyExists));

        // Constraints without a domain meaning become internal errors
        let err = violation().into_domain("create session", Error::SessionNotFound, |_| None);
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test]
    fn test_other_becomes_internal_with_operation() {
        let err = DbError::Other(anyhow::anyhow!("pool timed out")).into_domain("look up user", Error::UserNotFound, |_| None);
        match err {
            Error::Internal { operation } => {
                assert!(operation.starts_with("look up user"));
                assert!(operation.contains("pool timed out"));
            }
            other => panic!("expected internal error, got {other:?}"),
        }
    }
}
