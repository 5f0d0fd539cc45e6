use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Bitmask check failed; carries the permission bits the caller lacked.
    #[error("Permission denied: missing permission bits {missing:#b}")]
    PermissionDenied { missing: i64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Map "no rows" to NotFound
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => {
                        let detail = db_err.message().to_string();
                        if detail.contains("username") {
                            Self::ValidationFailed("Username already taken".to_string())
                        } else if detail.contains("email") {
                            Self::ValidationFailed("Email already registered".to_string())
                        } else if detail.contains("telephone") {
                            Self::ValidationFailed("Telephone already registered".to_string())
                        } else {
                            Self::ValidationFailed("Resource already exists".to_string())
                        }
                    }
                    // PostgreSQL foreign_key_violation
                    "23503" => Self::NotFound("Referenced resource not found".to_string()),
                    // PostgreSQL check_violation
                    "23514" => Self::ValidationFailed("Constraint check failed".to_string()),
                    // PostgreSQL not_null_violation
                    "23502" => Self::ValidationFailed("Required field is missing".to_string()),
                    _ => Self::Database(err),
                }
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_permission_denied_carries_missing_bits() {
        let err = Error::PermissionDenied { missing: 0b100 };
        let msg = err.to_string();
        assert!(msg.contains("0b100"), "unexpected message: {msg}");
    }
}
