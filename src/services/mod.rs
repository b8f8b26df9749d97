// Domain services - the business logic between the HTTP handlers and the store.

pub mod comments;
pub mod follow;
pub mod posts;
pub mod recommendation;

/// True when an insert bounced off a uniqueness constraint, which the API
/// surfaces as a 400 rather than a 500.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}
