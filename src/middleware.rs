// Request-scoped viewer extraction: parses the bearer token and resolves the
// caller's account and profile before any handler logic runs.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{Account, Profile};

/// Authenticated caller, available to any handler that lists it as an
/// extractor. Requests without a valid access token are rejected with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: Account,
    pub profile: Profile,
}

/// Caller identity for endpoints that allow anonymous reads.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

fn bearer_token(parts: &Parts) -> AppResult<Option<&str>> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed authorization header".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) => Ok(Some(token)),
        None => Err(AppError::Unauthorized(
            "Invalid authorization format".to_string(),
        )),
    }
}

async fn resolve_user(state: &AppState, token: &str) -> AppResult<CurrentUser> {
    let claims = state.auth.validate_access(token)?;
    let account_id = claims.account_id()?;

    let account = state
        .db
        .get_account(account_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    // The profile is provisioned by a background task right after
    // registration; a missing row here means that task has not landed yet.
    let profile = state
        .db
        .get_profile_by_account(account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(CurrentUser { account, profile })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("Authorization header required".to_string()))?;
        resolve_user(state, token).await
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(OptionalUser(None)),
            Some(token) => Ok(OptionalUser(Some(resolve_user(state, token).await?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with_auth(Some("Bearer token123"));
        assert_eq!(bearer_token(&parts).unwrap(), Some("token123"));
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        let parts = parts_with_auth(None);
        assert_eq!(bearer_token(&parts).unwrap(), None);
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let parts = parts_with_auth(Some("Basic abc123"));
        assert!(bearer_token(&parts).is_err());
    }
}
