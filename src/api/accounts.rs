// Identity endpoints: registration, token lifecycle, and the caller's own
// account and profile.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::jobs;
use crate::middleware::CurrentUser;
use crate::models::{Gender, Profile};
use crate::services::is_unique_violation;

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshInput {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyInput {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutInput {
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub all_tokens: bool,
}

#[derive(Debug, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ProfileMe {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    full_name: String,
    bio: String,
    location: String,
    date_of_birth: Option<String>,
    age: Option<i64>,
    gender: Gender,
    is_private: bool,
    followers_count: i64,
    following_count: i64,
    posts_count: i64,
    created: i64,
    updated: i64,
}

fn validate_email(email: &str) -> AppResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::Validation(
            "email: Enter a valid email address.".to_string(),
        ));
    }
    Ok(())
}

fn compute_age(date_of_birth: &str) -> AppResult<i64> {
    let dob = NaiveDate::parse_from_str(date_of_birth, "%Y-%m-%d").map_err(|_| {
        AppError::Validation("date_of_birth: Enter a valid date (YYYY-MM-DD).".to_string())
    })?;

    let today = Utc::now().date_naive();
    if dob > today {
        return Err(AppError::Validation(
            "date_of_birth: Birth date cannot be in the future.".to_string(),
        ));
    }
    Ok(today.years_since(dob).unwrap_or(0) as i64)
}

fn validate_date_of_birth(date_of_birth: &str) -> AppResult<()> {
    let age = compute_age(date_of_birth)?;
    if age < 13 {
        return Err(AppError::Validation(
            "date_of_birth: You must be at least 13 years old to register.".to_string(),
        ));
    }
    if age > 100 {
        return Err(AppError::Validation(
            "date_of_birth: Please enter a valid birth date.".to_string(),
        ));
    }
    Ok(())
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_email(&input.email)?;
    let password_hash = state.auth.hash_password(&input.password)?;
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT INTO accounts (email, password_hash, is_staff, created, updated)
         VALUES (?, ?, 0, ?, ?)",
    )
    .bind(&input.email)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.db.pool)
    .await;

    let account_id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Validation(
                "email: Account with this email already exists.".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Profile provisioning runs off the request path.
    jobs::spawn_profile_provisioning(state.db.clone(), account_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({"id": account_id, "email": input.email, "is_staff": false})),
    ))
}

async fn obtain_token(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<Value>> {
    let account = state
        .db
        .get_account_by_email(&input.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if !state
        .auth
        .verify_password(&input.password, &account.password_hash)?
    {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let pair = state.auth.issue_token_pair(&state.db, account.id).await?;
    Ok(Json(json!({"access": pair.access, "refresh": pair.refresh})))
}

async fn refresh_token(
    State(state): State<AppState>,
    Json(input): Json<RefreshInput>,
) -> AppResult<Json<Value>> {
    let access = state.auth.refresh_access(&state.db, &input.refresh).await?;
    Ok(Json(json!({"access": access})))
}

async fn verify_token(
    State(state): State<AppState>,
    Json(input): Json<VerifyInput>,
) -> AppResult<Json<Value>> {
    state.auth.decode_token(&input.token)?;
    Ok(Json(json!({})))
}

async fn logout(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<LogoutInput>,
) -> AppResult<StatusCode> {
    if input.all_tokens {
        state
            .auth
            .revoke_all_refresh_tokens(&state.db, user.account.id)
            .await?;
    } else {
        let refresh = input.refresh.ok_or_else(|| {
            AppError::Validation("refresh: This field is required.".to_string())
        })?;
        state
            .auth
            .revoke_refresh_token(&state.db, user.account.id, &refresh)
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_me(user: CurrentUser) -> Json<Value> {
    Json(json!({
        "id": user.account.id,
        "email": user.account.email,
        "is_staff": user.account.is_staff,
        "created": user.account.created,
        "updated": user.account.updated,
    }))
}

async fn update_me(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<AccountUpdate>,
) -> AppResult<Json<Value>> {
    let now = Utc::now().timestamp();

    if let Some(email) = &input.email {
        validate_email(email)?;
        let result = sqlx::query("UPDATE accounts SET email = ?, updated = ? WHERE id = ?")
            .bind(email)
            .bind(now)
            .bind(user.account.id)
            .execute(&state.db.pool)
            .await;
        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(AppError::Validation(
                    "email: Account with this email already exists.".to_string(),
                ));
            }
            return Err(e.into());
        }
    }

    if let Some(password) = &input.password {
        let password_hash = state.auth.hash_password(password)?;
        sqlx::query("UPDATE accounts SET password_hash = ?, updated = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(now)
            .bind(user.account.id)
            .execute(&state.db.pool)
            .await?;
    }

    let account = state
        .db
        .get_account(user.account.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    Ok(Json(json!({
        "id": account.id,
        "email": account.email,
        "is_staff": account.is_staff,
        "created": account.created,
        "updated": account.updated,
    })))
}

fn profile_me_response(profile: &Profile, email: &str) -> AppResult<ProfileMe> {
    let age = match &profile.date_of_birth {
        Some(dob) => Some(compute_age(dob)?),
        None => None,
    };
    Ok(ProfileMe {
        id: profile.id,
        email: email.to_string(),
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        full_name: profile.full_name(email),
        bio: profile.bio.clone(),
        location: profile.location.clone(),
        date_of_birth: profile.date_of_birth.clone(),
        age,
        gender: profile.gender,
        is_private: profile.is_private,
        followers_count: profile.followers_count,
        following_count: profile.following_count,
        posts_count: profile.posts_count,
        created: profile.created,
        updated: profile.updated,
    })
}

async fn get_my_profile(user: CurrentUser) -> AppResult<Json<ProfileMe>> {
    Ok(Json(profile_me_response(
        &user.profile,
        &user.account.email,
    )?))
}

async fn update_my_profile(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileMe>> {
    if let Some(bio) = &input.bio {
        if bio.len() > 500 {
            return Err(AppError::Validation(
                "bio: Must be at most 500 characters.".to_string(),
            ));
        }
    }
    if let Some(dob) = &input.date_of_birth {
        validate_date_of_birth(dob)?;
    }

    let profile = &user.profile;
    let now = Utc::now().timestamp();

    sqlx::query(
        "UPDATE profiles
         SET first_name = ?, last_name = ?, bio = ?, location = ?, date_of_birth = ?,
             gender = ?, is_private = ?, updated = ?
         WHERE id = ?",
    )
    .bind(input.first_name.as_deref().unwrap_or(&profile.first_name))
    .bind(input.last_name.as_deref().unwrap_or(&profile.last_name))
    .bind(input.bio.as_deref().unwrap_or(&profile.bio))
    .bind(input.location.as_deref().unwrap_or(&profile.location))
    .bind(
        input
            .date_of_birth
            .as_deref()
            .or(profile.date_of_birth.as_deref()),
    )
    .bind(input.gender.unwrap_or(profile.gender).as_str())
    .bind(input.is_private.unwrap_or(profile.is_private))
    .bind(now)
    .bind(profile.id)
    .execute(&state.db.pool)
    .await?;

    let updated = state
        .db
        .get_profile(profile.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile_me_response(&updated, &user.account.email)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(obtain_token))
        .route("/token/refresh", post(refresh_token))
        .route("/token/verify", post(verify_token))
        .route("/logout", post(logout))
        .route("/me", get(get_me).patch(update_me))
        .route("/profile/me", get(get_my_profile).put(update_my_profile))
}
