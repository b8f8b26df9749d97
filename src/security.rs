// Authentication: argon2 password hashing, HS256 JWT issuance/validation,
// and the refresh-token blacklist with its cleanup worker.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::database::Database;
use crate::error::{AppError, AppResult};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
    pub token_type: String,
}

impl Claims {
    pub fn account_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and validates tokens; owns the signing keys.
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
            config,
        }
    }

    pub fn password_min_length(&self) -> usize {
        self.config.password_min_length
    }

    /// Hash password securely using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        if password.len() < self.config.password_min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.config.password_min_length
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verify password against hash
    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Issue an access + refresh pair; the refresh jti is recorded so it can
    /// be revoked on logout and swept once expired.
    pub async fn issue_token_pair(&self, db: &Database, account_id: i64) -> AppResult<TokenPair> {
        let access = self.encode_token(
            account_id,
            self.config.access_token_minutes,
            TOKEN_TYPE_ACCESS,
        )?;

        let refresh_jti = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let expires_at = now + self.config.refresh_token_minutes * 60;
        let refresh = self.encode_token_with_jti(
            account_id,
            self.config.refresh_token_minutes,
            TOKEN_TYPE_REFRESH,
            &refresh_jti,
        )?;

        sqlx::query(
            "INSERT INTO refresh_tokens (jti, account_id, expires_at, revoked, created)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&refresh_jti)
        .bind(account_id)
        .bind(expires_at)
        .bind(now)
        .execute(&db.pool)
        .await?;

        Ok(TokenPair { access, refresh })
    }

    fn encode_token(&self, account_id: i64, ttl_minutes: i64, token_type: &str) -> AppResult<String> {
        let jti = uuid::Uuid::new_v4().to_string();
        self.encode_token_with_jti(account_id, ttl_minutes, token_type, &jti)
    }

    fn encode_token_with_jti(
        &self,
        account_id: i64,
        ttl_minutes: i64,
        token_type: &str,
        jti: &str,
    ) -> AppResult<String> {
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now,
            exp: now + (ttl_minutes as u64) * 60,
            jti: jti.to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Decode any of our tokens, enforcing signature and expiry.
    pub fn decode_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate a bearer token presented on a request.
    pub fn validate_access(&self, token: &str) -> AppResult<Claims> {
        let claims = self.decode_token(token)?;
        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(AppError::Unauthorized(
                "Token is not an access token".to_string(),
            ));
        }
        Ok(claims)
    }

    /// Exchange a live refresh token for a new access token.
    pub async fn refresh_access(&self, db: &Database, refresh_token: &str) -> AppResult<String> {
        let claims = self.decode_token(refresh_token)?;
        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(AppError::Unauthorized(
                "Token is not a refresh token".to_string(),
            ));
        }

        let account_id = claims.account_id()?;
        let row = sqlx::query("SELECT revoked FROM refresh_tokens WHERE jti = ? AND account_id = ?")
            .bind(&claims.jti)
            .bind(account_id)
            .fetch_optional(&db.pool)
            .await?;

        match row {
            Some(r) if !r.get::<bool, _>("revoked") => self.encode_token(
                account_id,
                self.config.access_token_minutes,
                TOKEN_TYPE_ACCESS,
            ),
            Some(_) => Err(AppError::Unauthorized(
                "Refresh token has been revoked".to_string(),
            )),
            None => Err(AppError::Unauthorized("Unknown refresh token".to_string())),
        }
    }

    /// Revoke one refresh token belonging to `account_id`.
    pub async fn revoke_refresh_token(
        &self,
        db: &Database,
        account_id: i64,
        refresh_token: &str,
    ) -> AppResult<()> {
        let claims = self.decode_token(refresh_token)?;
        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(AppError::Validation(
                "Token is not a refresh token".to_string(),
            ));
        }
        if claims.account_id()? != account_id {
            return Err(AppError::Validation(
                "Refresh token does not belong to the authenticated user".to_string(),
            ));
        }

        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND account_id = ?",
        )
        .bind(&claims.jti)
        .bind(account_id)
        .execute(&db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest(
                "Failed to blacklist refresh token".to_string(),
            ));
        }

        info!("Revoked refresh token for account {}", account_id);
        Ok(())
    }

    /// Revoke every live refresh token of the account.
    pub async fn revoke_all_refresh_tokens(
        &self,
        db: &Database,
        account_id: i64,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE account_id = ? AND revoked = 0",
        )
        .bind(account_id)
        .execute(&db.pool)
        .await?;

        info!(
            "Revoked {} refresh tokens for account {}",
            result.rows_affected(),
            account_id
        );
        Ok(result.rows_affected())
    }
}

const CLEANUP_BATCH_SIZE: i64 = 1000;

/// Delete expired refresh tokens in batches; returns the total removed.
pub async fn flush_expired_tokens(db: &Database) -> AppResult<u64> {
    let now = Utc::now().timestamp();
    let mut total_deleted: u64 = 0;

    loop {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE id IN (
                SELECT id FROM refresh_tokens WHERE expires_at < ? LIMIT ?
            )",
        )
        .bind(now)
        .bind(CLEANUP_BATCH_SIZE)
        .execute(&db.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted == 0 {
            break;
        }

        total_deleted += deleted;
        info!("Deleted {} expired tokens in batch", deleted);

        if (deleted as i64) < CLEANUP_BATCH_SIZE {
            break;
        }
    }

    if total_deleted > 0 {
        info!("Total deleted {} expired tokens", total_deleted);
    }
    Ok(total_deleted)
}

/// Start the background worker that sweeps expired refresh tokens.
pub fn start_token_cleanup_worker(db: Arc<Database>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = flush_expired_tokens(&db).await {
                warn!("Token cleanup failed, retrying next interval: {}", e);
            }
        }
    });
}
