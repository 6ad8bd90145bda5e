use std::sync::Arc;
use crate::domain::{
    models::{auth::{Claims, RefreshTokenRecord}, user::User},
    ports::AuthRepository
};
use crate::error::AppError;
use crate::config::Config;
use jsonwebtoken::{encode, EncodingKey, Header, Algorithm};
use uuid::Uuid;
use chrono::{DateTime, Utc, Duration};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Sha256, Digest};
use tracing::{error, warn};

pub const TOKEN_AUDIENCE: &str = "eventdesk-frontend";

const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Credentials handed to the cookie layer after login or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
}

fn random_token(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// Refresh tokens are stored only as their sha256 hex digest.
pub fn hash_refresh_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

pub struct AuthService {
    repo: Arc<dyn AuthRepository>,
    config: Config,
    encoding_key: EncodingKey,
}

impl AuthService {
    pub fn new(repo: Arc<dyn AuthRepository>, config: Config) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_ed_pem(config.jwt_secret_key.as_bytes())
            .map_err(|e| AppError::InternalWithMsg(format!("Invalid JWT private key PEM: {}", e)))?;

        Ok(Self { repo, config, encoding_key })
    }

    /// Starts a new refresh family.
    pub async fn login(&self, user: &User) -> Result<TokenPair, AppError> {
        let (pair, record) = self.mint(user, Uuid::new_v4(), 1, Utc::now())?;
        self.repo.create_refresh_token(&record).await?;
        Ok(pair)
    }

    /// Looks up the stored record for a raw refresh token, dropping it when expired.
    pub async fn validate_refresh(&self, raw_refresh_token: &str) -> Result<RefreshTokenRecord, AppError> {
        let token_hash = hash_refresh_token(raw_refresh_token);

        let record = self.repo.find_refresh_token(&token_hash).await?
            .ok_or(AppError::Unauthorized)?;

        if record.expires_at < Utc::now() {
            self.repo.revoke_refresh_token(&token_hash).await?;
            return Err(AppError::Unauthorized);
        }

        Ok(record)
    }

    /// Exchanges a refresh token for the next generation of its family. A
    /// token presented twice, or for the wrong user, revokes the whole family.
    pub async fn refresh(&self, raw_refresh_token: &str, user: &User) -> Result<TokenPair, AppError> {
        let record = self.validate_refresh(raw_refresh_token).await?;

        if record.user_id != user.id {
            warn!("Refresh token presented for another user, revoking family {}", record.family_id);
            self.repo.revoke_refresh_family(record.family_id).await?;
            return Err(AppError::Unauthorized);
        }

        let (pair, next) = self.mint(user, record.family_id, record.generation_id + 1, Utc::now())?;
        if !self.repo.rotate_refresh_token(&record.token_hash, &next).await? {
            let revoked = self.repo.revoke_refresh_family(record.family_id).await?;
            warn!(
                "Refresh token reused for family {} (generation {}), revoked {} live tokens",
                record.family_id, record.generation_id, revoked
            );
            return Err(AppError::Unauthorized);
        }

        Ok(pair)
    }

    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), AppError> {
        self.repo.revoke_refresh_token(&hash_refresh_token(raw_refresh_token)).await
    }

    /// Signs an access token and generates the refresh record to go with it.
    /// Nothing is persisted here.
    fn mint(&self, user: &User, family_id: Uuid, generation_id: i32, now: DateTime<Utc>) -> Result<(TokenPair, RefreshTokenRecord), AppError> {
        let csrf_token = random_token(32);

        let claims = Claims {
            iss: self.config.auth_issuer.clone(),
            sub: user.id.clone(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp: (now + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES)).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            event_role: user.event_role,
            support_role: user.support_role,
            csrf_token: csrf_token.clone(),
        };

        let access_token = encode(&Header::new(Algorithm::EdDSA), &claims, &self.encoding_key)
            .map_err(|e| {
                error!("JWT encoding failed: {}", e);
                AppError::Internal
            })?;

        let refresh_token = random_token(64);
        let record = RefreshTokenRecord {
            token_hash: hash_refresh_token(&refresh_token),
            user_id: user.id.clone(),
            family_id,
            generation_id,
            expires_at: now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
            created_at: now,
        };

        Ok((TokenPair { access_token, refresh_token, csrf_token }, record))
    }
}
