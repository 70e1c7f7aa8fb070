use crate::domain::{
    AccessClaims, AuthError, AuthService, AuthSession, LoginInput, RegisterInput, TokenPair,
};
use crate::domain_model::UserId;
use crate::domain_port::{NewUser, RefreshTokenRecord, RefreshTokenRepo, TxManager, UserRepo};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const ACCESS_TTL_MINS: i64 = 15;
pub const REFRESH_TTL_DAYS: i64 = 7;

// region credential hashing

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AuthError::Internal(format!("invalid PHC hash: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Internal(format!("verify error: {e}"))),
        }
    }
}

// endregion

// region access-token codec

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String, // user id
    name: String,
    iat: i64,
    exp: i64,
}

/// HS256 codec for the short-lived self-describing access token.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl JwtCodec {
    pub fn new(secret: &[u8]) -> Self {
        JwtCodec {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(ACCESS_TTL_MINS),
        }
    }

    #[cfg(test)]
    fn with_ttl(secret: &[u8], access_ttl: Duration) -> Self {
        JwtCodec {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
        }
    }

    pub fn issue(&self, user_id: UserId, username: &str) -> Result<String, AuthError> {
        let iat = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            name: username.to_owned(),
            iat: iat.timestamp(),
            exp: (iat + self.access_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Signature, expiry, and subject failures all collapse into
    /// `InvalidToken`; callers never learn which check tripped.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;
        let user_id = data
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(AccessClaims {
            user_id,
            username: data.claims.name,
        })
    }
}

// endregion

// region refresh tokens

fn new_refresh_token() -> String {
    // 32 chars over the 64-symbol default alphabet: ~190 bits of entropy.
    nanoid!(32)
}

pub fn refresh_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// endregion

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    refresh_repo: Arc<dyn RefreshTokenRepo>,
    hasher: Arc<dyn CredentialHasher>,
    codec: JwtCodec,
    tx_manager: Arc<dyn TxManager>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        refresh_repo: Arc<dyn RefreshTokenRepo>,
        hasher: Arc<dyn CredentialHasher>,
        codec: JwtCodec,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            refresh_repo,
            hasher,
            codec,
            tx_manager,
        }
    }

    fn validate_register(input: &RegisterInput) -> Result<(), AuthError> {
        let name_ok = (3..=30).contains(&input.username.len())
            && input
                .username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !name_ok {
            return Err(AuthError::Validation(
                "Username must be 3-30 characters of letters, digits, or underscore".into(),
            ));
        }
        if !input.email.contains('@') || input.email.len() > 255 {
            return Err(AuthError::Validation("Invalid email address".into()));
        }
        let display_len = input.display_name.chars().count();
        if display_len == 0 || display_len > 50 {
            return Err(AuthError::Validation(
                "Display name must be 1-50 characters".into(),
            ));
        }
        if input.password.len() < 8 {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }

    fn new_refresh_record(user_id: UserId, token: &str, now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token_hash: refresh_token_digest(token),
            user_id,
            expires_at: now + Duration::days(REFRESH_TTL_DAYS),
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthError> {
        Self::validate_register(&input)?;

        if self.user_repo.username_exists(&input.username).await? {
            return Err(AuthError::Validation("Username already taken".into()));
        }
        if self.user_repo.email_exists(&input.email).await? {
            return Err(AuthError::Validation("Email already registered".into()));
        }

        let user_id = UserId::new();
        let password_hash = self.hasher.hash_password(&input.password).await?;
        let new_user = NewUser {
            user_id,
            username: input.username.clone(),
            email: input.email.clone(),
            password_hash,
            display_name: input.display_name.clone(),
        };

        let access_token = self.codec.issue(user_id, &input.username)?;
        let refresh_token = new_refresh_token();
        let now = Utc::now();

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        self.user_repo.create_in_tx(&mut *tx, &new_user).await?;
        self.refresh_repo
            .insert_in_tx(&mut *tx, &Self::new_refresh_record(user_id, &refresh_token, now))
            .await?;
        tx.commit()
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthSession {
            user: user.own_profile(),
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        // Unknown email and wrong password deliberately share one message.
        let user = self
            .user_repo
            .get_by_email(&input.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .hasher
            .verify_password(&input.password, &user.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.codec.issue(user.user_id, &user.username)?;
        let refresh_token = new_refresh_token();
        self.refresh_repo
            .insert(&Self::new_refresh_record(
                user.user_id,
                &refresh_token,
                Utc::now(),
            ))
            .await?;

        Ok(AuthSession {
            user: user.own_profile(),
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let digest = refresh_token_digest(refresh_token);

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let row = match self.refresh_repo.find_in_tx(&mut *tx, &digest).await? {
            Some(row) => row,
            None => return Err(AuthError::InvalidRefresh),
        };

        if row.expires_at <= Utc::now() {
            // Expiry discovered on use: the dead row goes away in this step.
            self.refresh_repo.delete_in_tx(&mut *tx, &digest).await?;
            tx.commit()
                .await
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            return Err(AuthError::InvalidRefresh);
        }

        let user = self
            .user_repo
            .get_by_id(row.user_id)
            .await?
            .ok_or(AuthError::InvalidRefresh)?;

        let access_token = self.codec.issue(user.user_id, &user.username)?;
        let new_token = new_refresh_token();

        // Rotation: consume and replace in one transaction.
        self.refresh_repo.delete_in_tx(&mut *tx, &digest).await?;
        self.refresh_repo
            .insert_in_tx(
                &mut *tx,
                &Self::new_refresh_record(user.user_id, &new_token, Utc::now()),
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token: new_token,
        })
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        // Revoking an unknown token is a no-op.
        self.refresh_repo
            .delete(&refresh_token_digest(refresh_token))
            .await?;
        Ok(())
    }

    async fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.codec.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip_preserves_identity() {
        let codec = JwtCodec::new(b"test-secret");
        let user_id = UserId::new();
        let token = codec.issue(user_id, "alice").unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let codec = JwtCodec::with_ttl(b"test-secret", Duration::minutes(-5));
        let token = codec.issue(UserId::new(), "alice").unwrap();
        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::InvalidToken)
        ));

        let signer = JwtCodec::new(b"other-secret");
        let foreign = signer.issue(UserId::new(), "mallory").unwrap();
        let codec = JwtCodec::new(b"test-secret");
        assert!(matches!(
            codec.verify(&foreign),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            codec.verify("not-a-jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn refresh_tokens_are_long_and_digested() {
        let a = new_refresh_token();
        let b = new_refresh_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        // SHA-256 hex digest: stable, 64 chars, token not recoverable.
        let d = refresh_token_digest(&a);
        assert_eq!(d.len(), 64);
        assert_eq!(d, refresh_token_digest(&a));
        assert_ne!(d, refresh_token_digest(&b));
    }

    #[test]
    fn register_validation_rules() {
        let base = RegisterInput {
            username: "alice_01".into(),
            email: "alice@example.com".into(),
            password: "correct-horse".into(),
            display_name: "Alice".into(),
        };
        assert!(RealAuthService::validate_register(&base).is_ok());

        let mut bad = base.clone();
        bad.username = "ab".into();
        assert!(RealAuthService::validate_register(&bad).is_err());

        let mut bad = base.clone();
        bad.username = "has space".into();
        assert!(RealAuthService::validate_register(&bad).is_err());

        let mut bad = base.clone();
        bad.email = "nope".into();
        assert!(RealAuthService::validate_register(&bad).is_err());

        let mut bad = base.clone();
        bad.display_name = String::new();
        assert!(RealAuthService::validate_register(&bad).is_err());

        let mut bad = base;
        bad.password = "short".into();
        assert!(RealAuthService::validate_register(&bad).is_err());
    }
}
