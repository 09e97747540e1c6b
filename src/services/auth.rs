use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::password;
use crate::AppState;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 64;
const PASSWORD_MIN: usize = 4;
const PASSWORD_MAX: usize = 128;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Create a signed JWT for a user id. Expiry is computed in UTC from the
    /// configured validity window.
    pub fn create_token(config: &Config, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::days(config.jwt.expire_days);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims. Bad signature,
    /// malformed token and expiry all map to an unauthenticated response.
    pub fn decode_token(config: &Config, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve a bearer token to its user. An unknown subject (e.g. a token
    /// issued against a rebuilt database) rejects like an invalid token.
    pub async fn get_user_from_token(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let claims = Self::decode_token(&state.config, token)?;
        let user = UserRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(user)
    }

    /// Register a new user and issue their first token.
    pub async fn register(
        state: &Arc<AppState>,
        username: &str,
        password: &str,
    ) -> AppResult<(User, String)> {
        validate_credentials(username, password)?;

        let hash = password::hash_password(password)?;
        let user = UserRepository::create(&state.db, username, &hash).await?;

        tracing::info!("Registered user {} ({})", user.username, user.id);

        let token = Self::create_token(&state.config, &user.id)?;
        Ok((user, token))
    }

    /// Verify credentials and issue a token. Unknown usernames and wrong
    /// passwords are indistinguishable to the caller. A successful login
    /// against a legacy-format hash lazily migrates it to the current format;
    /// migration failure is logged and never fails the login.
    pub async fn login(
        state: &Arc<AppState>,
        username: &str,
        password: &str,
    ) -> AppResult<(User, String)> {
        let user = UserRepository::find_by_username(&state.db, username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !password::verify_password(password, &user.password) {
            return Err(AppError::Unauthorized);
        }

        if password::needs_rehash(&user.password) {
            match password::hash_password(password) {
                Ok(new_hash) => {
                    if let Err(e) =
                        UserRepository::update_password(&state.db, &user.id, &new_hash).await
                    {
                        tracing::warn!(
                            "Failed to migrate legacy password hash for user {}: {:?}",
                            user.id,
                            e
                        );
                    } else {
                        tracing::info!("Migrated legacy password hash for user {}", user.id);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to rehash legacy password for user {}: {:?}",
                        user.id,
                        e
                    );
                }
            }
        }

        let token = Self::create_token(&state.config, &user.id)?;
        Ok((user, token))
    }
}

fn validate_credentials(username: &str, password: &str) -> AppResult<()> {
    let ulen = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&ulen) {
        return Err(AppError::Validation(format!(
            "Username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    let plen = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&plen) {
        return Err(AppError::Validation(format!(
            "Password must be {}-{} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::metadata::MetadataService;
    use crate::services::password::legacy_hash;

    async fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        let metadata = MetadataService::new(&config.metadata).unwrap();
        Arc::new(AppState {
            db: test_pool().await,
            config,
            metadata,
        })
    }

    #[test]
    fn token_round_trip() {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();

        let token = AuthService::create_token(&config, "user-1").unwrap();
        let claims = AuthService::decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn tampered_token_rejected() {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();

        let token = AuthService::create_token(&config, "user-1").unwrap();
        // Flip one character in the signature segment.
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(AuthService::decode_token(&config, &tampered).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();

        let now = Utc::now();
        let claims = Claims {
            sub: "user-1".to_string(),
            iat: (now - Duration::days(8)).timestamp() as usize,
            exp: (now - Duration::days(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )
        .unwrap();

        assert!(AuthService::decode_token(&config, &token).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        let token = AuthService::create_token(&config, "user-1").unwrap();

        config.jwt.secret = "other-secret".to_string();
        assert!(AuthService::decode_token(&config, &token).is_err());
    }

    #[tokio::test]
    async fn register_then_login_same_identity() {
        let state = test_state().await;

        let (user, token_a) = AuthService::register(&state, "alice", "pw1234").await.unwrap();
        let (_, token_b) = AuthService::login(&state, "alice", "pw1234").await.unwrap();

        let a = AuthService::decode_token(&state.config, &token_a).unwrap();
        let b = AuthService::decode_token(&state.config, &token_b).unwrap();
        assert_eq!(a.sub, user.id);
        assert_eq!(b.sub, user.id);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let state = test_state().await;

        AuthService::register(&state, "alice", "pw1234").await.unwrap();
        let err = AuthService::register(&state, "alice", "pw1234").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn bad_credentials_indistinguishable() {
        let state = test_state().await;
        AuthService::register(&state, "alice", "pw1234").await.unwrap();

        let unknown = AuthService::login(&state, "nobody", "pw1234").await.unwrap_err();
        let wrong = AuthService::login(&state, "alice", "nope1").await.unwrap_err();
        assert!(matches!(unknown, AppError::Unauthorized));
        assert!(matches!(wrong, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn validation_limits_enforced() {
        let state = test_state().await;

        let err = AuthService::register(&state, "ab", "pw1234").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = AuthService::register(&state, "alice", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn login_migrates_legacy_hash() {
        let state = test_state().await;

        let stored = legacy_hash("pw1234", "salty");
        let user = UserRepository::create(&state.db, "legacyuser", &stored).await.unwrap();
        assert!(password::needs_rehash(&user.password));

        AuthService::login(&state, "legacyuser", "pw1234").await.unwrap();

        let migrated = UserRepository::find_by_id(&state.db, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!password::needs_rehash(&migrated.password));
        assert!(password::verify_password("pw1234", &migrated.password));

        // Idempotent: a second login leaves the current-format hash in place.
        let before = migrated.password.clone();
        AuthService::login(&state, "legacyuser", "pw1234").await.unwrap();
        let after = UserRepository::find_by_id(&state.db, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before, after.password);
    }
}
