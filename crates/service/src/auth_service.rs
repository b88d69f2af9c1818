//! Registration, login and token handling (argon2 + HS256 JWT).

use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, PasswordHash};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use models::{user, user_credentials};

use crate::access::{AuthContext, Role};
use crate::errors::ServiceError;

pub const PASSWORD_ALGORITHM: &str = "argon2";

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: user::Model,
    pub token: String,
}

/// Token settings, taken from `configs::AuthConfig` at startup.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub uid: String,
    pub role: String,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Validation(format!("hashing error: {e}")))?
        .to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Register a new user. Role is always `user`; admins are provisioned out
/// of band.
#[instrument(skip(db, input), fields(email = %input.email))]
pub async fn register(db: &DatabaseConnection, input: RegisterInput) -> Result<user::Model, ServiceError> {
    user::validate_email(&input.email)?;
    user::validate_name(&input.name)?;
    if input.password.len() < 8 {
        return Err(ServiceError::Validation("password too short (>=8)".into()));
    }
    if user::find_by_email(db, &input.email).await?.is_some() {
        return Err(ServiceError::Validation("user already exists".into()));
    }

    let created = user::create(db, &input.email, &input.name, user::ROLE_USER).await?;
    let hash = hash_password(&input.password)?;
    user_credentials::upsert_password(db, created.id, hash, PASSWORD_ALGORITHM).await?;
    info!(user_id = %created.id, email = %created.email, "user_registered");
    Ok(created)
}

/// Authenticate a user and issue a signed token.
#[instrument(skip(db, settings, input), fields(email = %input.email))]
pub async fn login(
    db: &DatabaseConnection,
    settings: &AuthSettings,
    input: LoginInput,
) -> Result<Session, ServiceError> {
    let user = user::find_by_email(db, &input.email)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("invalid credentials".into()))?;
    let creds = user_credentials::find_by_user(db, user.id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("invalid credentials".into()))?;
    if !verify_password(&creds.password_hash, &input.password) {
        return Err(ServiceError::Unauthorized("invalid credentials".into()));
    }

    let token = issue_token(settings, &user)?;
    info!(user_id = %user.id, "user_logged_in");
    Ok(Session { user, token })
}

pub fn issue_token(settings: &AuthSettings, user: &user::Model) -> Result<String, ServiceError> {
    let exp = (chrono::Utc::now() + chrono::Duration::hours(settings.token_ttl_hours)).timestamp() as usize;
    let claims = Claims { sub: user.email.clone(), uid: user.id.to_string(), role: user.role.clone(), exp };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.jwt_secret.as_bytes()))
        .map_err(|e| ServiceError::Token(e.to_string()))
}

/// Verify a token and rebuild the request principal from its claims.
pub fn decode_token(secret: &str, token: &str) -> Result<AuthContext, ServiceError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &key, &validation)
        .map_err(|e| ServiceError::Token(e.to_string()))?;
    let user_id = Uuid::parse_str(&data.claims.uid)
        .map_err(|e| ServiceError::Token(format!("bad uid claim: {e}")))?;
    let role = Role::parse(&data.claims.role)
        .map_err(|_| ServiceError::Token(format!("bad role claim: {}", data.claims.role)))?;
    Ok(AuthContext { user_id, role, email: data.claims.sub })
}
