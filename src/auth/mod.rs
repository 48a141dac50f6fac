//! Admin authentication: a single configured admin account, argon2 password
//! hash, short-lived HS256 bearer tokens.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::AppState;

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    pub sub: String, // admin email
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminToken {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: usize,
}

#[derive(Clone)]
pub struct AdminAuthService {
    jwt_secret: String,
    issuer: String,
    expiration_secs: usize,
    admin_email: Option<String>,
    admin_password_hash: Option<String>,
}

impl AdminAuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            issuer: config.auth_issuer.clone(),
            expiration_secs: config.jwt_expiration,
            admin_email: config.admin_email.clone(),
            admin_password_hash: config.admin_password_hash.clone(),
        }
    }

    /// Checks the configured credentials and issues a bearer token.
    pub fn login(&self, email: &str, password: &str) -> Result<AdminToken, ServiceError> {
        let (Some(admin_email), Some(hash)) = (&self.admin_email, &self.admin_password_hash) else {
            return Err(ServiceError::Unauthorized(
                "admin login is not configured".to_string(),
            ));
        };

        let email = email.trim();
        if !email.eq_ignore_ascii_case(admin_email) || !verify_password(password, hash) {
            warn!(email = %email, "Rejected admin login");
            return Err(ServiceError::Unauthorized("invalid credentials".to_string()));
        }

        info!(email = %admin_email, "Admin logged in");
        self.issue_token(admin_email)
    }

    pub fn issue_token(&self, email: &str) -> Result<AdminToken, ServiceError> {
        let now = Utc::now();
        let exp = now + ChronoDuration::seconds(self.expiration_secs as i64);
        let claims = AdminClaims {
            sub: email.to_string(),
            role: ADMIN_ROLE.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token creation failed: {}", e)))?;

        Ok(AdminToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.expiration_secs,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<AdminClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<AdminClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("token expired".to_string())
            }
            _ => ServiceError::Unauthorized("invalid token".to_string()),
        })?
        .claims;

        if claims.role != ADMIN_ROLE {
            return Err(ServiceError::Unauthorized("admin role required".to_string()));
        }
        Ok(claims)
    }
}

/// Produces the PHC string to put in `APP__ADMIN_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        warn!("Configured admin password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Authenticated admin, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

        let claims = state.services.auth.validate_token(token)?;
        Ok(AdminUser { email: claims.sub })
    }
}
