// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// JWT Claims issued by the identity provider.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - stable user identifier.
    pub sub: String,
    /// Display name shown on leaderboards.
    #[serde(default)]
    pub name: Option<String>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The caller as seen by the session core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            display_name: claims
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| claims.sub.clone()),
        }
    }
}

/// Request extension set by [`optional_auth_middleware`].
#[derive(Debug, Clone, Default)]
pub struct MaybeIdentity(pub Option<Identity>);

/// Signs a token the way the identity provider does. Used by tooling and tests.
pub fn sign_jwt(
    user_id: &str,
    display_name: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_owned(),
        name: Some(display_name.to_owned()),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects `Identity`.
/// Missing or invalid tokens are rejected with 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&req).ok_or(StatusCode::UNAUTHORIZED)?;

    match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => {
            let identity = Identity::from(&claims);
            req.extensions_mut().insert(MaybeIdentity(Some(identity.clone())));
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: optional authentication.
///
/// Taking a test does not need a login, so anonymous requests pass through with
/// `MaybeIdentity(None)`. A token that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = match bearer_token(&req) {
        Some(token) => {
            let claims = verify_jwt(token, &config.jwt_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;
            Some(Identity::from(&claims))
        }
        None => None,
    };

    req.extensions_mut().insert(MaybeIdentity(identity));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_yields_identity() {
        let token = sign_jwt("user-1", "Asha", "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        let identity = Identity::from(&claims);
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.display_name, "Asha");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt("user-1", "Asha", "secret", 60).unwrap();
        assert!(matches!(verify_jwt(&token, "other"), Err(AppError::AuthError(_))));
    }

    #[test]
    fn blank_name_falls_back_to_user_id() {
        let claims = Claims {
            sub: "user-9".into(),
            name: Some("  ".into()),
            exp: 0,
        };
        assert_eq!(Identity::from(&claims).display_name, "user-9");
    }
}
