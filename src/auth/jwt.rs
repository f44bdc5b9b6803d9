use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::utils::error::AppError;

/// Discriminates the two token lifetimes. A refresh token can only be spent
/// on the refresh endpoint and an access token only on API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id the token was issued to.
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub kind: TokenKind,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues a fresh access/refresh pair for a user.
pub fn issue_pair(config: &JwtConfig, user_id: i64) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access: issue(config, user_id, TokenKind::Access)?,
        refresh: issue(config, user_id, TokenKind::Refresh)?,
    })
}

/// Trades a valid refresh token for a new access token.
pub fn refresh_access(config: &JwtConfig, refresh_token: &str) -> Result<String, AppError> {
    let claims = validate(config, refresh_token, TokenKind::Refresh)?;
    issue(config, claims.sub, TokenKind::Access)
}

fn issue(config: &JwtConfig, user_id: i64, kind: TokenKind) -> Result<String, AppError> {
    let ttl = match kind {
        TokenKind::Access => config.access_ttl_secs,
        TokenKind::Refresh => config.refresh_ttl_secs,
    };

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + ttl,
        jti: Uuid::new_v4(),
        kind,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("failed to sign token: {}", e)))
}

/// Decodes a token, checking signature, expiry and kind.
pub fn validate(config: &JwtConfig, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::AuthError(format!("invalid token: {}", e)))?;

    if data.claims.kind != expected {
        return Err(AppError::AuthError("wrong token kind".into()));
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "unit-test-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 3600,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = test_config();
        let pair = issue_pair(&config, 42).unwrap();

        let claims = validate(&config, &pair.access, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_yields_new_access_token() {
        let config = test_config();
        let pair = issue_pair(&config, 7).unwrap();

        let access = refresh_access(&config, &pair.refresh).unwrap();
        let claims = validate(&config, &access, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, 7);
    }

    #[test]
    fn test_access_token_rejected_on_refresh_endpoint() {
        let config = test_config();
        let pair = issue_pair(&config, 7).unwrap();

        assert!(matches!(
            refresh_access(&config, &pair.access),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = JwtConfig {
            access_ttl_secs: -60,
            ..test_config()
        };
        let token = issue(&config, 1, TokenKind::Access).unwrap();

        assert!(matches!(
            validate(&test_config(), &token, TokenKind::Access),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let config = test_config();
        let other = JwtConfig {
            secret: "a-different-secret".to_string(),
            ..test_config()
        };
        let token = issue(&other, 1, TokenKind::Access).unwrap();

        assert!(matches!(
            validate(&config, &token, TokenKind::Access),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            validate(&test_config(), "not.a.jwt", TokenKind::Access),
            Err(AppError::AuthError(_))
        ));
    }
}
