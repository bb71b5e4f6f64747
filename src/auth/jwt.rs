use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Type of JWT issued by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub exp: usize,      // expires at (unix timestamp)
    pub iat: usize,      // issued at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
}

/// Verification key with the expected issuer and audience.
#[derive(Clone)]
pub struct JwtKeys {
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

/// Authenticated user id taken from a bearer access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Access token required".to_string(),
            ));
        }

        Ok(AuthUser(claims.sub))
    }
}

/// Token as the identity provider would issue it, valid for `ttl_secs`
/// (negative for an already expired one).
#[cfg(test)]
pub(crate) fn mint_token(cfg: &JwtConfig, user_id: Uuid, kind: TokenKind, ttl_secs: i64) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + ttl_secs).max(0) as usize,
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        kind,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    fn access(cfg: &JwtConfig, user_id: Uuid) -> String {
        mint_token(cfg, user_id, TokenKind::Access, 300)
    }

    #[test]
    fn verify_accepts_provider_token() {
        let cfg = config("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let claims = JwtKeys::from(&cfg)
            .verify(&access(&cfg, user_id))
            .expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = config("same-secret", "good-iss", "good-aud");
        let bad = config("same-secret", "bad-iss", "bad-aud");
        let token = access(&good, Uuid::new_v4());
        assert!(JwtKeys::from(&bad).verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_other_secret() {
        let cfg = config("secret-a", "iss", "aud");
        let other = config("secret-b", "iss", "aud");
        let token = access(&cfg, Uuid::new_v4());
        assert!(JwtKeys::from(&other).verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let cfg = config("dev-secret", "iss", "aud");
        let token = mint_token(&cfg, Uuid::new_v4(), TokenKind::Access, -3600);
        assert!(JwtKeys::from(&cfg).verify(&token).is_err());
    }

    #[tokio::test]
    async fn extractor_requires_access_token() {
        let cfg = config("dev-secret", "iss", "aud");
        let keys = JwtKeys::from(&cfg);
        let user_id = Uuid::new_v4();

        let extract = |token: String| {
            let keys = keys.clone();
            async move {
                let req = axum::http::Request::builder()
                    .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(())
                    .unwrap();
                let (mut parts, _) = req.into_parts();
                AuthUser::from_request_parts(&mut parts, &keys).await
            }
        };

        let AuthUser(id) = extract(access(&cfg, user_id))
            .await
            .expect("access token accepted");
        assert_eq!(id, user_id);

        let (status, _) = extract(mint_token(&cfg, user_id, TokenKind::Refresh, 300))
            .await
            .err()
            .expect("refresh token rejected");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn extractor_rejects_missing_header() {
        let keys = JwtKeys::from(&config("dev-secret", "iss", "aud"));
        let (mut parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();
        let (status, msg) = AuthUser::from_request_parts(&mut parts, &keys)
            .await
            .err()
            .expect("missing header rejected");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(msg.contains("Missing"));
    }
}
