use std::sync::{PoisonError, RwLock};

use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::debug;
use uuid::Uuid;

use super::jwt::{Claims, TokenKind};

/// Supplies the identity the sync core acts for.
pub trait AuthProvider: Send + Sync {
    /// Signed-in user, or `None` when there is no usable session.
    fn current_user_id(&self) -> Option<Uuid>;

    /// Bearer token to present to the server.
    fn bearer_token(&self) -> Option<String>;
}

/// Client-side session holding the access token issued by the server.
///
/// The token is only decoded here to learn its subject and expiry; the server
/// verifies signatures on every request.
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<String>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn sign_in(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn sign_out(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn valid_claims(&self) -> Option<(String, Claims)> {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_aud = false;

        match decode::<Claims>(&token, &DecodingKey::from_secret(&[]), &validation) {
            Ok(data) if data.claims.kind == TokenKind::Access => Some((token, data.claims)),
            Ok(_) => {
                debug!("session holds a non-access token");
                None
            }
            Err(e) => {
                debug!(error = %e, "session token unusable");
                None
            }
        }
    }
}

impl AuthProvider for Session {
    fn current_user_id(&self) -> Option<Uuid> {
        self.valid_claims().map(|(_, claims)| claims.sub)
    }

    fn bearer_token(&self) -> Option<String> {
        self.valid_claims().map(|(token, _)| token)
    }
}

/// Fixed identity, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user_id: Option<Uuid>,
    token: Option<String>,
}

impl StaticAuth {
    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            token: Some(format!("static-{user_id}")),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuth {
    fn current_user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}
