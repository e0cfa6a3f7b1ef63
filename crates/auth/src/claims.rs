use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shipit_core::OwnerId;

use crate::Scope;

/// How the token was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantFlow {
    /// Interactive user login; the subject is the acting owner.
    AuthorizationCode,
    /// Machine-to-machine; may act on any owner's data.
    ClientCredentials,
}

/// Access claims model (transport-agnostic).
///
/// This is the minimal set of claims the placement engine expects once a
/// token has been decoded and verified by the surrounding security layer. It
/// is passed explicitly into every guarded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the owner the token was issued to.
    pub sub: OwnerId,

    /// Granted scopes.
    pub scopes: Vec<Scope>,

    pub flow: GrantFlow,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl AccessClaims {
    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claims' time window.
///
/// Signature verification / decoding is intentionally outside this crate.
pub fn validate_claims(
    claims: &AccessClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
