use chrono::{DateTime, Utc};
use thiserror::Error;

use shipit_core::OwnerId;

use crate::{AccessClaims, GrantFlow, Scope, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid token: {0}")]
    Token(#[from] TokenValidationError),

    #[error("forbidden: missing scope '{0}'")]
    MissingScope(String),

    #[error("forbidden: token subject {subject} may not act for owner {owner_id}")]
    SubjectMismatch { subject: OwnerId, owner_id: OwnerId },
}

/// Require read access to `owner_id`'s data.
pub fn check_read_access(
    claims: &AccessClaims,
    owner_id: OwnerId,
    now: DateTime<Utc>,
) -> Result<(), AuthzError> {
    check_access(claims, owner_id, &Scope::READ, now)
}

/// Require write access to `owner_id`'s data.
pub fn check_write_access(
    claims: &AccessClaims,
    owner_id: OwnerId,
    now: DateTime<Utc>,
) -> Result<(), AuthzError> {
    check_access(claims, owner_id, &Scope::WRITE, now)
}

/// Pure policy check; denials are logged, never panicked on.
///
/// Users may only touch their own data. Client-credentials tokens carry no
/// user and may act for any owner.
fn check_access(
    claims: &AccessClaims,
    owner_id: OwnerId,
    required: &Scope,
    now: DateTime<Utc>,
) -> Result<(), AuthzError> {
    if let Err(e) = validate_claims(claims, now) {
        tracing::warn!(%owner_id, error = %e, "authorization denied: invalid token");
        return Err(e.into());
    }

    if !claims.has_scope(required) {
        tracing::warn!(%owner_id, scope = %required, "authorization denied: missing scope");
        return Err(AuthzError::MissingScope(required.as_str().to_string()));
    }

    if claims.flow != GrantFlow::ClientCredentials && claims.sub != owner_id {
        tracing::warn!(
            %owner_id,
            subject = %claims.sub,
            "authorization denied: subject does not match owner"
        );
        return Err(AuthzError::SubjectMismatch {
            subject: claims.sub,
            owner_id,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_for(sub: OwnerId, scopes: Vec<Scope>, flow: GrantFlow) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            sub,
            scopes,
            flow,
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn owner_with_write_scope_may_write() {
        let owner = OwnerId::new();
        let claims = claims_for(owner, vec![Scope::WRITE], GrantFlow::AuthorizationCode);
        assert_eq!(check_write_access(&claims, owner, Utc::now()), Ok(()));
    }

    #[test]
    fn read_scope_does_not_grant_write() {
        let owner = OwnerId::new();
        let claims = claims_for(owner, vec![Scope::READ], GrantFlow::AuthorizationCode);
        assert_eq!(check_read_access(&claims, owner, Utc::now()), Ok(()));
        assert_eq!(
            check_write_access(&claims, owner, Utc::now()),
            Err(AuthzError::MissingScope("shipit:write".to_string()))
        );
    }

    #[test]
    fn user_cannot_act_for_another_owner() {
        let me = OwnerId::new();
        let other = OwnerId::new();
        let claims = claims_for(me, vec![Scope::WRITE], GrantFlow::AuthorizationCode);
        assert_eq!(
            check_write_access(&claims, other, Utc::now()),
            Err(AuthzError::SubjectMismatch {
                subject: me,
                owner_id: other
            })
        );
    }

    #[test]
    fn client_credentials_may_act_for_any_owner() {
        let service = OwnerId::new();
        let claims = claims_for(service, vec![Scope::WRITE], GrantFlow::ClientCredentials);
        assert_eq!(check_write_access(&claims, OwnerId::new(), Utc::now()), Ok(()));
    }

    #[test]
    fn expired_token_is_rejected_before_scope_check() {
        let owner = OwnerId::new();
        let claims = claims_for(owner, vec![], GrantFlow::AuthorizationCode);
        let later = Utc::now() + Duration::hours(2);
        assert_eq!(
            check_write_access(&claims, owner, later),
            Err(AuthzError::Token(TokenValidationError::Expired))
        );
    }
}
