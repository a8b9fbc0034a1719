//! Scope-based authorization.

use error::AuthError;

use crate::verifier::VerifiedClaims;

/// Read access to the protected API.
pub const API_READ: &str = "api:read";
/// Write access to the protected API.
pub const API_WRITE: &str = "api:write";

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    allowed: bool,
    required_scope: String,
    reason: String,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn required_scope(&self) -> &str {
        &self.required_scope
    }

    /// Why the decision came out the way it did. Internal detail only.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// `Ok` when allowed, `InsufficientScope` otherwise.
    pub fn into_result(self) -> Result<(), AuthError> {
        if self.allowed {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope(self.required_scope))
        }
    }
}

/// Allow iff `required_scope` is one of the granted scopes.
///
/// Exact string match: `api` does not grant `api:read`, and there are no
/// wildcards.
pub fn authorize(claims: &VerifiedClaims, required_scope: &str) -> Decision {
    let allowed = claims.has_scope(required_scope);
    let reason = if allowed {
        format!("scope {} granted to {}", required_scope, claims.sub)
    } else {
        format!("scope {} not granted to {}", required_scope, claims.sub)
    };

    tracing::debug!(sub = %claims.sub, scope = required_scope, allowed, "Authorization decision");
    Decision {
        allowed,
        required_scope: required_scope.to_string(),
        reason,
    }
}
