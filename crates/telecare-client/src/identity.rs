//! Session identity, injected rather than read from ambient storage.
//!
//! The chat core never touches cookies itself; hosts hand it an
//! [`IdentityProvider`]. `None` means "no session" — the host redirects
//! to login, which is outside this crate.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use telecare_shared::model::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Doctor,
}

impl Role {
    /// The wire side this role publishes as.
    pub fn side(self) -> Side {
        match self {
            Role::User => Side::User,
            Role::Doctor => Side::Doctor,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionIdentity {
    pub account_id: i64,
    pub role: Role,
}

pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<SessionIdentity>;
}

/// A fixed identity, for hosts that resolve the session up front and for
/// tests.
pub struct StaticIdentity(pub SessionIdentity);

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<SessionIdentity> {
        Some(self.0)
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    data: ClaimData,
}

#[derive(Debug, Deserialize)]
struct ClaimData {
    account_id: i64,
    role: String,
}

/// Decode `{account_id, role}` from the access-token cookie value (a JWT;
/// only the payload segment is read, signature verification is the
/// backend's job). Anything unparseable is "no session".
pub fn identity_from_token(token: &str) -> Option<SessionIdentity> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;

    let role = match claims.data.role.as_str() {
        "user" => Role::User,
        "doctor" => Role::Doctor,
        _ => return None,
    };

    Some(SessionIdentity {
        account_id: claims.data.account_id,
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.c2ln",
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decodes_doctor_identity() {
        let token = token_with_payload(r#"{"exp":1,"data":{"account_id":42,"role":"doctor"}}"#);
        let identity = identity_from_token(&token).unwrap();
        assert_eq!(identity.account_id, 42);
        assert_eq!(identity.role, Role::Doctor);
        assert_eq!(identity.role.side().as_u8(), 2);
    }

    #[test]
    fn test_garbage_token_is_no_session() {
        assert!(identity_from_token("not-a-jwt").is_none());
        let unknown_role =
            token_with_payload(r#"{"data":{"account_id":1,"role":"admin"}}"#);
        assert!(identity_from_token(&unknown_role).is_none());
    }
}
