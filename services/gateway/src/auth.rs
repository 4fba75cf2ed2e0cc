use std::collections::BTreeSet;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use types::ids::Symbol;

use crate::error::GatewayError;

/// Authority granting every symbol.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Authority granting every symbol to non-admin feed consumers.
pub const AUTHORITY_ALL_SYMBOLS: &str = "market-data:all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Symbols the subject may subscribe to.
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Identity bound to a connection after CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub authorities: BTreeSet<String>,
    pub symbols: BTreeSet<Symbol>,
}

impl Principal {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            authorities: claims.roles.into_iter().collect(),
            symbols: claims.symbols.iter().filter_map(Symbol::try_new).collect(),
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// Turns a bearer token into claims.
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode(&self, token: &str) -> Result<Claims, GatewayError>;
}

/// HS256 JWT decoder.
pub struct JwtTokenDecoder {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtTokenDecoder {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign `claims` with the same secret.
    pub fn issue(&self, claims: &Claims) -> Result<String, GatewayError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| GatewayError::Configuration(format!("Failed to sign token: {}", e)))
    }
}

#[async_trait]
impl TokenDecoder for JwtTokenDecoder {
    async fn decode(&self, token: &str) -> Result<Claims, GatewayError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| GatewayError::Authentication(format!("Invalid token: {}", e)))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, GatewayError> {
    let header = header
        .ok_or_else(|| GatewayError::Authentication("Missing Authorization header".to_string()))?;

    let (scheme, token) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(GatewayError::Authentication(
            "Authorization scheme must be Bearer".to_string(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(GatewayError::Authentication("Empty bearer token".to_string()));
    }
    Ok(token)
}

/// Per-symbol subscription check.
pub trait SymbolAuthorizer: Send + Sync {
    fn is_symbol_authorized(&self, principal: &Principal, symbol: &Symbol) -> bool;
}

/// Grants admins and `market-data:all` holders everything, everyone else
/// the symbols listed in their claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsSymbolAuthorizer;

impl SymbolAuthorizer for ClaimsSymbolAuthorizer {
    fn is_symbol_authorized(&self, principal: &Principal, symbol: &Symbol) -> bool {
        principal.has_authority(ROLE_ADMIN)
            || principal.has_authority(AUTHORITY_ALL_SYMBOLS)
            || principal.symbols.contains(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, roles: &[&str], symbols: &[&str], exp_offset: i64) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as u64,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(Some("bearer  xyz ")).unwrap(), "xyz");

        for bad in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer "), Some("Bearer"), Some("")] {
            assert!(
                matches!(bearer_token(bad), Err(GatewayError::Authentication(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_jwt_roundtrip() {
        let decoder = JwtTokenDecoder::new(b"test-secret");
        let original = claims("alice", &["ROLE_TRADER"], &["aapl"], 3_600);
        let token = decoder.issue(&original).unwrap();

        let decoded = decoder.decode(&token).await.unwrap();
        assert_eq!(decoded, original);

        let principal = Principal::from_claims(decoded);
        assert_eq!(principal.subject, "alice");
        assert!(principal.symbols.contains(&Symbol::new("AAPL")));
    }

    #[tokio::test]
    async fn test_jwt_rejects_wrong_secret_and_expiry() {
        let issuer = JwtTokenDecoder::new(b"issuer-secret");
        let verifier = JwtTokenDecoder::new(b"other-secret");
        let token = issuer.issue(&claims("bob", &[], &[], 3_600)).unwrap();
        assert!(matches!(
            verifier.decode(&token).await,
            Err(GatewayError::Authentication(_))
        ));

        let expired = issuer.issue(&claims("bob", &[], &[], -3_600)).unwrap();
        assert!(issuer.decode(&expired).await.is_err());
        assert!(issuer.decode("not-a-jwt").await.is_err());
    }

    #[test]
    fn test_symbol_authorization_rules() {
        let authorizer = ClaimsSymbolAuthorizer;
        let aapl = Symbol::new("AAPL");
        let msft = Symbol::new("MSFT");

        let listed = Principal::from_claims(claims("u1", &[], &["AAPL"], 60));
        assert!(authorizer.is_symbol_authorized(&listed, &aapl));
        assert!(!authorizer.is_symbol_authorized(&listed, &msft));

        let admin = Principal::from_claims(claims("u2", &[ROLE_ADMIN], &[], 60));
        assert!(authorizer.is_symbol_authorized(&admin, &msft));

        let all = Principal::from_claims(claims("u3", &[AUTHORITY_ALL_SYMBOLS], &[], 60));
        assert!(authorizer.is_symbol_authorized(&all, &msft));

        let nobody = Principal::from_claims(claims("u4", &["ROLE_TRADER"], &[], 60));
        assert!(!authorizer.is_symbol_authorized(&nobody, &aapl));
    }
}
