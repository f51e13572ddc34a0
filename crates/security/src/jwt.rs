//! HS256 JSON Web Tokens.
//!
//! Only compact-serialized tokens signed with HMAC-SHA256 are accepted.
//! The caller's identity is the `sub` claim.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::{AuthError, Authenticator, Identity};

type HmacSha256 = Hmac<Sha256>;

/// Verifies (and issues) HS256 bearer tokens with a shared secret.
pub struct JwtAuthenticator {
    secret: Vec<u8>,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// The signing secret was empty or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("JWT secret must not be blank")]
pub struct BlankSecret;

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<f64>,
}

impl JwtAuthenticator {
    /// Fails on an empty or whitespace-only secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, BlankSecret> {
        let secret = secret.as_ref();
        if secret.iter().all(u8::is_ascii_whitespace) {
            return Err(BlankSecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Invalid(format!("bad signing key: {e}")))
    }

    /// Issue a token for `subject` that expires after `ttl`.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Invalid("token lifetime out of range".into()))?;
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
        let claims = serde_json::json!({
            "sub": subject,
            "iat": now.timestamp(),
            "exp": expires_at.timestamp(),
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token against the clock `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Invalid("malformed token".into()));
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(AuthError::Invalid(format!(
                "unsupported algorithm '{}'",
                header.alg
            )));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Invalid("signature is not base64url".into()))?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());

        // Constant-time comparison via `verify_slice`
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::Invalid("signature mismatch".into()))?;

        let claims: Claims = decode_segment(claims_b64)?;

        let user_id = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AuthError::Invalid("missing sub claim".into()))?;

        let expires_at = match claims.exp {
            Some(exp) => {
                let expires_at = DateTime::from_timestamp(exp as i64, 0)
                    .ok_or_else(|| AuthError::Invalid("exp out of range".into()))?;
                if expires_at <= now {
                    debug!(user_id = %user_id, "Rejected expired token");
                    return Err(AuthError::Expired);
                }
                Some(expires_at)
            }
            None => None,
        };

        Ok(Identity {
            user_id,
            expires_at,
        })
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_at(token, Utc::now())
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Invalid("segment is not base64url".into()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::Invalid(format!("bad segment: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "dev-secret-key-change-in-production";

    fn sign_raw(secret: &str, header: &serde_json::Value, claims: &serde_json::Value) -> String {
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(input.as_bytes());
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn issued_token_round_trips() {
        let auth = JwtAuthenticator::new(SECRET).unwrap();
        let token = auth.issue("test_user", Duration::hours(1)).unwrap();
        let identity = auth.authenticate(&token).unwrap();
        assert_eq!(identity.user_id, "test_user");
        assert!(identity.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtAuthenticator::new("other-secret").unwrap()
            .issue("test_user", Duration::hours(1))
            .unwrap();
        assert!(matches!(
            JwtAuthenticator::new(SECRET).unwrap().authenticate(&token),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = JwtAuthenticator::new(SECRET).unwrap();
        let token = auth.issue("test_user", Duration::hours(1)).unwrap();
        let later = Utc::now() + Duration::hours(2);
        assert_eq!(auth.verify_at(&token, later), Err(AuthError::Expired));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let auth = JwtAuthenticator::new(SECRET).unwrap();
        let token = auth.issue("test_user", Duration::hours(1)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(r#"{"sub":"admin","exp":9999999999}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(matches!(
            auth.authenticate(&forged),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn non_hs256_algorithms_are_rejected() {
        let token = sign_raw(
            SECRET,
            &serde_json::json!({"alg": "none", "typ": "JWT"}),
            &serde_json::json!({"sub": "test_user"}),
        );
        assert!(matches!(
            JwtAuthenticator::new(SECRET).unwrap().authenticate(&token),
            Err(AuthError::Invalid(reason)) if reason.contains("algorithm")
        ));
    }

    #[test]
    fn missing_sub_is_rejected() {
        let token = sign_raw(
            SECRET,
            &serde_json::json!({"alg": "HS256"}),
            &serde_json::json!({"exp": 9999999999i64}),
        );
        assert!(matches!(
            JwtAuthenticator::new(SECRET).unwrap().authenticate(&token),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn token_without_exp_is_accepted() {
        let token = sign_raw(
            SECRET,
            &serde_json::json!({"alg": "HS256", "typ": "JWT"}),
            &serde_json::json!({"sub": "test_user"}),
        );
        let identity = JwtAuthenticator::new(SECRET).unwrap().authenticate(&token).unwrap();
        assert_eq!(identity.user_id, "test_user");
        assert!(identity.expires_at.is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = JwtAuthenticator::new(SECRET).unwrap();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(auth.authenticate(token), Err(AuthError::Invalid(_))),
                "{token} should be invalid"
            );
        }
    }

    #[test]
    fn blank_secret_is_refused() {
        assert_eq!(JwtAuthenticator::new("").unwrap_err(), BlankSecret);
        assert_eq!(JwtAuthenticator::new("  \t").unwrap_err(), BlankSecret);
    }

    #[test]
    fn oversized_lifetime_is_an_error() {
        let auth = JwtAuthenticator::new(SECRET).unwrap();
        let err = auth.issue("test_user", Duration::MAX).unwrap_err();
        assert!(matches!(err, AuthError::Invalid(reason) if reason.contains("lifetime")));
    }

    #[test]
    fn debug_redacts_secret() {
        let debug = format!("{:?}", JwtAuthenticator::new(SECRET).unwrap());
        assert!(!debug.contains(SECRET));
    }
}
