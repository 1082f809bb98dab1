//! Credential verification.
//!
//! Checks the signature of an externally issued token against a single
//! configured public key, then applies the audience and time-window rules.
//! Time is read from an injected [`Clock`] rather than by `jsonwebtoken`, so
//! the window can be tested without sleeping.
//!
//! # Time window
//!
//! A credential is accepted when `iat - skew <= now` and `now < exp`. The
//! skew only relaxes the lower bound: a credential at or past `exp` always
//! has a non-positive remaining lifetime and is reported as expired.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::AuthResult;
use crate::clock::{Clock, SystemClock};
use crate::config::VerifierConfig;
use crate::error::AuthError;
use crate::token::ClaimSet;

/// Supported credential signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-256 and SHA-256.
    ES256,
    /// ECDSA with P-384 and SHA-384.
    ES384,
}

impl SigningAlgorithm {
    /// Parses an algorithm name as used in JWT headers.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "RS256" => Some(Self::RS256),
            "RS384" => Some(Self::RS384),
            "ES256" => Some(Self::ES256),
            "ES384" => Some(Self::ES384),
            _ => None,
        }
    }

    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES256 => Algorithm::ES256,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verifies signed credentials and yields their claims.
///
/// Verification is synchronous and performs no I/O.
#[derive(Clone)]
pub struct CredentialVerifier {
    decoding_key: DecodingKey,
    algorithm: SigningAlgorithm,
    expected_audience: String,
    clock_skew: i64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("algorithm", &self.algorithm)
            .field("expected_audience", &self.expected_audience)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

/// Just enough of the payload to tell whether a rejected credential had
/// already expired.
#[derive(Deserialize)]
struct ExpiryOnly {
    exp: Option<i64>,
}

impl CredentialVerifier {
    /// Creates a verifier for credentials signed with `public_key_pem`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the key cannot be parsed for the
    /// algorithm or the audience is empty.
    pub fn new(
        public_key_pem: &str,
        algorithm: SigningAlgorithm,
        expected_audience: impl Into<String>,
        clock_skew: Duration,
    ) -> AuthResult<Self> {
        let decoding_key = if algorithm.is_rsa() {
            DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        } else {
            DecodingKey::from_ec_pem(public_key_pem.as_bytes())
        }
        .map_err(|e| {
            AuthError::configuration(format!("invalid {algorithm} public key: {e}"))
        })?;

        let expected_audience = expected_audience.into();
        if expected_audience.trim().is_empty() {
            return Err(AuthError::configuration("expected audience cannot be empty"));
        }

        Ok(Self {
            decoding_key,
            algorithm,
            expected_audience,
            clock_skew: i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX),
            clock: Arc::new(SystemClock),
        })
    }

    /// Creates a verifier from configuration, reading the key file if needed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the algorithm is unknown or the
    /// key is missing, unreadable or unparsable.
    pub fn from_config(config: &VerifierConfig) -> AuthResult<Self> {
        let algorithm = SigningAlgorithm::parse(&config.algorithm).ok_or_else(|| {
            AuthError::configuration(format!(
                "unsupported verifier algorithm '{}'",
                config.algorithm
            ))
        })?;
        let pem = config.public_key()?;

        Self::new(
            &pem,
            algorithm,
            config.expected_audience.clone(),
            config.clock_skew,
        )
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The clock this verifier compares against.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    /// Verifies `raw` and returns its claims.
    ///
    /// # Errors
    ///
    /// - `AuthError::CredentialExpired` if `exp` is not in the future
    /// - `AuthError::CredentialInvalid` for a bad signature, malformed token,
    ///   audience mismatch, missing claim, or a credential not yet valid
    pub fn verify(&self, raw: &str) -> AuthResult<ClaimSet> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::credential_invalid("empty credential"));
        }

        let claims = decode::<ClaimSet>(raw, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|err| self.map_decode_error(raw, err))?;

        self.check_window(&claims)?;

        if claims.sub.is_empty() {
            return Err(AuthError::credential_invalid("empty 'sub' claim"));
        }
        if claims.jti.is_empty() {
            return Err(AuthError::credential_invalid("empty 'jti' claim"));
        }

        tracing::debug!(sub = %claims.sub, jti = %claims.jti, "credential verified");
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        // Time claims are checked against the injected clock in check_window.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_audience(&[&self.expected_audience]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation
    }

    fn check_window(&self, claims: &ClaimSet) -> AuthResult<()> {
        let now = self.clock.now_unix();

        if claims.exp <= now {
            return Err(AuthError::CredentialExpired);
        }

        if claims.iat.saturating_sub(self.clock_skew) > now {
            return Err(AuthError::credential_invalid("credential issued in the future"));
        }

        if let Some(nbf) = claims.extra_i64("nbf")
            && nbf.saturating_sub(self.clock_skew) > now
        {
            return Err(AuthError::credential_invalid("credential not yet valid"));
        }

        Ok(())
    }

    fn map_decode_error(&self, raw: &str, err: jsonwebtoken::errors::Error) -> AuthError {
        if is_signature_failure(err.kind()) && self.unverified_expired(raw) {
            return AuthError::CredentialExpired;
        }

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::credential_invalid("signature mismatch"),
            ErrorKind::InvalidAudience => AuthError::credential_invalid("audience mismatch"),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::credential_invalid(format!("missing required claim '{claim}'"))
            }
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::credential_invalid(format!(
                    "credential not signed with {}",
                    self.algorithm
                ))
            }
            ErrorKind::Json(e) => AuthError::credential_invalid(format!("malformed claims: {e}")),
            _ => AuthError::credential_invalid(err.to_string()),
        }
    }

    /// Reads `exp` without trusting the signature.
    fn unverified_expired(&self, raw: &str) -> bool {
        jsonwebtoken::dangerous::insecure_decode::<ExpiryOnly>(raw)
            .ok()
            .and_then(|data| data.claims.exp)
            .is_some_and(|exp| exp <= self.clock.now_unix())
    }
}

/// Failures that leave the signature untrusted.
fn is_signature_failure(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
    )
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use p384::SecretKey;
    use p384::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rand::rngs::OsRng;
    use serde_json::{Value, json};

    use super::*;
    use crate::clock::ManualClock;

    const NOW: i64 = 1_700_000_000;

    struct Issuer {
        encoding_key: EncodingKey,
        public_pem: String,
    }

    impl Issuer {
        fn es384() -> Self {
            let secret = SecretKey::random(&mut OsRng);
            let private_pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
            let public_pem = secret
                .public_key()
                .to_public_key_pem(LineEnding::LF)
                .unwrap();
            Self {
                encoding_key: EncodingKey::from_ec_pem(private_pem.as_bytes()).unwrap(),
                public_pem,
            }
        }

        fn sign(&self, claims: &Value) -> String {
            encode(&Header::new(Algorithm::ES384), claims, &self.encoding_key).unwrap()
        }
    }

    fn claims(exp_in: i64) -> Value {
        json!({
            "sub": "42",
            "aud": "1",
            "jti": "tok-A",
            "iat": NOW,
            "exp": NOW + exp_in,
            "scopes": ["profile:read", "resume:write"]
        })
    }

    fn verifier(issuer: &Issuer, clock: Arc<ManualClock>) -> CredentialVerifier {
        CredentialVerifier::new(
            &issuer.public_pem,
            SigningAlgorithm::ES384,
            "1",
            Duration::from_secs(10),
        )
        .unwrap()
        .with_clock(clock)
    }

    #[test]
    fn test_valid_credential_yields_exact_claims() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let claims = verifier.verify(&issuer.sign(&claims(60))).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.jti, "tok-A");
        assert!(claims.aud.contains("1"));
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + 60);
        assert_eq!(claims.scopes, vec!["profile:read", "resume:write"]);
    }

    #[test]
    fn test_expired_credential() {
        let issuer = Issuer::es384();
        let clock = Arc::new(ManualClock::new(NOW));
        let verifier = verifier(&issuer, clock.clone());
        let token = issuer.sign(&claims(60));

        clock.advance(60);
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::CredentialExpired)
        ));

        // Skew does not extend exp.
        clock.set(NOW + 65);
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::CredentialExpired)
        ));
    }

    #[test]
    fn test_wrong_audience_is_invalid() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let mut payload = claims(60);
        payload["aud"] = json!("other-app");
        let err = verifier.verify(&issuer.sign(&payload)).unwrap_err();
        assert!(matches!(err, AuthError::CredentialInvalid { .. }));
        assert!(err.to_string().contains("audience"));

        payload["aud"] = json!(["other-app", "1"]);
        assert!(verifier.verify(&issuer.sign(&payload)).is_ok());
    }

    #[test]
    fn test_missing_claims_are_invalid() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        for claim in ["exp", "aud", "iat", "sub", "jti"] {
            let mut payload = claims(60);
            payload.as_object_mut().unwrap().remove(claim);
            let err = verifier.verify(&issuer.sign(&payload)).unwrap_err();
            assert!(
                matches!(err, AuthError::CredentialInvalid { .. }),
                "missing {claim} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_iat_skew_tolerance() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let mut payload = claims(60);
        payload["iat"] = json!(NOW + 10);
        assert!(verifier.verify(&issuer.sign(&payload)).is_ok());

        payload["iat"] = json!(NOW + 11);
        let err = verifier.verify(&issuer.sign(&payload)).unwrap_err();
        assert!(matches!(err, AuthError::CredentialInvalid { .. }));
    }

    #[test]
    fn test_nbf_in_future_is_invalid() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let mut payload = claims(60);
        payload["nbf"] = json!(NOW + 30);
        let err = verifier.verify(&issuer.sign(&payload)).unwrap_err();
        assert!(err.to_string().contains("not yet valid"));
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let issuer = Issuer::es384();
        let impostor = Issuer::es384();
        let clock = Arc::new(ManualClock::new(NOW));
        let verifier = verifier(&issuer, clock.clone());

        let err = verifier.verify(&impostor.sign(&claims(60))).unwrap_err();
        assert!(matches!(err, AuthError::CredentialInvalid { .. }));

        // Bad signature on an already lapsed credential reports expiry.
        let token = impostor.sign(&claims(60));
        clock.advance(120);
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::CredentialExpired)
        ));
    }

    #[test]
    fn test_malformed_credential_is_invalid() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        for raw in ["", "   ", "abc", "a.b.c"] {
            let err = verifier.verify(raw).unwrap_err();
            assert!(matches!(err, AuthError::CredentialInvalid { .. }));
        }
    }

    #[test]
    fn test_algorithm_mismatch_is_invalid() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims(60),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::CredentialInvalid { .. }));
    }

    #[test]
    fn test_lapsed_credential_with_foreign_algorithm_is_expired() {
        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let mut payload = claims(60);
        payload["iat"] = json!(NOW - 1_000);
        payload["exp"] = json!(NOW - 900);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::CredentialExpired)
        ));
    }

    #[test]
    fn test_lapsed_credential_from_other_key_family_is_expired() {
        use rsa::RsaPrivateKey;
        use rsa::pkcs8::EncodePrivateKey as _;

        let issuer = Issuer::es384();
        let verifier = verifier(&issuer, Arc::new(ManualClock::new(NOW)));

        let rsa_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let rsa_pem = rsa_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let mut payload = claims(60);
        payload["exp"] = json!(NOW);
        let token = encode(
            &Header::new(Algorithm::RS256),
            &payload,
            &EncodingKey::from_rsa_pem(rsa_pem.as_bytes()).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::CredentialExpired)
        ));
    }

    #[test]
    fn test_rs256_credential() {
        use rsa::RsaPrivateKey;
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let verifier = CredentialVerifier::new(
            &public_pem,
            SigningAlgorithm::RS256,
            "1",
            Duration::from_secs(10),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(NOW)));

        let token = encode(
            &Header::new(Algorithm::RS256),
            &claims(120),
            &EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap(),
        )
        .unwrap();
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.exp, NOW + 120);
    }

    #[test]
    fn test_invalid_key_is_configuration_error() {
        let err = CredentialVerifier::new(
            "not a key",
            SigningAlgorithm::RS256,
            "1",
            Duration::from_secs(10),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = CredentialVerifier::from_config(&VerifierConfig::default()).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(SigningAlgorithm::parse("rs256"), Some(SigningAlgorithm::RS256));
        assert_eq!(SigningAlgorithm::parse("ES384"), Some(SigningAlgorithm::ES384));
        assert_eq!(SigningAlgorithm::parse("HS256"), None);
        assert_eq!(SigningAlgorithm::ES256.to_string(), "ES256");
    }
}
