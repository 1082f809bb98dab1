//! Verified credential payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `aud` claim, which issuers send either as a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience value.
    Single(String),
    /// Multiple audience values.
    Many(Vec<String>),
}

impl Audience {
    /// Returns `true` if `value` is one of the audiences.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(aud) => aud == value,
            Self::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }

    /// Iterates over the audience values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(aud) => std::slice::from_ref(aud),
            Self::Many(auds) => auds,
        };
        values.iter().map(String::as_str)
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(aud) => write!(f, "{aud}"),
            Self::Many(auds) => write!(f, "{}", auds.join(",")),
        }
    }
}

/// Claims of a verified credential.
///
/// Only produced by [`CredentialVerifier::verify`](super::CredentialVerifier::verify)
/// or read back from an ephemeral token record. Fields the issuer sends that
/// are not modelled here land in `extra` and are stored unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject identity.
    pub sub: String,

    /// Audience the credential was issued for.
    pub aud: Audience,

    /// Token identifier, unique per issuance.
    pub jti: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Unrecognised claims, passed through opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClaimSet {
    /// Seconds of validity left at `now`; zero or negative once expired.
    #[must_use]
    pub fn remaining_lifetime(&self, now: i64) -> i64 {
        self.exp.saturating_sub(now)
    }

    /// Returns `true` if `scope` was granted.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Reads an integer claim from the pass-through bag.
    pub(crate) fn extra_i64(&self, name: &str) -> Option<i64> {
        self.extra.get(name).and_then(Value::as_i64)
    }
}
