//! Credential claims and verification.

mod claims;
mod verifier;

pub use claims::{Audience, ClaimSet};
pub use verifier::{CredentialVerifier, SigningAlgorithm};
