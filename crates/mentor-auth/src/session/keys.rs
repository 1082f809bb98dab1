//! Session store key layout.
//!
//! ```text
//! token:<jti>                   full claim set, expires with the credential
//! subject:<sub>:record          durable identity record
//! subject:<sub>:latest_token    last seen token identifier
//! subject:<sub>:session         free-form session data
//! ```

/// Key of the ephemeral token record.
#[must_use]
pub fn token_key(jti: &str) -> String {
    format!("token:{jti}")
}

/// Key of the durable identity record.
#[must_use]
pub fn identity_key(subject: &str) -> String {
    format!("subject:{subject}:record")
}

/// Key of the latest-token-identifier pointer.
#[must_use]
pub fn latest_token_key(subject: &str) -> String {
    format!("subject:{subject}:latest_token")
}

/// Key of the session data record.
#[must_use]
pub fn session_key(subject: &str) -> String {
    format!("subject:{subject}:session")
}
