//! Single-use signing tokens and the personalised links that carry them

use std::fmt;

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Opaque token embedded in one recipient address's signing link
///
/// Only the SHA-256 digest is ever stored; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningToken(String);

impl SigningToken {
    /// Draw a fresh token from the operating system CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digest(&self) -> String {
        digest_token(&self.0)
    }
}

impl fmt::Debug for SigningToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningToken(..)")
    }
}

/// Hex SHA-256 of a presented token
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Compare a presented token against a stored digest
pub fn verify_token(token: &str, digest: &str) -> bool {
    let presented = Sha256::digest(token.as_bytes());
    match hex::decode(digest) {
        Ok(stored) => presented.as_slice().ct_eq(&stored).into(),
        Err(_) => false,
    }
}

/// Build `{base}?request=..&recipient=..&token=..`
pub fn signing_url(base: &str, request_id: &str, recipient_id: &str, token: &SigningToken) -> String {
    format!(
        "{}?request={}&recipient={}&token={}",
        base.trim_end_matches('?'),
        urlencoding::encode(request_id),
        urlencoding::encode(recipient_id),
        urlencoding::encode(token.as_str()),
    )
}
