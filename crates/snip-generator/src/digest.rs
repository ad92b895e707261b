use crate::Generator;
use sha2::{Digest, Sha256};
use snip_core::base62;
use snip_core::ShortCode;

/// Content-addressed generator.
///
/// Hashes the content with SHA-256, keeps the low 64 bits of the digest read
/// as a big-endian integer and renders them in reversed base62. Codes are at
/// most 11 characters long. A zero value would render as an empty code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestGenerator;

impl DigestGenerator {
    pub fn new() -> Self {
        Self
    }

    /// The integer a code is rendered from.
    pub fn fingerprint(content: &str) -> u64 {
        let digest = Sha256::digest(content.as_bytes());
        let mut low = [0_u8; 8];
        low.copy_from_slice(&digest[digest.len() - 8..]);
        u64::from_be_bytes(low)
    }
}

impl Generator for DigestGenerator {
    fn generate(&self, content: &str) -> ShortCode {
        ShortCode::new_unchecked(base62::encode_reversed(Self::fingerprint(content)))
    }
}
