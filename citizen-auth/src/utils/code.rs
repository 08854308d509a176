//! Canonical form, display form and hashes of human-entered codes.
//!
//! Activation codes and tourist codes are typed by people, so the same code
//! arrives as `ab12-cd34`, `AB12 CD34` or `AB12–CD34`. Everything is compared
//! in canonical form: uppercase `[A-Z0-9]` with no separators.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Length of a canonical tourist code (6 random bytes, hex encoded).
pub const TOURIST_CODE_LEN: usize = 12;

const GROUP_LEN: usize = 4;

fn is_dash(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{00AD}'
            | '\u{2010}'..='\u{2015}'
            | '\u{2212}'
            | '\u{FE58}'
            | '\u{FE63}'
            | '\u{FF0D}'
    )
}

/// Canonicalise user input. Total: anything that is not a code character
/// is dropped, so empty or garbage input yields an empty string.
pub fn normalize(input: &str) -> String {
    input
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| if is_dash(c) { '-' } else { c })
        .filter(|c| !c.is_whitespace() && *c != '-')
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Display form: groups of four joined by `-` (`AB12CD34` -> `AB12-CD34`).
pub fn format(canonical: &str) -> String {
    let chars: Vec<char> = canonical.chars().collect();
    chars
        .chunks(GROUP_LEN)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// `true` when `canonical` has the shape of a tourist code.
pub fn is_canonical_tourist_code(canonical: &str) -> bool {
    canonical.len() == TOURIST_CODE_LEN && canonical.chars().all(|c| c.is_ascii_alphanumeric())
}

/// SHA-256 over `"{tenant}:{canonical}"`, hex encoded.
pub fn hash_tenant_code(tenant_id: &str, canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 keyed by `secret` over `"{tenant}:{canonical}"`, hex encoded.
pub fn hmac_tenant_code(
    secret: &[u8],
    tenant_id: &str,
    canonical: &str,
) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(tenant_id.as_bytes());
    mac.update(b":");
    mac.update(canonical.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `len` random bytes as uppercase hex.
pub fn random_hex_code(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}
