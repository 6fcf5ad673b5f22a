//! # Credential Verification
//!
//! The credential blob is a URL-encoded run of `key=value` pairs carrying a
//! hex HMAC-SHA256 under the `hash` key. Verification:
//!
//! 1. Percent-decode the pairs; pull `hash` out.
//! 2. Canonicalize the rest: sort by key, render `key=value`, join with
//!    `\n`. Input order must not matter.
//! 3. Derive the signing key: HMAC-SHA256 with the fixed protocol constant
//!    as key and the shared secret as message.
//! 4. HMAC-SHA256 the canonical string with the derived key and compare
//!    against the provided digest.
//! 5. Only then parse the embedded `user` JSON record.

use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Fixed protocol constant used to derive the signing key.
const KEY_DERIVATION_CONSTANT: &[u8] = b"WebAppData";

/// Length of a generated fallback display name.
const FALLBACK_NAME_LEN: usize = 10;

/// Charset for generated fallback display names.
const FALLBACK_NAME_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// The embedded user record, as signed by the identity provider.
#[derive(Clone, Debug, Deserialize)]
struct UserRecord {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    photo_url: Option<String>,
}

/// A successfully verified identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedUser {
    /// Stringified numeric id - the stable identity key.
    pub id: String,
    /// Username from the provider, if any.
    pub username: Option<String>,
    /// Given name from the provider, if any.
    pub first_name: Option<String>,
    /// Family name from the provider, if any.
    pub last_name: Option<String>,
    /// Avatar image URL, if any.
    pub photo_url: Option<String>,
}

impl VerifiedUser {
    /// The display name: the provider username, or a generated
    /// pseudo-random lowercase alphanumeric name when absent. Real names
    /// stay profile data only; they never become the display name.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(generate_fallback_name)
    }
}

/// Generates a 10-char lowercase alphanumeric name.
fn generate_fallback_name() -> String {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..FALLBACK_NAME_LEN)
        .map(|_| FALLBACK_NAME_CHARS[rng.gen_range(0..FALLBACK_NAME_CHARS.len())] as char)
        .collect()
}

/// Verifies a credential blob against the shared secret.
///
/// # Errors
///
/// - [`AuthError::MissingCredential`]: empty blob/secret or no `hash` pair.
/// - [`AuthError::MalformedPayload`]: undecodable pairs, a non-hex digest,
///   or a missing/unparsable `user` record.
/// - [`AuthError::InvalidSignature`]: the digest does not match.
pub fn verify(init_data: &str, secret: &str) -> AuthResult<VerifiedUser> {
    if init_data.is_empty() {
        return Err(AuthError::MissingCredential("credential blob"));
    }
    if secret.is_empty() {
        return Err(AuthError::MissingCredential("shared secret"));
    }

    let mut pairs = parse_pairs(init_data)?;

    let hash_index = pairs
        .iter()
        .position(|(key, _)| key == "hash")
        .ok_or(AuthError::MissingCredential("hash field"))?;
    let (_, provided_hex) = pairs.remove(hash_index);
    let provided = hex::decode(&provided_hex)
        .map_err(|_| AuthError::MalformedPayload("hash is not hex".to_string()))?;

    let canonical = canonical_string(&mut pairs);

    // HMAC key sizes are unrestricted; new_from_slice cannot fail.
    let mut derivation = HmacSha256::new_from_slice(KEY_DERIVATION_CONSTANT)
        .map_err(|_| AuthError::InvalidSignature)?;
    derivation.update(secret.as_bytes());
    let signing_key = derivation.finalize().into_bytes();

    let mut mac =
        HmacSha256::new_from_slice(&signing_key).map_err(|_| AuthError::InvalidSignature)?;
    mac.update(canonical.as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| AuthError::InvalidSignature)?;

    let user_json = pairs
        .iter()
        .find(|(key, _)| key == "user")
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| AuthError::MalformedPayload("no user field".to_string()))?;

    let record: UserRecord = serde_json::from_str(user_json)
        .map_err(|e| AuthError::MalformedPayload(format!("user record: {e}")))?;

    Ok(VerifiedUser {
        id: record.id.to_string(),
        username: record.username,
        first_name: record.first_name,
        last_name: record.last_name,
        photo_url: record.photo_url,
    })
}

/// Splits the blob into decoded `(key, value)` pairs, preserving input
/// order. A pair without `=` decodes to an empty value.
fn parse_pairs(init_data: &str) -> AuthResult<Vec<(String, String)>> {
    init_data
        .split('&')
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            let (key, value) = chunk.split_once('=').unwrap_or((chunk, ""));
            Ok((percent_decode(key)?, percent_decode(value)?))
        })
        .collect()
}

/// Builds the canonical signed string: pairs sorted lexicographically by
/// key, rendered `key=value`, joined with newlines.
fn canonical_string(pairs: &mut [(String, String)]) -> String {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = String::new();
    for (index, (key, value)) in pairs.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// Decodes `%XX` escapes and `+`-as-space.
fn percent_decode(input: &str) -> AuthResult<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16));
                let lo = bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 3;
                    }
                    _ => {
                        return Err(AuthError::MalformedPayload(
                            "truncated percent escape".to_string(),
                        ))
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8(out)
        .map_err(|_| AuthError::MalformedPayload("invalid utf-8 after decode".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "123456:TEST-BOT-SECRET";

    /// Percent-encodes a value the way the provider does.
    fn encode(value: &str) -> String {
        let mut out = String::new();
        for byte in value.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char);
                }
                _ => out.push_str(&format!("%{byte:02X}")),
            }
        }
        out
    }

    /// Signs `pairs` with the protocol's derivation scheme and renders the
    /// full blob in the given order, appending the hash.
    fn signed_blob(pairs: &[(&str, &str)], secret: &str) -> String {
        let mut sorted: Vec<_> = pairs.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let canonical = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut derivation = HmacSha256::new_from_slice(KEY_DERIVATION_CONSTANT).unwrap();
        derivation.update(secret.as_bytes());
        let key = derivation.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(canonical.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());

        let mut blob: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", encode(v)))
            .collect();
        blob.push(format!("hash={digest}"));
        blob.join("&")
    }

    const USER_JSON: &str =
        r#"{"id":7654321,"username":"wacker","first_name":"Molly","photo_url":"https://cdn.example/a.png"}"#;

    #[test]
    fn test_valid_blob_verifies() {
        let blob = signed_blob(
            &[("auth_date", "1712345678"), ("user", USER_JSON)],
            SECRET,
        );
        let user = verify(&blob, SECRET).unwrap();
        assert_eq!(user.id, "7654321");
        assert_eq!(user.username.as_deref(), Some("wacker"));
        assert_eq!(user.photo_url.as_deref(), Some("https://cdn.example/a.png"));
        assert_eq!(user.display_name(), "wacker");
    }

    #[test]
    fn test_pair_order_does_not_matter() {
        let forward = signed_blob(
            &[("auth_date", "1712345678"), ("user", USER_JSON)],
            SECRET,
        );
        let reversed = signed_blob(
            &[("user", USER_JSON), ("auth_date", "1712345678")],
            SECRET,
        );
        assert!(verify(&forward, SECRET).is_ok());
        assert!(verify(&reversed, SECRET).is_ok());
    }

    #[test]
    fn test_flipped_character_invalidates() {
        let blob = signed_blob(
            &[("auth_date", "1712345678"), ("user", USER_JSON)],
            SECRET,
        );
        // Flip one character of the signed auth_date field.
        let tampered = blob.replace("auth_date=1712345678", "auth_date=1712345679");
        assert_ne!(blob, tampered);
        assert_eq!(verify(&tampered, SECRET), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_wrong_secret_invalidates() {
        let blob = signed_blob(&[("user", USER_JSON)], SECRET);
        assert_eq!(
            verify(&blob, "another-secret"),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_hash_rejected() {
        let blob = format!("user={}", encode(USER_JSON));
        assert_eq!(
            verify(&blob, SECRET),
            Err(AuthError::MissingCredential("hash field"))
        );
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(matches!(
            verify("", SECRET),
            Err(AuthError::MissingCredential(_))
        ));
        assert!(matches!(
            verify("hash=00", ""),
            Err(AuthError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_non_hex_hash_rejected() {
        let blob = format!("user={}&hash=not-hex!", encode(USER_JSON));
        assert!(matches!(
            verify(&blob, SECRET),
            Err(AuthError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_missing_user_record_rejected() {
        let blob = signed_blob(&[("auth_date", "1712345678")], SECRET);
        assert!(matches!(
            verify(&blob, SECRET),
            Err(AuthError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_malformed_user_record_rejected() {
        let blob = signed_blob(&[("user", r#"{"username":"no-id"}"#)], SECRET);
        assert!(matches!(
            verify(&blob, SECRET),
            Err(AuthError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_real_names_never_become_display_name() {
        // Without a username the name is generated even when real names
        // are present; they are profile data, not display data.
        let user = VerifiedUser {
            id: "1".to_string(),
            username: None,
            first_name: Some("Molly".to_string()),
            last_name: Some("Digger".to_string()),
            photo_url: None,
        };
        let name = user.display_name();
        assert_ne!(name, "Molly Digger");
        assert_eq!(name.len(), FALLBACK_NAME_LEN);
    }

    #[test]
    fn test_fallback_display_name_shape() {
        let user = VerifiedUser {
            id: "1".to_string(),
            username: None,
            first_name: None,
            last_name: None,
            photo_url: None,
        };
        let name = user.display_name();
        assert_eq!(name.len(), FALLBACK_NAME_LEN);
        assert!(name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }
}
