//! Rotating, time-boxed authentication tokens
//!
//! A token has the shape `<days-b36>-<digest-hex>-<nonce>`:
//!
//! - `days-b36`: days since [`TOKEN_EPOCH`](super::clock::TOKEN_EPOCH), lowercase base 36
//! - `digest-hex`: HMAC-SHA256 keyed with the server secret over the
//!   username, the password hash and the day count
//! - `nonce`: 64 characters of `[A-Z0-9]`, also kept in the nonce store
//!
//! Only the nonce currently stored for a user validates, so minting a token
//! silently retires every earlier one. Folding the password hash into the
//! digest retires tokens when the password changes, without any
//! "last login" bookkeeping on the user record.

use std::sync::Arc;
use std::time::Duration;

use gluten_shared::User;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::clock::{Clock, SystemClock};
use super::nonce_store::{NonceKey, NonceStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TIMEOUT_DAYS: u32 = 7;
pub const NONCE_LENGTH: usize = 64;
const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DIGEST_HEX_LENGTH: usize = 64;
const SECONDS_PER_DAY: u64 = 86_400;
// 36^12 stays below i64::MAX
const MAX_TIMESTAMP_LENGTH: usize = 12;

/// Token engine errors. Validation never returns these; it fails closed.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("HMAC initialization failed")]
    HmacInitFailed,
    #[error("Clock is set before the token epoch")]
    ClockBeforeEpoch,
    #[error("Nonce store error: {0}")]
    Store(#[from] StoreError),
}

/// Mints, checks and invalidates per-user tokens
#[derive(Clone)]
pub struct TokenEngine {
    secret: Vec<u8>,
    timeout_days: u32,
    store: Arc<dyn NonceStore>,
    clock: Arc<dyn Clock>,
}

impl TokenEngine {
    /// Create an engine using the system clock
    pub fn new(secret: &str, timeout_days: u32, store: Arc<dyn NonceStore>) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            timeout_days,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock (tests pin "today" with a `FixedClock`)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timeout_days(&self) -> u32 {
        self.timeout_days
    }

    /// Lifetime of a stored nonce
    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_days) * SECONDS_PER_DAY)
    }

    /// Issue a fresh token for `user`, rotating out all earlier ones
    pub async fn make_token(&self, user: &User) -> Result<String, TokenError> {
        let timestamp = u64::try_from(self.clock.days_since_epoch())
            .map_err(|_| TokenError::ClockBeforeEpoch)?;
        let digest = self.digest(user, timestamp)?;
        let nonce = generate_nonce();

        // Last writer wins when two mints race for the same user
        self.store
            .set(&NonceKey::for_user(&user.username), &nonce, self.nonce_ttl())
            .await
            .map_err(|e| {
                tracing::error!(
                    username = %user.username,
                    error = %e,
                    "Failed to store token nonce"
                );
                e
            })?;

        tracing::info!(username = %user.username, timestamp, "Auth token issued");

        Ok(format!("{}-{}-{}", encode_base36(timestamp), digest, nonce))
    }

    /// Whether `token` currently authenticates `user`.
    ///
    /// Every malformed, tampered, expired or rotated token yields `false`,
    /// without telling the caller which check failed.
    pub async fn check_token(&self, user: &User, token: &str) -> bool {
        let Some(parsed) = ParsedToken::parse(token) else {
            tracing::debug!(username = %user.username, "Rejected malformed token");
            return false;
        };

        let expected = match self.digest(user, parsed.timestamp) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::error!(error = %e, "Failed to compute token digest");
                return false;
            }
        };
        if !constant_time_compare(parsed.digest, &expected) {
            tracing::debug!(username = %user.username, "Rejected token with bad digest");
            return false;
        }

        let age = self.clock.days_since_epoch() - parsed.timestamp as i64;
        if age > i64::from(self.timeout_days) {
            tracing::debug!(username = %user.username, age, "Rejected expired token");
            return false;
        }

        let current = match self.store.get(&NonceKey::for_user(&user.username)).await {
            Ok(nonce) => nonce.unwrap_or_default(),
            Err(e) => {
                tracing::error!(username = %user.username, error = %e, "Nonce store lookup failed");
                return false;
            }
        };
        if !constant_time_compare(parsed.nonce, &current) {
            tracing::debug!(username = %user.username, "Rejected rotated or revoked token");
            return false;
        }

        true
    }

    /// Retire every token issued to `user`. Idempotent.
    pub async fn invalidate_token(&self, user: &User) -> Result<(), TokenError> {
        self.store
            .delete(&NonceKey::for_user(&user.username))
            .await
            .map_err(|e| {
                tracing::error!(
                    username = %user.username,
                    error = %e,
                    "Failed to delete token nonce"
                );
                e
            })?;

        tracing::info!(username = %user.username, "Auth tokens invalidated");
        Ok(())
    }

    fn digest(&self, user: &User, timestamp: u64) -> Result<String, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::HmacInitFailed)?;

        let timestamp = timestamp.to_string();

        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        for field in [
            user.username.as_bytes(),
            user.password_hash.as_bytes(),
            timestamp.as_bytes(),
        ] {
            mac.update(&(field.len() as u64).to_be_bytes());
            mac.update(field);
        }

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Structurally valid token, not yet verified
#[derive(Debug, PartialEq, Eq)]
struct ParsedToken<'a> {
    timestamp: u64,
    digest: &'a str,
    nonce: &'a str,
}

impl<'a> ParsedToken<'a> {
    fn parse(token: &'a str) -> Option<Self> {
        let mut parts = token.split('-');
        let (Some(ts_b36), Some(digest), Some(nonce), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        let timestamp = decode_base36(ts_b36)?;

        if digest.len() != DIGEST_HEX_LENGTH
            || !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return None;
        }

        // An empty nonce would otherwise match a user with nothing stored
        if nonce.len() != NONCE_LENGTH || !nonce.bytes().all(|b| NONCE_ALPHABET.contains(&b)) {
            return None;
        }

        Some(Self {
            timestamp,
            digest,
            nonce,
        })
    }
}

fn generate_nonce() -> String {
    let mut rng = rand::rngs::OsRng;
    (0..NONCE_LENGTH)
        .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

fn encode_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Parse a canonical (lowercase, no leading zeros) base-36 day count
fn decode_base36(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > MAX_TIMESTAMP_LENGTH {
        return None;
    }
    let value = u64::from_str_radix(s, 36).ok()?;
    (encode_base36(value) == s).then_some(value)
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        // Do a dummy comparison to avoid length-based timing attacks
        let dummy = vec![0u8; a.len()];
        let _ = a.as_bytes().ct_eq(&dummy);
        return false;
    }

    a.as_bytes().ct_eq(b.as_bytes()).into()
}
