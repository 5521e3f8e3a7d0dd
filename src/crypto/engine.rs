use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const MAC_LEN: usize = 32;
const STATE_NONCE_LEN: usize = 16;
/// Random nonce followed by the big-endian issue time.
const STATE_PAYLOAD_LEN: usize = STATE_NONCE_LEN + 8;

/// Seals secret-store values with AES-256-GCM and signs OAuth `state`
/// parameters with HMAC-SHA256.
///
/// A sealed value is bound to the store key it was written under; moved to
/// another key it no longer opens.
pub struct CryptoEngine {
    cipher: Aes256Gcm,
    signer: HmacSha256,
}

fn decode_key(var: &str, key_b64: &str) -> Result<Vec<u8>, AuthError> {
    STANDARD
        .decode(key_b64.trim())
        .map_err(|e| AuthError::CryptoError(format!("Invalid {var} base64: {e}")))
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

impl CryptoEngine {
    /// Build the engine from the base64 `MASTER_KEY` (32 bytes) and
    /// `HMAC_SECRET` (non-empty).
    pub fn new(master_key_b64: &str, hmac_secret_b64: &str) -> Result<Self, AuthError> {
        let master_key = decode_key("MASTER_KEY", master_key_b64)?;
        let cipher = Aes256Gcm::new_from_slice(&master_key).map_err(|_| {
            AuthError::CryptoError(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            ))
        })?;

        let hmac_key = decode_key("HMAC_SECRET", hmac_secret_b64)?;
        if hmac_key.is_empty() {
            return Err(AuthError::CryptoError("HMAC_SECRET must not be empty".into()));
        }
        let signer = <HmacSha256 as Mac>::new_from_slice(&hmac_key)
            .map_err(|e| AuthError::CryptoError(format!("HMAC init failed: {e}")))?;

        Ok(Self { cipher, signer })
    }

    /// Seal `value` for storage under `key`. Returns base64(nonce || ciphertext).
    pub fn seal(&self, key: &str, value: &str) -> Result<String, AuthError> {
        let nonce = random_bytes::<NONCE_LEN>();
        let payload = Payload {
            msg: value.as_bytes(),
            aad: key.as_bytes(),
        };
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| AuthError::CryptoError(format!("failed to seal value for {key}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Open a value sealed under `key`.
    pub fn open(&self, key: &str, sealed: &str) -> Result<String, AuthError> {
        let bytes = STANDARD.decode(sealed).map_err(|e| {
            AuthError::CryptoError(format!("sealed value for {key} is not base64: {e}"))
        })?;
        if bytes.len() < NONCE_LEN {
            return Err(AuthError::CryptoError(format!(
                "sealed value for {key} is truncated"
            )));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let payload = Payload {
            msg: ciphertext,
            aad: key.as_bytes(),
        };
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| {
                AuthError::CryptoError(format!("sealed value for {key} failed authentication"))
            })?;

        String::from_utf8(plaintext).map_err(|e| {
            AuthError::CryptoError(format!("sealed value for {key} is not UTF-8: {e}"))
        })
    }

    /// Issue a signed OAuth `state` for an authorize redirect:
    /// base64url(mac || nonce || issued_at).
    pub fn issue_state(&self, issued_at: i64) -> String {
        let mut payload = Vec::with_capacity(STATE_PAYLOAD_LEN);
        payload.extend_from_slice(&random_bytes::<STATE_NONCE_LEN>());
        payload.extend_from_slice(&issued_at.to_be_bytes());

        let mut mac = self.signer.clone();
        mac.update(&payload);

        let mut signed = mac.finalize().into_bytes().to_vec();
        signed.extend_from_slice(&payload);
        URL_SAFE_NO_PAD.encode(signed)
    }

    /// Accept a state from [`CryptoEngine::issue_state`] that is at most
    /// `max_age_secs` old at `now`.
    pub fn verify_state(
        &self,
        signed: &str,
        now: i64,
        max_age_secs: i64,
    ) -> Result<(), AuthError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| AuthError::InvalidState)?;
        if bytes.len() != MAC_LEN + STATE_PAYLOAD_LEN {
            return Err(AuthError::InvalidState);
        }

        let (tag, payload) = bytes.split_at(MAC_LEN);
        let mut mac = self.signer.clone();
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| AuthError::InvalidState)?;

        let issued_at = payload[STATE_NONCE_LEN..]
            .try_into()
            .map(i64::from_be_bytes)
            .map_err(|_| AuthError::InvalidState)?;
        let age = now.checked_sub(issued_at).ok_or(AuthError::InvalidState)?;
        if !(0..=max_age_secs).contains(&age) {
            return Err(AuthError::InvalidState);
        }
        Ok(())
    }
}
