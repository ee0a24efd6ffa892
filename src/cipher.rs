//! Authenticated payload encryption under a single-use symmetric key.

use crate::{Error, Result, NONCE_LENGTH, SYMMETRIC_KEY_LENGTH, TAG_LENGTH};
use aes_gcm::{aead::Aead, Aes256Gcm, Key, KeyInit, Nonce};
use rand::{rngs::OsRng, RngCore};
use std::fmt::{self, Debug, Formatter};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A single-use data encryption key.
///
/// Generated fresh for every envelope, it exists only for the duration of one
/// encrypt or decrypt call and is zeroized on drop. It leaves the process
/// only in wrapped form.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
#[repr(transparent)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LENGTH]);

impl Debug for SymmetricKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "SymmetricKey {{ ... }}")
    }
}

impl SymmetricKey {
    /// Generate a fresh key from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LENGTH] {
        &self.0
    }
}

/// Encrypt a payload with AES-256-GCM under the given key.
///
/// A fresh random nonce is drawn per call and prepended to the ciphertext so
/// decryption is self-describing.
pub fn encrypt<B: AsRef<[u8]>>(plaintext: B, key: &SymmetricKey) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Nonce::clone_from_slice(&nonce_bytes);
    let mut ciphertext = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|_| Error::EncryptionFailure)?;
    let mut result = Vec::with_capacity(nonce.len() + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);
    Ok(result)
}

/// Decrypt a payload produced by [`encrypt`].
///
/// Fails with [`Error::AuthenticationFailure`] if the ciphertext was tampered
/// with or the key is wrong; unauthenticated plaintext is never returned.
pub fn decrypt<B: AsRef<[u8]>>(ciphertext: B, key: &SymmetricKey) -> Result<Vec<u8>> {
    let ct = ciphertext.as_ref();
    if ct.len() < NONCE_LENGTH + TAG_LENGTH {
        return Err(Error::AuthenticationFailure);
    }
    let (nonce, ct) = ct.split_at(NONCE_LENGTH);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Nonce::clone_from_slice(nonce);
    cipher
        .decrypt(&nonce, ct)
        .map_err(|_| Error::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = SymmetricKey::generate();
        let plaintext = b"ledger payload";
        let ciphertext = encrypt(plaintext.as_ref(), &key).unwrap();
        assert_eq!(decrypt(&ciphertext, &key).unwrap(), plaintext);
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let key = SymmetricKey::generate();
        let ciphertext = encrypt([], &key).unwrap();
        assert_eq!(ciphertext.len(), NONCE_LENGTH + TAG_LENGTH);
        assert!(decrypt(&ciphertext, &key).unwrap().is_empty());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = SymmetricKey::generate();
        let ciphertext = encrypt(b"ledger payload".as_ref(), &key).unwrap();
        let other = SymmetricKey::generate();
        assert!(matches!(
            decrypt(&ciphertext, &other),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = SymmetricKey::generate();
        let mut ciphertext = encrypt(b"ledger payload".as_ref(), &key).unwrap();
        for i in 0..ciphertext.len() {
            ciphertext[i] ^= 0x01;
            assert!(matches!(
                decrypt(&ciphertext, &key),
                Err(Error::AuthenticationFailure)
            ));
            ciphertext[i] ^= 0x01;
        }
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let key = SymmetricKey::generate();
        assert!(matches!(
            decrypt([0u8; NONCE_LENGTH + TAG_LENGTH - 1], &key),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let key = SymmetricKey::generate();
        let first = encrypt(b"same plaintext".as_ref(), &key).unwrap();
        let second = encrypt(b"same plaintext".as_ref(), &key).unwrap();
        assert_ne!(first, second);
        assert_ne!(first[..NONCE_LENGTH], second[..NONCE_LENGTH]);
    }
}
