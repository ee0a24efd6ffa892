use crate::{Error, Result, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use derive_more::Display;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Debug, Formatter};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A recipient's public encryption key
#[derive(Clone, Display, Eq, PartialEq)]
#[display("{}", self.to_base64())]
#[repr(transparent)]
pub struct PublicKey(crypto_box::PublicKey);

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "PublicKey {{ {} }}", self.to_base64())
    }
}

impl From<crypto_box::PublicKey> for PublicKey {
    fn from(pk: crypto_box::PublicKey) -> Self {
        PublicKey(pk)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, s: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if s.is_human_readable() {
            s.serialize_str(&self.to_base64())
        } else {
            s.serialize_bytes(self.0.as_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(d: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if d.is_human_readable() {
            let encoded = String::deserialize(d)?;
            Self::from_base64(&encoded).map_err(|_| serde::de::Error::custom("invalid public key"))
        } else {
            let bytes = Vec::<u8>::deserialize(d)?;
            Self::from_slice(&bytes).map_err(|_| serde::de::Error::custom("invalid public key"))
        }
    }
}

impl PublicKey {
    /// Convert a public key from a slice of raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| Error::InvalidKeyFormat)?;
        Ok(Self(crypto_box::PublicKey::from(raw)))
    }

    /// Decode a public key from its base64 transport form.
    ///
    /// Surrounding whitespace is trimmed before decoding.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        Self::from_slice(&BASE64.decode(encoded.trim())?)
    }

    /// The canonical base64 transport form of this key.
    ///
    /// This string is the identifier an [`Envelope`](crate::Envelope) keys its
    /// wrapped-key map by.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.as_bytes())
    }

    pub(crate) fn inner(&self) -> &crypto_box::PublicKey {
        &self.0
    }
}

/// A private decryption key
#[derive(Clone)]
#[repr(transparent)]
pub struct SecretKey(crypto_box::SecretKey);

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "SecretKey {{ ... }}")
    }
}

impl From<crypto_box::SecretKey> for SecretKey {
    fn from(sk: crypto_box::SecretKey) -> Self {
        SecretKey(sk)
    }
}

impl SecretKey {
    /// Convert a secret key from a slice of raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; SECRET_KEY_LENGTH] = bytes.try_into().map_err(|_| Error::InvalidKeyFormat)?;
        Ok(Self(crypto_box::SecretKey::from(raw)))
    }

    /// Decode a secret key from its base64 transport form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut bytes = BASE64.decode(encoded.trim())?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    /// The base64 transport form of this key.
    ///
    /// Exporting a secret key is an explicit act; there is no serde impl.
    pub fn to_base64(&self) -> String {
        let mut bytes = self.0.to_bytes();
        let encoded = BASE64.encode(&bytes);
        bytes.zeroize();
        encoded
    }

    /// Derive the public half of this key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn inner(&self) -> &crypto_box::SecretKey {
        &self.0
    }
}

/// An X25519 key pair identifying one recipient.
///
/// The public key is always derived from the secret key; there is no
/// constructor taking both halves independently.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the operating system CSPRNG.
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey(crypto_box::SecretKey::generate(&mut OsRng)))
    }

    /// Rebuild a key pair from its secret half, re-deriving the public key.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            secret_key,
            public_key,
        }
    }

    /// Rebuild a key pair from a base64-encoded secret key.
    ///
    /// This is how a process restores its identity from stored credentials.
    pub fn from_secret_base64(encoded: &str) -> Result<Self> {
        Ok(Self::from_secret_key(SecretKey::from_base64(encoded)?))
    }

    /// The public half of this key pair
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The secret half of this key pair
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Export both halves in base64 transport form.
    pub fn to_encoded(&self) -> EncodedKeyPair {
        EncodedKeyPair {
            public_key: self.public_key.to_base64(),
            secret_key: self.secret_key.to_base64(),
        }
    }
}

/// A key pair in base64 transport form, the record handed to a newly
/// registered identity. The secret string is zeroized on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EncodedKeyPair {
    /// The base64-encoded public key
    #[zeroize(skip)]
    pub public_key: String,
    /// The base64-encoded secret key
    pub secret_key: String,
}

impl Debug for EncodedKeyPair {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "EncodedKeyPair {{ public_key: {} }}", self.public_key)
    }
}

impl TryFrom<&EncodedKeyPair> for KeyPair {
    type Error = Error;

    fn try_from(encoded: &EncodedKeyPair) -> Result<Self> {
        KeyPair::from_secret_base64(&encoded.secret_key)
    }
}
