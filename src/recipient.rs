use crate::{
    cipher::SymmetricKey, Error, PublicKey, Result, SecretKey, SYMMETRIC_KEY_LENGTH,
    WRAPPED_KEY_LENGTH,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// A symmetric key wrapped for one recipient.
///
/// The wrapping is an anonymous sealed box: an ephemeral X25519 public key
/// followed by the encrypted symmetric key and its authentication tag. Only
/// the holder of the matching secret key can unwrap it, and nothing about the
/// encryptor's identity is asserted.
#[derive(Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct WrappedKey(pub(crate) [u8; WRAPPED_KEY_LENGTH]);

impl std::fmt::Display for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedKey {{ {} }}", self.to_base64())
    }
}

impl AsRef<[u8]> for WrappedKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for WrappedKey {
    fn serialize<S>(&self, s: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if s.is_human_readable() {
            s.serialize_str(&self.to_base64())
        } else {
            serde_big_array::Array(self.0).serialize(s)
        }
    }
}

impl<'de> Deserialize<'de> for WrappedKey {
    fn deserialize<D>(d: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if d.is_human_readable() {
            let encoded = String::deserialize(d)?;
            Self::from_base64(&encoded).map_err(serde::de::Error::custom)
        } else {
            #[derive(Deserialize)]
            #[repr(transparent)]
            struct WrappedKeyHelper(#[serde(with = "serde_big_array::BigArray")] [u8; WRAPPED_KEY_LENGTH]);
            let helper = WrappedKeyHelper::deserialize(d)?;
            Ok(Self(helper.0))
        }
    }
}

impl WrappedKey {
    /// Wrap a symmetric key for the given recipient.
    ///
    /// Each call draws its own ephemeral key material, so wrapping the same
    /// symmetric key twice never yields the same bytes.
    pub fn wrap(key: &SymmetricKey, recipient: &PublicKey) -> Result<Self> {
        let sealed = recipient
            .inner()
            .seal(&mut OsRng, key.as_bytes())
            .map_err(|_| Error::EncryptionFailure)?;
        let bytes: [u8; WRAPPED_KEY_LENGTH] =
            sealed.try_into().map_err(|_| Error::EncryptionFailure)?;
        Ok(Self(bytes))
    }

    /// Recover the symmetric key with the recipient's secret key.
    ///
    /// Fails with [`Error::AuthenticationFailure`] if the secret key does not
    /// correspond to the public key used to wrap, or the bytes are corrupted.
    pub fn unwrap_key(&self, secret_key: &SecretKey) -> Result<SymmetricKey> {
        let mut opened = secret_key
            .inner()
            .unseal(&self.0)
            .map_err(|_| Error::AuthenticationFailure)?;
        let bytes: [u8; SYMMETRIC_KEY_LENGTH] = opened
            .as_slice()
            .try_into()
            .map_err(|_| Error::AuthenticationFailure)?;
        opened.zeroize();
        Ok(SymmetricKey::from_bytes(bytes))
    }

    /// Convert a wrapped key from a slice of bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; WRAPPED_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidWrappedKeyLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// The base64 transport form of this wrapped key
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Decode a wrapped key from its base64 transport form
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| Error::InvalidKeyFormat)?;
        Self::from_slice(&bytes)
    }
}
