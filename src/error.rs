use thiserror::Error;

/// The error type for this crate.
#[derive(Copy, Clone, Debug, Error)]
pub enum Error {
    /// Malformed text encoding of a key
    #[error("Invalid key encoding")]
    InvalidKeyFormat,
    /// Wrapped key bytes have the wrong length
    #[error("Invalid wrapped key length {0}")]
    InvalidWrappedKeyLength(usize),
    /// The recipient set is empty and the policy requires an external recipient
    #[error("No recipient other than the encryptor was provided")]
    EmptyRecipientSet,
    /// The cryptographic backend failed during encryption or key wrapping
    #[error("Encryption backend failure")]
    EncryptionFailure,
    /// The decrypting identity has no wrapped-key entry in the envelope
    #[error("No wrapped key for this recipient")]
    RecipientNotFound,
    /// Tampered ciphertext/wrapped key, or a key that does not match
    #[error("Ciphertext or wrapped key failed authentication")]
    AuthenticationFailure,
    /// Invalid policy name when using RecipientPolicy.parse()
    #[error("Invalid policy name: {0}")]
    InvalidPolicyName(#[from] derive_more::FromStrError),
    /// Invalid policy value when using RecipientPolicy::try_from(u8)
    #[error("Invalid policy value: {0}")]
    InvalidPolicyValue(#[from] derive_more::TryFromReprError<u8>),
}

impl From<base64::DecodeError> for Error {
    fn from(_: base64::DecodeError) -> Self {
        Error::InvalidKeyFormat
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
