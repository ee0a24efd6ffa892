//! Multi-recipient envelope encryption for shared-ledger payloads
//!
//! An envelope is an encrypted payload that only a caller-chosen set of
//! recipients can decrypt. The payload is encrypted once; adding a recipient
//! only adds one wrapped copy of the key, never a second copy of the data.
//! This matters when the blob is published to an append-only ledger that
//! every subscribed node replicates: all nodes store the same bytes, but only
//! the recipients can read them.
//!
//! The scheme works as follows:
//!
//! 1. Generate a fresh AES-256-GCM symmetric key for this envelope.
//! 2. Encrypt the payload with it, prepending a fresh random nonce.
//! 3. For each recipient, wrap the symmetric key in an anonymous sealed box
//!    (X25519 + XSalsa20-Poly1305): an ephemeral key pair is generated per
//!    wrap, so the recipient learns nothing about who encrypted.
//! 4. The envelope is the ciphertext plus a map from each recipient's
//!    base64-encoded public key to their wrapped key. The encryptor's own
//!    key is always part of the map.
//!
//! Decryption is the reverse: look up your entry by public key, unseal the
//! symmetric key with your secret key, decrypt the payload. Both layers are
//! authenticated, so tampering with any byte of the envelope is a hard
//! failure rather than garbage plaintext.
//!
//! # Usage
//!
//! ```
//! use ledger_envelope::{Envelope, KeyPair};
//!
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//! let carol = KeyPair::generate();
//! let plaintext = b"Hello World!".to_vec();
//!
//! let envelope = Envelope::new(
//!     &[bob.public_key().clone(), carol.public_key().clone()],
//!     &plaintext,
//!     &alice,
//! ).unwrap();
//!
//! // Every recipient decrypts independently, including the encryptor
//! assert_eq!(plaintext, envelope.decrypt(&alice).unwrap());
//! assert_eq!(plaintext, envelope.decrypt(&bob).unwrap());
//! assert_eq!(plaintext, envelope.decrypt(&carol).unwrap());
//!
//! // An identity without a wrapped-key entry gets nothing
//! let mallory = KeyPair::generate();
//! assert!(envelope.decrypt(&mallory).is_err());
//! ```
//!
//! Envelopes serialize with [`serde::Serialize`], [`serde::Deserialize`]:
//! human-readable formats carry base64 text suitable for embedding in a JSON
//! ledger item, binary formats carry raw bytes.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused,
    clippy::mod_module_files
)]
#![deny(clippy::unwrap_used)]

pub mod cipher;
mod envelope;
mod error;
mod keys;
mod policy;
mod recipient;

/// The length of a public key
pub const PUBLIC_KEY_LENGTH: usize = 32;
/// The length of a secret key
pub const SECRET_KEY_LENGTH: usize = 32;
/// The length of the single-use symmetric key protecting a payload
pub const SYMMETRIC_KEY_LENGTH: usize = 32;
/// The length of the nonce prepended to the payload ciphertext
pub const NONCE_LENGTH: usize = 12;
/// The length of the authentication tag appended by the payload cipher
pub const TAG_LENGTH: usize = 16;
/// The length of a wrapped key: ephemeral public key, wrapped symmetric key
/// and sealed-box authentication tag
pub const WRAPPED_KEY_LENGTH: usize = PUBLIC_KEY_LENGTH + SYMMETRIC_KEY_LENGTH + TAG_LENGTH;

pub use cipher::SymmetricKey;
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use keys::{EncodedKeyPair, KeyPair, PublicKey, SecretKey};
pub use policy::RecipientPolicy;
pub use recipient::WrappedKey;
