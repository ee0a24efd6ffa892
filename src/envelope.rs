use crate::{
    cipher::{self, SymmetricKey},
    Error, KeyPair, PublicKey, RecipientPolicy, Result, WrappedKey,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::SeqAccess;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error as DError, MapAccess, Visitor},
    ser::SerializeStruct,
};
use std::collections::BTreeMap;

/// The envelope structure that holds the encrypted payload along with one
/// wrapped key per recipient.
///
/// The wrapped-key map is keyed by the canonical base64 encoding of each
/// recipient's public key, and always contains an entry for the encryptor's
/// own key. Every entry unwraps to the same symmetric key, so any recipient
/// can recover the payload independently.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// The encrypted payload
    ciphertext: Vec<u8>,
    /// The wrapped symmetric key for each recipient, keyed by encoded public key
    wrapped_keys: BTreeMap<String, WrappedKey>,
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope {{ recipients: [{}], ciphertext: {} }}",
            self.display_recipients(),
            BASE64.encode(&self.ciphertext),
        )
    }
}

impl Serialize for Envelope {
    fn serialize<S>(&self, s: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if s.is_human_readable() {
            let mut state = s.serialize_struct("Envelope", 2)?;
            state.serialize_field("wrapped_keys", &self.wrapped_keys)?;
            state.serialize_field("ciphertext", &BASE64.encode(&self.ciphertext))?;
            state.end()
        } else {
            let mut state = s.serialize_struct("Envelope", 2)?;
            state.serialize_field("wrapped_keys", &self.wrapped_keys)?;
            state.serialize_field("ciphertext", &self.ciphertext)?;
            state.end()
        }
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(d: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        fn check_recipient_keys<E: DError>(
            wrapped_keys: &BTreeMap<String, WrappedKey>,
        ) -> std::result::Result<(), E> {
            for encoded in wrapped_keys.keys() {
                PublicKey::from_base64(encoded)
                    .map_err(|_| E::custom("Invalid recipient key in wrapped_keys"))?;
            }
            Ok(())
        }

        if d.is_human_readable() {
            struct EnvelopeVisitor;

            impl<'de> Visitor<'de> for EnvelopeVisitor {
                type Value = Envelope;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "struct Envelope or map")
                }

                fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
                where
                    A: MapAccess<'de>,
                {
                    let mut wrapped_keys: Option<BTreeMap<String, WrappedKey>> = None;
                    let mut ciphertext: Option<String> = None;

                    while let Some(key) = map.next_key::<&str>()? {
                        match key {
                            "wrapped_keys" => {
                                if wrapped_keys.is_some() {
                                    return Err(DError::duplicate_field("wrapped_keys"));
                                }
                                wrapped_keys = Some(map.next_value()?);
                            }
                            "ciphertext" => {
                                if ciphertext.is_some() {
                                    return Err(DError::duplicate_field("ciphertext"));
                                }
                                ciphertext = Some(map.next_value()?);
                            }
                            _ => {
                                let _: serde::de::IgnoredAny = map.next_value()?;
                            }
                        }
                    }

                    let wrapped_keys =
                        wrapped_keys.ok_or_else(|| DError::missing_field("wrapped_keys"))?;
                    let ciphertext_b64 =
                        ciphertext.ok_or_else(|| DError::missing_field("ciphertext"))?;
                    let ciphertext = BASE64
                        .decode(&ciphertext_b64)
                        .map_err(|_| DError::custom("Invalid base64 in ciphertext"))?;
                    check_recipient_keys(&wrapped_keys)?;

                    Ok(Envelope {
                        wrapped_keys,
                        ciphertext,
                    })
                }
            }
            d.deserialize_struct("Envelope", &["wrapped_keys", "ciphertext"], EnvelopeVisitor)
        } else {
            struct EnvelopeVisitor;
            impl<'de> Visitor<'de> for EnvelopeVisitor {
                type Value = Envelope;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "struct Envelope or map")
                }

                fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
                where
                    A: SeqAccess<'de>,
                {
                    let wrapped_keys: BTreeMap<String, WrappedKey> = seq
                        .next_element()?
                        .ok_or_else(|| DError::missing_field("wrapped_keys"))?;
                    let ciphertext = seq
                        .next_element()?
                        .ok_or_else(|| DError::missing_field("ciphertext"))?;
                    check_recipient_keys(&wrapped_keys)?;

                    Ok(Envelope {
                        wrapped_keys,
                        ciphertext,
                    })
                }
            }
            d.deserialize_struct("Envelope", &["wrapped_keys", "ciphertext"], EnvelopeVisitor)
        }
    }
}

impl Envelope {
    pub(crate) fn display_recipients(&self) -> String {
        let mut s = String::new();
        for (i, k) in self.wrapped_keys.keys().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(k);
        }
        s
    }

    /// Create a new envelope for the given recipients with the specified data.
    ///
    /// The encryptor's own public key is always added to the recipient set,
    /// so the resulting envelope is decryptable by `key_pair` even when
    /// `recipients` is empty. Uses the default [`RecipientPolicy`].
    pub fn new<B: AsRef<[u8]>>(
        recipients: &[PublicKey],
        data: B,
        key_pair: &KeyPair,
    ) -> Result<Self> {
        Self::new_with_policy(recipients, data, key_pair, RecipientPolicy::default())
    }

    /// Create a new envelope with an explicit recipient policy.
    ///
    /// Recipients are deduplicated by their canonical encoding before any key
    /// is wrapped, so duplicates in `recipients` cost nothing and a recipient
    /// listed twice still gets exactly one entry. The call is all-or-nothing:
    /// if any single wrap fails, no envelope is returned.
    pub fn new_with_policy<B: AsRef<[u8]>>(
        recipients: &[PublicKey],
        data: B,
        key_pair: &KeyPair,
        policy: RecipientPolicy,
    ) -> Result<Self> {
        let own_key = key_pair.public_key().to_base64();
        let mut recipient_set: BTreeMap<String, &PublicKey> = BTreeMap::new();
        for pk in recipients {
            recipient_set.insert(pk.to_base64(), pk);
        }
        if policy == RecipientPolicy::RequireExternal
            && !recipient_set.keys().any(|k| *k != own_key)
        {
            return Err(Error::EmptyRecipientSet);
        }
        recipient_set.insert(own_key, key_pair.public_key());

        let dek = SymmetricKey::generate();
        let ciphertext = cipher::encrypt(data, &dek)?;
        let mut wrapped_keys = BTreeMap::new();
        for (encoded, pk) in recipient_set {
            wrapped_keys.insert(encoded, WrappedKey::wrap(&dek, pk)?);
        }

        Ok(Self {
            ciphertext,
            wrapped_keys,
        })
    }

    /// Recover the payload with a recipient's key pair.
    ///
    /// Looks up the caller's wrapped-key entry, unwraps the symmetric key and
    /// decrypts the payload. Fails with [`Error::RecipientNotFound`] if this
    /// identity was never granted access, and with
    /// [`Error::AuthenticationFailure`] if any part of the envelope was
    /// tampered with.
    pub fn decrypt(&self, key_pair: &KeyPair) -> Result<Vec<u8>> {
        let wrapped = self
            .wrapped_keys
            .get(&key_pair.public_key().to_base64())
            .ok_or(Error::RecipientNotFound)?;
        let dek = wrapped.unwrap_key(key_pair.secret_key())?;
        cipher::decrypt(&self.ciphertext, &dek)
    }

    /// Return the encrypted payload
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Return the wrapped key of each recipient, keyed by encoded public key
    pub fn wrapped_keys(&self) -> &BTreeMap<String, WrappedKey> {
        &self.wrapped_keys
    }

    /// Iterate over the encoded public keys that can decrypt this envelope
    pub fn recipient_keys(&self) -> impl Iterator<Item = &str> {
        self.wrapped_keys.keys().map(String::as_str)
    }

    /// Whether the given public key has a wrapped-key entry
    pub fn is_recipient(&self, public_key: &PublicKey) -> bool {
        self.wrapped_keys.contains_key(&public_key.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn key_pairs(n: usize) -> Vec<KeyPair> {
        (0..n).map(|_| KeyPair::generate()).collect()
    }

    fn public_keys(pairs: &[KeyPair]) -> Vec<PublicKey> {
        pairs.iter().map(|p| p.public_key().clone()).collect()
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(6)]
    fn round_trip_for_every_recipient(#[case] num_recipients: usize) {
        let encryptor = KeyPair::generate();
        let recipients = key_pairs(num_recipients);

        let data = b"envelope decryption";
        let envelope = Envelope::new(&public_keys(&recipients), data.as_ref(), &encryptor).unwrap();

        assert_eq!(envelope.wrapped_keys.len(), num_recipients + 1);
        assert_eq!(envelope.decrypt(&encryptor).unwrap(), data.as_ref());
        for pair in &recipients {
            assert_eq!(envelope.decrypt(pair).unwrap(), data.as_ref());
        }
    }

    #[test]
    fn encryptor_can_always_decrypt() {
        let encryptor = KeyPair::generate();
        let envelope = Envelope::new(&[], b"note to self".as_ref(), &encryptor).unwrap();
        assert_eq!(envelope.wrapped_keys.len(), 1);
        assert!(envelope.is_recipient(encryptor.public_key()));
        assert_eq!(envelope.decrypt(&encryptor).unwrap(), b"note to self");
    }

    #[test]
    fn require_external_rejects_empty_list() {
        let encryptor = KeyPair::generate();
        assert!(matches!(
            Envelope::new_with_policy(
                &[],
                b"data".as_ref(),
                &encryptor,
                RecipientPolicy::RequireExternal
            ),
            Err(Error::EmptyRecipientSet)
        ));
    }

    #[test]
    fn require_external_rejects_self_as_only_recipient() {
        let encryptor = KeyPair::generate();
        assert!(matches!(
            Envelope::new_with_policy(
                &[encryptor.public_key().clone()],
                b"data".as_ref(),
                &encryptor,
                RecipientPolicy::RequireExternal
            ),
            Err(Error::EmptyRecipientSet)
        ));
    }

    #[test]
    fn require_external_accepts_one_recipient() {
        let encryptor = KeyPair::generate();
        let recipient = KeyPair::generate();
        let envelope = Envelope::new_with_policy(
            &[recipient.public_key().clone()],
            b"data".as_ref(),
            &encryptor,
            RecipientPolicy::RequireExternal,
        )
        .unwrap();
        assert_eq!(envelope.decrypt(&recipient).unwrap(), b"data");
    }

    #[test]
    fn encryption_is_randomized() {
        let encryptor = KeyPair::generate();
        let recipient = KeyPair::generate();
        let recipients = [recipient.public_key().clone()];

        let first = Envelope::new(&recipients, b"same data".as_ref(), &encryptor).unwrap();
        let second = Envelope::new(&recipients, b"same data".as_ref(), &encryptor).unwrap();

        assert_ne!(first.ciphertext, second.ciphertext);
        let key = recipient.public_key().to_base64();
        assert_ne!(first.wrapped_keys[&key], second.wrapped_keys[&key]);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let encryptor = KeyPair::generate();
        let recipient = KeyPair::generate();
        let mut envelope = Envelope::new(
            &[recipient.public_key().clone()],
            b"hello".as_ref(),
            &encryptor,
        )
        .unwrap();

        for i in 0..envelope.ciphertext.len() {
            envelope.ciphertext[i] ^= 0x01;
            assert!(matches!(
                envelope.decrypt(&recipient),
                Err(Error::AuthenticationFailure)
            ));
            envelope.ciphertext[i] ^= 0x01;
        }
        assert_eq!(envelope.decrypt(&recipient).unwrap(), b"hello");
    }

    #[test]
    fn non_recipient_is_not_found() {
        let encryptor = KeyPair::generate();
        let recipient = KeyPair::generate();
        let outsider = KeyPair::generate();
        let envelope = Envelope::new(
            &[recipient.public_key().clone()],
            b"hello".as_ref(),
            &encryptor,
        )
        .unwrap();

        assert!(!envelope.is_recipient(outsider.public_key()));
        assert!(matches!(
            envelope.decrypt(&outsider),
            Err(Error::RecipientNotFound)
        ));
    }

    #[test]
    fn relocated_wrapped_key_is_rejected() {
        let encryptor = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();
        let mut envelope = Envelope::new(
            &[b.public_key().clone(), c.public_key().clone()],
            b"hello".as_ref(),
            &encryptor,
        )
        .unwrap();

        // Graft C's wrapped entry under B's key: present in the map, but the
        // sealed box no longer matches B's secret key.
        let c_entry = envelope.wrapped_keys[&c.public_key().to_base64()].clone();
        envelope
            .wrapped_keys
            .insert(b.public_key().to_base64(), c_entry);

        assert!(matches!(
            envelope.decrypt(&b),
            Err(Error::AuthenticationFailure)
        ));
        assert_eq!(envelope.decrypt(&c).unwrap(), b"hello");
    }

    #[test]
    fn recipient_order_is_irrelevant() {
        let encryptor = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();

        let forward = Envelope::new(
            &[b.public_key().clone(), c.public_key().clone()],
            b"hello".as_ref(),
            &encryptor,
        )
        .unwrap();
        let reverse = Envelope::new(
            &[c.public_key().clone(), b.public_key().clone()],
            b"hello".as_ref(),
            &encryptor,
        )
        .unwrap();

        let forward_keys: Vec<_> = forward.recipient_keys().collect();
        let reverse_keys: Vec<_> = reverse.recipient_keys().collect();
        assert_eq!(forward_keys, reverse_keys);
        for envelope in [&forward, &reverse] {
            assert_eq!(envelope.decrypt(&b).unwrap(), b"hello");
            assert_eq!(envelope.decrypt(&c).unwrap(), b"hello");
        }
    }

    #[test]
    fn duplicate_recipients_collapse() {
        let encryptor = KeyPair::generate();
        let recipient = KeyPair::generate();
        let envelope = Envelope::new(
            &[
                recipient.public_key().clone(),
                recipient.public_key().clone(),
                recipient.public_key().clone(),
            ],
            b"hello".as_ref(),
            &encryptor,
        )
        .unwrap();

        assert_eq!(envelope.wrapped_keys.len(), 2);
        assert_eq!(envelope.decrypt(&recipient).unwrap(), b"hello");
    }

    #[test]
    fn two_party_scenario() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();

        let envelope = Envelope::new(&[b.public_key().clone()], b"hello".as_ref(), &a).unwrap();

        let mut expected = vec![a.public_key().to_base64(), b.public_key().to_base64()];
        expected.sort();
        let actual: Vec<_> = envelope.recipient_keys().map(str::to_owned).collect();
        assert_eq!(actual, expected);

        assert_eq!(envelope.decrypt(&b).unwrap(), b"hello");
        assert!(matches!(envelope.decrypt(&c), Err(Error::RecipientNotFound)));
    }

    #[test]
    fn serialization_human_readable() {
        let encryptor = KeyPair::generate();
        let recipients = key_pairs(3);
        let envelope = Envelope::new(
            &public_keys(&recipients),
            b"Hello, world!".as_ref(),
            &encryptor,
        )
        .unwrap();

        let serialized = serde_json::to_string(&envelope).unwrap();
        assert!(serialized.contains(&BASE64.encode(&envelope.ciphertext)));
        let deserialized: Envelope = serde_json::from_str(&serialized).unwrap();
        assert_eq!(envelope.ciphertext, deserialized.ciphertext);
        assert_eq!(envelope.wrapped_keys, deserialized.wrapped_keys);
        for pair in &recipients {
            assert_eq!(deserialized.decrypt(pair).unwrap(), b"Hello, world!");
        }
    }

    #[test]
    fn serialization_binary() {
        let encryptor = KeyPair::generate();
        let recipients = key_pairs(2);
        let envelope = Envelope::new(
            &public_keys(&recipients),
            b"Hello, world!".as_ref(),
            &encryptor,
        )
        .unwrap();

        let serialized = postcard::to_stdvec(&envelope).unwrap();
        let deserialized: Envelope = postcard::from_bytes(&serialized).unwrap();
        assert_eq!(envelope.ciphertext, deserialized.ciphertext);
        assert_eq!(envelope.wrapped_keys, deserialized.wrapped_keys);
        assert_eq!(deserialized.decrypt(&encryptor).unwrap(), b"Hello, world!");
    }

    #[test]
    fn corrupted_recipient_key_fails_deserialization() {
        let encryptor = KeyPair::generate();
        let envelope = Envelope::new(&[], b"hello".as_ref(), &encryptor).unwrap();
        let serialized = serde_json::to_string(&envelope).unwrap();
        let own_key = encryptor.public_key().to_base64();
        let corrupted = serialized.replace(&own_key, "not a key");
        assert!(serde_json::from_str::<Envelope>(&corrupted).is_err());
    }

    #[test]
    fn display_lists_recipients() {
        let encryptor = KeyPair::generate();
        let envelope = Envelope::new(&[], b"hello".as_ref(), &encryptor).unwrap();
        let rendered = format!("{}", envelope);
        assert!(rendered.contains(&encryptor.public_key().to_base64()));
        assert!(rendered.contains(&BASE64.encode(&envelope.ciphertext)));
    }
}
