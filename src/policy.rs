use derive_more::{Display, FromStr, TryFrom};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How an envelope treats an explicit recipient list that is empty after
/// normalization.
///
/// The encryptor's own key is always added to the recipient set, so an empty
/// explicit list still yields a decryptable envelope. Whether that degenerate
/// "encrypt for myself alone" request is acceptable is a caller policy:
///
/// * `SelfOnly`: the empty list is valid; the envelope is readable by the
///   encryptor and nobody else. This is the default.
/// * `RequireExternal`: at least one recipient other than the encryptor must
///   remain after trimming and deduplication, otherwise the call fails with
///   [`Error::EmptyRecipientSet`](crate::Error::EmptyRecipientSet).
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    FromStr,
    TryFrom,
)]
#[display("{}")]
#[try_from(repr)]
#[repr(u8)]
pub enum RecipientPolicy {
    #[default]
    #[display("SelfOnly")]
    /// An empty explicit recipient list degenerates to encrypt-for-self.
    SelfOnly = 1,
    #[display("RequireExternal")]
    /// An external recipient is mandatory.
    RequireExternal = 2,
}

impl Serialize for RecipientPolicy {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if s.is_human_readable() {
            s.serialize_str(&self.to_string())
        } else {
            s.serialize_u8(self.into())
        }
    }
}

impl<'de> Deserialize<'de> for RecipientPolicy {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if d.is_human_readable() {
            let s = String::deserialize(d)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let v = u8::deserialize(d)?;
            v.try_into().map_err(serde::de::Error::custom)
        }
    }
}

impl From<RecipientPolicy> for u8 {
    fn from(policy: RecipientPolicy) -> Self {
        policy as u8
    }
}

impl From<&RecipientPolicy> for u8 {
    fn from(policy: &RecipientPolicy) -> Self {
        *policy as u8
    }
}
