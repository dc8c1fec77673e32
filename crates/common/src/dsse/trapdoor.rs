use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::normalize_keyword;

/// Size of a trapdoor in bytes (SHA-256 output)
pub const TRAPDOOR_SIZE: usize = 32;

const EPOCH_DOMAIN: &[u8] = b"ehr-dsse-epoch";

#[derive(Debug, thiserror::Error)]
pub enum TrapdoorError {
    #[error("trapdoor error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Opaque index key derived from (key, keyword, counter)
///
/// Rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trapdoor([u8; TRAPDOOR_SIZE]);

impl Trapdoor {
    /// `SHA-256(SHA-256(key || normalized_keyword || decimal(counter)))`
    pub fn derive(key: &[u8], keyword: &str, counter: u64) -> Self {
        let inner = Sha256::new()
            .chain_update(key)
            .chain_update(normalize_keyword(keyword).as_bytes())
            .chain_update(counter.to_string().as_bytes())
            .finalize();
        Self::digest(&inner)
    }

    /// SHA-256 of the normalized keyword, with no key and no counter
    pub fn plain(keyword: &str) -> Self {
        Self::digest(normalize_keyword(keyword).as_bytes())
    }

    pub fn to_bytes(&self) -> [u8; TRAPDOOR_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, TrapdoorError> {
        let mut buff = [0; TRAPDOOR_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("trapdoor hex decode error"))?;
        Ok(Self(buff))
    }

    fn digest(data: &[u8]) -> Self {
        let mut out = [0u8; TRAPDOOR_SIZE];
        out.copy_from_slice(&Sha256::digest(data));
        Self(out)
    }
}

/// Derivation key for a keyword epoch; epoch 0 is the engine key itself
pub(crate) fn epoch_key(key: &[u8], epoch: u64) -> Vec<u8> {
    if epoch == 0 {
        return key.to_vec();
    }
    Sha256::new()
        .chain_update(EPOCH_DOMAIN)
        .chain_update(key)
        .chain_update(epoch.to_be_bytes())
        .finalize()
        .to_vec()
}

impl From<[u8; TRAPDOOR_SIZE]> for Trapdoor {
    fn from(bytes: [u8; TRAPDOOR_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Trapdoor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Trapdoor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trapdoor({})", &self.to_hex()[..12])
    }
}

impl FromStr for Trapdoor {
    type Err = TrapdoorError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Trapdoor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Trapdoor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Trapdoor::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_matches_double_sha256() {
        let inner = Sha256::digest(b"Kfever1");
        let outer = Sha256::digest(inner);
        assert_eq!(
            Trapdoor::derive(b"K", "fever", 1).to_bytes().as_slice(),
            outer.as_slice()
        );
    }

    #[test]
    fn test_keyword_is_normalized() {
        assert_eq!(
            Trapdoor::derive(b"K", "  FeVeR ", 3),
            Trapdoor::derive(b"K", "fever", 3)
        );
    }

    #[test]
    fn test_depends_on_key_and_counter() {
        let t = Trapdoor::derive(b"K", "fever", 1);
        assert_ne!(t, Trapdoor::derive(b"K", "fever", 2));
        assert_ne!(t, Trapdoor::derive(b"L", "fever", 1));
        assert_ne!(t, Trapdoor::derive(b"K", "cough", 1));
    }

    #[test]
    fn test_plain_is_keyless() {
        assert_eq!(Trapdoor::plain("Sepsis"), Trapdoor::plain("sepsis"));
        assert_eq!(
            Trapdoor::plain("sepsis").to_bytes().as_slice(),
            Sha256::digest(b"sepsis").as_slice()
        );
    }

    #[test]
    fn test_epoch_zero_is_identity() {
        assert_eq!(epoch_key(b"K", 0), b"K".to_vec());
        assert_ne!(epoch_key(b"K", 1), b"K".to_vec());
        assert_ne!(epoch_key(b"K", 1), epoch_key(b"K", 2));
    }

    #[test]
    fn test_hex_roundtrip() {
        let t = Trapdoor::derive(b"K", "fever", 1);
        assert_eq!(t.to_hex().len(), 64);
        assert_eq!(t.to_hex().parse::<Trapdoor>().unwrap(), t);
        assert!(Trapdoor::from_hex("zz").is_err());
    }
}
