//! Policy-gated key encapsulation
//!
//! `PolicyKem` is the capability the owner uses to bind an entity key to an
//! access policy, and the capability a clinician uses to get it back.
//!
//! `AttributeKem` implements it with X25519 + AES Key Wrap (RFC 3394):
//!
//! 1. **Setup**: draw a random master seed. Every attribute in the universe
//!    gets a static X25519 secret `SHA-256("ehr-attr" || seed || attribute)`;
//!    the public params carry the matching public keys.
//! 2. **Keygen**: hand the holder the static secrets of their attributes.
//! 3. **Encrypt**: expand the policy to DNF, draw one ephemeral X25519 key and
//!    a fresh entity key. For every clause, hash the ECDH outputs against each
//!    clause attribute into a KEK and wrap the entity key with AES-KW.
//! 4. **Decrypt**: find a clause covered by the holder's attributes, redo the
//!    ECDH with the ephemeral public key and unwrap.
//!
//! Holders who pool attributes can satisfy clauses none of them satisfies
//! alone. Pairing-based CP-ABE prevents that; this scheme does not.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use aes_kw::KekAes256 as Kek;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use super::policy::{normalize_attribute, Policy, PolicyError};
use super::secret::{CipherError, Secret, SECRET_SIZE};

const ATTRIBUTE_DOMAIN: &[u8] = b"ehr-attr";
const KEK_DOMAIN: &[u8] = b"ehr-kek";

#[derive(Debug, thiserror::Error)]
pub enum KemError {
    #[error("kem error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("attributes do not satisfy the access policy")]
    PolicyNotSatisfied,
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("policy references unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("key generation failed: {0}")]
    Secret(#[from] CipherError),
    #[error("key wrap failed")]
    Wrap,
}

/// Attribute-gated key encapsulation
pub trait PolicyKem: Send + Sync {
    type PublicParams: Clone + Send + Sync;
    type MasterSecret: Send + Sync;
    type UserSecret: Clone + Send + Sync;
    type Ciphertext: Clone + fmt::Debug + Send + Sync;

    fn setup(&self) -> Result<(Self::PublicParams, Self::MasterSecret), KemError>;

    fn keygen(
        &self,
        params: &Self::PublicParams,
        master: &Self::MasterSecret,
        attributes: &[String],
    ) -> Result<Self::UserSecret, KemError>;

    /// Encapsulate a freshly generated symmetric key under `policy`
    fn encrypt(
        &self,
        params: &Self::PublicParams,
        policy: &str,
    ) -> Result<(Self::Ciphertext, Secret), KemError>;

    /// # Errors
    ///
    /// Fails with `KemError::PolicyNotSatisfied` when the holder's attributes
    /// do not satisfy the ciphertext's policy.
    fn decrypt(
        &self,
        params: &Self::PublicParams,
        user: &Self::UserSecret,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Secret, KemError>;
}

/// Attribute public keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeParams {
    attributes: BTreeMap<String, [u8; 32]>,
}

impl AttributeParams {
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    fn public_key(&self, attribute: &str) -> Option<X25519PublicKey> {
        self.attributes
            .get(attribute)
            .map(|bytes| X25519PublicKey::from(*bytes))
    }
}

/// The authority's master seed
///
/// Not `Clone`, never printed. Only `keygen` reads it.
pub struct MasterSecret([u8; 32]);

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

impl MasterSecret {
    fn attribute_secret(&self, attribute: &str) -> StaticSecret {
        let digest = Sha256::new()
            .chain_update(ATTRIBUTE_DOMAIN)
            .chain_update(self.0)
            .chain_update(attribute.as_bytes())
            .finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        StaticSecret::from(bytes)
    }
}

/// Attribute secrets issued to one holder
#[derive(Clone)]
pub struct AttributeSecret {
    secrets: BTreeMap<String, StaticSecret>,
}

impl fmt::Debug for AttributeSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSecret")
            .field("attributes", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AttributeSecret {
    pub fn attributes(&self) -> HashSet<String> {
        self.secrets.keys().cloned().collect()
    }
}

/// One DNF clause and the entity key wrapped for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedClause {
    pub attributes: Vec<String>,
    #[serde(with = "hex_array")]
    pub wrapped: Vec<u8>,
}

/// Key encapsulation ciphertext stored alongside each entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCiphertext {
    pub policy: String,
    #[serde(with = "hex_array")]
    pub ephemeral: Vec<u8>,
    pub clauses: Vec<WrappedClause>,
}

/// X25519 + AES-KW policy KEM over a fixed attribute universe
#[derive(Debug, Clone)]
pub struct AttributeKem {
    universe: BTreeSet<String>,
}

impl AttributeKem {
    pub fn new<I, S>(universe: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            universe: universe
                .into_iter()
                .map(|a| normalize_attribute(a.as_ref()))
                .collect(),
        }
    }

    fn derive_kek(
        clause: &BTreeSet<String>,
        mut shared: impl FnMut(&str) -> Option<[u8; 32]>,
    ) -> Option<[u8; SECRET_SIZE]> {
        let mut hasher = Sha256::new().chain_update(KEK_DOMAIN);
        for attribute in clause {
            hasher.update(attribute.as_bytes());
            hasher.update([0u8]);
            hasher.update(shared(attribute)?);
        }
        let mut kek = [0u8; SECRET_SIZE];
        kek.copy_from_slice(&hasher.finalize());
        Some(kek)
    }
}

impl PolicyKem for AttributeKem {
    type PublicParams = AttributeParams;
    type MasterSecret = MasterSecret;
    type UserSecret = AttributeSecret;
    type Ciphertext = KeyCiphertext;

    fn setup(&self) -> Result<(AttributeParams, MasterSecret), KemError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)
            .map_err(|e| anyhow::anyhow!("failed to generate master seed: {}", e))?;
        let master = MasterSecret(seed);

        let attributes = self
            .universe
            .iter()
            .map(|a| {
                let public = X25519PublicKey::from(&master.attribute_secret(a));
                (a.clone(), public.to_bytes())
            })
            .collect();

        tracing::debug!("policy authority set up with {} attributes", self.universe.len());
        Ok((AttributeParams { attributes }, master))
    }

    fn keygen(
        &self,
        _params: &AttributeParams,
        master: &MasterSecret,
        attributes: &[String],
    ) -> Result<AttributeSecret, KemError> {
        let secrets = attributes
            .iter()
            .map(|a| {
                let a = normalize_attribute(a);
                let secret = master.attribute_secret(&a);
                (a, secret)
            })
            .collect();
        Ok(AttributeSecret { secrets })
    }

    fn encrypt(
        &self,
        params: &AttributeParams,
        policy: &str,
    ) -> Result<(KeyCiphertext, Secret), KemError> {
        let policy = Policy::parse(policy)?;
        if let Some(unknown) = policy
            .attributes()
            .into_iter()
            .find(|a| !params.attributes.contains_key(a))
        {
            return Err(KemError::UnknownAttribute(unknown));
        }

        let key = Secret::generate()?;

        let mut ephemeral_bytes = [0u8; 32];
        getrandom::getrandom(&mut ephemeral_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate ephemeral key: {}", e))?;
        let ephemeral = StaticSecret::from(ephemeral_bytes);
        let ephemeral_public = X25519PublicKey::from(&ephemeral);

        let mut clauses = Vec::new();
        for clause in policy.clauses()? {
            let kek = Self::derive_kek(&clause, |a| {
                params
                    .public_key(a)
                    .map(|public| *ephemeral.diffie_hellman(&public).as_bytes())
            })
            .ok_or_else(|| anyhow::anyhow!("missing public key for clause attribute"))?;

            let wrapped = Kek::from(kek)
                .wrap_vec(key.bytes())
                .map_err(|_| KemError::Wrap)?;

            clauses.push(WrappedClause {
                attributes: clause.into_iter().collect(),
                wrapped,
            });
        }

        Ok((
            KeyCiphertext {
                policy: policy.to_string(),
                ephemeral: ephemeral_public.to_bytes().to_vec(),
                clauses,
            },
            key,
        ))
    }

    fn decrypt(
        &self,
        _params: &AttributeParams,
        user: &AttributeSecret,
        ciphertext: &KeyCiphertext,
    ) -> Result<Secret, KemError> {
        // Skip the ECDH work when the attributes cannot satisfy the policy
        let policy = Policy::parse(&ciphertext.policy)?;
        if !policy.is_satisfied_by(&user.attributes()) {
            tracing::debug!(
                "attributes {:?} do not satisfy {}",
                user.secrets.keys().collect::<Vec<_>>(),
                policy
            );
            return Err(KemError::PolicyNotSatisfied);
        }

        if ciphertext.ephemeral.len() != 32 {
            return Err(anyhow::anyhow!("malformed ephemeral key").into());
        }
        let mut ephemeral_bytes = [0u8; 32];
        ephemeral_bytes.copy_from_slice(&ciphertext.ephemeral);
        let ephemeral_public = X25519PublicKey::from(ephemeral_bytes);

        for clause in &ciphertext.clauses {
            let attributes: BTreeSet<String> = clause.attributes.iter().cloned().collect();
            let Some(kek) = Self::derive_kek(&attributes, |a| {
                user.secrets
                    .get(a)
                    .map(|secret| *secret.diffie_hellman(&ephemeral_public).as_bytes())
            }) else {
                continue;
            };

            // A covered clause that fails to unwrap came from another authority.
            if let Ok(unwrapped) = Kek::from(kek).unwrap_vec(&clause.wrapped) {
                return Ok(Secret::from_slice(&unwrapped)?);
            }
        }

        Err(KemError::PolicyNotSatisfied)
    }
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
