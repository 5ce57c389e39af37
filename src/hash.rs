//! Content identity: a deterministic digest over (type, content).
//!
//! Two versions with equal type and content always hash equal and are treated
//! as the same version; digest collisions are deliberately read as identity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::value::{Attributes, canonical_attributes};

/// Domain prefix mixed into every digest.
const HASH_DOMAIN: &[u8] = b"knowledge-cascade/v1";

/// SHA-256 digest identifying a version's content.
///
/// Serializes as hex in human-readable formats (JSON output) and as raw bytes
/// otherwise (the bincode records in the durable store).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, as used in storage keys and output.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex form produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(s: &str) -> KnowledgeResult<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| KnowledgeError::validation(format!("invalid content hash {s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({}…)", &self.to_hex()[..12])
    }
}

/// Hash a content payload together with its content type.
///
/// Both parts are length-prefixed, so moving bytes between type and content
/// always changes the digest.
pub fn compute_hash(content: &str, content_type: &str) -> ContentHash {
    finish(hasher(content, content_type))
}

/// Like [`compute_hash`], additionally covering item attributes.
///
/// An empty attribute map contributes nothing, so attribute-free items hash
/// exactly as [`compute_hash`].
pub fn compute_hash_with(content: &str, content_type: &str, attrs: &Attributes) -> ContentHash {
    let mut h = hasher(content, content_type);
    if !attrs.is_empty() {
        h.update(b"attrs");
        h.update(canonical_attributes(attrs));
    }
    finish(h)
}

fn hasher(content: &str, content_type: &str) -> Sha256 {
    let mut h = Sha256::new();
    h.update(HASH_DOMAIN);
    h.update((content_type.len() as u64).to_le_bytes());
    h.update(content_type.as_bytes());
    h.update((content.len() as u64).to_le_bytes());
    h.update(content.as_bytes());
    h
}

fn finish(h: Sha256) -> ContentHash {
    ContentHash(h.finalize().into())
}
