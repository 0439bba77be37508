//! Hashing, Merkle membership and serde helpers shared by every circuit.

use sha3::{Digest, Sha3_256};
use subtle::{Choice, ConstantTimeEq};

use crate::types::{Commitment, MerkleProof};

/// SHA3-256 hash helper.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Domain-separated commitment: `H(len(tag) || tag || len(p0) || p0 || ...)`.
///
/// Every part is length-prefixed so adjacent parts cannot be re-split.
pub fn commit(tag: &[u8], parts: &[&[u8]]) -> Commitment {
    let mut hasher = Sha3_256::new();
    hasher.update((tag.len() as u64).to_le_bytes());
    hasher.update(tag);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Constant-time equality of two commitments.
pub fn ct_eq(a: &Commitment, b: &Commitment) -> bool {
    bool::from(a.ct_eq(b))
}

/// Constant-time membership test: true if `needle` equals any entry.
///
/// Scans the whole list regardless of where (or whether) a match occurs.
pub fn ct_contains(haystack: &[Commitment], needle: &Commitment) -> bool {
    let found = haystack
        .iter()
        .fold(Choice::from(0u8), |acc, entry| acc | entry.ct_eq(needle));
    bool::from(found)
}

const MERKLE_LEAF_PREFIX: u8 = 0x00;
const MERKLE_NODE_PREFIX: u8 = 0x01;

/// `H(0x00 || leaf)`
fn hash_leaf(leaf: &Commitment) -> Commitment {
    let mut hasher = Sha3_256::new();
    hasher.update([MERKLE_LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().into()
}

/// `H(0x01 || left || right)`
fn hash_node(left: &Commitment, right: &Commitment) -> Commitment {
    let mut hasher = Sha3_256::new();
    hasher.update([MERKLE_NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Merkle tree over device commitments, used for whitelist membership.
///
/// Leaves and interior nodes hash under different prefixes, so an interior
/// node can never be presented as a whitelisted leaf. The leaf count is
/// padded to a power of two with zero commitments.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    leaves: Vec<Commitment>,
    /// `levels[0]` holds the hashed leaves, the last level holds the root.
    levels: Vec<Vec<Commitment>>,
}

impl MerkleTree {
    pub fn from_leaves(leaves: &[Commitment]) -> Self {
        if leaves.is_empty() {
            return Self {
                leaves: Vec::new(),
                levels: vec![vec![[0u8; 32]]],
            };
        }

        let width = leaves.len().next_power_of_two();
        let mut level: Vec<Commitment> = leaves
            .iter()
            .chain(std::iter::repeat(&[0u8; 32]))
            .take(width)
            .map(hash_leaf)
            .collect();

        let mut levels = Vec::new();
        while level.len() > 1 {
            let parent = level.chunks_exact(2).map(|pair| hash_node(&pair[0], &pair[1])).collect();
            levels.push(std::mem::replace(&mut level, parent));
        }
        levels.push(level);

        Self {
            leaves: leaves.to_vec(),
            levels,
        }
    }

    pub fn root(&self) -> Commitment {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Number of real (unpadded) leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Membership path for the leaf at `leaf_index`, bottom-up.
    pub fn prove(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf = *self.leaves.get(leaf_index)?;
        let depth = self.levels.len() - 1;

        let mut index = leaf_index;
        let mut siblings = Vec::with_capacity(depth);
        for level in &self.levels[..depth] {
            siblings.push(*level.get(index ^ 1)?);
            index /= 2;
        }
        Some(MerkleProof::new(siblings, leaf_index, leaf))
    }

    /// Recompute the root from `proof` and compare in constant time.
    pub fn verify_proof(root: &Commitment, proof: &MerkleProof) -> bool {
        let mut index = proof.leaf_index();
        let mut current = hash_leaf(proof.leaf_hash());
        for sibling in proof.siblings() {
            current = if index & 1 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
            index >>= 1;
        }
        index == 0 && ct_eq(&current, root)
    }
}

/// Serde adapters that encode 32-byte commitments as hex strings.
pub mod serde_hex {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    fn decode<'de, D: Deserializer<'de>>(s: &str) -> Result<[u8; 32], D::Error> {
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| D::Error::custom(format!("expected 32 bytes, got {}", v.len())))
    }

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        decode::<D>(&s)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(bytes: &Option<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => s.serialize_some(&hex::encode(b)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| decode::<D>(&s))
                .transpose()
        }
    }

    pub mod vec {
        use super::*;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(list: &[[u8; 32]], s: S) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(list.len()))?;
            for bytes in list {
                seq.serialize_element(&hex::encode(bytes))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<[u8; 32]>, D::Error> {
            Vec::<String>::deserialize(d)?
                .iter()
                .map(|s| decode::<D>(s))
                .collect()
        }
    }
}
