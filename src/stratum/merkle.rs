use super::*;

/// Stratum carries merkle branches as the natural big-endian hex of the
/// hash bytes, unlike Txid which displays reversed.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct MerkleNode(sha256d::Hash);

impl fmt::Display for MerkleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_byte_array()))
    }
}

impl MerkleNode {
    pub fn as_byte_array(&self) -> &[u8; 32] {
        self.0.as_byte_array()
    }

    pub fn from_byte_array(b: [u8; 32]) -> Self {
        Self(sha256d::Hash::from_byte_array(b))
    }

    pub fn to_raw_hash(self) -> sha256d::Hash {
        self.0
    }
}

impl FromStr for MerkleNode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() == 64, "merkle node hex must be 64 chars");
        let mut b = [0u8; 32];
        hex::decode_to_slice(s, &mut b)?;
        Ok(MerkleNode(sha256d::Hash::from_byte_array(b)))
    }
}

impl From<sha256d::Hash> for MerkleNode {
    fn from(h: sha256d::Hash) -> Self {
        Self(h)
    }
}

impl From<MerkleNode> for sha256d::Hash {
    fn from(n: MerkleNode) -> Self {
        n.0
    }
}

impl From<Txid> for MerkleNode {
    fn from(txid: Txid) -> Self {
        Self::from_byte_array(txid.to_byte_array())
    }
}

fn hash_pair(a: sha256d::Hash, b: sha256d::Hash) -> sha256d::Hash {
    let mut concat = [0u8; 64];
    concat[..32].copy_from_slice(a.as_byte_array());
    concat[32..].copy_from_slice(b.as_byte_array());
    sha256d::Hash::hash(&concat)
}

/// Constructs the branch a miner needs to recompute the merkle root from its
/// own coinbase hash: the tree is built bottom-up over a reserved coinbase
/// slot at index 0 followed by the template txids, odd levels duplicate their
/// last element, and the stored steps are the siblings along index 0's path.
pub fn merkle_branches(non_coinbase_txids: &[Txid]) -> Vec<MerkleNode> {
    if non_coinbase_txids.is_empty() {
        return Vec::new();
    }

    let mut level = vec![sha256d::Hash::all_zeros()];
    level.extend(non_coinbase_txids.iter().map(|id| id.to_raw_hash()));

    let mut branches = Vec::new();

    while level.len() > 1 {
        // index 0 is the coinbase slot at every level, so the sibling is
        // always index 1
        branches.push(MerkleNode(level[1]));

        let mut next_level = Vec::with_capacity(level.len() / 2 + 1);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            next_level.push(hash_pair(left, right));
        }

        level = next_level;
    }

    branches
}

/// Folds a coinbase hash through the branch, yielding the merkle root. With
/// an empty branch the root is the coinbase hash itself.
pub fn combine_coinbase(coinbase_hash: sha256d::Hash, branches: &[MerkleNode]) -> MerkleNode {
    let mut root = coinbase_hash;
    for branch in branches {
        root = hash_pair(root, branch.0);
    }
    MerkleNode(root)
}
