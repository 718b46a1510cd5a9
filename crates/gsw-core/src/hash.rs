use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::SweepError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hash for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, SweepError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn hash_ignores_map_order() {
        let sorted: BTreeMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        let hashed: HashMap<&str, i32> = [("b", 2), ("a", 1)].into_iter().collect();
        let left = stable_hash_string(&sorted).expect("hash");
        assert_eq!(left, stable_hash_string(&hashed).expect("hash"));
        assert_eq!(left.len(), 64);
    }
}
