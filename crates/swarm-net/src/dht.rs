//! A simplified Kademlia-style node table: given a target node-id, return
//! the `k` known peers whose id is closest to it under XOR distance over a
//! SHA-256 digest of the id. Used to answer `DHT_FIND_NODE` and to widen
//! the WAN peer view beyond directly-connected neighbors.

use sha2::{Digest, Sha256};

use crate::protocol::types::PeerAddr;

fn key_of(node_id: &str) -> [u8; 32] {
    Sha256::digest(node_id.as_bytes()).into()
}

fn xor_distance(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// Return the `k` entries in `known` closest to `target`, nearest first.
pub fn closest_peers(target: &str, known: &[PeerAddr], k: usize) -> Vec<PeerAddr> {
    let target_key = key_of(target);
    let mut scored: Vec<(std::cmp::Reverse<[u8; 32]>, &PeerAddr)> = known
        .iter()
        .map(|p| (std::cmp::Reverse(xor_distance(&key_of(&p.node_id), &target_key)), p))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().rev().take(k).map(|(_, p)| p.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str) -> PeerAddr {
        PeerAddr {
            node_id: id.to_string(),
            addr: "127.0.0.1:7420".into(),
        }
    }

    #[test]
    fn exact_match_is_closest() {
        let known = vec![peer("alice"), peer("bob"), peer("carol")];
        let closest = closest_peers("bob", &known, 1);
        assert_eq!(closest[0].node_id, "bob");
    }

    #[test]
    fn respects_k_limit() {
        let known = vec![peer("alice"), peer("bob"), peer("carol")];
        let closest = closest_peers("zzz", &known, 2);
        assert_eq!(closest.len(), 2);
    }
}
