// crates/hearsay-p2p/src/routing.rs
//
// XOR-distance ranking for DHT key locality. Keys and peer ids are mapped
// into a 128-bit space; ranking is for replica placement only, not a full
// Kademlia routing table.

use sha2::{Digest, Sha256};

/// Bytes of the routing identifier.
pub const ID_LEN: usize = 16;

pub type RoutingId = [u8; ID_LEN];

fn truncate(bytes: &[u8]) -> RoutingId {
    let mut id = [0u8; ID_LEN];
    id.copy_from_slice(&bytes[..ID_LEN]);
    id
}

/// Routing id of a DHT key: the first 16 bytes of sha256(key).
pub fn key_id(key: &str) -> RoutingId {
    truncate(&Sha256::digest(key.as_bytes()))
}

/// Routing id of a peer.
///
/// Peer ids are already hex hashes, so their leading 16 bytes are used
/// directly; anything that is not valid hex is hashed instead.
pub fn peer_routing_id(peer_id: &str) -> RoutingId {
    match peer_id.get(..ID_LEN * 2).map(hex::decode) {
        Some(Ok(bytes)) => truncate(&bytes),
        _ => truncate(&Sha256::digest(peer_id.as_bytes())),
    }
}

/// Bitwise XOR distance. Arrays compare big-endian, so `Ord` is magnitude.
pub fn distance(a: &RoutingId, b: &RoutingId) -> RoutingId {
    let mut out = [0u8; ID_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}

/// The `k` peers closest to `key`, nearest first.
pub fn closest<'a, I>(key: &str, peer_ids: I, k: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let target = key_id(key);
    let mut ranked: Vec<(RoutingId, &String)> = peer_ids
        .into_iter()
        .map(|id| (distance(&peer_routing_id(id), &target), id))
        .collect();
    ranked.sort();
    ranked.into_iter().take(k).map(|(_, id)| id.clone()).collect()
}
