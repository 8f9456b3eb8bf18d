// sbdl-core/src/infrastructure/adapters/partitioner.rs

use xxhash_rust::xxh64::xxh64;

/// Seed fixed so a key lands on the same partition from one run to the next.
const PARTITION_SEED: u64 = 0;

/// Broker partition for `key` among `partitions` (a zero count is treated as one).
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let n = u64::from(partitions.max(1));
    (xxh64(key.as_bytes(), PARTITION_SEED) % n) as u32
}
