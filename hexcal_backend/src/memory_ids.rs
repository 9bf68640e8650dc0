//! Central registry for stable memory IDs.
//!
//! All memory IDs must be unique across the canister.
//!
//! Allocation strategy:
//! - 0-9: Configuration
//! - 10-19: Tracked owners

// Configuration (0-9)
pub const CONFIG_MEMORY_ID: u8 = 0;

// Tracked owners (10-19)
pub const TRACKED_OWNERS_MEMORY_ID: u8 = 10;
pub const OWNER_SEQUENCE_MEMORY_ID: u8 = 11;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_ids_are_unique() {
        let ids = [CONFIG_MEMORY_ID, TRACKED_OWNERS_MEMORY_ID, OWNER_SEQUENCE_MEMORY_ID];

        let mut sorted = ids;
        sorted.sort();
        for i in 1..sorted.len() {
            assert_ne!(sorted[i - 1], sorted[i], "Duplicate memory ID found: {}", sorted[i]);
        }
    }
}
