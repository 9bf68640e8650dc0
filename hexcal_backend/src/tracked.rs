//! Owner addresses the canister refreshes. Persisted across upgrades.

use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::{StableBTreeMap, StableCell};
use std::cell::RefCell;

use crate::memory_ids::{OWNER_SEQUENCE_MEMORY_ID, TRACKED_OWNERS_MEMORY_ID};
use crate::types::Address;
use crate::Memory;

thread_local! {
    // owner -> insertion sequence
    static TRACKED_OWNERS: RefCell<StableBTreeMap<Address, u64, Memory>> = RefCell::new(
        StableBTreeMap::init(
            crate::MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(TRACKED_OWNERS_MEMORY_ID)))
        )
    );

    static NEXT_SEQUENCE: RefCell<StableCell<u64, Memory>> = RefCell::new(
        StableCell::init(
            crate::MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(OWNER_SEQUENCE_MEMORY_ID))),
            0,
        ).expect("Failed to init owner sequence")
    );
}

fn take_sequence() -> u64 {
    NEXT_SEQUENCE.with(|cell| {
        let mut cell = cell.borrow_mut();
        let seq = *cell.get();
        cell.set(seq + 1).expect("Failed to advance owner sequence");
        seq
    })
}

/// Start tracking `owner`. Returns false if it was already tracked.
pub fn add_owner(owner: Address) -> bool {
    if is_tracked(&owner) {
        return false;
    }
    let seq = take_sequence();
    TRACKED_OWNERS.with(|map| map.borrow_mut().insert(owner, seq));
    true
}

/// Stop tracking `owner`. Returns false if it was not tracked.
pub fn remove_owner(owner: &Address) -> bool {
    TRACKED_OWNERS.with(|map| map.borrow_mut().remove(owner).is_some())
}

pub fn is_tracked(owner: &Address) -> bool {
    TRACKED_OWNERS.with(|map| map.borrow().contains_key(owner))
}

/// Tracked owners, oldest first
pub fn list_owners() -> Vec<Address> {
    let mut entries: Vec<(Address, u64)> = TRACKED_OWNERS.with(|map| map.borrow().iter().collect());
    entries.sort_by_key(|(_, seq)| *seq);
    entries.into_iter().map(|(owner, _)| owner).collect()
}
