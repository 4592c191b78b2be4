//! Effective vote weight from role-based weight maps.

use alloc::collections::BTreeMap;

/// Weight applied when none of the member's roles carry one.
pub const BASE_WEIGHT: u32 = 1;

/// Resolves the weight of a member holding `roles`.
///
/// The guild-wide and poll-specific maps have equal priority: the highest weight found for any
/// held role in either map wins. A poll cannot lower a weight that the guild grants.
pub fn resolve(roles: &[u64], global: &BTreeMap<u64, u32>, poll: &BTreeMap<u64, u32>) -> u32 {
    roles
        .iter()
        .flat_map(|role| global.get(role).into_iter().chain(poll.get(role)))
        .copied()
        .fold(BASE_WEIGHT, u32::max)
}
