//! Damage resolution.
//!
//! Damage is split as evenly as integers allow: D over K targets gives each
//! target D / K, and the first D mod K targets take one extra point. The same
//! split is used for unit queues and for base facilities.

use crate::galaxy::Base;
use crate::game::{FacilityKind, InstructionInstance};

/// Split `total` damage over `count` targets.
///
/// Returns one share per target; shares sum to `total` (or are empty when
/// `count == 0`).
#[must_use]
pub fn distribute_damage(total: u32, count: usize) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }
    let count_u32 = u32::try_from(count).unwrap_or(u32::MAX);
    let per = total / count_u32;
    let remainder = total % count_u32;

    (0..count)
        .map(|i| {
            let extra = u32::from(u32::try_from(i).unwrap_or(u32::MAX) < remainder);
            per + extra
        })
        .collect()
}

/// Apply damage to a queue in place.
///
/// Returns the slots whose health reached zero, in ascending order. The caller
/// removes them (after running their removal handlers).
pub fn damage_queue(queue: &mut [InstructionInstance], amount: u32) -> Vec<usize> {
    let shares = distribute_damage(amount, queue.len());
    queue
        .iter_mut()
        .zip(shares)
        .enumerate()
        .filter_map(|(slot, (instance, share))| {
            instance.health = instance.health.saturating_sub(share);
            (instance.health == 0).then_some(slot)
        })
        .collect()
}

/// Apply damage to a base's facilities in place, removing destroyed ones.
///
/// Facilities are hit in kind order. Returns the destroyed facility kinds.
pub fn damage_base(base: &mut Base, amount: u32) -> Vec<FacilityKind> {
    let shares = distribute_damage(amount, base.facilities.len());
    let mut destroyed = Vec::new();
    for ((kind, health), share) in base.facilities.iter_mut().zip(shares) {
        *health = health.saturating_sub(share);
        if *health == 0 {
            destroyed.push(*kind);
        }
    }
    for kind in &destroyed {
        base.facilities.remove(kind);
    }
    destroyed
}

/// Kani formal verification proofs.
///
/// Run with: `cargo kani`
#[cfg(kani)]
mod kani_proofs {
    /// Prove that the even split never loses or creates damage.
    #[kani::proof]
    fn prove_split_conserves_damage() {
        let total: u32 = kani::any();
        let count: u32 = kani::any();
        kani::assume(count > 0);

        let per = total / count;
        let remainder = total % count;

        // count * per + remainder == total without overflow
        let spread = u64::from(per) * u64::from(count) + u64::from(remainder);
        assert!(spread == u64::from(total));
        assert!(remainder < count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::KindId;

    fn instances(healths: &[u32]) -> Vec<InstructionInstance> {
        healths
            .iter()
            .map(|&health| InstructionInstance {
                kind: KindId(0),
                health,
            })
            .collect()
    }

    #[test]
    fn test_distribute_even() {
        assert_eq!(distribute_damage(9, 3), vec![3, 3, 3]);
    }

    #[test]
    fn test_distribute_remainder_goes_first() {
        assert_eq!(distribute_damage(7, 3), vec![3, 2, 2]);
        assert_eq!(distribute_damage(2, 4), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_distribute_no_targets() {
        assert!(distribute_damage(5, 0).is_empty());
    }

    #[test]
    fn test_damage_queue_reports_dead_slots() {
        let mut queue = instances(&[2, 5, 1]);
        let dead = damage_queue(&mut queue, 7);
        // Shares 3, 2, 2
        assert_eq!(dead, vec![0, 2]);
        assert_eq!(queue[1].health, 3);
    }

    #[test]
    fn test_damage_queue_empty() {
        let mut queue = instances(&[]);
        assert!(damage_queue(&mut queue, 10).is_empty());
    }

    #[test]
    fn test_damage_base_removes_destroyed() {
        let mut base = Base::new(1, &[FacilityKind::Home, FacilityKind::Mine]);
        base.facilities.insert(FacilityKind::Mine, 2);

        // Shares 3 (Home), 2 (Mine)
        let destroyed = damage_base(&mut base, 5);
        assert_eq!(destroyed, vec![FacilityKind::Mine]);
        assert_eq!(
            base.facilities[&FacilityKind::Home],
            FacilityKind::Home.max_health() - 3
        );
        assert!(!base.has(FacilityKind::Mine));
    }
}
