//! Mutual-exclusion relations between state flags.
//!
//! Two kinds of relation feed one cascade algorithm:
//! - a single bipartite pair, where every bit of side A excludes every bit of
//!   side B (`set_pair`)
//! - any number of self-mutex groups, where all bits of the group exclude
//!   each other (`add_group`)

use crate::controller::{ControllerError, Result};
use crate::core::bits;
use std::collections::BTreeMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

#[derive(Clone, Debug, Default)]
pub struct MutexTable {
    pair: Option<(Vec<u32>, Vec<u32>)>,
    groups: BTreeMap<u32, Vec<u32>>,
}

fn mask_of(members: &[u32]) -> u32 {
    members.iter().fold(0, |acc, m| acc | m)
}

impl MutexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bipartite relation.
    pub fn set_pair(&mut self, a: &[u32], b: &[u32]) {
        self.pair = Some((a.to_vec(), b.to_vec()));
    }

    /// Register a self-mutex group keyed by the OR of its members.
    pub fn add_group(&mut self, group: &[u32]) -> Result<()> {
        let key = mask_of(group) & bits::ALL_FLAGS;
        if key == 0 {
            return Err(ControllerError::EmptyMutexGroup);
        }
        self.groups.insert(key, group.to_vec());
        Ok(())
    }

    /// Remove the group whose members OR to the same key.
    pub fn remove_group(&mut self, group: &[u32]) -> bool {
        self.groups.remove(&mask_of(group)).is_some()
    }

    pub fn clear(&mut self) {
        self.pair = None;
        self.groups.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pair.is_none() && self.groups.is_empty()
    }

    /// Members opposing `flag`: the other side of the pair, else the first
    /// group whose key overlaps `flag`.
    pub fn mutex_state(&self, flag: u32) -> Option<Vec<u32>> {
        if let Some((a, b)) = &self.pair {
            if mask_of(a) & flag != 0 {
                return Some(b.clone());
            }
            if mask_of(b) & flag != 0 {
                return Some(a.clone());
            }
        }
        self.groups
            .iter()
            .find(|(key, _)| *key & flag != 0)
            .map(|(_, members)| members.clone())
    }

    /// Mask of every bit mutually exclusive with `flag`.
    pub fn partners(&self, flag: u32) -> u32 {
        let mut partners = 0;
        if let Some((a, b)) = &self.pair {
            let (a, b) = (mask_of(a), mask_of(b));
            if a & flag != 0 {
                partners |= b;
            }
            if b & flag != 0 {
                partners |= a;
            }
        }
        for key in self.groups.keys() {
            if key & flag != 0 {
                partners |= key;
            }
        }
        partners & !flag
    }

    /// Check that no two bits of `flags` exclude each other, collecting every
    /// conflicting pair.
    pub fn validate(&self, flags: u32) -> Validation<(), NonEmptyVec<(u32, u32)>> {
        if bits::is_single_flag(flags) || self.is_empty() {
            return Validation::success(());
        }
        let checks: Vec<Validation<(), NonEmptyVec<(u32, u32)>>> = bits::iter_flags(flags)
            .flat_map(|flag| {
                // only lower partners, so each pair is reported once
                let below = flag - 1;
                bits::iter_flags(self.partners(flag) & flags & below)
                    .map(move |other| Validation::fail((flag, other)))
            })
            .collect();
        Validation::all_vec(checks).map(|_| ())
    }

    /// Like [`validate`](Self::validate), surfaced as a `MutexConflict`.
    pub fn check(&self, flags: u32) -> Result<()> {
        match self.validate(flags) {
            Validation::Success(()) => Ok(()),
            Validation::Failure(pairs) => Err(ControllerError::MutexConflict {
                flags,
                pairs: pairs.iter().copied().collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EAT: u32 = 1;
    const WORK: u32 = 2;
    const SLEEP: u32 = 4;
    const WORK2: u32 = 8;

    #[test]
    fn pair_sides_exclude_each_other() {
        let mut table = MutexTable::new();
        table.set_pair(&[EAT], &[SLEEP, WORK]);

        assert_eq!(table.partners(EAT), SLEEP | WORK);
        assert_eq!(table.partners(SLEEP), EAT);
        assert_eq!(table.partners(WORK2), 0);
        assert_eq!(table.mutex_state(WORK), Some(vec![EAT]));
    }

    #[test]
    fn group_members_exclude_each_other() {
        let mut table = MutexTable::new();
        table.add_group(&[WORK, WORK2, SLEEP]).unwrap();

        assert_eq!(table.partners(WORK), WORK2 | SLEEP);
        assert_eq!(table.mutex_state(WORK2), Some(vec![WORK, WORK2, SLEEP]));
        assert!(table.mutex_state(EAT).is_none());
    }

    #[test]
    fn pair_is_consulted_before_groups() {
        let mut table = MutexTable::new();
        table.add_group(&[EAT, WORK]).unwrap();
        table.set_pair(&[EAT], &[SLEEP]);
        assert_eq!(table.mutex_state(EAT), Some(vec![SLEEP]));
        assert_eq!(table.partners(EAT), SLEEP | WORK);
    }

    #[test]
    fn empty_group_is_rejected() {
        let mut table = MutexTable::new();
        assert_eq!(table.add_group(&[]), Err(ControllerError::EmptyMutexGroup));
        assert!(table.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let mut table = MutexTable::new();
        table.add_group(&[WORK, WORK2]).unwrap();
        assert!(table.remove_group(&[WORK2, WORK]));
        assert!(!table.remove_group(&[WORK2, WORK]));

        table.set_pair(&[EAT], &[SLEEP]);
        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn validation_accumulates_every_pair() {
        let mut table = MutexTable::new();
        table.set_pair(&[EAT], &[SLEEP]);
        table.add_group(&[WORK, WORK2]).unwrap();

        match table.validate(EAT | WORK | SLEEP | WORK2) {
            Validation::Failure(pairs) => {
                let pairs: Vec<_> = pairs.iter().copied().collect();
                assert_eq!(pairs, vec![(WORK2, WORK), (SLEEP, EAT)]);
            }
            Validation::Success(_) => panic!("Expected conflicts, got success"),
        }
    }

    #[test]
    fn compatible_composites_pass() {
        let mut table = MutexTable::new();
        table.set_pair(&[EAT], &[SLEEP]);
        assert!(table.check(EAT | WORK).is_ok());
        assert!(table.check(SLEEP).is_ok());
        assert!(matches!(
            table.check(EAT | SLEEP),
            Err(ControllerError::MutexConflict { flags: 5, .. })
        ));
    }
}
