//! Scope resolution
//!
//! Maps an identity to the set of villages it may act on. Pure function over
//! stored state; the caller loads the identity record (and, for supers, the
//! access assignment) and hands the relevant fields in.

use std::collections::BTreeSet;

use super::Role;

/// The villages an identity is permitted to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedScope {
    /// villager/head: at most one assigned village. `None` means the
    /// identity is unassigned and nothing is visible.
    Own(Option<i64>),
    /// super: the explicitly assigned village set. Empty means nothing is
    /// visible - never the full dataset.
    Set(BTreeSet<i64>),
}

impl ResolvedScope {
    /// The concrete village set this scope covers
    pub fn villages(&self) -> BTreeSet<i64> {
        match self {
            ResolvedScope::Own(Some(v)) => BTreeSet::from([*v]),
            ResolvedScope::Own(None) => BTreeSet::new(),
            ResolvedScope::Set(set) => set.clone(),
        }
    }

    /// Whether a specific village falls inside this scope
    pub fn contains(&self, village_id: i64) -> bool {
        match self {
            ResolvedScope::Own(Some(v)) => *v == village_id,
            ResolvedScope::Own(None) => false,
            ResolvedScope::Set(set) => set.contains(&village_id),
        }
    }
}

/// Resolve an identity's village scope.
///
/// For villager/head the scope is the single assigned village from the
/// identity record. For super it is the stored assignment's village list;
/// a missing assignment resolves to the empty set, which is "nothing
/// visible", not an error.
pub fn resolve_scope(
    role: Role,
    assigned_village: Option<i64>,
    assignment: Option<&[i64]>,
) -> ResolvedScope {
    match role {
        Role::Villager | Role::Head => ResolvedScope::Own(assigned_village),
        Role::Super => ResolvedScope::Set(
            assignment
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_villager_scope_is_assigned_village() {
        let scope = resolve_scope(Role::Villager, Some(7), None);
        assert_eq!(scope, ResolvedScope::Own(Some(7)));
        assert!(scope.contains(7));
        assert!(!scope.contains(9));
    }

    #[test]
    fn test_unassigned_villager_sees_nothing() {
        let scope = resolve_scope(Role::Villager, None, None);
        assert!(scope.villages().is_empty());
        assert!(!scope.contains(1));
    }

    #[test]
    fn test_super_scope_is_assignment_list() {
        let scope = resolve_scope(Role::Super, None, Some(&[7, 9]));
        assert_eq!(scope.villages(), BTreeSet::from([7, 9]));
        assert!(scope.contains(7));
        assert!(!scope.contains(12));
    }

    #[test]
    fn test_super_without_assignment_is_empty_not_all() {
        let scope = resolve_scope(Role::Super, None, None);
        assert_eq!(scope, ResolvedScope::Set(BTreeSet::new()));
        assert!(scope.villages().is_empty());
    }

    #[test]
    fn test_super_ignores_assigned_village_field() {
        // a stray assigned_village on a super identity must not leak into scope
        let scope = resolve_scope(Role::Super, Some(3), Some(&[7]));
        assert_eq!(scope.villages(), BTreeSet::from([7]));
    }

    #[test]
    fn test_assignment_deduplicates() {
        let scope = resolve_scope(Role::Super, None, Some(&[7, 7, 9]));
        assert_eq!(scope.villages(), BTreeSet::from([7, 9]));
    }
}
