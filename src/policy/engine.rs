//! Access policy engine
//!
//! The single place where the role policy table lives. Handlers call
//! [`authorize`] with the caller's role and resolved scope and get back a
//! [`Decision`]: allowed or not, plus the visibility filter to apply to the
//! storage query. No route carries its own role conditionals.

use std::collections::BTreeSet;

use crate::types::VemsError;

use super::{Role, ResolvedScope};

/// Entity families sharing owner + village scoping rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Report,
    Sos,
    Note,
    Announcement,
    Polygon,
    VillageStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

/// Village constraint on a query or mutation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VillageFilter {
    /// No village constraint
    Any,
    /// Only records attributed to a village in this set. An empty set means
    /// an empty result, never an error and never the full dataset.
    In(BTreeSet<i64>),
}

impl VillageFilter {
    /// Intersect with an optional caller-supplied village filter.
    ///
    /// A query parameter can only narrow the permitted scope, never widen
    /// it: asking for a village outside the scope yields the empty filter.
    pub fn narrow(self, requested: Option<i64>) -> VillageFilter {
        match (self, requested) {
            (filter, None) => filter,
            (VillageFilter::Any, Some(v)) => VillageFilter::In(BTreeSet::from([v])),
            (VillageFilter::In(set), Some(v)) => {
                if set.contains(&v) {
                    VillageFilter::In(BTreeSet::from([v]))
                } else {
                    VillageFilter::In(BTreeSet::new())
                }
            }
        }
    }

    /// True when the filter can never match a record
    pub fn is_empty(&self) -> bool {
        matches!(self, VillageFilter::In(set) if set.is_empty())
    }

    /// Whether a mutation targeting `village_id` is inside this filter
    pub fn permits(&self, village_id: i64) -> bool {
        match self {
            VillageFilter::Any => true,
            VillageFilter::In(set) => set.contains(&village_id),
        }
    }
}

/// Outcome of an allowed authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Restrict to records owned by the caller
    pub owner_only: bool,
    /// Villages the operation may touch
    pub villages: VillageFilter,
    /// Announcements only: on reads, union village-less (global) records
    /// with the village filter instead of intersecting; on creates, a
    /// village-less (global) target is permitted.
    pub include_global: bool,
}

impl Decision {
    fn owned() -> Self {
        Decision {
            owner_only: true,
            villages: VillageFilter::Any,
            include_global: false,
        }
    }

    fn villages(scope: &ResolvedScope) -> Self {
        Decision {
            owner_only: false,
            villages: VillageFilter::In(scope.villages()),
            include_global: false,
        }
    }

    fn with_global(mut self) -> Self {
        self.include_global = true;
        self
    }
}

fn denied(role: Role, entity: EntityKind, op: Operation) -> VemsError {
    VemsError::Authorization(format!("{role} may not {op:?} {entity:?}").to_lowercase())
}

/// Decide whether `role` may perform `op` on `entity`, and over which
/// villages. The policy table:
///
/// | Role     | Report/SOS read | Report/SOS write          | Note/Polygon | Announcement            | Village status |
/// |----------|-----------------|---------------------------|--------------|-------------------------|----------------|
/// | villager | own records     | create own                | none         | read own village+global | read own       |
/// | head     | own village     | create; resolve/delete in own village | CRUD own village | CRUD own village, read+global | read/update own |
/// | super    | assigned set    | none                      | none         | create in scope or global, read scope+global | read scope |
pub fn authorize(
    role: Role,
    scope: &ResolvedScope,
    entity: EntityKind,
    op: Operation,
) -> Result<Decision, VemsError> {
    use EntityKind::*;
    use Operation::*;

    let decision = match (entity, op, role) {
        // --- Reports and SOS signals share visibility rules ---
        (Report | Sos, Read, Role::Villager) => Decision::owned(),
        (Report | Sos, Read, Role::Head | Role::Super) => Decision::villages(scope),
        (Report | Sos, Create, Role::Villager | Role::Head) => Decision::villages(scope),
        // resolution and cleanup are the head's operational override,
        // bounded to their own village
        (Report, Delete, Role::Head) => Decision::villages(scope),
        (Sos, Update | Delete, Role::Head) => Decision::villages(scope),

        // --- Notes and hazard polygons: head-only, own village ---
        (Note | Polygon, _, Role::Head) => Decision::villages(scope),

        // --- Announcements ---
        (Announcement, Read, _) => Decision::villages(scope).with_global(),
        (Announcement, Create, Role::Head) => Decision::villages(scope),
        (Announcement, Create, Role::Super) => Decision::villages(scope).with_global(),
        (Announcement, Update | Delete, Role::Head) => Decision::villages(scope),

        // --- Village status ---
        (VillageStatus, Read, _) => Decision::villages(scope),
        (VillageStatus, Update, Role::Head) => Decision::villages(scope),

        _ => return Err(denied(role, entity, op)),
    };

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own(v: i64) -> ResolvedScope {
        ResolvedScope::Own(Some(v))
    }

    fn set(ids: &[i64]) -> ResolvedScope {
        ResolvedScope::Set(ids.iter().copied().collect())
    }

    #[test]
    fn test_villager_reads_own_records_only() {
        let d = authorize(Role::Villager, &own(7), EntityKind::Report, Operation::Read).unwrap();
        assert!(d.owner_only);
        assert_eq!(d.villages, VillageFilter::Any);
    }

    #[test]
    fn test_head_reads_whole_village() {
        let d = authorize(Role::Head, &own(7), EntityKind::Report, Operation::Read).unwrap();
        assert!(!d.owner_only);
        assert_eq!(d.villages, VillageFilter::In(BTreeSet::from([7])));
    }

    #[test]
    fn test_super_reads_assigned_set() {
        let d = authorize(Role::Super, &set(&[7, 9]), EntityKind::Sos, Operation::Read).unwrap();
        assert_eq!(d.villages, VillageFilter::In(BTreeSet::from([7, 9])));
    }

    #[test]
    fn test_super_empty_scope_is_empty_filter_not_error() {
        let d = authorize(Role::Super, &set(&[]), EntityKind::Report, Operation::Read).unwrap();
        assert!(d.villages.is_empty());
    }

    #[test]
    fn test_super_cannot_write_reports() {
        assert!(authorize(Role::Super, &set(&[7]), EntityKind::Report, Operation::Create).is_err());
        assert!(authorize(Role::Super, &set(&[7]), EntityKind::Report, Operation::Delete).is_err());
        assert!(authorize(Role::Super, &set(&[7]), EntityKind::Sos, Operation::Update).is_err());
    }

    #[test]
    fn test_villager_cannot_mutate_beyond_create() {
        assert!(authorize(Role::Villager, &own(7), EntityKind::Report, Operation::Delete).is_err());
        assert!(authorize(Role::Villager, &own(7), EntityKind::Report, Operation::Update).is_err());
        // reports have no update operation for anyone
        assert!(authorize(Role::Head, &own(7), EntityKind::Report, Operation::Update).is_err());
        let d =
            authorize(Role::Villager, &own(7), EntityKind::Report, Operation::Create).unwrap();
        assert!(d.villages.permits(7));
        assert!(!d.villages.permits(9));
    }

    #[test]
    fn test_unassigned_villager_can_create_nowhere() {
        let d = authorize(
            Role::Villager,
            &ResolvedScope::Own(None),
            EntityKind::Report,
            Operation::Create,
        )
        .unwrap();
        assert!(d.villages.is_empty());
    }

    #[test]
    fn test_notes_and_polygons_are_head_only() {
        for entity in [EntityKind::Note, EntityKind::Polygon] {
            for op in [
                Operation::Read,
                Operation::Create,
                Operation::Update,
                Operation::Delete,
            ] {
                assert!(authorize(Role::Villager, &own(7), entity, op).is_err());
                assert!(authorize(Role::Super, &set(&[7]), entity, op).is_err());
                let d = authorize(Role::Head, &own(7), entity, op).unwrap();
                assert!(d.villages.permits(7));
            }
        }
    }

    #[test]
    fn test_announcement_reads_include_global_for_every_role() {
        for (role, scope) in [
            (Role::Villager, own(7)),
            (Role::Head, own(7)),
            (Role::Super, set(&[7, 9])),
            (Role::Super, set(&[])),
        ] {
            let d = authorize(role, &scope, EntityKind::Announcement, Operation::Read).unwrap();
            assert!(d.include_global);
        }
    }

    #[test]
    fn test_head_announcement_create_is_village_bound() {
        let d = authorize(Role::Head, &own(7), EntityKind::Announcement, Operation::Create)
            .unwrap();
        assert!(!d.include_global);
        assert!(d.villages.permits(7));
    }

    #[test]
    fn test_super_announcement_create_allows_global_target() {
        let d = authorize(
            Role::Super,
            &set(&[7, 9]),
            EntityKind::Announcement,
            Operation::Create,
        )
        .unwrap();
        assert!(d.include_global);
        assert!(d.villages.permits(9));
        assert!(!d.villages.permits(12));
    }

    #[test]
    fn test_villager_cannot_author_announcements() {
        assert!(
            authorize(Role::Villager, &own(7), EntityKind::Announcement, Operation::Create)
                .is_err()
        );
    }

    #[test]
    fn test_village_status_write_is_head_only() {
        assert!(authorize(Role::Head, &own(7), EntityKind::VillageStatus, Operation::Update).is_ok());
        assert!(
            authorize(Role::Villager, &own(7), EntityKind::VillageStatus, Operation::Update)
                .is_err()
        );
        assert!(
            authorize(Role::Super, &set(&[7]), EntityKind::VillageStatus, Operation::Update)
                .is_err()
        );
    }

    #[test]
    fn test_narrow_intersects_never_widens() {
        let in_scope = VillageFilter::In(BTreeSet::from([7, 9]));
        assert_eq!(
            in_scope.clone().narrow(Some(7)),
            VillageFilter::In(BTreeSet::from([7]))
        );
        assert!(in_scope.clone().narrow(Some(12)).is_empty());
        assert_eq!(in_scope.clone().narrow(None), in_scope);
    }

    #[test]
    fn test_narrow_constrains_unfiltered_visibility() {
        // villager listing with ?village_id= adds a term instead of widening
        assert_eq!(
            VillageFilter::Any.narrow(Some(3)),
            VillageFilter::In(BTreeSet::from([3]))
        );
    }
}
