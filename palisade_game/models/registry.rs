use std::collections::{BTreeMap, HashMap};

use palisade_types::claim::{ClaimId, ClaimKind, PlayerId};
use palisade_types::errors::ClaimError;
use palisade_types::map::{Position, Region, WorldId};

use super::claim::Claim;

/// Per-world indexed collection of claims. Top-level claims are kept in a
/// sorted index keyed by `(min_x, min_z, world_id)` for deterministic
/// iteration; subdivisions are reachable through their parent's child list.
#[derive(Debug)]
pub struct ClaimRegistry {
    world_id: WorldId,
    claims: HashMap<ClaimId, Claim>,
    index: BTreeMap<(i32, i32, WorldId), ClaimId>,
    wilderness: Claim,
}

impl ClaimRegistry {
    pub fn new(world_id: WorldId) -> Self {
        // The sentinel "no claim here" claim spanning the whole world.
        // Spatial queries return it instead of a missing value, so callers
        // never branch on "outside all claims".
        let everywhere = Region {
            world_id,
            min_x: i32::MIN,
            min_z: i32::MIN,
            max_x: i32::MAX,
            max_z: i32::MAX,
            floor_y: i32::MIN,
        };
        let mut wilderness = Claim::wilderness(None, everywhere);
        wilderness.in_registry = true;

        Self {
            world_id,
            claims: HashMap::new(),
            index: BTreeMap::new(),
            wilderness,
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    pub fn wilderness(&self) -> &Claim {
        &self.wilderness
    }

    pub fn get(&self, id: ClaimId) -> Option<&Claim> {
        if id == self.wilderness.id {
            return Some(&self.wilderness);
        }
        self.claims.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ClaimId) -> Option<&mut Claim> {
        self.claims.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Every registered claim, subdivisions included.
    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    /// Top-level claims in index order.
    pub fn top_level(&self) -> impl Iterator<Item = &Claim> {
        self.index.values().filter_map(|id| self.claims.get(id))
    }

    pub fn owned_by(&self, player: PlayerId) -> Vec<ClaimId> {
        self.top_level()
            .filter(|c| c.owner_id == Some(player))
            .map(|c| c.id)
            .collect()
    }

    /// The top-level claim a claim hangs off, or the claim itself.
    pub fn top_level_ancestor<'a>(&'a self, claim: &'a Claim) -> &'a Claim {
        match claim.parent_id() {
            // A subdivision whose parent vanished is inert; fall back to
            // the claim itself rather than chasing a dangling id.
            Some(parent) => self.claims.get(&parent).unwrap_or(claim),
            None => claim,
        }
    }

    /// The effective kind of a claim: subdivisions answer with their
    /// parent's kind, so a subdivision of an admin claim is admin-ruled.
    pub fn effective_kind(&self, claim: &Claim) -> ClaimKind {
        let ancestor = self.top_level_ancestor(claim);
        if ancestor.is_subdivision() {
            // Orphaned subdivision; treat it as basic rather than guessing.
            ClaimKind::Basic
        } else {
            ancestor.kind
        }
    }

    /// The owning player of a claim, resolved through the parent for
    /// subdivisions. Admin and wilderness claims have no owner.
    pub fn effective_owner(&self, claim: &Claim) -> Option<PlayerId> {
        self.top_level_ancestor(claim).owner_id
    }

    /// Hierarchy-aware containment. A point is only inside a subdivision
    /// when it is also inside the parent (a parent resized smaller can
    /// strand a subdivision outside it). With `exclude_subdivisions`, a
    /// point inside any child makes the parent answer false.
    pub fn claim_contains(
        &self,
        claim: &Claim,
        pos: Position,
        ignore_height: bool,
        exclude_subdivisions: bool,
    ) -> bool {
        if !claim.region_contains(pos, ignore_height) {
            return false;
        }

        if let Some(parent_id) = claim.parent_id() {
            return match self.claims.get(&parent_id) {
                Some(parent) => self.claim_contains(parent, pos, ignore_height, false),
                None => false,
            };
        }

        if exclude_subdivisions {
            for child_id in claim.children() {
                if let Some(child) = self.claims.get(child_id) {
                    if self.claim_contains(child, pos, ignore_height, true) {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// The most specific claim containing a point: a subdivision when one
    /// covers it, else the top-level claim, else the wilderness sentinel.
    /// `hint` is a cache fast path: a repeat lookup inside the same claim
    /// resolves without touching the index.
    pub fn find_at(&self, pos: Position, ignore_height: bool, hint: Option<ClaimId>) -> &Claim {
        if let Some(hinted) = hint.and_then(|id| self.claims.get(&id)) {
            if hinted.in_registry && self.claim_contains(hinted, pos, ignore_height, false) {
                // A hinted top-level claim must not shadow its own
                // subdivisions; re-descend before trusting it.
                if let Some(child) = self.child_at(hinted, pos, ignore_height) {
                    return child;
                }
                return hinted;
            }
        }

        for id in self.index.values() {
            let Some(claim) = self.claims.get(id) else {
                continue;
            };
            if !self.claim_contains(claim, pos, ignore_height, false) {
                continue;
            }
            if let Some(child) = self.child_at(claim, pos, ignore_height) {
                return child;
            }
            return claim;
        }

        &self.wilderness
    }

    fn child_at(&self, claim: &Claim, pos: Position, ignore_height: bool) -> Option<&Claim> {
        claim
            .children()
            .iter()
            .filter_map(|id| self.claims.get(id))
            .find(|child| child.region_contains(pos, ignore_height))
    }

    /// Commits a drafted claim. Geometry is validated against the rest of
    /// the registry first; a conflict reports the existing claim and leaves
    /// the registry untouched.
    pub fn insert(&mut self, mut claim: Claim) -> Result<ClaimId, ClaimError> {
        if claim.region.world_id != self.world_id {
            return Err(ClaimError::WorldMismatch {
                region: claim.region.world_id,
                registry: self.world_id,
            });
        }
        if self.claims.contains_key(&claim.id) || claim.id == self.wilderness.id {
            return Err(ClaimError::DuplicateId(claim.id));
        }

        match claim.parent_id() {
            None => {
                if let Some(existing) = self.first_top_level_overlap(&claim.region, None) {
                    return Err(ClaimError::Overlap {
                        conflicting: existing,
                    });
                }
            }
            Some(parent_id) => {
                let parent = self
                    .claims
                    .get(&parent_id)
                    .ok_or(ClaimError::UnknownClaim(parent_id))?;
                if parent.is_subdivision() {
                    return Err(ClaimError::SubdivisionNesting);
                }
                if !parent.region.encloses(&claim.region) {
                    return Err(ClaimError::OutsideParent);
                }
                // Sibling subdivisions may not overlap each other.
                if let Some(sibling) = self.first_sibling_overlap(parent, &claim.region, None) {
                    return Err(ClaimError::Overlap {
                        conflicting: sibling,
                    });
                }
            }
        }

        claim.in_registry = true;
        let id = claim.id;
        match claim.parent_id() {
            Some(parent_id) => match self.claims.get_mut(&parent_id) {
                Some(parent) => parent.attach_child(id)?,
                None => return Err(ClaimError::UnknownClaim(parent_id)),
            },
            None => {
                self.index.insert(claim.region.order_key(), id);
            }
        }
        self.claims.insert(id, claim);

        Ok(id)
    }

    /// Validates and applies a new region for an existing claim. On
    /// conflict nothing changes and the conflicting claim is reported. On
    /// success the replaced region is returned so the caller can clean up
    /// vacated ground.
    pub fn resize(&mut self, id: ClaimId, new_region: Region) -> Result<Region, ClaimError> {
        if id == self.wilderness.id {
            return Err(ClaimError::WildernessImmutable);
        }
        let claim = self.claims.get(&id).ok_or(ClaimError::UnknownClaim(id))?;
        if new_region.world_id != self.world_id {
            return Err(ClaimError::WorldMismatch {
                region: new_region.world_id,
                registry: self.world_id,
            });
        }

        match claim.parent_id() {
            None => {
                if let Some(existing) = self.first_top_level_overlap(&new_region, Some(id)) {
                    return Err(ClaimError::Overlap {
                        conflicting: existing,
                    });
                }
                // Shrinking a parent below a subdivision is refused up
                // front; the stranded child is the reported conflict.
                for child_id in claim.children() {
                    if let Some(child) = self.claims.get(child_id) {
                        if !new_region.encloses(&child.region) {
                            return Err(ClaimError::Overlap {
                                conflicting: *child_id,
                            });
                        }
                    }
                }
            }
            Some(parent_id) => {
                let parent = self
                    .claims
                    .get(&parent_id)
                    .ok_or(ClaimError::UnknownClaim(parent_id))?;
                if !parent.region.encloses(&new_region) {
                    return Err(ClaimError::OutsideParent);
                }
                if let Some(sibling) = self.first_sibling_overlap(parent, &new_region, Some(id)) {
                    return Err(ClaimError::Overlap {
                        conflicting: sibling,
                    });
                }
            }
        }

        let claim = self.claims.get_mut(&id).ok_or(ClaimError::UnknownClaim(id))?;
        let old_region = claim.region;
        let is_top_level = claim.parent_id().is_none();
        claim.region = new_region;
        if is_top_level {
            self.index.remove(&old_region.order_key());
            self.index.insert(new_region.order_key(), id);
        }

        Ok(old_region)
    }

    /// Removes a claim and all of its subdivisions. The removed claims are
    /// returned with `in_registry` cleared, root first.
    pub fn remove(&mut self, id: ClaimId) -> Vec<Claim> {
        let Some(mut claim) = self.claims.remove(&id) else {
            return vec![];
        };

        if let Some(parent_id) = claim.parent_id() {
            if let Some(parent) = self.claims.get_mut(&parent_id) {
                parent.detach_child(id);
            }
        } else {
            self.index.remove(&claim.region.order_key());
        }

        claim.in_registry = false;
        let mut removed = vec![claim];
        let children: Vec<ClaimId> = removed[0].children().to_vec();
        for child_id in children {
            if let Some(mut child) = self.claims.remove(&child_id) {
                child.in_registry = false;
                removed.push(child);
            }
        }

        removed
    }

    /// Top-level claims whose region intersects the box `radius` blocks
    /// around a point. For bulk visualization, not permission decisions.
    pub fn nearby(&self, pos: Position, radius: i32) -> Vec<&Claim> {
        let probe = Region {
            world_id: self.world_id,
            min_x: pos.x,
            min_z: pos.z,
            max_x: pos.x,
            max_z: pos.z,
            floor_y: pos.y,
        }
        .expanded(radius);

        self.top_level()
            .filter(|c| c.region.overlaps(&probe))
            .collect()
    }

    fn first_top_level_overlap(&self, region: &Region, exclude: Option<ClaimId>) -> Option<ClaimId> {
        self.top_level()
            .find(|c| Some(c.id) != exclude && c.region.overlaps(region))
            .map(|c| c.id)
    }

    fn first_sibling_overlap(
        &self,
        parent: &Claim,
        region: &Region,
        exclude: Option<ClaimId>,
    ) -> Option<ClaimId> {
        parent
            .children()
            .iter()
            .filter(|id| Some(**id) != exclude)
            .filter_map(|id| self.claims.get(id))
            .find(|sibling| sibling.region.overlaps(region))
            .map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::test_utils::{
        ClaimFactoryOptions, RegionFactoryOptions, claim_factory, region_factory,
    };

    fn registry_with(world_id: WorldId) -> ClaimRegistry {
        ClaimRegistry::new(world_id)
    }

    fn bounded(world_id: WorldId, bounds: (i32, i32, i32, i32)) -> Region {
        region_factory(RegionFactoryOptions {
            world_id: Some(world_id),
            bounds: Some(bounds),
            ..Default::default()
        })
    }

    #[test]
    fn test_insert_rejects_overlap_and_reports_conflict() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let a = claim_factory(ClaimFactoryOptions {
            region: Some(bounded(world, (0, 0, 10, 10))),
            ..Default::default()
        });
        let a_id = registry.insert(a).unwrap();

        let b = claim_factory(ClaimFactoryOptions {
            region: Some(bounded(world, (5, 5, 15, 15))),
            ..Default::default()
        });
        assert_eq!(
            registry.insert(b),
            Err(ClaimError::Overlap { conflicting: a_id })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_same_id_twice_is_conflict() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let claim = claim_factory(ClaimFactoryOptions {
            region: Some(bounded(world, (0, 0, 10, 10))),
            ..Default::default()
        });
        let id = claim.id;
        registry.insert(claim.clone()).unwrap();

        // Even with non-overlapping geometry the id is taken.
        let mut again = claim;
        again.region = bounded(world, (100, 100, 110, 110));
        again.in_registry = false;
        assert_eq!(registry.insert(again), Err(ClaimError::DuplicateId(id)));
    }

    #[test]
    fn test_find_at_prefers_subdivision() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let owner = Uuid::new_v4();
        let parent = claim_factory(ClaimFactoryOptions {
            region: Some(bounded(world, (0, 0, 20, 20))),
            owner_id: Some(owner),
            ..Default::default()
        });
        let parent_id = registry.insert(parent).unwrap();

        let sub = Claim::subdivision(None, bounded(world, (5, 5, 10, 10)), parent_id);
        let sub_id = registry.insert(sub).unwrap();

        let found = registry.find_at(Position::new(7, 64, 7), true, None);
        assert_eq!(found.id, sub_id);
        assert_eq!(found.parent_id(), Some(parent_id));

        // Outside the subdivision but inside the parent.
        let found = registry.find_at(Position::new(15, 64, 15), true, None);
        assert_eq!(found.id, parent_id);
    }

    #[test]
    fn test_find_at_returns_wilderness_sentinel() {
        let world = Uuid::new_v4();
        let registry = registry_with(world);

        let found = registry.find_at(Position::new(1000, 64, 1000), true, None);
        assert_eq!(found.kind, ClaimKind::Wilderness);
        assert!(found.in_registry);
    }

    #[test]
    fn test_find_at_cache_hint_resolves_repeat_lookup() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let claim = claim_factory(ClaimFactoryOptions {
            region: Some(bounded(world, (0, 0, 10, 10))),
            ..Default::default()
        });
        let id = registry.insert(claim).unwrap();

        let first = registry.find_at(Position::new(3, 64, 3), true, None).id;
        let again = registry.find_at(Position::new(4, 64, 4), true, Some(first)).id;
        assert_eq!(first, id);
        assert_eq!(again, id);

        // A stale hint falls back to the full search.
        let elsewhere = registry.find_at(Position::new(500, 64, 500), true, Some(id));
        assert_eq!(elsewhere.kind, ClaimKind::Wilderness);
    }

    #[test]
    fn test_subdivision_must_stay_inside_parent() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let parent_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 20, 20))),
                ..Default::default()
            }))
            .unwrap();

        let escaping = Claim::subdivision(None, bounded(world, (15, 15, 25, 25)), parent_id);
        assert_eq!(registry.insert(escaping), Err(ClaimError::OutsideParent));
    }

    #[test]
    fn test_sibling_subdivisions_may_not_overlap() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let parent_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 30, 30))),
                ..Default::default()
            }))
            .unwrap();

        let first = Claim::subdivision(None, bounded(world, (0, 0, 10, 10)), parent_id);
        let first_id = registry.insert(first).unwrap();

        let second = Claim::subdivision(None, bounded(world, (8, 8, 20, 20)), parent_id);
        assert_eq!(
            registry.insert(second),
            Err(ClaimError::Overlap {
                conflicting: first_id
            })
        );
    }

    #[test]
    fn test_resize_rejects_overlap_keeps_original() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let a_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 10, 10))),
                ..Default::default()
            }))
            .unwrap();
        let b_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (20, 0, 30, 10))),
                ..Default::default()
            }))
            .unwrap();

        let grown = bounded(world, (0, 0, 25, 10));
        assert_eq!(
            registry.resize(a_id, grown),
            Err(ClaimError::Overlap { conflicting: b_id })
        );
        // Original untouched.
        assert_eq!(registry.get(a_id).unwrap().region.max_x, 10);
    }

    #[test]
    fn test_resize_shrink_below_subdivision_is_refused() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let parent_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 20, 20))),
                ..Default::default()
            }))
            .unwrap();
        let sub_id = registry
            .insert(Claim::subdivision(
                None,
                bounded(world, (10, 10, 18, 18)),
                parent_id,
            ))
            .unwrap();

        assert_eq!(
            registry.resize(parent_id, bounded(world, (0, 0, 12, 12))),
            Err(ClaimError::Overlap {
                conflicting: sub_id
            })
        );
    }

    #[test]
    fn test_resize_updates_index_ordering() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 10, 10))),
                ..Default::default()
            }))
            .unwrap();

        let old = registry.resize(id, bounded(world, (50, 50, 60, 60))).unwrap();
        assert_eq!((old.min_x, old.min_z), (0, 0));

        // The old footprint no longer resolves; the new one does.
        assert_eq!(
            registry.find_at(Position::new(5, 64, 5), true, None).kind,
            ClaimKind::Wilderness
        );
        assert_eq!(registry.find_at(Position::new(55, 64, 55), true, None).id, id);
    }

    #[test]
    fn test_remove_cascades_to_subdivisions() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let parent_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 20, 20))),
                ..Default::default()
            }))
            .unwrap();
        registry
            .insert(Claim::subdivision(
                None,
                bounded(world, (5, 5, 10, 10)),
                parent_id,
            ))
            .unwrap();

        let removed = registry.remove(parent_id);
        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|c| !c.in_registry));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nearby_uses_expanded_box() {
        let world = Uuid::new_v4();
        let mut registry = registry_with(world);

        let near_id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (0, 0, 10, 10))),
                ..Default::default()
            }))
            .unwrap();
        registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(bounded(world, (200, 200, 210, 210))),
                ..Default::default()
            }))
            .unwrap();

        let found = registry.nearby(Position::new(15, 64, 5), 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, near_id);
    }
}
